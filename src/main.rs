// src/main.rs
use anyhow::{Context as _, Result};
use lexgen::{
    Pattern, RuleDef, RuleSet, ScanConfig,
    pattern::StartConditionDef,
    tables::{self, Layout},
};

/// A tiny scanner covering identifiers, ints, comments, and symbols.
fn sample_rules() -> RuleSet {
    let ident_start = Pattern::class(&[(b'a', b'z'), (b'A', b'Z'), (b'_', b'_')]);
    let ident_rest = Pattern::class(&[(b'a', b'z'), (b'A', b'Z'), (b'0', b'9'), (b'_', b'_')]);
    let digits = Pattern::plus(Pattern::range(b'0', b'9'));

    RuleSet {
        start_conditions: vec![StartConditionDef {
            name: "COMMENT".into(),
            exclusive: true,
        }],
        rules: vec![
            RuleDef::new(Pattern::lit("if")),
            RuleDef::new(Pattern::lit("else")),
            RuleDef::new(Pattern::Seq(vec![ident_start, Pattern::star(ident_rest)])),
            RuleDef::new(digits.clone()),
            // 12.5 but also `12.` before a method name
            RuleDef::new(digits.clone()).with_trailing(Pattern::Seq(vec![
                Pattern::Byte(b'.'),
                Pattern::range(b'a', b'z'),
            ])),
            RuleDef::new(Pattern::Seq(vec![Pattern::lit("//"), Pattern::star(Pattern::Any)])),
            RuleDef::new(Pattern::lit("/*")),
            RuleDef::new(Pattern::lit("*/")).in_start_conditions(&["COMMENT"]),
            RuleDef::new(Pattern::Any).in_start_conditions(&["COMMENT"]),
            RuleDef::new(Pattern::Alt(vec![
                Pattern::lit("=="),
                Pattern::lit("<="),
                Pattern::lit(">="),
            ])),
            RuleDef::new(Pattern::class(&[(b'+', b'+'), (b'-', b'-'), (b'*', b'*'), (b'/', b'/')])),
            RuleDef::new(Pattern::plus(Pattern::class(&[(b' ', b' '), (b'\t', b'\t'), (b'\n', b'\n')]))),
            RuleDef::new(Pattern::Any),
        ],
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let rules = match std::env::args().nth(1) {
        Some(path) => RuleSet::from_json_file(&path).with_context(|| format!("loading {path}"))?,
        None => sample_rules(),
    };
    let cfg = match std::env::var("LEXGEN_CONFIG") {
        Ok(path) => ScanConfig::from_json_file(&path)?,
        Err(_) => ScanConfig::default(),
    }
    .with_env_overrides();

    let compiled = rules.compile(cfg)?;

    let bad = tables::verify(&compiled.dfa, &compiled.tables);
    if !bad.is_empty() {
        anyhow::bail!(
            "{} table entries disagree with the DFA (first: {:?})",
            bad.len(),
            bad[0]
        );
    }

    println!("{}", compiled.stats);
    match &compiled.tables.layout {
        Layout::Compressed(ct) => println!(
            "compressed: {} base/def, {} nxt/chk, {} templates",
            ct.base.len(),
            ct.nxt.len(),
            ct.numtemps
        ),
        Layout::Full(ft) => println!("full: {} x {}", compiled.dfa.lastdfa(), ft.width),
        Layout::FullSpeed(fs) => println!("full-speed: {} entries", fs.entries.len()),
    }
    if compiled.stats.num_backing_up > 0 && !compiled.stats.backing_up_report.is_empty() {
        print!("{}", compiled.stats.backing_up_text());
    }
    Ok(())
}
