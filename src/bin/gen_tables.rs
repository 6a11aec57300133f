// src/bin/gen_tables.rs
// Compile a rules JSON file into scanner tables and write them out.
// Usage:
//   cargo run --bin gen_tables -- rules.json                 # writes tables/scanner_tables.json
//   cargo run --bin gen_tables -- rules.json /path/out.bin   # compact binary
// LEXGEN_CONFIG=path picks a ScanConfig JSON; LEXGEN_* flags override it.

use std::{env, fs, path::Path};

use anyhow::{Context as _, Result, bail};
use lexgen::{RuleSet, ScanConfig, tables};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(rules_path) = env::args().nth(1) else {
        bail!("usage: gen_tables <rules.json> [out.json|out.bin]");
    };
    let out = env::args()
        .nth(2)
        .unwrap_or_else(|| "tables/scanner_tables.json".to_string());
    let out_path = Path::new(&out);

    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let cfg = match env::var("LEXGEN_CONFIG") {
        Ok(path) => ScanConfig::from_json_file(&path)?,
        Err(_) => ScanConfig::default(),
    }
    .with_env_overrides();

    println!("[gen_tables] compiling {rules_path} ({:?} tables)…", cfg.tables);
    let rules = RuleSet::from_json_file(&rules_path)?;
    let compiled = rules.compile(cfg)?;

    let bad = tables::verify(&compiled.dfa, &compiled.tables);
    if !bad.is_empty() {
        bail!(
            "{} table entries disagree with the DFA; first: {:?}",
            bad.len(),
            bad[0]
        );
    }

    let t = &compiled.tables;
    println!(
        "[gen_tables] {} rules, {} DFA states, {} equivalence classes, layout = {}",
        compiled.actions.len().saturating_sub(1),
        t.lastdfa,
        t.numecs,
        t.layout_name()
    );

    let is_bin = out_path.extension().and_then(|e| e.to_str()) == Some("bin");
    if is_bin {
        tables::save_tables_bin(out_path, t)
    } else {
        tables::save_tables_json(out_path, t)
    }
    .with_context(|| format!("failed to write {}", out_path.display()))?;

    let bytes = fs::metadata(out_path).map(|m| m.len()).unwrap_or(0);
    println!(
        "[gen_tables] wrote {} bytes (~{:.1} KiB) → {}",
        bytes,
        bytes as f64 / 1024.0,
        out_path.display()
    );
    Ok(())
}
