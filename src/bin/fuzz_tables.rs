// src/bin/fuzz_tables.rs
// Generate random rule sets, compile them with every table layout, decode
// the tables back and compare with the DFA. Plain rule sets are also run
// against the reference matcher on random inputs.
//   - FUZZ_ITERS=n     number of rule sets (default 200)
//   - FUZZ_RULES=n     rules per set (default 8)
//   - FUZZ_SEED=n      rng seed (default: time based)
//   - FUZZ_SAVE=1 and FUZZ_DIR=...   save failing rule sets as JSON
//   - FUZZ_INPUT=path  replay a saved rule set

use std::{
    fs,
    path::{Path, PathBuf},
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use lexgen::{
    RuleSet, ScanConfig,
    config::env_flag_true,
    dev::{
        generator::{GenOptions, gen_input, gen_rule_set},
        reference::{dfa_longest, reference_longest},
    },
    tables,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
}

fn layouts() -> [(&'static str, ScanConfig); 4] {
    [
        ("compressed", ScanConfig::default()),
        (
            "compressed-no-ecs",
            ScanConfig {
                use_ecs: false,
                use_mecs: false,
                ..ScanConfig::default()
            },
        ),
        ("full", ScanConfig::full()),
        ("full-speed", ScanConfig::full_speed()),
    ]
}

/// Every layout that accepts `rules`; returns a description of the first
/// failure.
fn check_rule_set<R: Rng>(rng: &mut R, rules: &RuleSet, alphabet: &[u8]) -> Result<(), String> {
    let plain = rules
        .rules
        .iter()
        .all(|r| r.trailing.is_none() && !r.eol && !r.bol && r.start_conditions.is_empty());

    for (name, cfg) in layouts() {
        let compiled = match rules.compile(cfg) {
            Ok(c) => c,
            // Variable trailing context is refused by the dense layouts.
            Err(lexgen::Error::Config(_)) if name.starts_with("full") => continue,
            Err(e) => return Err(format!("[{name}] compile failed: {e}")),
        };

        let bad = tables::verify(&compiled.dfa, &compiled.tables);
        if let Some(m) = bad.first() {
            return Err(format!("[{name}] {} mismatches; first: {m:?}", bad.len()));
        }

        if plain {
            let patterns: Vec<_> = rules.rules.iter().map(|r| r.pattern.clone()).collect();
            for _ in 0..16 {
                let len = rng.random_range(0..=12usize);
                let input = gen_input(rng, alphabet, len);
                let want = reference_longest(&patterns, &input);
                let got = dfa_longest(&compiled.dfa, &compiled.tables, 0, &input);
                if want != got {
                    return Err(format!(
                        "[{name}] input {:?}: reference {want:?}, dfa {got:?}",
                        String::from_utf8_lossy(&input)
                    ));
                }
            }
        }
    }
    Ok(())
}

fn save_case(dir: &str, seed: u64, iter: usize, rules: &RuleSet) -> PathBuf {
    let _ = fs::create_dir_all(dir);
    let path = Path::new(dir).join(format!("rules_seed{seed}_iter{iter}.json"));
    match serde_json::to_string_pretty(rules) {
        Ok(json) => {
            if let Err(e) = fs::write(&path, json) {
                eprintln!("[save] failed to write {}: {e}", path.display());
            }
        }
        Err(e) => eprintln!("[save] failed to encode rule set: {e}"),
    }
    path
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let opts = GenOptions::default();

    if let Ok(path) = std::env::var("FUZZ_INPUT") {
        eprintln!("[replay] reading {path}");
        let rules = match RuleSet::from_json_file(&path) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        };
        let mut rng = StdRng::seed_from_u64(0);
        match check_rule_set(&mut rng, &rules, &opts.alphabet) {
            Ok(()) => eprintln!("[replay] ok"),
            Err(msg) => {
                eprintln!("[replay] {msg}");
                std::process::exit(1);
            }
        }
        return;
    }

    let save_cases = env_flag_true("FUZZ_SAVE", false);
    let out_dir = std::env::var("FUZZ_DIR").unwrap_or_else(|_| "fuzz-cases".to_string());
    let iters = env_usize("FUZZ_ITERS", 200);
    let n_rules = env_usize("FUZZ_RULES", 8);
    let seed: u64 = std::env::var("FUZZ_SEED")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        });
    eprintln!("[fuzz] iters={iters} rules={n_rules} seed={seed}");

    let mut rng = StdRng::seed_from_u64(seed);
    let started = Instant::now();
    let mut failures = 0usize;
    for i in 0..iters {
        let gen_opts = GenOptions {
            trailing: rng.random_bool(0.5),
            start_conditions: rng.random_bool(0.5),
            ..opts.clone()
        };
        let count = rng.random_range(1..=n_rules.max(1));
        let rules = gen_rule_set(&mut rng, count, &gen_opts);
        if let Err(msg) = check_rule_set(&mut rng, &rules, &gen_opts.alphabet) {
            failures += 1;
            eprintln!("[fuzz] iter {i}: {msg}");
            if save_cases {
                let path = save_case(&out_dir, seed, i, &rules);
                eprintln!("[save] wrote {}", path.display());
            }
        }
    }

    if failures == 0 {
        eprintln!(
            "[fuzz] all {iters} rule sets matched in {} ms",
            started.elapsed().as_millis()
        );
    } else {
        eprintln!("[fuzz] {failures} of {iters} rule sets failed (seed {seed})");
        std::process::exit(1);
    }
}
