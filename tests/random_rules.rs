//! Randomized rule sets checked against the slow reference matcher and
//! against their own tables.
//!  - LEXGEN_FUZZ_SEED (default 42) and LEXGEN_FUZZ_ITERS (default 60)
//!  - the larger sweep is opt-in: `cargo test -- --ignored`

use lexgen::{
    RuleSet, ScanConfig,
    dev::{
        generator::{GenOptions, gen_input, gen_rule_set},
        reference::{dfa_longest, reference_longest},
    },
    tables,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
}

fn rng() -> StdRng {
    StdRng::seed_from_u64(env_u64("LEXGEN_FUZZ_SEED", 42))
}

fn patterns_of(rules: &RuleSet) -> Vec<lexgen::Pattern> {
    rules.rules.iter().map(|r| r.pattern.clone()).collect()
}

fn dump(rules: &RuleSet) -> String {
    serde_json::to_string(rules).unwrap_or_else(|e| format!("<unprintable: {e}>"))
}

fn longest_match_sweep(iters: usize, max_rules: usize) {
    let mut rng = rng();
    let opts = GenOptions::default();
    for i in 0..iters {
        let count = rng.random_range(1..=max_rules);
        let rules = gen_rule_set(&mut rng, count, &opts);
        let compiled = rules.compile(ScanConfig::default()).unwrap();
        let patterns = patterns_of(&rules);
        for _ in 0..24 {
            let len = rng.random_range(0..=10usize);
            let input = gen_input(&mut rng, &opts.alphabet, len);
            assert_eq!(
                dfa_longest(&compiled.dfa, &compiled.tables, 0, &input),
                reference_longest(&patterns, &input),
                "iter {i}, input {:?}, rules {}",
                String::from_utf8_lossy(&input),
                dump(&rules)
            );
        }
    }
}

#[test]
fn dfa_agrees_with_the_reference_matcher() {
    longest_match_sweep(env_usize("LEXGEN_FUZZ_ITERS", 60), 6);
}

#[test]
#[ignore]
fn dfa_agrees_with_the_reference_matcher_large() {
    longest_match_sweep(2000, 16);
}

/// Equivalence classes only rename symbols: the scanner must behave the
/// same with or without them.
#[test]
fn classes_do_not_change_what_is_matched() {
    let mut rng = rng();
    let opts = GenOptions::default();
    let no_ecs = ScanConfig {
        use_ecs: false,
        use_mecs: false,
        ..ScanConfig::default()
    };
    for i in 0..env_usize("LEXGEN_FUZZ_ITERS", 60) {
        let count = rng.random_range(1..=6usize);
        let rules = gen_rule_set(&mut rng, count, &opts);
        let with = rules.compile(ScanConfig::default()).unwrap();
        let without = rules.compile(no_ecs.clone()).unwrap();
        assert!(with.dfa.numecs <= without.dfa.numecs);
        assert_eq!(without.dfa.numecs, 256);

        for _ in 0..16 {
            let len = rng.random_range(0..=10usize);
            let input = gen_input(&mut rng, &opts.alphabet, len);
            assert_eq!(
                dfa_longest(&with.dfa, &with.tables, 0, &input),
                dfa_longest(&without.dfa, &without.tables, 0, &input),
                "iter {i}, input {:?}, rules {}",
                String::from_utf8_lossy(&input),
                dump(&rules)
            );
        }
    }
}

#[test]
fn random_tables_decode_back_to_their_dfa() {
    let mut rng = rng();
    let opts = GenOptions {
        trailing: true,
        start_conditions: true,
        ..GenOptions::default()
    };
    let layouts = [
        ScanConfig::default(),
        ScanConfig {
            use_mecs: false,
            ..ScanConfig::default()
        },
        ScanConfig::full(),
        ScanConfig::full_speed(),
    ];
    for i in 0..env_usize("LEXGEN_FUZZ_ITERS", 60) {
        let count = rng.random_range(1..=8usize);
        let rules = gen_rule_set(&mut rng, count, &opts);
        for cfg in layouts.iter().cloned() {
            let kind = cfg.tables;
            let compiled = match rules.compile(cfg) {
                Ok(c) => c,
                Err(lexgen::Error::Config(_)) => continue,
                Err(e) => panic!("iter {i} ({kind:?}): {e}; rules {}", dump(&rules)),
            };
            let bad = tables::verify(&compiled.dfa, &compiled.tables);
            assert!(
                bad.is_empty(),
                "iter {i} ({kind:?}): {} mismatches, first {:?}; rules {}",
                bad.len(),
                bad.first(),
                dump(&rules)
            );
        }
    }
}
