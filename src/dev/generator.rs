// src/dev/generator.rs
// Random-but-valid rule sets and inputs over a small alphabet, shared by
// fuzz_tables and the randomized tests.

use rand::Rng;

use crate::pattern::{Pattern, RuleDef, RuleSet, StartConditionDef};

#[derive(Debug, Clone)]
pub struct GenOptions {
    /// Bytes that literals and classes draw from.
    pub alphabet: Vec<u8>,
    pub max_depth: u32,
    /// Allow `head/trail` rules (and `$`).
    pub trailing: bool,
    /// Declare start conditions and scatter rules over them; allow `^`.
    pub start_conditions: bool,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            alphabet: b"abc\n".to_vec(),
            max_depth: 3,
            trailing: false,
            start_conditions: false,
        }
    }
}

fn pick<R: Rng>(rng: &mut R, alphabet: &[u8]) -> u8 {
    alphabet[rng.random_range(0..alphabet.len())]
}

pub fn gen_pattern<R: Rng>(rng: &mut R, alphabet: &[u8], depth: u32) -> Pattern {
    let leaf = depth == 0 || rng.random_bool(0.35);
    if leaf {
        return match rng.random_range(0u32..100) {
            0..=39 => {
                let n = rng.random_range(1..=3usize);
                let s: Vec<u8> = (0..n).map(|_| pick(rng, alphabet)).collect();
                Pattern::Literal(String::from_utf8_lossy(&s).into_owned())
            }
            40..=59 => Pattern::Byte(pick(rng, alphabet)),
            60..=89 => {
                let mut ranges = Vec::new();
                for _ in 0..rng.random_range(1..=2usize) {
                    let a = pick(rng, alphabet);
                    let b = pick(rng, alphabet);
                    ranges.push((a.min(b), a.max(b)));
                }
                Pattern::Class {
                    ranges,
                    negated: rng.random_bool(0.2),
                }
            }
            _ => Pattern::Any,
        };
    }

    let d = depth - 1;
    match rng.random_range(0u32..100) {
        0..=29 => {
            let n = rng.random_range(2..=3usize);
            Pattern::Seq((0..n).map(|_| gen_pattern(rng, alphabet, d)).collect())
        }
        30..=49 => {
            let n = rng.random_range(2..=3usize);
            Pattern::Alt((0..n).map(|_| gen_pattern(rng, alphabet, d)).collect())
        }
        50..=61 => Pattern::star(gen_pattern(rng, alphabet, d)),
        62..=73 => Pattern::plus(gen_pattern(rng, alphabet, d)),
        74..=85 => Pattern::opt(gen_pattern(rng, alphabet, d)),
        86..=93 => {
            let min = rng.random_range(0..=2i32);
            let max = if rng.random_bool(0.3) {
                None
            } else {
                Some(rng.random_range(min.max(1)..=min.max(1) + 2))
            };
            Pattern::repeat(gen_pattern(rng, alphabet, d), min, max)
        }
        _ => Pattern::exact(gen_pattern(rng, alphabet, d), rng.random_range(1..=3i32)),
    }
}

pub fn gen_rule_set<R: Rng>(rng: &mut R, n_rules: usize, opts: &GenOptions) -> RuleSet {
    let mut set = RuleSet::default();
    let mut sc_names: Vec<String> = Vec::new();
    if opts.start_conditions {
        for i in 0..rng.random_range(1..=3usize) {
            let name = format!("SC{i}");
            set.start_conditions.push(StartConditionDef {
                name: name.clone(),
                exclusive: rng.random_bool(0.5),
            });
            sc_names.push(name);
        }
    }

    for _ in 0..n_rules {
        let mut rule = RuleDef::new(gen_pattern(rng, &opts.alphabet, opts.max_depth));
        if opts.trailing && rng.random_bool(0.2) {
            if rng.random_bool(0.25) {
                rule.eol = true;
            } else {
                rule.trailing = Some(gen_pattern(rng, &opts.alphabet, opts.max_depth.min(2)));
            }
        }
        if opts.start_conditions {
            rule.bol = rng.random_bool(0.15);
            if !sc_names.is_empty() && rng.random_bool(0.4) {
                let name = sc_names[rng.random_range(0..sc_names.len())].clone();
                rule.start_conditions.push(name);
            } else if rng.random_bool(0.05) {
                rule.start_conditions.push("*".into());
            }
        }
        set.rules.push(rule);
    }
    set
}

pub fn gen_input<R: Rng>(rng: &mut R, alphabet: &[u8], len: usize) -> Vec<u8> {
    (0..len).map(|_| pick(rng, alphabet)).collect()
}
