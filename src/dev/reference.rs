// src/dev/reference.rs
// Slow reference matcher straight off the pattern AST, and a longest-match
// walk over a compiled DFA to compare it with.

use std::collections::BTreeSet;

use crate::{
    automata::{AcceptNum, Acceptance, Dfa, RuleNum},
    pattern::Pattern,
    tables::Tables,
};

fn class_contains(ranges: &[(u8, u8)], negated: bool, c: u8) -> bool {
    let hit = ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi);
    hit != negated
}

fn step_all(p: &Pattern, input: &[u8], from: &BTreeSet<usize>) -> BTreeSet<usize> {
    from.iter()
        .flat_map(|&s| pattern_ends(p, input, s))
        .collect()
}

fn closure(p: &Pattern, input: &[u8], from: BTreeSet<usize>) -> BTreeSet<usize> {
    let mut seen = from.clone();
    let mut frontier: Vec<usize> = from.into_iter().collect();
    while let Some(s) = frontier.pop() {
        for e in pattern_ends(p, input, s) {
            if seen.insert(e) {
                frontier.push(e);
            }
        }
    }
    seen
}

/// Every position where a match of `p` starting at `start` can end.
pub fn pattern_ends(p: &Pattern, input: &[u8], start: usize) -> BTreeSet<usize> {
    let mut out = BTreeSet::new();
    match p {
        Pattern::Literal(s) => {
            let b = s.as_bytes();
            if input.len() >= start + b.len() && &input[start..start + b.len()] == b {
                out.insert(start + b.len());
            }
        }
        Pattern::Byte(c) => {
            if input.get(start) == Some(c) {
                out.insert(start + 1);
            }
        }
        Pattern::Class { ranges, negated } => {
            if let Some(&c) = input.get(start) {
                if class_contains(ranges, *negated, c) {
                    out.insert(start + 1);
                }
            }
        }
        Pattern::Any => {
            if let Some(&c) = input.get(start) {
                if c != b'\n' {
                    out.insert(start + 1);
                }
            }
        }
        Pattern::Seq(items) => {
            let mut cur = BTreeSet::from([start]);
            for item in items {
                cur = step_all(item, input, &cur);
            }
            out = cur;
        }
        Pattern::Alt(items) => {
            if items.is_empty() {
                out.insert(start);
            }
            for item in items {
                out.extend(pattern_ends(item, input, start));
            }
        }
        Pattern::Star(inner) => out = closure(inner, input, BTreeSet::from([start])),
        Pattern::Plus(inner) => {
            let once = pattern_ends(inner, input, start);
            out = closure(inner, input, once);
        }
        Pattern::Opt(inner) => {
            out = pattern_ends(inner, input, start);
            out.insert(start);
        }
        Pattern::Repeat { pattern, min, max } => {
            let mut cur = BTreeSet::from([start]);
            for _ in 0..(*min).max(0) {
                cur = step_all(pattern, input, &cur);
            }
            match max {
                None => out = closure(pattern, input, cur),
                Some(max) => {
                    out = cur.clone();
                    for _ in (*min).max(0)..*max {
                        cur = step_all(pattern, input, &cur);
                        out.extend(cur.iter().copied());
                    }
                }
            }
        }
        Pattern::Exact { pattern, count } => {
            let mut cur = BTreeSet::from([start]);
            for _ in 0..(*count).max(1) {
                cur = step_all(pattern, input, &cur);
            }
            out = cur;
        }
    }
    out
}

/// Longest non-empty prefix of `input` some pattern matches; ties go to the
/// earliest pattern. Rules are numbered from 1.
pub fn reference_longest(patterns: &[Pattern], input: &[u8]) -> Option<(usize, RuleNum)> {
    let mut best: Option<(usize, RuleNum)> = None;
    for (i, p) in patterns.iter().enumerate() {
        let rule = i as RuleNum + 1;
        if let Some(&end) = pattern_ends(p, input, 0).iter().next_back() {
            if end == 0 {
                continue;
            }
            match best {
                Some((len, _)) if len >= end => {}
                _ => best = Some((end, rule)),
            }
        }
    }
    best
}

fn accepted_rule(acc: &Acceptance) -> Option<RuleNum> {
    match acc {
        Acceptance::Single(r) => *r,
        Acceptance::Set(set) => set.iter().find_map(|a| match a {
            AcceptNum::Rule(r) => Some(*r),
            AcceptNum::TrailingHead(_) => None,
        }),
    }
}

/// Run the DFA from start condition `sc` and report the last accepting
/// position with its rule.
pub fn dfa_longest(dfa: &Dfa, tables: &Tables, sc: usize, input: &[u8]) -> Option<(usize, RuleNum)> {
    let mut s = dfa.start_state(sc, false);
    let mut best = None;
    for (i, &c) in input.iter().enumerate() {
        s = dfa.target(s, tables.ec_of(c));
        if s == 0 {
            break;
        }
        if let Some(r) = accepted_rule(dfa.acceptance(s)) {
            best = Some((i + 1, r));
        }
    }
    best
}
