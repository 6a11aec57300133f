// src/tables/accept.rs
//! Accepting tables: what each DFA state matches, and which action runs.

use serde::{Deserialize, Serialize};

use crate::automata::{
    Acceptance, AcceptNum, Dfa, RuleInfo, RuleKind, RuleNum, TRAILING_MASK,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum AcceptTables {
    /// `accept[s]`: rule number or 0, for `s` in `0..=lastdfa + 1` (the
    /// last entry is the jam state).
    Single { accept: Vec<u32> },
    /// `acclist[accept[s]..accept[s + 1]]` lists the packed accept numbers
    /// of state `s`; `acclist[0]` is unused.
    Set { accept: Vec<u32>, acclist: Vec<u32> },
}

impl AcceptTables {
    pub fn build(dfa: &Dfa, rules: &[RuleInfo], end_of_buffer_action: u32) -> Self {
        let lastdfa = dfa.lastdfa();
        let eob = dfa.end_of_buffer_state;
        let set_mode = (1..=lastdfa).any(|s| matches!(dfa.acceptance(s), Acceptance::Set(_)));

        if !set_mode {
            let mut accept = vec![0u32; lastdfa as usize + 2];
            for s in 1..=lastdfa {
                accept[s as usize] = if Some(s) == eob {
                    end_of_buffer_action
                } else {
                    match dfa.acceptance(s) {
                        Acceptance::Single(r) => r.unwrap_or(0),
                        Acceptance::Set(_) => 0,
                    }
                };
            }
            return AcceptTables::Single { accept };
        }

        let mut accept = vec![0u32; lastdfa as usize + 2];
        let mut acclist = vec![0u32];
        for s in 1..=lastdfa {
            accept[s as usize] = acclist.len() as u32;
            if Some(s) == eob {
                acclist.push(end_of_buffer_action);
                continue;
            }
            let Acceptance::Set(set) = dfa.acceptance(s) else {
                continue;
            };
            for &a in set {
                acclist.push(pack(a, rules));
            }
        }
        accept[lastdfa as usize + 1] = acclist.len() as u32;
        AcceptTables::Set { accept, acclist }
    }

    /// Accept entries of state `s` in priority order (packed in set mode).
    pub fn rules_of(&self, s: u32) -> Vec<u32> {
        match self {
            AcceptTables::Single { accept } => match accept.get(s as usize) {
                Some(&r) if r != 0 => vec![r],
                _ => Vec::new(),
            },
            AcceptTables::Set { accept, acclist } => {
                let lo = accept.get(s as usize).copied().unwrap_or(0) as usize;
                let hi = accept.get(s as usize + 1).copied().unwrap_or(0) as usize;
                if lo >= hi {
                    return Vec::new();
                }
                acclist[lo..hi].to_vec()
            }
        }
    }
}

/// Packed accept-list entry; ends of variable trailing-context rules get
/// the trailing flag.
fn pack(a: AcceptNum, rules: &[RuleInfo]) -> u32 {
    match a {
        AcceptNum::TrailingHead(_) => a.packed(),
        AcceptNum::Rule(r) => match rules.get(r as usize) {
            Some(info) if info.kind == RuleKind::Variable => r | TRAILING_MASK,
            _ => r,
        },
    }
}

/// `actions[r]`: the rule whose action runs when `r` matches. A `|` rule
/// runs the action of the next rule that has its own.
pub fn rule_actions(rules: &[RuleInfo]) -> Vec<RuleNum> {
    let n = rules.len();
    let mut actions = vec![0; n];
    let mut owner = (n.saturating_sub(1)) as RuleNum;
    for r in (1..n).rev() {
        if !rules[r].continued {
            owner = r as RuleNum;
        }
        actions[r] = owner;
    }
    actions
}
