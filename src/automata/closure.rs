// src/automata/closure.rs
//! Epsilon closure of NFA state sets.

use super::{AcceptNum, Nfa, NfaId, Transition};
use crate::error::{Error, Result};

/// A closed state set, not yet sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Closure {
    pub states: Vec<NfaId>,
    pub accepts: Vec<AcceptNum>,
    /// Sum of the member state numbers.
    pub hash: u64,
}

/// Scratch space reused across closures: the visited flags and the stack.
#[derive(Debug, Default)]
pub struct ClosureEngine {
    visited: Vec<bool>,
    stack: Vec<NfaId>,
}

impl ClosureEngine {
    pub fn new(num_states: usize) -> Self {
        Self {
            visited: vec![false; num_states + 1],
            stack: Vec::new(),
        }
    }

    fn mark(&mut self, s: NfaId) -> bool {
        let idx = s as usize;
        if idx >= self.visited.len() {
            self.visited.resize(idx + 1, false);
        }
        !std::mem::replace(&mut self.visited[idx], true)
    }

    /// Close `set` under epsilon moves. Every input state is kept; a state
    /// reached only through epsilon edges is kept when it accepts or has a
    /// non-epsilon transition.
    pub fn epsclosure(&mut self, nfa: &Nfa, set: &[NfaId]) -> Result<Closure> {
        let mut out = Closure::default();
        self.stack.clear();

        for &ns in set {
            if self.mark(ns) {
                self.stack.push(ns);
                if let Some(a) = nfa.state(ns).accept {
                    out.accepts.push(a);
                }
                out.states.push(ns);
                out.hash += ns as u64;
            }
        }

        let mut pos = 0;
        while pos < self.stack.len() {
            let ns = nfa.state(self.stack[pos]);
            pos += 1;
            if ns.symbol != Transition::Epsilon {
                continue;
            }
            let Some(t1) = ns.trans1 else {
                continue;
            };
            for next in std::iter::once(t1).chain(ns.trans2) {
                if self.mark(next) {
                    self.stack.push(next);
                    let st = nfa.state(next);
                    if let Some(a) = st.accept {
                        out.accepts.push(a);
                    }
                    if st.accept.is_some() || st.symbol != Transition::Epsilon {
                        out.states.push(next);
                        out.hash += next as u64;
                    }
                }
            }
        }

        for &s in &self.stack {
            let flag = self.visited.get_mut(s as usize);
            match flag {
                Some(v) if *v => *v = false,
                _ => {
                    return Err(Error::internal(format!(
                        "consistency check failed in epsclosure() at state {s}"
                    )));
                }
            }
        }
        Ok(out)
    }
}
