// src/tables/verify.rs
//! Decode every (state, symbol) pair from the emitted tables and compare it
//! with the DFA rows. Symbol 0 is end of buffer.

use hashbrown::HashMap;
use rayon::prelude::*;

use super::{Layout, Tables, Target, full::FullSpeedStep};
use crate::automata::{Acceptance, Dfa};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Jam,
    State(u32),
    /// The full-speed end-of-buffer pseudo-state.
    EndOfBuffer,
    /// The lookup fell off the table.
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub state: u32,
    /// Class, or 0 for end of buffer; `None` for the state's action.
    pub symbol: Option<u32>,
    pub expected: Decoded,
    pub found: Decoded,
}

/// Every disagreement between `tables` and `dfa`; empty when they agree.
pub fn verify(dfa: &Dfa, tables: &Tables) -> Vec<Mismatch> {
    let numecs = dfa.numecs;
    let eob = dfa.end_of_buffer_state;
    let row_owner: HashMap<u32, u32> = match &tables.layout {
        Layout::FullSpeed(fs) => fs
            .base
            .iter()
            .enumerate()
            .map(|(s, &b)| (b, s as u32))
            .collect(),
        _ => HashMap::new(),
    };

    let decode = |s: u32, sym: u32| -> Decoded {
        match &tables.layout {
            Layout::Compressed(ct) => match ct.next_state(s, sym) {
                Some(n) if ct.is_jam(n) => Decoded::Jam,
                Some(n) => Decoded::State(n),
                None => Decoded::Invalid,
            },
            Layout::Full(ft) => match ft.get(s, sym) {
                Some(Target::Jam) => Decoded::Jam,
                Some(Target::State(n)) => Decoded::State(n),
                None => Decoded::Invalid,
            },
            Layout::FullSpeed(fs) => {
                let Some(&row) = fs.base.get(s as usize) else {
                    return Decoded::Invalid;
                };
                match fs.step(row, sym) {
                    Some(FullSpeedStep::Jam) => Decoded::Jam,
                    Some(FullSpeedStep::Row(r)) if r == fs.eob_base => Decoded::EndOfBuffer,
                    Some(FullSpeedStep::Row(r)) => match row_owner.get(&r) {
                        Some(&n) => Decoded::State(n),
                        None => Decoded::Invalid,
                    },
                    None => Decoded::Invalid,
                }
            }
        }
    };

    let expected_eob = |s: u32| -> Decoded {
        if matches!(tables.layout, Layout::FullSpeed(_)) {
            return Decoded::EndOfBuffer;
        }
        match eob {
            Some(e) if e != s => Decoded::State(e),
            _ => Decoded::Jam,
        }
    };

    (1..=dfa.lastdfa())
        .into_par_iter()
        .flat_map_iter(|s| {
            let mut bad = Vec::new();
            let want = expected_eob(s);
            let got = decode(s, 0);
            if want != got {
                bad.push(Mismatch {
                    state: s,
                    symbol: Some(0),
                    expected: want,
                    found: got,
                });
            }
            for ec in 1..=numecs {
                let want = match dfa.target(s, ec) {
                    0 => Decoded::Jam,
                    n => Decoded::State(n),
                };
                let got = decode(s, ec);
                if want != got {
                    bad.push(Mismatch {
                        state: s,
                        symbol: Some(ec),
                        expected: want,
                        found: got,
                    });
                }
            }
            if let Layout::FullSpeed(fs) = &tables.layout {
                let want = match dfa.acceptance(s) {
                    Acceptance::Single(r) => r.unwrap_or(0),
                    Acceptance::Set(_) => 0,
                };
                let got = fs.base.get(s as usize).and_then(|&b| fs.action(b));
                if got != Some(want) {
                    bad.push(Mismatch {
                        state: s,
                        symbol: None,
                        expected: Decoded::State(want),
                        found: got.map_or(Decoded::Invalid, Decoded::State),
                    });
                }
            }
            bad
        })
        .collect()
}
