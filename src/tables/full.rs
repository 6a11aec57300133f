// src/tables/full.rs
//! Uncompressed layouts: the dense state × class matrix and the full-speed
//! `(verify, next)` table addressed by state offset + class.

use serde::{Deserialize, Serialize};

use super::Target;
use crate::{
    automata::{Acceptance, Dfa},
    error::{Error, Result},
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FullTable {
    /// Columns per row: end of buffer, then classes `1..=numecs`.
    pub width: u32,
    /// Row-major, rows `0..=lastdfa`; row 0 is the jam state.
    pub nxt: Vec<Target>,
}

impl FullTable {
    pub fn build(dfa: &Dfa) -> Self {
        let width = dfa.numecs as usize + 1;
        let lastdfa = dfa.lastdfa() as usize;
        let mut nxt = vec![Target::Jam; (lastdfa + 1) * width];
        let eob = dfa.end_of_buffer_state;

        for ds in 1..=dfa.lastdfa() {
            let row = &mut nxt[ds as usize * width..(ds as usize + 1) * width];
            row[0] = match eob {
                Some(e) if e != ds => Target::State(e),
                _ => Target::Jam,
            };
            for (ec, &t) in dfa.row(ds).iter().enumerate().skip(1) {
                row[ec] = if t == 0 { Target::Jam } else { Target::State(t) };
            }
        }
        Self {
            width: width as u32,
            nxt,
        }
    }

    pub fn get(&self, state: u32, col: u32) -> Option<Target> {
        if col >= self.width {
            return None;
        }
        self.nxt
            .get((state * self.width + col) as usize)
            .copied()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullSpeedEntry {
    /// Class this entry answers for; `numecs + 1` marks an action slot.
    pub verify: u32,
    /// Offset to the next state's row (or the action number in an action slot).
    pub next: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FullSpeedTable {
    pub entries: Vec<FullSpeedEntry>,
    /// Row offset of every state `0..=lastdfa` (0 is the jam state).
    pub base: Vec<u32>,
    /// Row offset of the end-of-buffer pseudo-state.
    pub eob_base: u32,
    pub numecs: u32,
}

/// What one full-speed step decodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullSpeedStep {
    Jam,
    /// Offset of the next state's row.
    Row(u32),
}

impl FullSpeedTable {
    pub fn step(&self, row: u32, sym: u32) -> Option<FullSpeedStep> {
        let e = self.entries.get((row + sym) as usize)?;
        if e.verify != sym {
            return Some(FullSpeedStep::Jam);
        }
        let to = row as i64 + e.next as i64;
        u32::try_from(to).ok().map(FullSpeedStep::Row)
    }

    /// Action number stored just before a row.
    pub fn action(&self, row: u32) -> Option<u32> {
        let e = self.entries.get(row.checked_sub(1)? as usize)?;
        if e.verify != self.numecs + 1 {
            return None;
        }
        u32::try_from(e.next).ok()
    }
}

/// Builder state while placing full-speed rows.
struct Placer {
    numecs: usize,
    max_interior: usize,
    chk: Vec<u32>,
    nxt: Vec<u32>,
    base: Vec<usize>,
    firstfree: usize,
    tblend: usize,
}

impl Placer {
    fn chk_at(&self, i: usize) -> u32 {
        self.chk.get(i).copied().unwrap_or(0)
    }

    fn reserve(&mut self, i: usize) {
        if i >= self.chk.len() {
            self.chk.resize(i + 1, 0);
            self.nxt.resize(i + 1, 0);
        }
    }

    /// A position whose action slot, EOB slot and transition slots are free.
    fn find_table_space(&mut self, state: &[u32], numtrans: usize) -> usize {
        let interior = numtrans <= self.max_interior;
        let mut i = if !interior {
            if self.tblend < 2 {
                return 1;
            }
            self.tblend.saturating_sub(self.numecs).max(1)
        } else {
            self.firstfree.max(1)
        };

        loop {
            loop {
                if self.chk_at(i - 1) == 0 {
                    if self.chk_at(i) == 0 {
                        break;
                    }
                    i += 2;
                } else {
                    i += 1;
                }
            }
            if interior {
                self.firstfree = i + 1;
            }
            let clash = (1..=self.numecs).any(|ec| state[ec] != 0 && self.chk_at(i + ec) != 0);
            if !clash {
                return i;
            }
            i += 1;
        }
    }

    fn place_state(&mut self, state: &[u32], statenum: usize, numtrans: usize) {
        let pos = self.find_table_space(state, numtrans);
        self.base[statenum] = pos;
        self.reserve(pos + self.numecs);
        // Action and end-of-buffer slots.
        self.chk[pos - 1] = 1;
        self.chk[pos] = 1;
        for ec in 1..=self.numecs {
            if state[ec] != 0 {
                self.chk[pos + ec] = ec as u32;
                self.nxt[pos + ec] = state[ec];
            }
        }
        self.tblend = self.tblend.max(pos + self.numecs);
    }
}

impl FullSpeedTable {
    /// Place the jam row, then every state row. Each row also gets an
    /// action slot and an end-of-buffer slot.
    pub fn build(
        dfa: &Dfa,
        max_interior: usize,
        end_of_buffer_action: u32,
    ) -> Result<Self> {
        let numecs = dfa.numecs as usize;
        let lastdfa = dfa.lastdfa() as usize;
        let mut p = Placer {
            numecs,
            max_interior,
            chk: vec![0; 1],
            nxt: vec![0; 1],
            base: vec![0; lastdfa + 2],
            firstfree: 1,
            tblend: 0,
        };

        let jam = vec![0u32; numecs + 1];
        p.place_state(&jam, 0, 0);
        for ds in 1..=lastdfa {
            let row = dfa.row(ds as u32);
            let numtrans = row[1..].iter().filter(|&&t| t != 0).count();
            p.place_state(row, ds, numtrans);
        }

        let tblend = p.tblend;
        let eob_base = tblend + 2;
        p.reserve(tblend + 2);
        p.base[lastdfa + 1] = eob_base;

        let mut accept = vec![0u32; lastdfa + 1];
        for ds in 1..=lastdfa {
            accept[ds] = match dfa.acceptance(ds as u32) {
                Acceptance::Single(r) => r.unwrap_or(0),
                Acceptance::Set(_) => {
                    return Err(Error::Config(
                        "REJECT cannot be used with -f or -F".into(),
                    ));
                }
            };
        }

        // Slot markers from placement are replaced by real entries here.
        let mut entries = vec![
            FullSpeedEntry { verify: 0, next: 0 };
            tblend + 3
        ];
        let mut kind = vec![Slot::Plain; tblend + 1];
        for (s, &b) in p.base.iter().enumerate().take(lastdfa + 1) {
            kind[b] = Slot::Eob;
            kind[b - 1] = Slot::Action(accept[s]);
        }
        for i in 0..=tblend {
            entries[i] = match kind[i] {
                Slot::Eob => FullSpeedEntry {
                    verify: 0,
                    next: offset(eob_base, i)?,
                },
                Slot::Action(a) => FullSpeedEntry {
                    verify: numecs as u32 + 1,
                    next: a as i32,
                },
                Slot::Plain => {
                    let c = p.chk_at(i) as usize;
                    if c == 0 || c > numecs {
                        FullSpeedEntry { verify: 0, next: 0 }
                    } else {
                        let target = p.nxt[i] as usize;
                        let from = i - c;
                        let to = *p.base.get(target).ok_or_else(|| {
                            Error::internal(format!("full-speed target {target} out of range"))
                        })?;
                        FullSpeedEntry {
                            verify: c as u32,
                            next: offset(to, from)?,
                        }
                    }
                }
            };
        }
        // End-of-buffer pseudo-state: action slot, then an entry that never verifies.
        entries[tblend + 1] = FullSpeedEntry {
            verify: numecs as u32 + 1,
            next: end_of_buffer_action as i32,
        };
        entries[tblend + 2] = FullSpeedEntry { verify: 1, next: 0 };

        log::debug!(
            "[tables] full-speed: {} entries for {} states",
            entries.len(),
            lastdfa + 1
        );
        Ok(Self {
            entries,
            base: p.base[..=lastdfa].iter().map(|&b| b as u32).collect(),
            eob_base: eob_base as u32,
            numecs: numecs as u32,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Plain,
    Eob,
    Action(u32),
}

fn offset(to: usize, from: usize) -> Result<i32> {
    i32::try_from(to as i64 - from as i64)
        .map_err(|_| Error::internal("full-speed offset overflows i32"))
}
