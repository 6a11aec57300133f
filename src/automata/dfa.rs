// src/automata/dfa.rs
//! Subset construction (`ntod`).
//!
//! DFA states are numbered from 1 in creation order: two per start
//! condition (plain, then beginning-of-line), then the end-of-buffer state
//! unless full-speed tables are wanted, then everything reached from those.
//! Transition rows are indexed by equivalence class `1..=numecs`; 0 means
//! "no transition" (jam).

use hashbrown::HashMap;

use super::{
    AcceptNum, Context, DfaId, EcLinks, NfaId, RuleKind, RuleNum, StateType, Transition,
    closure::{Closure, ClosureEngine},
};
use crate::{config::TableKind, error::{Error, Result}};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceptance {
    /// Lowest matching rule, if any.
    Single(Option<RuleNum>),
    /// Sorted accepting set; rules before trailing heads.
    Set(Vec<AcceptNum>),
}

impl Acceptance {
    pub fn is_accepting(&self) -> bool {
        match self {
            Acceptance::Single(r) => r.is_some(),
            Acceptance::Set(s) => !s.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DfaState {
    /// Sorted NFA states.
    pub nfa_states: Vec<NfaId>,
    pub hash: u64,
    pub acceptance: Acceptance,
}

#[derive(Debug, Clone)]
pub struct Dfa {
    /// Index 0 is the jam placeholder.
    states: Vec<DfaState>,
    rows: Vec<Vec<u32>>,
    pub numecs: u32,
    /// Plain and BOL start state per start condition, plus end of buffer.
    pub num_start_states: u32,
    pub num_scs: u32,
    pub end_of_buffer_state: Option<DfaId>,
}

impl Dfa {
    fn new(numecs: u32, set_mode: bool) -> Self {
        let jam = DfaState {
            nfa_states: Vec::new(),
            hash: 0,
            acceptance: if set_mode {
                Acceptance::Set(Vec::new())
            } else {
                Acceptance::Single(None)
            },
        };
        Self {
            states: vec![jam],
            rows: vec![vec![0; numecs as usize + 1]],
            numecs,
            num_start_states: 0,
            num_scs: 0,
            end_of_buffer_state: None,
        }
    }

    pub fn lastdfa(&self) -> DfaId {
        (self.states.len() - 1) as DfaId
    }

    pub fn state(&self, ds: DfaId) -> Option<&DfaState> {
        if ds == 0 {
            return None;
        }
        self.states.get(ds as usize)
    }

    /// Row of `ds`, `row[ec]` for `ec` in `1..=numecs`.
    pub fn row(&self, ds: DfaId) -> &[u32] {
        &self.rows[ds as usize]
    }

    pub fn target(&self, ds: DfaId, ec: u32) -> u32 {
        self.rows
            .get(ds as usize)
            .and_then(|r| r.get(ec as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Unknown ids answer like the jam state.
    pub fn acceptance(&self, ds: DfaId) -> &Acceptance {
        match self.states.get(ds as usize) {
            Some(s) => &s.acceptance,
            None => &self.states[0].acceptance,
        }
    }

    /// Start state of start condition `sc` (0-based).
    pub fn start_state(&self, sc: usize, bol: bool) -> DfaId {
        (sc as DfaId) * 2 + 1 + bol as DfaId
    }

    pub fn iter_states(&self) -> impl Iterator<Item = (DfaId, &DfaState)> {
        self.states
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, s)| (i as DfaId, s))
    }
}

/// Hash buckets over the DFA states built so far.
#[derive(Default)]
struct StateIndex {
    by_hash: HashMap<u64, Vec<DfaId>>,
}

impl Context {
    pub(crate) fn ntod(&mut self) -> Result<Dfa> {
        let numecs = self.numecs();
        let set_mode = self.uses_accept_sets();
        let mut dfa = Dfa::new(numecs, set_mode);
        let mut index = StateIndex::default();

        // Start states need their BOL branches before the closure scratch is sized.
        let mut seeds = Vec::with_capacity(self.scs.len() * 2);
        for i in 0..self.scs.len() {
            let (set, bol) = (self.scs[i].set, self.scs[i].bol);
            seeds.push(set);
            seeds.push(self.mkbranch(bol, set)?);
        }
        let mut engine = ClosureEngine::new(self.nfa.lastnfa() as usize);

        for (i, &seed) in seeds.iter().enumerate() {
            let closure = engine.epsclosure(&self.nfa, &[seed])?;
            let (ds, fresh) = self.snstods(&mut dfa, &mut index, closure, set_mode);
            if !fresh || ds as usize != i + 1 {
                return Err(Error::internal(format!(
                    "start state {} collapsed into state {ds}",
                    i + 1
                )));
            }
        }
        dfa.num_scs = self.scs.len() as u32;
        dfa.num_start_states = seeds.len() as u32;

        if self.cfg.tables != TableKind::FullSpeed {
            let (ds, fresh) = self.snstods(&mut dfa, &mut index, Closure::default(), set_mode);
            if !fresh {
                return Err(Error::internal(
                    "could not create unique end-of-buffer state",
                ));
            }
            dfa.end_of_buffer_state = Some(ds);
            dfa.num_start_states += 1;
        }

        let mut symlist = vec![false; numecs as usize + 1];
        let mut ds: DfaId = 1;
        while ds <= dfa.lastdfa() {
            let dset = dfa.states[ds as usize].nfa_states.clone();
            let mut dup = EcLinks::new(numecs as usize);
            symlist.iter_mut().for_each(|s| *s = false);
            self.sympartition(&dset, &mut dup, &mut symlist)?;

            let mut row = vec![0u32; numecs as usize + 1];
            let mut totaltrans = 0usize;
            for sym in 1..=numecs as usize {
                if !symlist[sym] {
                    continue;
                }
                totaltrans += 1;
                match dup.prev(sym) {
                    None => {
                        let follow = self.symfollowset(&dset, sym as u32);
                        let closure = engine.epsclosure(&self.nfa, &follow)?;
                        let (newds, _) = self.snstods(&mut dfa, &mut index, closure, set_mode);
                        row[sym] = newds;
                        self.stats.numuniq += 1;
                    }
                    Some(p) => {
                        row[sym] = row[p];
                        self.stats.numdup += 1;
                    }
                }
            }
            self.stats.numsnpairs += totaltrans;

            if ds > dfa.num_start_states && !dfa.acceptance(ds).is_accepting() {
                self.stats.num_backing_up += 1;
                if self.cfg.backing_up_report {
                    let entry = self.describe_backing_up(&dfa, ds, &row);
                    self.stats.backing_up_report.push(entry);
                }
            }
            if self.cfg.trace {
                log::trace!("[dfa] state {ds} {:?} -> {:?}", dset, &row[1..]);
            }
            dfa.rows.push(row);
            ds += 1;
        }

        self.stats.lastdfa = dfa.lastdfa() as usize;
        for r in 1..self.rules.len() {
            if !self.rules[r].useful {
                let line = self.rules[r].line;
                self.diags.warn("rule cannot be matched", Some(line));
            }
        }
        log::debug!(
            "[dfa] {} states, {} transitions ({} unique, {} duplicate)",
            dfa.lastdfa(),
            self.stats.numsnpairs,
            self.stats.numuniq,
            self.stats.numdup
        );
        Ok(dfa)
    }

    /// Partition the ecs by the out-transitions of `ds` and mark in
    /// `symlist` every ec some transition accepts.
    fn sympartition(&self, ds: &[NfaId], dup: &mut EcLinks, symlist: &mut [bool]) -> Result<()> {
        let numecs = dup.len();
        for &ns in ds {
            match self.nfa.state(ns).symbol {
                Transition::Epsilon => {}
                Transition::Char(c) => {
                    let ec = self.ec_of(c) as usize;
                    if ec == 0 || ec > numecs {
                        return Err(Error::internal(format!(
                            "bad transition character {c} in state {ns}"
                        )));
                    }
                    dup.mkechar(ec);
                    symlist[ec] = true;
                }
                Transition::Class(k) => {
                    let ccl = self
                        .ccls
                        .get(k)
                        .ok_or_else(|| Error::internal(format!("unknown class {k}")))?;
                    let ecl: Vec<usize> = ccl.ecl.iter().map(|&e| e as usize).collect();
                    dup.mkeccl(&ecl);
                    if ccl.negated {
                        let mut j = 0usize;
                        for &ich in &ecl {
                            for s in symlist.iter_mut().take(ich).skip(j + 1) {
                                *s = true;
                            }
                            j = ich;
                        }
                        for s in symlist.iter_mut().take(numecs + 1).skip(j + 1) {
                            *s = true;
                        }
                    } else {
                        for &e in &ecl {
                            symlist[e] = true;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// NFA states reached from `ds` on ec `transsym`.
    fn symfollowset(&self, ds: &[NfaId], transsym: u32) -> Vec<NfaId> {
        let mut out = Vec::new();
        for &ns in ds {
            let st = self.nfa.state(ns);
            let Some(next) = st.trans1 else {
                continue;
            };
            let hit = match st.symbol {
                Transition::Epsilon => false,
                Transition::Char(c) => self.ec_of(c) == transsym,
                Transition::Class(k) => match self.ccls.get(k) {
                    Some(ccl) => ccl.ecl.binary_search(&transsym).is_ok() != ccl.negated,
                    None => false,
                },
            };
            if hit {
                out.push(next);
            }
        }
        out
    }

    /// Find or create the DFA state for `closure`. Returns whether it is new.
    fn snstods(
        &mut self,
        dfa: &mut Dfa,
        index: &mut StateIndex,
        mut closure: Closure,
        set_mode: bool,
    ) -> (DfaId, bool) {
        closure.states.sort_unstable();
        let bucket = index.by_hash.entry(closure.hash).or_default();
        self.stats.hshsave += dfa.lastdfa() as usize - bucket.len();
        for &id in bucket.iter() {
            if dfa.states[id as usize].nfa_states == closure.states {
                self.stats.dfaeql += 1;
                return (id, false);
            }
            self.stats.hshcol += 1;
        }

        let acceptance = if set_mode {
            let mut accs = closure.accepts.clone();
            accs.sort_unstable();
            accs.dedup();
            for a in &accs {
                if let AcceptNum::Rule(r) = a {
                    self.rules[*r as usize].useful = true;
                }
            }
            Acceptance::Set(accs)
        } else {
            let lowest = closure
                .accepts
                .iter()
                .filter_map(|a| match a {
                    AcceptNum::Rule(r) => Some(*r),
                    AcceptNum::TrailingHead(_) => None,
                })
                .min();
            if let Some(r) = lowest {
                self.rules[r as usize].useful = true;
            }
            Acceptance::Single(lowest)
        };

        if acceptance.is_accepting() {
            self.stats.numas += 1;
        }
        self.stats.totnst += closure.states.len();
        if self.variable_trailing_context_rules && !closure.accepts.is_empty() {
            self.check_trailing_context(&closure.states, &closure.accepts);
        }

        dfa.states.push(DfaState {
            nfa_states: closure.states,
            hash: closure.hash,
            acceptance,
        });
        let id = dfa.lastdfa();
        bucket.push(id);
        (id, true)
    }

    /// A trailing-context state of a variable rule sharing a DFA state with
    /// some head accept may back up wrongly at run time.
    fn check_trailing_context(&mut self, states: &[NfaId], accepts: &[AcceptNum]) {
        for &ns in states {
            let st = self.nfa.state(ns);
            let Some(ar) = st.assoc_rule else {
                continue;
            };
            if st.state_type == StateType::Normal
                || self.rules[ar as usize].kind != RuleKind::Variable
            {
                continue;
            }
            if accepts
                .iter()
                .any(|a| matches!(a, AcceptNum::TrailingHead(_)))
            {
                let line = self.rules[ar as usize].line;
                self.diags.warn("dangerous trailing context", Some(line));
                return;
            }
        }
    }

    fn describe_backing_up(&self, dfa: &Dfa, ds: DfaId, row: &[u32]) -> String {
        let mut lines: Vec<usize> = dfa.states[ds as usize]
            .nfa_states
            .iter()
            .filter_map(|&ns| self.nfa.state(ns).assoc_rule)
            .filter_map(|r| self.rule(r).map(|info| info.line))
            .collect();
        lines.sort_unstable();
        lines.dedup();

        let mut out_chars = Vec::new();
        let mut jam_chars = Vec::new();
        for c in 0..self.cfg.csize {
            let ec = self.ec_of(c as u8);
            if row.get(ec as usize).copied().unwrap_or(0) != 0 {
                out_chars.push(c as u8);
            } else {
                jam_chars.push(c as u8);
            }
        }
        format!(
            "State #{ds} is non-accepting -\n associated rule line numbers:\n\t{}\n out-transitions: [ {} ]\n jam-transitions: EOF [ {} ]\n",
            lines
                .iter()
                .map(|l| l.to_string())
                .collect::<Vec<_>>()
                .join("\t"),
            crate::stats::char_ranges(&out_chars),
            crate::stats::char_ranges(&jam_chars),
        )
    }
}
