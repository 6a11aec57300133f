// src/automata/nfa.rs
//! Thompson-style NFA fragments.
//!
//! A fragment ("machine") is named by its start state. The start state also
//! records the fragment's lowest and highest state numbers and its final
//! state, so fragments built in order occupy one contiguous range that
//! `dupmachine` can copy.

use super::{
    AcceptNum, CclRegistry, Context, NfaId, RuleKind, RuleNum, StartCondition, StateType,
    Transition,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct NfaState {
    pub first: NfaId,
    pub last: NfaId,
    pub final_state: NfaId,
    pub symbol: Transition,
    pub trans1: Option<NfaId>,
    /// Only epsilon states fan out to a second successor.
    pub trans2: Option<NfaId>,
    pub accept: Option<AcceptNum>,
    pub assoc_rule: Option<RuleNum>,
    pub state_type: StateType,
}

impl NfaState {
    /// Epsilon state with no outgoing edge yet.
    fn is_super_free_epsilon(&self) -> bool {
        self.symbol == Transition::Epsilon && self.trans1.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Nfa {
    /// Index 0 is a placeholder so state numbers start at 1.
    states: Vec<NfaState>,
    pub(crate) num_eps: usize,
    pub(crate) num_eps2: usize,
}

impl Default for Nfa {
    fn default() -> Self {
        Self::new()
    }
}

impl Nfa {
    pub fn new() -> Self {
        let placeholder = NfaState {
            first: 0,
            last: 0,
            final_state: 0,
            symbol: Transition::Epsilon,
            trans1: None,
            trans2: None,
            accept: None,
            assoc_rule: None,
            state_type: StateType::Normal,
        };
        Self {
            states: vec![placeholder],
            num_eps: 0,
            num_eps2: 0,
        }
    }

    /// Highest state number in use.
    pub fn lastnfa(&self) -> NfaId {
        (self.states.len() - 1) as NfaId
    }

    pub fn state(&self, id: NfaId) -> &NfaState {
        &self.states[id as usize]
    }

    fn state_mut(&mut self, id: NfaId) -> &mut NfaState {
        &mut self.states[id as usize]
    }

    pub fn final_of(&self, mach: NfaId) -> NfaId {
        self.state(mach).final_state
    }

    pub fn iter(&self) -> impl Iterator<Item = (NfaId, &NfaState)> {
        self.states
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, s)| (i as NfaId, s))
    }

    fn push(&mut self, symbol: Transition, rule: Option<RuleNum>, ty: StateType) -> NfaId {
        let id = self.states.len() as NfaId;
        self.states.push(NfaState {
            first: id,
            last: id,
            final_state: id,
            symbol,
            trans1: None,
            trans2: None,
            accept: None,
            assoc_rule: rule,
            state_type: ty,
        });
        if symbol == Transition::Epsilon {
            self.num_eps += 1;
        }
        id
    }

    fn mkxtion(&mut self, from: NfaId, to: NfaId) -> Result<()> {
        let st = self.state_mut(from);
        if st.trans1.is_none() {
            st.trans1 = Some(to);
        } else if st.symbol != Transition::Epsilon || st.trans2.is_some() {
            return Err(Error::internal(format!(
                "found too many transitions in mkxtion() (state {from})"
            )));
        } else {
            st.trans2 = Some(to);
            self.num_eps2 += 1;
        }
        Ok(())
    }

    pub(crate) fn trace_dump(&self, ccls: &CclRegistry) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        log::trace!("********** beginning dump of nfa ({} states)", self.lastnfa());
        for (id, st) in self.iter() {
            let sym = match st.symbol {
                Transition::Epsilon => "eps".to_string(),
                Transition::Char(c) => format!("{:?}", c as char),
                Transition::Class(k) => match ccls.get(k) {
                    Some(ccl) if ccl.negated => format!("[^ccl {k}]"),
                    _ => format!("[ccl {k}]"),
                },
            };
            log::trace!(
                "state # {id:4}\t{sym:>8}: {:4}, {:4}  [{:?}]",
                st.trans1.unwrap_or(0),
                st.trans2.unwrap_or(0),
                st.accept
            );
        }
        log::trace!("********** end of dump");
    }
}

impl Context {
    /// New one-state fragment on `symbol`.
    pub fn mkstate(&mut self, symbol: Transition) -> NfaId {
        if let Transition::Char(c) = symbol {
            if c as usize >= self.cfg.csize {
                self.diags
                    .error(format!("bad character: {c:#04x}"), self.current_line());
            } else if self.cfg.use_ecs {
                self.ecgroup.mkechar(c as usize + 1);
            }
        }
        let rule = self.current_rule();
        let ty = self.current_state_type;
        let id = self.nfa.push(symbol, rule, ty);
        self.stats.num_nfa_states = self.nfa.lastnfa() as usize;
        id
    }

    pub fn mkxtion(&mut self, from: NfaId, to: NfaId) -> Result<()> {
        self.nfa.mkxtion(from, to)
    }

    /// Concatenate `first` and `last`.
    pub fn link(&mut self, first: NfaId, last: NfaId) -> Result<NfaId> {
        let first_final = self.nfa.final_of(first);
        self.nfa.mkxtion(first_final, last)?;
        let (l_first, l_last, l_final) = {
            let l = self.nfa.state(last);
            (l.first, l.last, l.final_state)
        };
        let f = self.nfa.state_mut(first);
        f.final_state = l_final;
        f.last = f.last.max(l_last);
        f.first = f.first.min(l_first);
        Ok(first)
    }

    /// `link` where either side may be missing.
    pub fn link_opt(&mut self, first: Option<NfaId>, last: Option<NfaId>) -> Result<Option<NfaId>> {
        match (first, last) {
            (None, m) | (m, None) => Ok(m),
            (Some(a), Some(b)) => self.link(a, b).map(Some),
        }
    }

    /// Epsilon fork to `first` and `second` with no common end.
    pub fn mkbranch(&mut self, first: NfaId, second: NfaId) -> Result<NfaId> {
        let eps = self.mkstate(Transition::Epsilon);
        self.nfa.mkxtion(eps, first)?;
        self.nfa.mkxtion(eps, second)?;
        Ok(eps)
    }

    /// `first | second`.
    pub fn mkor(&mut self, first: NfaId, second: NfaId) -> Result<NfaId> {
        let eps = self.mkstate(Transition::Epsilon);
        let mut first = self.link(eps, first)?;
        self.nfa.mkxtion(first, second)?;

        let f_final = self.nfa.final_of(first);
        let s_final = self.nfa.final_of(second);
        let free_end = |nfa: &Nfa, s: NfaId| {
            let st = nfa.state(s);
            st.is_super_free_epsilon() && st.accept.is_none()
        };

        let orend = if free_end(&self.nfa, f_final) {
            self.nfa.mkxtion(s_final, f_final)?;
            f_final
        } else if free_end(&self.nfa, s_final) {
            self.nfa.mkxtion(f_final, s_final)?;
            s_final
        } else {
            let eps = self.mkstate(Transition::Epsilon);
            first = self.link(first, eps)?;
            let orend = self.nfa.final_of(first);
            self.nfa.mkxtion(s_final, orend)?;
            orend
        };
        self.nfa.state_mut(first).final_state = orend;
        Ok(first)
    }

    /// `state+`.
    pub fn mkposcl(&mut self, state: NfaId) -> Result<NfaId> {
        let fin = self.nfa.final_of(state);
        if self.nfa.state(fin).is_super_free_epsilon() {
            self.nfa.mkxtion(fin, state)?;
            Ok(state)
        } else {
            let eps = self.mkstate(Transition::Epsilon);
            self.nfa.mkxtion(eps, state)?;
            self.link(state, eps)
        }
    }

    /// `mach?`.
    pub fn mkopt(&mut self, mut mach: NfaId) -> Result<NfaId> {
        // The skip edge needs a final state that can still take an edge.
        let fin = self.nfa.final_of(mach);
        if !self.nfa.state(fin).is_super_free_epsilon() {
            let eps = self.mkstate(Transition::Epsilon);
            mach = self.link(mach, eps)?;
        }
        let eps = self.mkstate(Transition::Epsilon);
        mach = self.link(eps, mach)?;
        let fin = self.nfa.final_of(mach);
        self.nfa.mkxtion(mach, fin)?;
        Ok(mach)
    }

    /// `state*`.
    pub fn mkclos(&mut self, state: NfaId) -> Result<NfaId> {
        let plus = self.mkposcl(state)?;
        self.mkopt(plus)
    }

    /// Copy a fragment. Its states must form one contiguous range.
    pub fn dupmachine(&mut self, mach: NfaId) -> Result<NfaId> {
        let (lo, hi, fin) = {
            let m = self.nfa.state(mach);
            (m.first, m.last, m.final_state)
        };
        if lo > hi || lo == 0 {
            return Err(Error::internal("empty machine in dupmachine()"));
        }
        let mut offset = 0;
        for i in lo..=hi {
            let (symbol, t1, t2, accept, ty) = {
                let s = self.nfa.state(i);
                (s.symbol, s.trans1, s.trans2, s.accept, s.state_type)
            };
            let state = self.mkstate(symbol);
            offset = state - i;
            if let Some(t1) = t1 {
                self.nfa.mkxtion(state, t1 + offset)?;
                if symbol == Transition::Epsilon {
                    if let Some(t2) = t2 {
                        self.nfa.mkxtion(state, t2 + offset)?;
                    }
                }
            }
            let copy = self.nfa.state_mut(state);
            copy.accept = accept;
            copy.state_type = ty;
        }
        let init = mach + offset;
        let st = self.nfa.state_mut(init);
        st.first = lo + offset;
        st.last = hi + offset;
        st.final_state = fin + offset;
        Ok(init)
    }

    /// `num` copies of `singl` after a leading epsilon.
    fn copysingl(&mut self, singl: NfaId, num: u32) -> Result<NfaId> {
        let mut copy = self.mkstate(Transition::Epsilon);
        for _ in 0..num {
            let dup = self.dupmachine(singl)?;
            copy = self.link(copy, dup)?;
        }
        Ok(copy)
    }

    /// `mach{lb,ub}` with `1 <= lb <= ub`, or `mach{lb,}` when `ub` is None.
    fn mkrep_core(&mut self, mach: NfaId, lb: u32, ub: Option<u32>) -> Result<NfaId> {
        let base = self.copysingl(mach, lb - 1)?;
        match ub {
            None => {
                let copy = self.dupmachine(mach)?;
                let clos = self.mkclos(copy)?;
                let rest = self.link(base, clos)?;
                self.link(mach, rest)
            }
            Some(ub) => {
                let mut tail = self.mkstate(Transition::Epsilon);
                for _ in lb..ub {
                    let copy = self.dupmachine(mach)?;
                    let linked = self.link(copy, tail)?;
                    tail = self.mkopt(linked)?;
                }
                let rest = self.link(base, tail)?;
                self.link(mach, rest)
            }
        }
    }

    /// `mach{lo,hi}`; `hi` None means unbounded. Bad bounds are reported and
    /// the fragment is returned unchanged.
    pub fn mkrep(&mut self, mach: NfaId, lo: i32, hi: Option<i32>) -> Result<NfaId> {
        match hi {
            None if lo < 0 => {
                self.diags.error("bad iteration values", self.current_line());
                Ok(mach)
            }
            None if lo == 0 => self.mkclos(mach),
            None => self.mkrep_core(mach, lo as u32, None),
            Some(hi) if lo > hi || lo < 0 || (lo == 0 && hi <= 0) => {
                self.diags.error("bad iteration values", self.current_line());
                Ok(mach)
            }
            Some(hi) if lo == 0 => {
                let rep = self.mkrep_core(mach, 1, Some(hi as u32))?;
                self.mkopt(rep)
            }
            Some(hi) => self.mkrep_core(mach, lo as u32, Some(hi as u32)),
        }
    }

    /// `mach{n}`.
    pub fn mkrep_exact(&mut self, mach: NfaId, n: i32) -> Result<NfaId> {
        if n <= 0 {
            self.diags
                .error("iteration value must be positive", self.current_line());
            return Ok(mach);
        }
        let copies = self.copysingl(mach, n as u32 - 1)?;
        self.link(mach, copies)
    }

    /// Make the fragment's final state accept `num`.
    pub fn add_accept(&mut self, mach: NfaId, num: AcceptNum) -> Result<NfaId> {
        let fin = self.nfa.final_of(mach);
        if self.nfa.state(fin).symbol == Transition::Epsilon {
            self.nfa.state_mut(fin).accept = Some(num);
            Ok(mach)
        } else {
            let astate = self.mkstate(Transition::Epsilon);
            self.nfa.state_mut(astate).accept = Some(num);
            self.link(mach, astate)
        }
    }

    /// States created from here on belong to the trailing context.
    pub fn begin_trailing_context(&mut self) {
        self.current_state_type = StateType::TrailingContext;
    }

    /// Join `head/trail`. Lengths are `Some` when fixed.
    pub fn mk_trailing_context(
        &mut self,
        head: NfaId,
        head_len: Option<usize>,
        trail: NfaId,
        trail_len: Option<usize>,
    ) -> Result<TrailingParts> {
        let rule = self
            .current_rule()
            .ok_or_else(|| Error::internal("trailing context outside of a rule"))?;
        let mut head_len = head_len;
        let prev_continued = rule > 1 && self.rules[rule as usize - 1].continued;
        if prev_continued && head_len.is_some() {
            self.diags.warn(
                "trailing context made variable due to preceding '|' action",
                self.current_line(),
            );
            head_len = None;
        }

        let mut parts = TrailingParts {
            mach: head,
            variable: false,
            headcnt: head_len,
            trailcnt: None,
        };
        let head = if head_len.is_none() && trail_len.is_none() {
            // Head accepts are ordinary states even though the trail follows.
            let saved = std::mem::replace(&mut self.current_state_type, StateType::Normal);
            let head = self.add_accept(head, AcceptNum::TrailingHead(rule))?;
            self.current_state_type = saved;
            parts.variable = true;
            head
        } else {
            parts.trailcnt = trail_len;
            head
        };
        parts.mach = self.link(head, trail)?;
        Ok(parts)
    }

    /// Accept `mach` with the current rule and record how the rule ends.
    pub fn finish_rule(
        &mut self,
        mach: NfaId,
        variable_trail_rule: bool,
        headcnt: Option<usize>,
        trailcnt: Option<usize>,
        continued: bool,
    ) -> Result<NfaId> {
        let rule = self
            .current_rule()
            .ok_or_else(|| Error::internal("finish_rule() without new_rule()"))?;
        let mach = self.add_accept(mach, AcceptNum::Rule(rule))?;
        let info = &mut self.rules[rule as usize];
        info.continued = continued;
        if variable_trail_rule {
            info.kind = RuleKind::Variable;
            self.variable_trailing_context_rules = true;
        } else {
            info.kind = RuleKind::Normal;
            info.headcnt = headcnt.filter(|&n| n > 0);
            info.trailcnt = if info.headcnt.is_some() {
                None
            } else {
                trailcnt.filter(|&n| n > 0)
            };
        }
        self.current_state_type = StateType::Normal;
        Ok(mach)
    }

    /// Declare a start condition; returns its index.
    pub fn scinstal(&mut self, name: &str, exclusive: bool) -> usize {
        if let Some(i) = self.sclookup(name) {
            self.diags
                .warn(format!("start condition {name} declared twice"), None);
            return i;
        }
        let set = self.mkstate(Transition::Epsilon);
        let bol = self.mkstate(Transition::Epsilon);
        self.scs.push(StartCondition {
            name: name.to_string(),
            exclusive,
            set,
            bol,
        });
        self.stats.num_scs = self.scs.len();
        self.scs.len() - 1
    }

    pub fn sclookup(&self, name: &str) -> Option<usize> {
        self.scs.iter().position(|sc| sc.name == name)
    }

    /// Hang a finished rule off its start conditions. An empty `scs` means
    /// every inclusive start condition.
    pub fn add_to_start_conditions(&mut self, mach: NfaId, bol: bool, scs: &[usize]) -> Result<()> {
        let targets: Vec<usize> = if scs.is_empty() {
            (0..self.scs.len())
                .filter(|&i| !self.scs[i].exclusive)
                .collect()
        } else {
            scs.to_vec()
        };
        for i in targets {
            let Some(sc) = self.scs.get(i) else {
                return Err(Error::internal(format!("no start condition #{i}")));
            };
            let (set, scbol) = (sc.set, sc.bol);
            if bol {
                let b = self.mkbranch(scbol, mach)?;
                self.scs[i].bol = b;
            } else {
                let b = self.mkbranch(set, mach)?;
                self.scs[i].set = b;
            }
        }
        Ok(())
    }
}

/// Result of `mk_trailing_context`, fed to `finish_rule`.
#[derive(Debug, Clone, Copy)]
pub struct TrailingParts {
    pub mach: NfaId,
    pub variable: bool,
    pub headcnt: Option<usize>,
    pub trailcnt: Option<usize>,
}
