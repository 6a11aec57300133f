// src/automata/mod.rs
//! Rule automata: the NFA builder, character classes, equivalence classes,
//! epsilon closure and the subset construction.
//!
//! All mutable state lives in one [`Context`]. Handles are plain indices
//! into its arenas; nothing is ever freed individually.

pub mod ccl;
pub mod closure;
pub mod dfa;
pub mod ecs;
pub mod nfa;

use crate::{
    config::{ScanConfig, TableKind},
    error::{Diagnostics, Error, Result},
    stats::Stats,
    tables::{self, Tables},
};

pub use ccl::{CclDraft, CclRegistry};
pub use dfa::{Acceptance, Dfa};
pub use ecs::{EcLinks, EcNumbering};
pub use nfa::{Nfa, NfaState};

pub type NfaId = u32;
pub type CclId = u32;
pub type RuleNum = u32;
pub type DfaId = u32;

/// Largest rule number; larger numbers collide with the trailing flags.
pub const MAX_RULE: u32 = 8191;
/// Accept-list flag: end of a variable trailing-context rule.
pub const TRAILING_MASK: u32 = 0x2000;
/// Accept-list flag: end of the head part of such a rule.
pub const TRAILING_HEAD_MASK: u32 = 0x4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Epsilon,
    Char(u8),
    Class(CclId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StateType {
    #[default]
    Normal,
    TrailingContext,
}

/// What an accepting NFA state accepts. Variant order matches the packed
/// encoding: every rule sorts before every trailing head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AcceptNum {
    Rule(RuleNum),
    TrailingHead(RuleNum),
}

impl AcceptNum {
    pub fn rule(self) -> RuleNum {
        match self {
            AcceptNum::Rule(r) | AcceptNum::TrailingHead(r) => r,
        }
    }

    pub fn packed(self) -> u32 {
        match self {
            AcceptNum::Rule(r) => r,
            AcceptNum::TrailingHead(r) => r | TRAILING_HEAD_MASK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleKind {
    #[default]
    Normal,
    /// Both head and trailing context have variable length.
    Variable,
}

#[derive(Debug, Clone, Default)]
pub struct RuleInfo {
    pub line: usize,
    pub kind: RuleKind,
    pub useful: bool,
    /// Action is `|`: shares the next rule's action.
    pub continued: bool,
    /// Fixed head length when only the trailing part varies.
    pub headcnt: Option<usize>,
    /// Fixed trailing length when only the head varies.
    pub trailcnt: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct StartCondition {
    pub name: String,
    pub exclusive: bool,
    /// Epsilon state all rules hang off.
    pub set: NfaId,
    /// Epsilon state for rules anchored at beginning of line.
    pub bol: NfaId,
}

/// Everything one generator run produces.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub dfa: Dfa,
    pub tables: Tables,
    /// `actions[r]` = action number run when rule `r` matches (index 0 unused).
    pub actions: Vec<RuleNum>,
    pub stats: Stats,
    pub diagnostics: Diagnostics,
}

pub struct Context {
    pub(crate) cfg: ScanConfig,
    pub(crate) nfa: Nfa,
    pub(crate) ccls: CclRegistry,
    /// Character equivalence groups, element `c + 1` is character `c`.
    pub(crate) ecgroup: EcLinks,
    pub(crate) ec_numbering: EcNumbering,
    /// Index 0 unused; rule numbers start at 1.
    pub(crate) rules: Vec<RuleInfo>,
    pub(crate) current_state_type: StateType,
    pub(crate) variable_trailing_context_rules: bool,
    pub(crate) scs: Vec<StartCondition>,
    pub(crate) diags: Diagnostics,
    pub(crate) stats: Stats,
}

impl Context {
    pub fn new(cfg: ScanConfig) -> Result<Self> {
        cfg.validate()?;
        let csize = cfg.csize;
        let mut ctx = Self {
            nfa: Nfa::new(),
            ccls: CclRegistry::default(),
            ecgroup: EcLinks::new(csize),
            ec_numbering: EcNumbering::default(),
            rules: vec![RuleInfo::default()],
            current_state_type: StateType::Normal,
            variable_trailing_context_rules: false,
            scs: Vec::new(),
            diags: Diagnostics::default(),
            stats: Stats::default(),
            cfg,
        };
        ctx.scinstal("INITIAL", false);
        Ok(ctx)
    }

    pub fn config(&self) -> &ScanConfig {
        &self.cfg
    }

    pub fn nfa(&self) -> &Nfa {
        &self.nfa
    }

    pub fn ccls(&self) -> &CclRegistry {
        &self.ccls
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diags
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diags
    }

    pub fn num_rules(&self) -> u32 {
        (self.rules.len() - 1) as u32
    }

    pub fn rule(&self, r: RuleNum) -> Option<&RuleInfo> {
        if r == 0 {
            return None;
        }
        self.rules.get(r as usize)
    }

    pub fn start_conditions(&self) -> &[StartCondition] {
        &self.scs
    }

    /// Action number of the last rule; the end-of-buffer action follows it.
    pub fn end_of_buffer_action(&self) -> u32 {
        self.num_rules() + 1
    }

    /// Is the accepting set kept whole for every DFA state?
    pub fn uses_accept_sets(&self) -> bool {
        self.cfg.reject || self.variable_trailing_context_rules
    }

    /// Start a new rule. States made from now on belong to it.
    pub fn new_rule(&mut self, line: usize) -> Result<RuleNum> {
        let next = self.rules.len() as u32;
        if next > MAX_RULE {
            return Err(Error::TooManyRules { limit: MAX_RULE });
        }
        self.rules.push(RuleInfo {
            line,
            ..RuleInfo::default()
        });
        self.current_state_type = StateType::Normal;
        self.stats.num_rules = next as usize;
        Ok(next)
    }

    pub(crate) fn current_rule(&self) -> Option<RuleNum> {
        match self.rules.len() {
            1 => None,
            n => Some((n - 1) as RuleNum),
        }
    }

    /// Run the back half: classes, subset construction, table layout.
    pub fn compile(mut self) -> Result<Compiled> {
        if self.cfg.tables != TableKind::Compressed && self.variable_trailing_context_rules {
            return Err(Error::Config(
                "variable trailing context rules cannot be used with -f or -F".into(),
            ));
        }
        let errors = self.diags.error_count();
        if errors > 0 {
            return Err(Error::Syntax { errors });
        }

        self.finish_ecs();
        if self.cfg.trace {
            self.nfa.trace_dump(&self.ccls);
        }

        let dfa = self.ntod()?;
        let (tables, cstats) = tables::build::build_tables(&self, &dfa)?;
        self.stats.record_nfa(&self.nfa);
        self.stats.record_tables(&tables, &cstats);

        let actions = tables::accept::rule_actions(&self.rules);
        log::info!("{}", self.stats);
        Ok(Compiled {
            dfa,
            tables,
            actions,
            stats: self.stats,
            diagnostics: self.diags,
        })
    }
}
