// src/pattern.rs
//! Rule sets as data. `RuleSet::install` makes the builder calls a rule
//! parser would make while reducing each rule, in the same order.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    automata::{Compiled, Context, NfaId, Transition},
    config::ScanConfig,
    error::{Error, Result},
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// The bytes of the string, in order.
    Literal(String),
    Byte(u8),
    /// Inclusive byte ranges.
    Class {
        ranges: Vec<(u8, u8)>,
        #[serde(default)]
        negated: bool,
    },
    /// Anything but newline.
    Any,
    Seq(Vec<Pattern>),
    Alt(Vec<Pattern>),
    Star(Box<Pattern>),
    Plus(Box<Pattern>),
    Opt(Box<Pattern>),
    /// `{min,max}`, or `{min,}` without `max`.
    Repeat {
        pattern: Box<Pattern>,
        min: i32,
        #[serde(default)]
        max: Option<i32>,
    },
    /// `{count}`.
    Exact { pattern: Box<Pattern>, count: i32 },
}

impl Pattern {
    pub fn lit(s: &str) -> Self {
        Pattern::Literal(s.to_string())
    }

    pub fn range(lo: u8, hi: u8) -> Self {
        Pattern::Class {
            ranges: vec![(lo, hi)],
            negated: false,
        }
    }

    pub fn class(ranges: &[(u8, u8)]) -> Self {
        Pattern::Class {
            ranges: ranges.to_vec(),
            negated: false,
        }
    }

    pub fn not_class(ranges: &[(u8, u8)]) -> Self {
        Pattern::Class {
            ranges: ranges.to_vec(),
            negated: true,
        }
    }

    pub fn star(p: Pattern) -> Self {
        Pattern::Star(Box::new(p))
    }

    pub fn plus(p: Pattern) -> Self {
        Pattern::Plus(Box::new(p))
    }

    pub fn opt(p: Pattern) -> Self {
        Pattern::Opt(Box::new(p))
    }

    pub fn repeat(p: Pattern, min: i32, max: Option<i32>) -> Self {
        Pattern::Repeat {
            pattern: Box::new(p),
            min,
            max,
        }
    }

    pub fn exact(p: Pattern, count: i32) -> Self {
        Pattern::Exact {
            pattern: Box::new(p),
            count,
        }
    }

    /// Build the fragment; the length is `Some` when every match has it.
    pub fn build(&self, ctx: &mut Context) -> Result<(NfaId, Option<usize>)> {
        match self {
            Pattern::Literal(s) => {
                let bytes = s.as_bytes();
                if bytes.is_empty() {
                    return Ok((ctx.mkstate(Transition::Epsilon), Some(0)));
                }
                let mut mach = ctx.mkstate(Transition::Char(bytes[0]));
                for &b in &bytes[1..] {
                    let next = ctx.mkstate(Transition::Char(b));
                    mach = ctx.link(mach, next)?;
                }
                Ok((mach, Some(bytes.len())))
            }
            Pattern::Byte(b) => Ok((ctx.mkstate(Transition::Char(*b)), Some(1))),
            Pattern::Class { ranges, negated } => {
                let mut draft = ctx.cclinit();
                for &(lo, hi) in ranges {
                    if lo > hi {
                        let line = ctx.current_line();
                        ctx.diagnostics_mut()
                            .error("negative range in character class", line);
                        continue;
                    }
                    for c in lo..=hi {
                        ctx.ccladd(&mut draft, c);
                    }
                }
                if *negated {
                    ctx.cclnegate(&mut draft);
                }
                let id = ctx.cclinstal(draft);
                Ok((ctx.mkstate(Transition::Class(id)), Some(1)))
            }
            Pattern::Any => {
                let mut draft = ctx.cclinit();
                ctx.ccladd(&mut draft, b'\n');
                ctx.cclnegate(&mut draft);
                let id = ctx.cclinstal(draft);
                Ok((ctx.mkstate(Transition::Class(id)), Some(1)))
            }
            Pattern::Seq(items) => {
                let mut mach: Option<NfaId> = None;
                let mut len = Some(0usize);
                for item in items {
                    let (m, l) = item.build(ctx)?;
                    mach = ctx.link_opt(mach, Some(m))?;
                    len = len.zip(l).map(|(a, b)| a + b);
                }
                match mach {
                    Some(m) => Ok((m, len)),
                    None => Ok((ctx.mkstate(Transition::Epsilon), Some(0))),
                }
            }
            Pattern::Alt(items) => {
                let mut mach: Option<NfaId> = None;
                for item in items {
                    let (m, _) = item.build(ctx)?;
                    mach = Some(match mach {
                        None => m,
                        Some(prev) => ctx.mkor(prev, m)?,
                    });
                }
                match mach {
                    Some(m) => Ok((m, None)),
                    None => Ok((ctx.mkstate(Transition::Epsilon), Some(0))),
                }
            }
            Pattern::Star(p) => {
                let (m, _) = p.build(ctx)?;
                Ok((ctx.mkclos(m)?, None))
            }
            Pattern::Plus(p) => {
                let (m, _) = p.build(ctx)?;
                Ok((ctx.mkposcl(m)?, None))
            }
            Pattern::Opt(p) => {
                let (m, _) = p.build(ctx)?;
                Ok((ctx.mkopt(m)?, None))
            }
            Pattern::Repeat { pattern, min, max } => {
                let (m, _) = pattern.build(ctx)?;
                Ok((ctx.mkrep(m, *min, *max)?, None))
            }
            Pattern::Exact { pattern, count } => {
                let (m, l) = pattern.build(ctx)?;
                let len = if *count > 0 {
                    l.map(|l| l * *count as usize)
                } else {
                    l
                };
                Ok((ctx.mkrep_exact(m, *count)?, len))
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RuleDef {
    pub pattern: Pattern,
    /// `pattern/trailing`: match `trailing` but leave it in the input.
    #[serde(default)]
    pub trailing: Option<Pattern>,
    /// Anchored at beginning of line (`^`).
    #[serde(default)]
    pub bol: bool,
    /// Anchored at end of line (`$`), i.e. trailing context `\n`.
    #[serde(default)]
    pub eol: bool,
    /// Empty: every inclusive start condition. `"*"`: all of them.
    #[serde(default)]
    pub start_conditions: Vec<String>,
    /// The action is `|`.
    #[serde(default)]
    pub continued: bool,
    /// 0 means "use the rule's position".
    #[serde(default)]
    pub line: usize,
}

impl RuleDef {
    pub fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            trailing: None,
            bol: false,
            eol: false,
            start_conditions: Vec::new(),
            continued: false,
            line: 0,
        }
    }

    pub fn with_trailing(mut self, trailing: Pattern) -> Self {
        self.trailing = Some(trailing);
        self
    }

    pub fn in_start_conditions(mut self, names: &[&str]) -> Self {
        self.start_conditions = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StartConditionDef {
    pub name: String,
    #[serde(default)]
    pub exclusive: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleSet {
    #[serde(default)]
    pub start_conditions: Vec<StartConditionDef>,
    pub rules: Vec<RuleDef>,
}

impl RuleSet {
    pub fn new(rules: Vec<RuleDef>) -> Self {
        Self {
            start_conditions: Vec::new(),
            rules,
        }
    }

    pub fn from_patterns(patterns: impl IntoIterator<Item = Pattern>) -> Self {
        Self::new(patterns.into_iter().map(RuleDef::new).collect())
    }

    pub fn from_json_bytes(data: &[u8]) -> Result<Self> {
        serde_json::from_slice::<RuleSet>(data)
            .map_err(|e| Error::Config(format!("Failed to parse rules JSON: {e}")))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let data = std::fs::read(path_ref).map_err(|e| {
            Error::Config(format!("Failed to read rules file {:?}: {}", path_ref, e))
        })?;
        Self::from_json_bytes(&data)
    }

    /// Declare the start conditions, then build and attach every rule.
    pub fn install(&self, ctx: &mut Context) -> Result<()> {
        for sc in &self.start_conditions {
            ctx.scinstal(&sc.name, sc.exclusive);
        }

        for (i, rule) in self.rules.iter().enumerate() {
            let line = if rule.line > 0 { rule.line } else { i + 1 };
            ctx.new_rule(line)?;

            let mut scs = Vec::new();
            let mut unresolved = false;
            for name in &rule.start_conditions {
                if name == "*" {
                    scs.extend(0..ctx.start_conditions().len());
                    continue;
                }
                match ctx.sclookup(name) {
                    Some(sc) => scs.push(sc),
                    None => {
                        ctx.diagnostics_mut()
                            .error(format!("undeclared start condition {name}"), Some(line));
                        unresolved = true;
                    }
                }
            }
            scs.sort_unstable();
            scs.dedup();

            let (head, head_len) = rule.pattern.build(ctx)?;

            let trailing = match (&rule.trailing, rule.eol) {
                (Some(_), true) => {
                    ctx.diagnostics_mut()
                        .error("trailing context used twice", Some(line));
                    rule.trailing.clone()
                }
                (Some(t), false) => Some(t.clone()),
                (None, true) => Some(Pattern::Byte(b'\n')),
                (None, false) => None,
            };

            let (mach, variable, headcnt, trailcnt) = match trailing {
                Some(t) => {
                    ctx.begin_trailing_context();
                    let (trail, trail_len) = t.build(ctx)?;
                    let parts = ctx.mk_trailing_context(head, head_len, trail, trail_len)?;
                    (parts.mach, parts.variable, parts.headcnt, parts.trailcnt)
                }
                None => (head, false, None, None),
            };

            let mach = ctx.finish_rule(mach, variable, headcnt, trailcnt, rule.continued)?;
            if unresolved && scs.is_empty() {
                continue;
            }
            ctx.add_to_start_conditions(mach, rule.bol, &scs)?;
        }
        Ok(())
    }

    /// Configure, install and compile in one go.
    pub fn compile(&self, cfg: ScanConfig) -> Result<Compiled> {
        let mut ctx = Context::new(cfg)?;
        self.install(&mut ctx)?;
        ctx.compile()
    }
}
