// src/stats.rs
//! Generation statistics, printed like a verbose run of a classic scanner
//! generator, plus the optional backing-up report.

use std::fmt;

use crate::{
    automata::Nfa,
    tables::{Layout, Tables, compress::CompressStats},
};

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub num_rules: usize,
    pub num_scs: usize,
    pub num_nfa_states: usize,
    pub num_eps: usize,
    pub eps2: usize,
    pub numccls: usize,
    pub cclreuse: usize,
    pub numecs: usize,
    pub csize: usize,

    pub lastdfa: usize,
    /// NFA states summed over all DFA states.
    pub totnst: usize,
    pub numas: usize,
    pub numsnpairs: usize,
    pub numuniq: usize,
    pub numdup: usize,
    pub hshcol: usize,
    pub hshsave: usize,
    pub dfaeql: usize,
    pub num_backing_up: usize,
    pub backing_up_report: Vec<String>,

    pub layout: &'static str,
    pub base_def_entries: usize,
    pub table_entries: usize,
    pub empty_entries: usize,
    pub peakpairs: usize,
    pub numprots: usize,
    pub numtemps: usize,
    pub tmpuses: usize,
    pub nummecs: usize,
}

impl Stats {
    pub(crate) fn record_nfa(&mut self, nfa: &Nfa) {
        self.num_nfa_states = nfa.lastnfa() as usize;
        self.num_eps = nfa.num_eps;
        self.eps2 = nfa.num_eps2;
    }

    pub(crate) fn record_tables(&mut self, tables: &Tables, c: &CompressStats) {
        self.layout = tables.layout_name();
        self.numprots = c.numprots;
        self.numtemps = c.numtemps;
        self.tmpuses = c.tmpuses;
        self.nummecs = c.nummecs;
        self.peakpairs = c.peakpairs;
        match &tables.layout {
            Layout::Compressed(ct) => {
                self.base_def_entries = ct.base.len().saturating_sub(1);
                self.table_entries = ct.chk.len().saturating_sub(1);
                self.empty_entries = ct.chk.iter().skip(1).filter(|&&c| c == 0).count();
            }
            Layout::Full(ft) => {
                self.table_entries = ft.nxt.len();
            }
            Layout::FullSpeed(fs) => {
                self.table_entries = fs.entries.len();
                self.empty_entries = fs
                    .entries
                    .iter()
                    .filter(|e| e.verify == 0 && e.next == 0)
                    .count();
            }
        }
    }

    /// The backing-up report, one paragraph per non-accepting state.
    pub fn backing_up_text(&self) -> String {
        if self.num_backing_up == 0 {
            return "No backing up.\n".to_string();
        }
        let mut out = self.backing_up_report.join("\n");
        if self.num_backing_up > 1 {
            out.push_str(&format!(
                "\n{} backing up (non-accepting) states.\n",
                self.num_backing_up
            ));
        } else {
            out.push_str("\n1 backing up (non-accepting) state.\n");
        }
        if self.layout == "compressed" {
            out.push_str("Compressed tables always back up.\n");
        }
        out
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "lexgen scanner statistics:")?;
        writeln!(f, "  {} NFA states", self.num_nfa_states)?;
        writeln!(f, "  {} DFA states ({} words)", self.lastdfa, self.totnst)?;
        writeln!(f, "  {} rules", self.num_rules)?;
        if self.num_backing_up == 0 {
            writeln!(f, "  No backing up")?;
        } else {
            writeln!(f, "  {} backing-up (non-accepting) states", self.num_backing_up)?;
        }
        writeln!(f, "  {} start conditions", self.num_scs)?;
        writeln!(
            f,
            "  {} epsilon states, {} double epsilon states",
            self.num_eps, self.eps2
        )?;
        if self.numccls == 0 {
            writeln!(f, "  no character classes")?;
        } else {
            writeln!(
                f,
                "  {} character classes needed, {} reused",
                self.numccls, self.cclreuse
            )?;
        }
        writeln!(f, "  {} state/nextstate pairs created", self.numsnpairs)?;
        writeln!(
            f,
            "  {}/{} unique/duplicate transitions",
            self.numuniq, self.numdup
        )?;
        match self.layout {
            "compressed" => {
                writeln!(f, "  {} base-def entries created", self.base_def_entries)?;
                writeln!(
                    f,
                    "  {} (peak {}) nxt-chk entries created",
                    self.table_entries, self.peakpairs
                )?;
                writeln!(f, "  {} empty table entries", self.empty_entries)?;
                writeln!(f, "  {} protos created", self.numprots)?;
                writeln!(
                    f,
                    "  {} templates created, {} uses",
                    self.numtemps, self.tmpuses
                )?;
            }
            other => {
                writeln!(f, "  {} {} table entries", self.table_entries, other)?;
            }
        }
        writeln!(
            f,
            "  {}/{} equivalence classes created",
            self.numecs, self.csize
        )?;
        if self.nummecs > 0 {
            writeln!(f, "  {} meta-equivalence classes created", self.nummecs)?;
        }
        write!(
            f,
            "  {} ({} saved) hash collisions, {} DFAs equal",
            self.hshcol, self.hshsave, self.dfaeql
        )
    }
}

/// Render characters as bracket-style ranges: `a-z 0-9 \n`.
pub fn char_ranges(chars: &[u8]) -> String {
    let mut parts = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let lo = chars[i];
        let mut hi = lo;
        while i + 1 < chars.len() && chars[i + 1] == hi.wrapping_add(1) && hi != u8::MAX {
            i += 1;
            hi = chars[i];
        }
        if hi > lo {
            parts.push(format!("{}-{}", readable(lo), readable(hi)));
        } else {
            parts.push(readable(lo));
        }
        i += 1;
    }
    parts.join(" ")
}

fn readable(c: u8) -> String {
    match c {
        b'\n' => "\\n".into(),
        b'\t' => "\\t".into(),
        b' ' => "' '".into(),
        0x21..=0x7e => (c as char).to_string(),
        _ => format!("\\{c:03o}"),
    }
}
