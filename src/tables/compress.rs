// src/tables/compress.rs
//! Row-displacement compression of the DFA into `base/def/nxt/chk`.
//!
//! A state's row either stands alone or is stored as the difference from a
//! recently seen row (a proto) or from a synthetic template row. Rows with
//! a single transition are deferred and used to fill holes at the end.
//!
//! State numbering in the result: real states `1..=lastdfa`, the jam state
//! `lastdfa + 1`, templates `lastdfa + 2 ..`. Lookup of class `c` in `s`:
//! if `chk[base[s] + c] == s` the answer is `nxt[base[s] + c]`, otherwise
//! continue with `def[s]` (and `meta[c]` once `s` is a template).

use serde::{Deserialize, Serialize};

use crate::{
    automata::{Dfa, EcLinks},
    config::CompressionTuning,
    error::{Error, Result},
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompressedTables {
    pub base: Vec<u32>,
    pub def: Vec<u32>,
    pub nxt: Vec<u32>,
    pub chk: Vec<u32>,
    /// ec → meta-ec, used once the default chain reaches a template.
    pub meta: Option<Vec<u32>>,
    pub jamstate: u32,
    pub jambase: u32,
    pub lastdfa: u32,
    /// Templates including the jam row.
    pub numtemps: u32,
    pub nummecs: u32,
}

impl CompressedTables {
    /// Follow the default chain. Returns `None` for a malformed table.
    pub fn next_state(&self, state: u32, ec: u32) -> Option<u32> {
        let mut s = state;
        let mut c = ec;
        for _ in 0..=self.base.len() {
            let b = *self.base.get(s as usize)?;
            let idx = (b + c) as usize;
            if self.chk.get(idx) == Some(&s) {
                return self.nxt.get(idx).copied();
            }
            s = *self.def.get(s as usize)?;
            if s >= self.lastdfa + 2 {
                if let Some(meta) = &self.meta {
                    c = *meta.get(c as usize)?;
                }
            }
        }
        None
    }

    pub fn is_jam(&self, s: u32) -> bool {
        s == self.jamstate
    }
}

/// One row entry relative to the default it falls back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    /// Same as the default row; nothing stored.
    Same,
    /// Stored; 0 means no transition.
    Next(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefLink {
    Jam,
    State(u32),
    Template(u32),
}

#[derive(Debug, Clone)]
struct Proto {
    serial: usize,
    owner: DefLink,
    comstate: u32,
    row: Vec<u32>,
}

struct OneTransition {
    state: u32,
    sym: usize,
    next: u32,
    def: DefLink,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompressStats {
    pub numprots: usize,
    pub numtemps: usize,
    pub tmpuses: usize,
    pub nummecs: usize,
    pub peakpairs: usize,
}

pub(crate) struct Compressor<'a> {
    tuning: &'a CompressionTuning,
    numecs: usize,
    lastdfa: u32,
    use_mecs: bool,
    /// `None` until placed, `Some(None)` for "jam base".
    base: Vec<Option<Option<u32>>>,
    def: Vec<DefLink>,
    nxt: Vec<u32>,
    chk: Vec<u32>,
    firstfree: usize,
    tblend: usize,
    jambase: u32,
    /// Meta-ec of every ec once `cmptmps` ran.
    meta_class: Option<Vec<u32>>,
    /// Most recently used first.
    protos: Vec<Proto>,
    next_serial: usize,
    /// Template rows, `templates[t - 1][ec]`.
    templates: Vec<Vec<u32>>,
    tec: EcLinks,
    onestack: Vec<OneTransition>,
    pub stats: CompressStats,
}

impl<'a> Compressor<'a> {
    pub fn new(tuning: &'a CompressionTuning, numecs: usize, lastdfa: u32, use_mecs: bool) -> Self {
        Self {
            tuning,
            numecs,
            lastdfa,
            use_mecs,
            base: vec![None; lastdfa as usize + 2],
            def: vec![DefLink::Jam; lastdfa as usize + 2],
            nxt: vec![0; 1],
            chk: vec![0; 1],
            firstfree: 1,
            tblend: 0,
            jambase: 0,
            meta_class: None,
            protos: Vec::new(),
            next_serial: 0,
            templates: Vec::new(),
            tec: EcLinks::new(numecs),
            onestack: Vec::new(),
            stats: CompressStats::default(),
        }
    }

    #[inline]
    fn chk_at(&self, i: usize) -> u32 {
        self.chk.get(i).copied().unwrap_or(0)
    }

    fn reserve(&mut self, i: usize) {
        if i >= self.chk.len() {
            self.chk.resize(i + 1, 0);
            self.nxt.resize(i + 1, 0);
        }
    }

    fn set_base(&mut self, s: u32, b: Option<u32>) {
        let idx = s as usize;
        if idx >= self.base.len() {
            self.base.resize(idx + 1, None);
            self.def.resize(idx + 1, DefLink::Jam);
        }
        self.base[idx] = Some(b);
    }

    fn set_def(&mut self, s: u32, d: DefLink) {
        let idx = s as usize;
        if idx >= self.def.len() {
            self.base.resize(idx + 1, None);
            self.def.resize(idx + 1, DefLink::Jam);
        }
        self.def[idx] = d;
    }

    /// Lay out every DFA state, in order.
    pub fn compress(mut self, dfa: &Dfa) -> Result<(CompressedTables, CompressStats)> {
        let eob = dfa.end_of_buffer_state;
        for ds in 1..=dfa.lastdfa() {
            if Some(ds) == eob {
                self.stack1(ds, 0, 0, DefLink::Jam)?;
                continue;
            }
            let row = dfa.row(ds);
            let totaltrans = row[1..].iter().filter(|&&t| t != 0).count();
            let (comstate, comfreq) = common_target(row);
            self.bldtbl(row, ds, totaltrans, comstate, comfreq)?;
        }
        self.cmptmps()?;
        while let Some(one) = self.onestack.pop() {
            self.mk1tbl(one.state, one.sym, one.next, one.def)?;
        }
        let eob_state = eob.unwrap_or(0);
        self.mkdeftbl(eob_state);
        self.finish()
    }

    fn bldtbl(
        &mut self,
        state: &[u32],
        statenum: u32,
        totaltrans: usize,
        mut comstate: u32,
        comfreq: usize,
    ) -> Result<()> {
        let t = self.tuning;
        let numecs = self.numecs;

        if totaltrans * 100 < numecs * t.proto_size_percentage {
            let cells = raw_cells(state);
            return self.mkentry(&cells, numecs, statenum, DefLink::Jam, totaltrans);
        }

        let checkcom = comfreq * 100 > totaltrans * t.check_com_percentage;
        let mut minprot: Option<usize> = if self.protos.is_empty() { None } else { Some(0) };
        let mut mindiff = totaltrans;
        let mut best: Option<Vec<Cell>> = None;

        if checkcom {
            if let Some(i) = self.protos.iter().position(|p| p.comstate == comstate) {
                let (d, diff) = tbldiff(state, &self.protos[i].row);
                minprot = Some(i);
                mindiff = d;
                best = Some(diff);
            }
        } else {
            // Not dominated by one target: never a template candidate.
            comstate = 0;
            if !self.protos.is_empty() {
                let (d, diff) = tbldiff(state, &self.protos[0].row);
                minprot = Some(0);
                mindiff = d;
                best = Some(diff);
            }
        }

        if mindiff * 100 > totaltrans * t.first_match_diff_percentage {
            if let Some(start) = minprot {
                for i in start..self.protos.len() {
                    let (d, diff) = tbldiff(state, &self.protos[i].row);
                    if d < mindiff {
                        mindiff = d;
                        minprot = Some(i);
                        best = Some(diff);
                    }
                }
            }
        }

        let usable = match (&best, minprot) {
            (Some(_), Some(_)) => mindiff * 100 <= totaltrans * t.acceptable_diff_percentage,
            _ => false,
        };

        if !usable {
            if comfreq * 100 >= totaltrans * t.template_same_percentage {
                self.mktemplate(state, statenum, comstate)
            } else {
                self.mkprot(state, DefLink::State(statenum), comstate);
                let cells = raw_cells(state);
                self.mkentry(&cells, numecs, statenum, DefLink::Jam, totaltrans)
            }
        } else {
            let (Some(diff), Some(mp)) = (best, minprot) else {
                return Err(Error::internal("bldtbl lost its best proto"));
            };
            let serial = self.protos[mp].serial;
            let owner = self.protos[mp].owner;
            self.mkentry(&diff, numecs, statenum, owner, mindiff)?;
            if mindiff * 100 >= totaltrans * t.new_proto_diff_percentage {
                self.mkprot(state, DefLink::State(statenum), comstate);
            }
            self.mv2front(serial);
            Ok(())
        }
    }

    /// Push a proto at the front, dropping the oldest when the queue is full.
    fn mkprot(&mut self, row: &[u32], owner: DefLink, comstate: u32) {
        self.stats.numprots += 1;
        if self.protos.len() + 1 >= self.tuning.max_protos {
            self.protos.pop();
        }
        let serial = self.next_serial;
        self.next_serial += 1;
        self.protos.insert(
            0,
            Proto {
                serial,
                owner,
                comstate,
                row: row.to_vec(),
            },
        );
    }

    /// A proto that was just used moves to the front; gone protos stay gone.
    fn mv2front(&mut self, serial: usize) {
        if let Some(i) = self.protos.iter().position(|p| p.serial == serial) {
            if i != 0 {
                let p = self.protos.remove(i);
                self.protos.insert(0, p);
            }
        }
    }

    fn mktemplate(&mut self, state: &[u32], statenum: u32, comstate: u32) -> Result<()> {
        let numecs = self.numecs;
        let mut row = vec![0u32; numecs + 1];
        let mut transset = Vec::new();
        for i in 1..=numecs {
            if state[i] != 0 {
                transset.push(i);
                row[i] = comstate;
            }
        }
        if self.use_mecs {
            self.tec.mkeccl(&transset);
        }
        self.templates.push(row.clone());
        let t = self.templates.len() as u32;
        self.stats.numtemps = self.templates.len();

        self.mkprot(&row, DefLink::Template(t), comstate);
        let (numdiff, diff) = tbldiff(state, &row);
        self.mkentry(&diff, numecs, statenum, DefLink::Template(t), numdiff)
    }

    /// Place `state[1..=numchars]` (only the significant cells) somewhere
    /// in `nxt/chk` and set `base/def` of `statenum`.
    fn mkentry(
        &mut self,
        state: &[Cell],
        numchars: usize,
        statenum: u32,
        deflink: DefLink,
        totaltrans: usize,
    ) -> Result<()> {
        if totaltrans == 0 {
            let b = if deflink == DefLink::Jam { None } else { Some(0) };
            self.set_base(statenum, b);
            self.set_def(statenum, deflink);
            return Ok(());
        }

        let significant = |i: usize| match state[i] {
            Cell::Same => false,
            Cell::Next(x) => x != 0 || deflink != DefLink::Jam,
        };

        let Some(minec) = (1..=numchars).find(|&i| significant(i)) else {
            return Err(Error::internal(format!(
                "state {statenum} claims {totaltrans} transitions but has none"
            )));
        };

        if totaltrans == 1 {
            let next = match state[minec] {
                Cell::Next(x) => x,
                Cell::Same => 0,
            };
            return self.stack1(statenum, minec, next, deflink);
        }

        let maxec = (1..=numchars)
            .rev()
            .find(|&i| significant(i))
            .unwrap_or(minec);

        let baseaddr = if totaltrans * 100 <= numchars * self.tuning.interior_fit_percentage {
            let mut baseaddr = self.firstfree;
            while baseaddr < minec {
                baseaddr += 1;
                while self.chk_at(baseaddr) != 0 {
                    baseaddr += 1;
                }
            }
            loop {
                let clash = (minec..=maxec)
                    .any(|i| significant(i) && self.chk_at(baseaddr + i - minec) != 0);
                if !clash {
                    break;
                }
                baseaddr += 1;
                while self.chk_at(baseaddr) != 0 {
                    baseaddr += 1;
                }
            }
            baseaddr
        } else {
            (self.tblend + 1).max(minec)
        };

        let tblbase = baseaddr - minec;
        let tbllast = tblbase + maxec;
        self.reserve(tbllast + 1);

        self.set_base(statenum, Some(tblbase as u32));
        self.set_def(statenum, deflink);

        for i in minec..=maxec {
            if !significant(i) {
                continue;
            }
            let slot = tblbase + i;
            if self.chk[slot] != 0 {
                return Err(Error::internal(format!(
                    "table slot {slot} claimed twice (state {statenum})"
                )));
            }
            if let Cell::Next(x) = state[i] {
                self.nxt[slot] = x;
            }
            self.chk[slot] = statenum;
        }

        if baseaddr == self.firstfree {
            self.firstfree += 1;
            while self.chk_at(self.firstfree) != 0 {
                self.firstfree += 1;
            }
        }
        self.tblend = self.tblend.max(tbllast);
        Ok(())
    }

    /// Defer a one-transition row; when the stack is full place it now.
    fn stack1(&mut self, statenum: u32, sym: usize, next: u32, def: DefLink) -> Result<()> {
        if self.onestack.len() >= self.tuning.one_stack_size - 1 {
            self.mk1tbl(statenum, sym, next, def)
        } else {
            self.onestack.push(OneTransition {
                state: statenum,
                sym,
                next,
                def,
            });
            Ok(())
        }
    }

    fn mk1tbl(&mut self, state: u32, sym: usize, next: u32, def: DefLink) -> Result<()> {
        if self.firstfree < sym {
            self.firstfree = sym;
        }
        while self.chk_at(self.firstfree) != 0 {
            self.firstfree += 1;
        }
        let slot = self.firstfree;
        self.reserve(slot + 1);
        if self.chk[slot] != 0 {
            return Err(Error::internal(format!("table slot {slot} claimed twice")));
        }
        self.set_base(state, Some((slot - sym) as u32));
        self.set_def(state, def);
        self.chk[slot] = state;
        self.nxt[slot] = next;
        if slot > self.tblend {
            self.tblend = slot;
            self.firstfree += 1;
        }
        Ok(())
    }

    /// Compress template rows by meta-ec and place them after the jam state.
    fn cmptmps(&mut self) -> Result<()> {
        self.stats.peakpairs = self.templates.len() * self.numecs + self.tblend;
        let (meta_class, representative, nummecs) = if self.use_mecs {
            let n = self.tec.cre8ecs();
            let count = n.count as usize;
            (n.class, n.representative, count)
        } else {
            let ident: Vec<u32> = (0..=self.numecs as u32).collect();
            (ident, vec![true; self.numecs + 1], self.numecs)
        };
        self.stats.nummecs = nummecs;

        let templates = std::mem::take(&mut self.templates);
        for (i, row) in templates.iter().enumerate() {
            let mut tmp = vec![Cell::Next(0); nummecs + 1];
            let mut totaltrans = 0;
            for j in 1..=self.numecs {
                if representative[j] {
                    let m = meta_class[j] as usize;
                    tmp[m] = Cell::Next(row[j]);
                    if row[j] > 0 {
                        totaltrans += 1;
                    }
                }
            }
            let statenum = self.lastdfa + i as u32 + 2;
            self.mkentry(&tmp, nummecs, statenum, DefLink::Jam, totaltrans)?;
        }
        self.templates = templates;
        self.meta_class = Some(meta_class);
        Ok(())
    }

    /// The jam row: matches every class, sends end of buffer to the
    /// end-of-buffer state and everything else to itself.
    fn mkdeftbl(&mut self, eob_state: u32) {
        let jamstate = self.lastdfa + 1;
        self.tblend += 1;
        let jambase = self.tblend;
        self.reserve(jambase + self.numecs);
        self.nxt[jambase] = eob_state;
        self.chk[jambase] = jamstate;
        for i in 1..=self.numecs {
            self.nxt[jambase + i] = 0;
            self.chk[jambase + i] = jamstate;
        }
        self.set_base(jamstate, Some(jambase as u32));
        self.jambase = jambase as u32;
        self.tblend += self.numecs;
    }

    fn finish(mut self) -> Result<(CompressedTables, CompressStats)> {
        let lastdfa = self.lastdfa;
        let jamstate = lastdfa + 1;
        let jambase = self.jambase;
        let numtemps = self.templates.len() as u32 + 1;
        let total = (lastdfa + numtemps) as usize;

        let mut base = vec![0u32; total + 1];
        let mut def = vec![0u32; total + 1];
        for s in 1..=total {
            let b = self
                .base
                .get(s)
                .copied()
                .flatten()
                .ok_or_else(|| Error::internal(format!("state {s} never placed")))?;
            base[s] = b.unwrap_or(jambase);
            def[s] = if s as u32 == jamstate {
                0
            } else if s as u32 > jamstate {
                jamstate
            } else {
                match self.def[s] {
                    DefLink::Jam => jamstate,
                    DefLink::State(d) => d,
                    DefLink::Template(t) => {
                        self.stats.tmpuses += 1;
                        lastdfa + t + 1
                    }
                }
            };
        }

        self.chk.truncate(self.tblend + 1);
        self.nxt.truncate(self.tblend + 1);
        self.reserve(self.tblend);
        for i in 1..=self.tblend {
            if self.chk[i] == 0 || self.nxt[i] == 0 {
                self.nxt[i] = jamstate;
            }
        }

        let meta = if self.use_mecs {
            let mut m = self.meta_class.take().unwrap_or_default();
            m.resize(self.numecs + 1, 0);
            m[0] = 0;
            Some(m)
        } else {
            None
        };

        log::debug!(
            "[tables] compressed: {} entries, {} protos, {} templates ({} uses), {} meta-ecs",
            self.tblend,
            self.stats.numprots,
            numtemps - 1,
            self.stats.tmpuses,
            self.stats.nummecs
        );

        let tables = CompressedTables {
            base,
            def,
            nxt: self.nxt,
            chk: self.chk,
            meta,
            jamstate,
            jambase,
            lastdfa,
            numtemps,
            nummecs: self.stats.nummecs as u32,
        };
        Ok((tables, self.stats))
    }
}

fn raw_cells(row: &[u32]) -> Vec<Cell> {
    row.iter().map(|&t| Cell::Next(t)).collect()
}

/// Cells of `state` relative to `proto`, and how many differ.
fn tbldiff(state: &[u32], proto: &[u32]) -> (usize, Vec<Cell>) {
    let mut numdiff = 0;
    let mut out = vec![Cell::Same; state.len()];
    for i in 1..state.len() {
        if proto.get(i).copied().unwrap_or(0) != state[i] {
            out[i] = Cell::Next(state[i]);
            numdiff += 1;
        }
    }
    (numdiff, out)
}

/// Most frequent non-jam target of a row; ties go to the one seen first.
pub(crate) fn common_target(row: &[u32]) -> (u32, usize) {
    let mut targets: Vec<(u32, usize)> = Vec::new();
    for &t in row.iter().skip(1) {
        if t == 0 {
            continue;
        }
        match targets.iter_mut().find(|(s, _)| *s == t) {
            Some((_, f)) => *f += 1,
            None => targets.push((t, 1)),
        }
    }
    let mut best = (0, 0);
    for (s, f) in targets {
        if f > best.1 {
            best = (s, f);
        }
    }
    best
}
