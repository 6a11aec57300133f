// src/automata/ecs.rs
//! Equivalence classes as doubly linked lists over elements `1..=n`.
//!
//! Two elements stay in one list while no literal or class seen so far
//! distinguishes them. The same structure partitions characters into
//! equivalence classes, partitions ecs into meta-ecs for the template rows,
//! and partitions a DFA state's out-symbols.

use super::Context;

#[derive(Debug, Clone)]
pub struct EcLinks {
    fwd: Vec<Option<usize>>,
    bck: Vec<Option<usize>>,
}

/// Result of [`EcLinks::cre8ecs`]: class per element, 1-based.
#[derive(Debug, Clone, Default)]
pub struct EcNumbering {
    /// `class[e]` for `e` in `1..=n`; index 0 unused.
    pub class: Vec<u32>,
    /// Only the head of each list represents its class.
    pub representative: Vec<bool>,
    pub count: u32,
}

impl EcLinks {
    /// All of `1..=n` in one class.
    pub fn new(n: usize) -> Self {
        let mut fwd = vec![None; n + 1];
        let mut bck = vec![None; n + 1];
        for i in 1..=n {
            bck[i] = if i > 1 { Some(i - 1) } else { None };
            fwd[i] = if i < n { Some(i + 1) } else { None };
        }
        Self { fwd, bck }
    }

    pub fn len(&self) -> usize {
        self.fwd.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element `e` shares its list with the element before it.
    pub fn prev(&self, e: usize) -> Option<usize> {
        self.bck[e]
    }

    pub fn next(&self, e: usize) -> Option<usize> {
        self.fwd[e]
    }

    pub fn is_head(&self, e: usize) -> bool {
        self.bck[e].is_none()
    }

    /// Put `e` in a class of its own.
    pub fn mkechar(&mut self, e: usize) {
        if let Some(f) = self.fwd[e] {
            self.bck[f] = self.bck[e];
        }
        if let Some(b) = self.bck[e] {
            self.fwd[b] = self.fwd[e];
        }
        self.fwd[e] = None;
        self.bck[e] = None;
    }

    /// Split every class touched by `members` into the part inside the set
    /// and the part outside. `members` must be ascending and duplicate-free;
    /// relative order inside each list is kept.
    pub fn mkeccl(&mut self, members: &[usize]) {
        let n = self.len();
        let len = members.len();
        let mut processed = vec![false; len];
        let mut cclp = 0usize;

        while cclp < len {
            let cclm = members[cclp];
            let mut oldec = self.bck[cclm];
            let mut newec = cclm;
            let mut j = cclp + 1;

            let mut i = self.fwd[cclm];
            while let Some(cur) = i {
                if cur > n {
                    break;
                }
                let mut in_set = false;
                while j < len {
                    let ch = members[j];
                    if ch > cur {
                        break;
                    }
                    if ch == cur && !processed[j] {
                        // Joins the new class right after the last member.
                        self.bck[cur] = Some(newec);
                        self.fwd[newec] = Some(cur);
                        newec = cur;
                        processed[j] = true;
                        in_set = true;
                        j += 1;
                        break;
                    }
                    j += 1;
                }
                let nxt = self.fwd[cur];
                if !in_set {
                    // Stays behind in the old class.
                    self.bck[cur] = oldec;
                    if let Some(o) = oldec {
                        self.fwd[o] = Some(cur);
                    }
                    oldec = Some(cur);
                }
                i = nxt;
            }

            if self.bck[cclm].is_some() || oldec != self.bck[cclm] {
                self.bck[cclm] = None;
                if let Some(o) = oldec {
                    self.fwd[o] = None;
                }
            }
            self.fwd[newec] = None;

            cclp += 1;
            while cclp < len && processed[cclp] {
                processed[cclp] = false;
                cclp += 1;
            }
        }
    }

    /// Number the classes in ascending order of their smallest element.
    pub fn cre8ecs(&self) -> EcNumbering {
        let n = self.len();
        let mut class = vec![0u32; n + 1];
        let mut representative = vec![false; n + 1];
        let mut count = 0u32;
        for e in 1..=n {
            if self.bck[e].is_none() {
                count += 1;
                class[e] = count;
                representative[e] = true;
                let mut j = self.fwd[e];
                while let Some(k) = j {
                    class[k] = count;
                    j = self.fwd[k];
                }
            }
        }
        EcNumbering {
            class,
            representative,
            count,
        }
    }
}

impl Context {
    /// Equivalence class of character `c` (1-based).
    pub fn ec_of(&self, c: u8) -> u32 {
        if self.cfg.use_ecs {
            self.ec_numbering
                .class
                .get(c as usize + 1)
                .copied()
                .unwrap_or(0)
        } else {
            c as u32 + 1
        }
    }

    pub fn numecs(&self) -> u32 {
        if self.cfg.use_ecs {
            self.ec_numbering.count
        } else {
            self.cfg.csize as u32
        }
    }

    /// Number the character classes and rewrite every ccl into its ec list.
    pub(crate) fn finish_ecs(&mut self) {
        if self.cfg.use_ecs {
            self.ec_numbering = self.ecgroup.cre8ecs();
        }
        let numbering = &self.ec_numbering;
        let use_ecs = self.cfg.use_ecs;
        self.ccls.ccl2ecl(|c| {
            let e = c as usize + 1;
            if !use_ecs {
                Some(e as u32)
            } else if numbering.representative.get(e).copied().unwrap_or(false) {
                numbering.class.get(e).copied()
            } else {
                None
            }
        });
        self.stats.numecs = self.numecs() as usize;
        self.stats.csize = self.cfg.csize;
        log::debug!(
            "[ecs] {} equivalence classes over {} characters",
            self.numecs(),
            self.cfg.csize
        );
    }
}
