// src/automata/ccl.rs
//! Character-class registry. Classes with identical contents share an id.

use hashbrown::HashMap;

use super::{CclId, Context};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ccl {
    /// Sorted, duplicate-free character codes.
    pub members: Vec<u8>,
    pub negated: bool,
    /// Sorted equivalence classes of the members, filled by `ccl2ecl`.
    pub ecl: Vec<u32>,
}

/// A class under construction (`cclinit` .. `cclinstal`).
#[derive(Debug, Clone, Default)]
pub struct CclDraft {
    members: Vec<u8>,
    negated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CclRegistry {
    ccls: Vec<Ccl>,
    by_content: HashMap<(Vec<u8>, bool), CclId>,
    reuses: usize,
}

impl CclRegistry {
    pub fn len(&self) -> usize {
        self.ccls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ccls.is_empty()
    }

    /// Classes are numbered from 1.
    pub fn get(&self, id: CclId) -> Option<&Ccl> {
        if id == 0 {
            return None;
        }
        self.ccls.get(id as usize - 1)
    }

    pub fn reuses(&self) -> usize {
        self.reuses
    }

    pub fn total_members(&self) -> usize {
        self.ccls.iter().map(|c| c.members.len()).sum()
    }

    fn install(&mut self, members: Vec<u8>, negated: bool) -> (CclId, bool) {
        let key = (members, negated);
        if let Some(&id) = self.by_content.get(&key) {
            self.reuses += 1;
            return (id, false);
        }
        self.ccls.push(Ccl {
            members: key.0.clone(),
            negated,
            ecl: Vec::new(),
        });
        let id = self.ccls.len() as CclId;
        self.by_content.insert(key, id);
        (id, true)
    }

    pub(crate) fn ccl2ecl(&mut self, mut ec: impl FnMut(u8) -> Option<u32>) {
        for ccl in &mut self.ccls {
            ccl.ecl = ccl.members.iter().filter_map(|&c| ec(c)).collect();
        }
    }
}

impl Context {
    pub fn cclinit(&self) -> CclDraft {
        CclDraft::default()
    }

    pub fn ccladd(&mut self, draft: &mut CclDraft, ch: u8) {
        if ch as usize >= self.cfg.csize {
            self.diags.error(
                format!("bad character in class: {ch:#04x}"),
                self.current_line(),
            );
            return;
        }
        draft.members.push(ch);
    }

    pub fn cclnegate(&mut self, draft: &mut CclDraft) {
        draft.negated = true;
    }

    /// Freeze a class. A new class also splits the character ecs.
    pub fn cclinstal(&mut self, draft: CclDraft) -> CclId {
        let mut members = draft.members;
        members.sort_unstable();
        members.dedup();
        let (id, fresh) = self.ccls.install(members, draft.negated);
        if fresh && self.cfg.use_ecs {
            if let Some(ccl) = self.ccls.get(id) {
                let elems: Vec<usize> = ccl.members.iter().map(|&c| c as usize + 1).collect();
                self.ecgroup.mkeccl(&elems);
            }
        }
        self.stats.numccls = self.ccls.len();
        self.stats.cclreuse = self.ccls.reuses();
        id
    }

    pub(crate) fn current_line(&self) -> Option<usize> {
        self.current_rule()
            .and_then(|r| self.rule(r))
            .map(|info| info.line)
    }
}
