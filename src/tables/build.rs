// src/tables/build.rs
use std::time::Instant;

use super::{
    AcceptTables, Layout, Tables,
    compress::{CompressStats, Compressor},
    full::{FullSpeedTable, FullTable},
};
use crate::{
    automata::{Context, Dfa},
    config::TableKind,
    error::Result,
};

/// Lay out the DFA in the configured table format.
pub fn build_tables(ctx: &Context, dfa: &Dfa) -> Result<(Tables, CompressStats)> {
    let t0 = Instant::now();
    let cfg = ctx.config();

    let mut ec = [0u32; 256];
    for (c, slot) in ec.iter_mut().enumerate().take(cfg.csize) {
        *slot = ctx.ec_of(c as u8);
    }

    let end_of_buffer_action = ctx.end_of_buffer_action();
    let mut cstats = CompressStats::default();
    let layout = match cfg.tables {
        TableKind::Compressed => {
            let compressor = Compressor::new(
                &cfg.tuning,
                dfa.numecs as usize,
                dfa.lastdfa(),
                cfg.use_mecs,
            );
            let (tables, stats) = compressor.compress(dfa)?;
            cstats = stats;
            Layout::Compressed(tables)
        }
        TableKind::Full => Layout::Full(FullTable::build(dfa)),
        TableKind::FullSpeed => Layout::FullSpeed(FullSpeedTable::build(
            dfa,
            cfg.tuning.max_xtions_full_interior_fit,
            end_of_buffer_action,
        )?),
    };

    let start_states = (0..dfa.num_scs as usize)
        .flat_map(|sc| [dfa.start_state(sc, false), dfa.start_state(sc, true)])
        .map(|ds| match &layout {
            Layout::FullSpeed(fs) => fs.base[ds as usize],
            _ => ds,
        })
        .collect();

    let accept = AcceptTables::build(dfa, &ctx.rules, end_of_buffer_action);

    let tables = Tables {
        ec,
        numecs: dfa.numecs,
        layout,
        accept,
        start_states,
        end_of_buffer_state: dfa.end_of_buffer_state,
        end_of_buffer_action,
        lastdfa: dfa.lastdfa(),
    };
    log::info!(
        "[tables] built {} tables for {} states in {:.3} ms",
        tables.layout_name(),
        dfa.lastdfa(),
        t0.elapsed().as_nanos() as f64 / 1.0e6
    );
    Ok((tables, cstats))
}
