// src/tables/mod.rs
pub mod accept;
pub mod build;
pub mod compress;
pub mod full;
pub mod io;
pub mod verify;

use serde::{Deserialize, Serialize};

pub use accept::AcceptTables;
pub use build::build_tables;
pub use compress::CompressedTables;
pub use full::{FullSpeedEntry, FullSpeedTable, FullTable};
pub use io::{
    encode_tables_bin, load_tables_bin_bytes, load_tables_json_bytes, save_tables_bin,
    save_tables_json, tables_to_json_string,
};
pub use verify::{Decoded, Mismatch, verify};

/// Where a transition goes in the dense layouts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Jam,
    State(u32),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    Compressed(CompressedTables),
    Full(FullTable),
    FullSpeed(FullSpeedTable),
}

/// Scanner tables handed to code emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    /// Character → equivalence class (1-based; 0 for characters outside the alphabet).
    pub ec: [u32; 256],
    pub numecs: u32,
    pub layout: Layout,
    pub accept: AcceptTables,
    /// Per start condition: plain then BOL start state. For full-speed
    /// tables these are row offsets into the transition table.
    pub start_states: Vec<u32>,
    pub end_of_buffer_state: Option<u32>,
    pub end_of_buffer_action: u32,
    pub lastdfa: u32,
}

impl Tables {
    pub fn layout_name(&self) -> &'static str {
        match self.layout {
            Layout::Compressed(_) => "compressed",
            Layout::Full(_) => "full",
            Layout::FullSpeed(_) => "full-speed",
        }
    }

    /// Equivalence class of byte `c`.
    #[inline]
    pub fn ec_of(&self, c: u8) -> u32 {
        self.ec[c as usize]
    }
}
