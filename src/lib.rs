// src/lib.rs
pub mod automata;
pub mod config;
pub mod dev;
pub mod error;
pub mod pattern;
pub mod stats;
pub mod tables;

pub use automata::{Compiled, Context};
pub use config::{ScanConfig, TableKind};
pub use error::{Error, Result};
pub use pattern::{Pattern, RuleDef, RuleSet};
