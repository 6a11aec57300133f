// src/config.rs
// Generator settings: table layout, alphabet size, compression tuning.
// Loaded from JSON (all fields optional) and then overridden from LEXGEN_* env vars.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Sparse base/def/nxt/chk tables.
    #[default]
    Compressed,
    /// Dense state × class matrix.
    Full,
    /// (verify, next) pairs addressed by state pointer + symbol.
    FullSpeed,
}

/// Heuristic thresholds used by the compressor. Only table size depends on
/// these; every setting produces correct tables.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CompressionTuning {
    /// Rows with fewer transitions than this percentage of the classes are not compacted.
    pub proto_size_percentage: usize,
    /// Only protos with the same common target are tried if that target covers this percentage.
    pub check_com_percentage: usize,
    /// A first proto within this difference percentage is taken without scanning the rest.
    pub first_match_diff_percentage: usize,
    /// Largest difference percentage for which a proto is used at all.
    pub acceptable_diff_percentage: usize,
    /// Rows whose common target covers this percentage become templates.
    pub template_same_percentage: usize,
    /// A row differing from its proto by this percentage becomes a proto too.
    pub new_proto_diff_percentage: usize,
    /// Rows at most this percentage full are fitted into holes of the table.
    pub interior_fit_percentage: usize,
    /// Size of the most-recently-used proto queue.
    pub max_protos: usize,
    /// Full-speed rows with more transitions than this are appended at the end.
    pub max_xtions_full_interior_fit: usize,
    /// Capacity of the deferred one-transition stack.
    pub one_stack_size: usize,
}

impl Default for CompressionTuning {
    fn default() -> Self {
        Self {
            proto_size_percentage: 15,
            check_com_percentage: 50,
            first_match_diff_percentage: 10,
            acceptable_diff_percentage: 50,
            template_same_percentage: 60,
            new_proto_diff_percentage: 20,
            interior_fit_percentage: 15,
            max_protos: 50,
            max_xtions_full_interior_fit: 4,
            one_stack_size: 500,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    pub tables: TableKind,
    /// Number of input symbols (128 for 7-bit scanners, 256 for 8-bit).
    pub csize: usize,
    pub use_ecs: bool,
    pub use_mecs: bool,
    /// Rules use REJECT: keep full accepting sets.
    pub reject: bool,
    /// Log the NFA, classes and DFA construction at trace level.
    pub trace: bool,
    /// Collect a description of every non-accepting (backing-up) state.
    pub backing_up_report: bool,
    pub tuning: CompressionTuning,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            tables: TableKind::Compressed,
            csize: 256,
            use_ecs: true,
            use_mecs: true,
            reject: false,
            trace: false,
            backing_up_report: false,
            tuning: CompressionTuning::default(),
        }
    }
}

impl ScanConfig {
    /// Dense tables; meta-equivalence classes are meaningless there.
    pub fn full() -> Self {
        Self {
            tables: TableKind::Full,
            use_mecs: false,
            ..Self::default()
        }
    }

    pub fn full_speed() -> Self {
        Self {
            tables: TableKind::FullSpeed,
            use_mecs: false,
            ..Self::default()
        }
    }

    pub fn from_json_bytes(data: &[u8]) -> Result<Self> {
        serde_json::from_slice::<ScanConfig>(data)
            .map_err(|e| Error::Config(format!("Failed to parse config JSON: {e}")))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        log::debug!("Reading scanner config from: {}", path_ref.display());
        let data = std::fs::read(path_ref).map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path_ref, e))
        })?;
        Self::from_json_bytes(&data)
    }

    /// Apply LEXGEN_TABLES / LEXGEN_CSIZE / LEXGEN_ECS / LEXGEN_MECS /
    /// LEXGEN_REJECT / LEXGEN_TRACE / LEXGEN_BACKING_UP.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("LEXGEN_TABLES") {
            // Single letters follow the -f / -F flags, so case matters for them.
            let kind = match v.as_str() {
                "F" => Some(TableKind::FullSpeed),
                "f" => Some(TableKind::Full),
                "c" | "C" => Some(TableKind::Compressed),
                _ => match v.to_ascii_lowercase().as_str() {
                    "compressed" => Some(TableKind::Compressed),
                    "full" => Some(TableKind::Full),
                    "fullspeed" | "full_speed" | "full-speed" | "fast" => Some(TableKind::FullSpeed),
                    _ => None,
                },
            };
            match kind {
                Some(TableKind::Compressed) => self.tables = TableKind::Compressed,
                Some(dense) => {
                    self.tables = dense;
                    self.use_mecs = false;
                }
                None => log::warn!("ignoring unknown LEXGEN_TABLES value {v:?}"),
            }
        }
        if let Some(n) = std::env::var("LEXGEN_CSIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            self.csize = n;
        }
        self.use_ecs = env_flag_true("LEXGEN_ECS", self.use_ecs);
        self.use_mecs = env_flag_true("LEXGEN_MECS", self.use_mecs);
        self.reject = env_flag_true("LEXGEN_REJECT", self.reject);
        self.trace = env_flag_true("LEXGEN_TRACE", self.trace);
        self.backing_up_report = env_flag_true("LEXGEN_BACKING_UP", self.backing_up_report);
        self
    }

    /// Checks that hold before any rule is seen.
    pub fn validate(&self) -> Result<()> {
        if self.csize == 0 || self.csize > 256 {
            return Err(Error::Config(format!(
                "alphabet size {} out of range 1..=256",
                self.csize
            )));
        }
        if self.tables != TableKind::Compressed && self.use_mecs {
            return Err(Error::Config(
                "-Cf/-CF and -Cm don't make sense together".into(),
            ));
        }
        if self.tables != TableKind::Compressed && self.reject {
            return Err(Error::Config("REJECT cannot be used with -f or -F".into()));
        }
        let t = &self.tuning;
        if t.max_protos == 0 || t.one_stack_size < 2 {
            return Err(Error::Config(
                "proto queue and one-transition stack need room".into(),
            ));
        }
        Ok(())
    }
}

/// Treat any value other than "0"/"false" (case-insensitive) as true.
pub fn env_flag_true(var: &str, default: bool) -> bool {
    std::env::var(var)
        .map(|v| !(v == "0" || v.eq_ignore_ascii_case("false")))
        .unwrap_or(default)
}
