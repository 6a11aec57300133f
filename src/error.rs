// src/error.rs
// Fatal errors and the diagnostics sink shared by every phase.

use std::fmt;

/// Errors that stop generation. User input problems are *not* errors of this
/// kind until `compile` sees that some were reported; see [`Diagnostics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// More rules than fit below the trailing-context flag bits.
    TooManyRules { limit: u32 },
    /// Incompatible or out-of-range configuration.
    Config(String),
    /// Implementation bug (broken invariant). Never recovered.
    Internal(String),
    /// User errors were reported; no output is valid.
    Syntax { errors: usize },
}

impl Error {
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TooManyRules { limit } => write!(f, "too many rules (> {limit})!"),
            Error::Config(msg) => write!(f, "{msg}"),
            Error::Internal(msg) => write!(f, "internal error: {msg}"),
            Error::Syntax { errors } => {
                write!(f, "{errors} error(s) in rule input; no tables generated")
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: Option<usize>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.line {
            Some(line) => write!(f, "line {line}: {tag}: {}", self.message),
            None => write!(f, "{tag}: {}", self.message),
        }
    }
}

/// Message-with-optional-line sink. Everything reported here is also logged.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn warn(&mut self, message: impl Into<String>, line: Option<usize>) {
        let d = Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            line,
        };
        log::warn!("{d}");
        self.entries.push(d);
    }

    /// A user input error. Processing goes on so later problems surface too.
    pub fn error(&mut self, message: impl Into<String>, line: Option<usize>) {
        let d = Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            line,
        };
        log::error!("{d}");
        self.entries.push(d);
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn has_warning(&self, needle: &str) -> bool {
        self.warnings().any(|d| d.message.contains(needle))
    }
}
