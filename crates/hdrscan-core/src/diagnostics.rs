//! Non-fatal problems collected while parsing
//!
//! The parser keeps going on almost everything; what it could not handle
//! cleanly ends up here rather than in an `Err`.

use crate::location::Location;
use serde::{Deserialize, Serialize};

/// How bad a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Something was tolerated or ignored
    Warning,
    /// A construct was dropped entirely
    Error,
}

/// A single diagnostic record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Option<Location>,
    pub message: String,
}

impl Diagnostic {
    /// Create a warning diagnostic
    pub fn warning(location: Option<Location>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            location,
            message: message.into(),
        }
    }

    /// Create an error-severity diagnostic (still non-fatal)
    pub fn error(location: Option<Location>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            location,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.location {
            Some(loc) => write!(f, "{}: {}: {}", loc, level, self.message),
            None => write!(f, "{}: {}", level, self.message),
        }
    }
}
