//! hdrscan Core
//!
//! Core types and interfaces for the hdrscan C header model.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod location;
pub mod token;
pub mod types;

pub use config::{Encoding, ParserConfig};
pub use diagnostics::{Diagnostic, Severity};
pub use error::{Error, Result};
pub use location::Location;
pub use token::{IntFlags, Token, TokenKind};
pub use types::*;
