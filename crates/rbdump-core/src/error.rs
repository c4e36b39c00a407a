//! Errors that abort a dump
//!
//! Everything else (undecodable `$I` files, missing `$R` entries,
//! unreadable folders) is logged and skipped by the engine.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// Writing this field would overflow the row buffer; cutting the
    /// original path short would make the report lie, so the run stops.
    #[error("row needs {needed} characters but the row buffer holds {capacity}")]
    RowOverflow { capacity: usize, needed: usize },

    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
