//! OpenMAX-specific error types.
//!
//! These cover loading the vendor IL library, which happens before any
//! component exists. Everything after that surfaces as the common
//! `RenderError` from `vr-common`.

use thiserror::Error;
use vr_common::RenderError;

/// Errors that can occur when loading the IL core library.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IL core library not found: {0}")]
    LibraryNotFound(String),

    #[error("Required symbol not found: {0}")]
    SymbolNotFound(String),
}

impl From<LoadError> for RenderError {
    fn from(err: LoadError) -> Self {
        RenderError::Load(err.to_string())
    }
}
