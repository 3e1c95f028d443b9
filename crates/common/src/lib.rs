//! `vr-common` -- Shared types, errors, and configuration for the video-render core.
//!
//! This crate is the foundation the backend crates depend on. It defines
//! the vocabulary of the render lifecycle without knowing anything about a
//! particular vendor API:
//!
//! - **Types**: `Geometry`, `ComponentState` (lifecycle states and legal moves)
//! - **Errors**: `ErrorKind` (classification), `RenderError` (thiserror-based)
//! - **Config**: `RenderConfig`, `ReturnPolicy`

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used items at crate root
pub use config::{RenderConfig, ReturnPolicy};
pub use error::{ErrorKind, RenderError, RenderResult};
pub use types::{ComponentState, Geometry};
