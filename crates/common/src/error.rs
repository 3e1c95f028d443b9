//! Central error types for the render core (thiserror-based).

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Classification of a failure, deciding how the caller must react.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Timeout, underflow, overflow. The caller may retry.
    Transient,
    /// Insufficient or unavailable resources. The operation is aborted and
    /// the buffer pool stays in its prior valid state.
    ResourceExhaustion,
    /// Bad parameter, unsupported setting/index, bad port. A caller bug.
    Configuration,
    /// Invalid or incorrect state/transition. Possibly recoverable by
    /// re-querying the actual state.
    Protocol,
    /// Undefined error, invalid component, hardware fault. The component
    /// must be re-initialized.
    Fatal,
    /// A code outside the known set. Treated like `Fatal`.
    Unknown,
}

impl ErrorKind {
    /// `Fatal` and `Unknown` both latch the lifecycle manager.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::Fatal | ErrorKind::Unknown)
    }

    pub fn is_retryable(self) -> bool {
        self == ErrorKind::Transient
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Transient => "transient",
            ErrorKind::ResourceExhaustion => "resource exhaustion",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Fatal => "fatal",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Top-level render core error.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IL component not found: {0}")]
    NotFound(String),

    #[error("{op} failed with {name} (0x{code:08X}, {kind})")]
    Hardware {
        op: &'static str,
        code: u32,
        name: &'static str,
        kind: ErrorKind,
    },

    #[error("Component reported {name} (0x{code:08X}, {kind}) while waiting for {waiting_for}")]
    HardwareEvent {
        code: u32,
        name: &'static str,
        kind: ErrorKind,
        waiting_for: String,
    },

    #[error("Timed out after {waited:?} waiting for {what}")]
    TimedOut { what: String, waited: Duration },

    #[error("Wait for {0} cancelled")]
    Cancelled(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Render core latched after a {0} error: re-initialize or tear down")]
    Latched(ErrorKind),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid render config: {0}")]
    InvalidConfig(String),

    #[error("IL library load failed: {0}")]
    Load(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::Hardware { kind, .. } | RenderError::HardwareEvent { kind, .. } => *kind,
            RenderError::TimedOut { .. } | RenderError::Cancelled(_) => ErrorKind::Transient,
            RenderError::Protocol(_) => ErrorKind::Protocol,
            RenderError::Latched(_) => ErrorKind::Fatal,
            RenderError::NotFound(_)
            | RenderError::InvalidGeometry(_)
            | RenderError::InvalidConfig(_)
            | RenderError::Load(_)
            | RenderError::ConfigParse(_)
            | RenderError::Io(_) => ErrorKind::Configuration,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RenderError::TimedOut { .. })
    }
}

/// Convenience Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
