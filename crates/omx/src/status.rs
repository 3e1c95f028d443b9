//! OpenMAX IL status codes and their classification.
//!
//! Every hardware call returns an `OMX_ERRORTYPE`. Call sites never act on a
//! raw code: they go through [`OmxStatus::into_error`],
//! which attach the operation name, the symbolic name of the code, and its
//! [`ErrorKind`].

use std::fmt;

use vr_common::{ErrorKind, RenderError};

/// An `OMX_ERRORTYPE` value.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct OmxStatus(pub u32);

impl OmxStatus {
    pub const NONE: Self = Self(0);
    pub const INSUFFICIENT_RESOURCES: Self = Self(0x8000_1000);
    pub const UNDEFINED: Self = Self(0x8000_1001);
    pub const INVALID_COMPONENT_NAME: Self = Self(0x8000_1002);
    pub const COMPONENT_NOT_FOUND: Self = Self(0x8000_1003);
    pub const INVALID_COMPONENT: Self = Self(0x8000_1004);
    pub const BAD_PARAMETER: Self = Self(0x8000_1005);
    pub const NOT_IMPLEMENTED: Self = Self(0x8000_1006);
    pub const UNDERFLOW: Self = Self(0x8000_1007);
    pub const OVERFLOW: Self = Self(0x8000_1008);
    pub const HARDWARE: Self = Self(0x8000_1009);
    pub const INVALID_STATE: Self = Self(0x8000_100A);
    pub const STREAM_CORRUPT: Self = Self(0x8000_100B);
    pub const PORTS_NOT_COMPATIBLE: Self = Self(0x8000_100C);
    pub const RESOURCES_LOST: Self = Self(0x8000_100D);
    pub const NO_MORE: Self = Self(0x8000_100E);
    pub const VERSION_MISMATCH: Self = Self(0x8000_100F);
    pub const NOT_READY: Self = Self(0x8000_1010);
    pub const TIMEOUT: Self = Self(0x8000_1011);
    pub const SAME_STATE: Self = Self(0x8000_1012);
    pub const RESOURCES_PREEMPTED: Self = Self(0x8000_1013);
    pub const PORT_UNRESPONSIVE_DURING_ALLOCATION: Self = Self(0x8000_1014);
    pub const PORT_UNRESPONSIVE_DURING_DEALLOCATION: Self = Self(0x8000_1015);
    pub const PORT_UNRESPONSIVE_DURING_STOP: Self = Self(0x8000_1016);
    pub const INCORRECT_STATE_TRANSITION: Self = Self(0x8000_1017);
    pub const INCORRECT_STATE_OPERATION: Self = Self(0x8000_1018);
    pub const UNSUPPORTED_SETTING: Self = Self(0x8000_1019);
    pub const UNSUPPORTED_INDEX: Self = Self(0x8000_101A);
    pub const BAD_PORT_INDEX: Self = Self(0x8000_101B);
    pub const PORT_UNPOPULATED: Self = Self(0x8000_101C);
    pub const COMPONENT_SUSPENDED: Self = Self(0x8000_101D);
    pub const DYNAMIC_RESOURCES_UNAVAILABLE: Self = Self(0x8000_101E);
    pub const MB_ERRORS_IN_FRAME: Self = Self(0x8000_101F);
    pub const FORMAT_NOT_DETECTED: Self = Self(0x8000_1020);
    pub const CONTENT_PIPE_OPEN_FAILED: Self = Self(0x8000_1021);
    pub const CONTENT_PIPE_CREATION_FAILED: Self = Self(0x8000_1022);
    pub const SEPARATE_TABLES_USED: Self = Self(0x8000_1023);
    pub const TUNNELING_UNSUPPORTED: Self = Self(0x8000_1024);

    /// Every defined failure code, in numeric order.
    pub const DEFINED_ERRORS: [Self; 37] = [
        Self::INSUFFICIENT_RESOURCES,
        Self::UNDEFINED,
        Self::INVALID_COMPONENT_NAME,
        Self::COMPONENT_NOT_FOUND,
        Self::INVALID_COMPONENT,
        Self::BAD_PARAMETER,
        Self::NOT_IMPLEMENTED,
        Self::UNDERFLOW,
        Self::OVERFLOW,
        Self::HARDWARE,
        Self::INVALID_STATE,
        Self::STREAM_CORRUPT,
        Self::PORTS_NOT_COMPATIBLE,
        Self::RESOURCES_LOST,
        Self::NO_MORE,
        Self::VERSION_MISMATCH,
        Self::NOT_READY,
        Self::TIMEOUT,
        Self::SAME_STATE,
        Self::RESOURCES_PREEMPTED,
        Self::PORT_UNRESPONSIVE_DURING_ALLOCATION,
        Self::PORT_UNRESPONSIVE_DURING_DEALLOCATION,
        Self::PORT_UNRESPONSIVE_DURING_STOP,
        Self::INCORRECT_STATE_TRANSITION,
        Self::INCORRECT_STATE_OPERATION,
        Self::UNSUPPORTED_SETTING,
        Self::UNSUPPORTED_INDEX,
        Self::BAD_PORT_INDEX,
        Self::PORT_UNPOPULATED,
        Self::COMPONENT_SUSPENDED,
        Self::DYNAMIC_RESOURCES_UNAVAILABLE,
        Self::MB_ERRORS_IN_FRAME,
        Self::FORMAT_NOT_DETECTED,
        Self::CONTENT_PIPE_OPEN_FAILED,
        Self::CONTENT_PIPE_CREATION_FAILED,
        Self::SEPARATE_TABLES_USED,
        Self::TUNNELING_UNSUPPORTED,
    ];

    pub fn code(self) -> u32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self == Self::NONE
    }

    /// `Ok(())` for `OMX_ErrorNone`, the status itself otherwise.
    pub fn result(self) -> Result<(), OmxStatus> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Symbolic name of the code.
    pub fn name(self) -> &'static str {
        describe(self).map_or("OMX_ErrorUnknown", |(name, _)| name)
    }

    /// Classify the code. `None` means success.
    ///
    /// Total over `u32`: codes outside the defined set are `Unknown`.
    pub fn classify(self) -> Option<ErrorKind> {
        if self.is_success() {
            return None;
        }
        Some(describe(self).map_or(ErrorKind::Unknown, |(_, kind)| kind))
    }

    /// Convert a failed call into a classified [`RenderError`].
    ///
    /// A success status passed here is itself a caller bug and is reported
    /// as a protocol error rather than silently accepted.
    pub fn into_error(self, op: &'static str) -> RenderError {
        match self.classify() {
            Some(kind) => RenderError::Hardware {
                op,
                code: self.0,
                name: self.name(),
                kind,
            },
            None => RenderError::Protocol(format!("{op} reported success as an error")),
        }
    }
}

/// Name and class of every defined code.
fn describe(status: OmxStatus) -> Option<(&'static str, ErrorKind)> {
    use ErrorKind::*;
    let entry = match status.0 {
        0 => ("OMX_ErrorNone", Transient),
        0x8000_1000 => ("OMX_ErrorInsufficientResources", ResourceExhaustion),
        0x8000_1001 => ("OMX_ErrorUndefined", Fatal),
        0x8000_1002 => ("OMX_ErrorInvalidComponentName", Configuration),
        0x8000_1003 => ("OMX_ErrorComponentNotFound", Configuration),
        0x8000_1004 => ("OMX_ErrorInvalidComponent", Fatal),
        0x8000_1005 => ("OMX_ErrorBadParameter", Configuration),
        0x8000_1006 => ("OMX_ErrorNotImplemented", Configuration),
        0x8000_1007 => ("OMX_ErrorUnderflow", Transient),
        0x8000_1008 => ("OMX_ErrorOverflow", Transient),
        0x8000_1009 => ("OMX_ErrorHardware", Fatal),
        0x8000_100A => ("OMX_ErrorInvalidState", Protocol),
        0x8000_100B => ("OMX_ErrorStreamCorrupt", Transient),
        0x8000_100C => ("OMX_ErrorPortsNotCompatible", Configuration),
        0x8000_100D => ("OMX_ErrorResourcesLost", ResourceExhaustion),
        0x8000_100E => ("OMX_ErrorNoMore", Configuration),
        0x8000_100F => ("OMX_ErrorVersionMismatch", Configuration),
        0x8000_1010 => ("OMX_ErrorNotReady", Transient),
        0x8000_1011 => ("OMX_ErrorTimeout", Transient),
        0x8000_1012 => ("OMX_ErrorSameState", Protocol),
        0x8000_1013 => ("OMX_ErrorResourcesPreempted", ResourceExhaustion),
        0x8000_1014 => ("OMX_ErrorPortUnresponsiveDuringAllocation", Protocol),
        0x8000_1015 => ("OMX_ErrorPortUnresponsiveDuringDeallocation", Protocol),
        0x8000_1016 => ("OMX_ErrorPortUnresponsiveDuringStop", Protocol),
        0x8000_1017 => ("OMX_ErrorIncorrectStateTransition", Protocol),
        0x8000_1018 => ("OMX_ErrorIncorrectStateOperation", Protocol),
        0x8000_1019 => ("OMX_ErrorUnsupportedSetting", Configuration),
        0x8000_101A => ("OMX_ErrorUnsupportedIndex", Configuration),
        0x8000_101B => ("OMX_ErrorBadPortIndex", Configuration),
        0x8000_101C => ("OMX_ErrorPortUnpopulated", Protocol),
        0x8000_101D => ("OMX_ErrorComponentSuspended", Transient),
        0x8000_101E => ("OMX_ErrorDynamicResourcesUnavailable", ResourceExhaustion),
        0x8000_101F => ("OMX_ErrorMbErrorsInFrame", Transient),
        0x8000_1020 => ("OMX_ErrorFormatNotDetected", Configuration),
        0x8000_1021 => ("OMX_ErrorContentPipeOpenFailed", Configuration),
        0x8000_1022 => ("OMX_ErrorContentPipeCreationFailed", Configuration),
        0x8000_1023 => ("OMX_ErrorSeperateTablesUsed", Configuration),
        0x8000_1024 => ("OMX_ErrorTunnelingUnsupported", Configuration),
        _ => return None,
    };
    Some(entry)
}

impl fmt::Display for OmxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.name(), self.0)
    }
}

impl fmt::Debug for OmxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
