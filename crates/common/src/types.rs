//! Core value types shared by every backend.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RenderError;

/// Frame geometry requested by the display collaborator.
///
/// `stride` is the distance in bytes between two luma rows. The render port
/// always uses `slice_height == height`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

impl Geometry {
    /// Build a geometry, rejecting zero dimensions and rows narrower than
    /// the frame.
    pub fn new(width: u32, height: u32, stride: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 || stride == 0 {
            return Err(RenderError::InvalidGeometry(format!(
                "{width}x{height} stride {stride}: all dimensions must be > 0"
            )));
        }
        if stride < width {
            return Err(RenderError::InvalidGeometry(format!(
                "stride {stride} is smaller than width {width}"
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
        })
    }

    /// Slice height negotiated on the port (always the frame height here).
    pub fn slice_height(&self) -> u32 {
        self.height
    }

    /// Size in bytes of one planar 4:2:0 frame laid out with this stride.
    pub fn i420_frame_size(&self) -> usize {
        let luma = self.stride as usize * self.height as usize;
        luma + luma / 2
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} (stride {})", self.width, self.height, self.stride)
    }
}

/// Lifecycle state of an IL component, as reported by the hardware.
///
/// The hardware owns the state. Software only mirrors the last value it
/// observed and never assumes a transition finished without confirmation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentState {
    Invalid,
    Loaded,
    Idle,
    Executing,
    Pause,
    WaitForResources,
}

impl ComponentState {
    /// Whether the IL state machine permits a direct move from `self` to `to`.
    ///
    /// Loaded↔Idle↔Executing are the only moves this core issues. Loaded can
    /// never go straight to Executing.
    pub fn can_transition_to(self, to: ComponentState) -> bool {
        use ComponentState::*;
        matches!(
            (self, to),
            (Loaded, Idle)
                | (Idle, Loaded)
                | (Idle, Executing)
                | (Executing, Idle)
                | (Idle, Pause)
                | (Pause, Idle)
                | (Executing, Pause)
                | (Pause, Executing)
                | (Loaded, WaitForResources)
                | (WaitForResources, Loaded)
                | (WaitForResources, Idle)
                | (_, Invalid)
        ) && self != to
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ComponentState::Invalid => "Invalid",
            ComponentState::Loaded => "Loaded",
            ComponentState::Idle => "Idle",
            ComponentState::Executing => "Executing",
            ComponentState::Pause => "Pause",
            ComponentState::WaitForResources => "WaitForResources",
        }
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
