//! `vr-omx` -- OpenMAX IL hardware video-render lifecycle.
//!
//! Drives a vendor video-render component (VideoCore `OMX.broadcom.video_render`
//! or a Bellagio sink) through its state machine, negotiates the render input
//! port, and feeds it from a pool of hardware-allocated buffers. The IL core
//! is loaded dynamically at runtime; without it a simulated component takes
//! its place.
//!
//! # Architecture
//!
//! - [`status`] -- `OMX_ERRORTYPE` names and classification into `ErrorKind`
//! - [`events`] -- Event synchronizer: async notifications, bounded waits
//! - [`component`] -- `IlCore` / `IlComponent` traits over the consumed IL surface
//!   - [`native`] -- Vendor IL core via [`ffi`] (`libloading`)
//!   - [`sim`] -- Simulated component with fault injection
//! - [`port`] -- Port definition negotiation and enable/disable
//! - [`buffer`] -- Input buffer pool with ownership hand-off
//! - [`lifecycle`] -- [`VideoRender`]: initialize / enable / submit / disable / teardown
//! - [`display`] -- [`DisplaySurface`] for a windowing backend
//!
//! # Render Pipeline
//!
//! ```text
//! caller frame (width, height, stride)
//!   --> enable_display: negotiate port, Loaded -> Idle (+ allocate) -> Executing
//!     --> input_buffer: next FreeForFill buffer
//!       --> submit: EmptyThisBuffer
//!         --> EmptyBufferDone -> EventSync -> buffer reusable
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use vr_common::RenderConfig;
//! use vr_omx::VideoRender;
//!
//! let mut render = VideoRender::with_fallback(RenderConfig::default())?;
//! render.initialize()?;
//! render.enable_display(640, 480, 640)?;
//!
//! for frame in frames {
//!     let buffer = render.input_buffer()?;
//!     buffer[..frame.len()].copy_from_slice(&frame);
//!     render.submit(frame.len() as u32)?;
//! }
//!
//! render.disable_display()?;
//! render.teardown()?;
//! ```

pub mod buffer;
pub mod component;
pub mod display;
pub mod error;
pub mod events;
pub mod ffi;
pub mod lifecycle;
pub mod native;
pub mod port;
pub mod sim;
pub mod status;

// Re-export primary public types
pub use buffer::{BufferPool, Ownership};
pub use component::{BufferHeader, Command, IlComponent, IlCore, PortDefinition};
pub use display::DisplaySurface;
pub use error::LoadError;
pub use events::{EventStats, EventSync, Notification};
pub use lifecycle::{RenderStats, VideoRender};
pub use native::NativeCore;
pub use port::PortController;
pub use sim::{SimConfig, SimProbe, SimulatedCore};
pub use status::OmxStatus;
