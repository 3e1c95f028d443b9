//! Display surface handed to a windowing backend.
//!
//! Owns one [`VideoRender`] and tracks the frame geometry currently
//! negotiated on the render port. A frame with a different geometry
//! re-negotiates the port (disable, then enable with the new size) before it
//! is shown.

use tracing::{debug, info};

use vr_common::{Geometry, RenderError, RenderResult};

use crate::lifecycle::VideoRender;

pub struct DisplaySurface {
    render: VideoRender,
    geometry: Option<Geometry>,
    renegotiations: u64,
}

impl DisplaySurface {
    /// Initialize the render component. The port is negotiated lazily on the
    /// first frame.
    pub fn open(mut render: VideoRender) -> RenderResult<Self> {
        render.initialize()?;
        Ok(Self {
            render,
            geometry: None,
            renegotiations: 0,
        })
    }

    /// Geometry of the last frame shown.
    pub fn geometry(&self) -> Option<Geometry> {
        self.geometry
    }

    /// How many times a size change forced a new port negotiation.
    pub fn renegotiations(&self) -> u64 {
        self.renegotiations
    }

    pub fn render(&self) -> &VideoRender {
        &self.render
    }

    /// Make sure the port is negotiated for `geometry` and return the next
    /// buffer to fill. Finish with [`present`](Self::present).
    pub fn begin_frame(&mut self, geometry: Geometry) -> RenderResult<&mut [u8]> {
        if self.geometry != Some(geometry) {
            if let Some(previous) = self.geometry {
                info!(from = %previous, to = %geometry, "Frame size changed, renegotiating render port");
                self.render.disable_display()?;
                self.geometry = None;
                self.renegotiations += 1;
            }
            self.render
                .enable_display(geometry.width, geometry.height, geometry.stride)?;
            self.geometry = Some(geometry);
        }
        self.render.input_buffer()
    }

    /// Submit the buffer from [`begin_frame`](Self::begin_frame).
    pub fn present(&mut self, filled_len: u32) -> RenderResult<()> {
        self.render.submit(filled_len)
    }

    /// Copy a packed planar 4:2:0 frame laid out with `geometry.stride` into
    /// the next buffer and display it.
    pub fn show_frame(&mut self, geometry: Geometry, frame: &[u8]) -> RenderResult<()> {
        let buffer = self.begin_frame(geometry)?;
        if frame.len() > buffer.len() {
            return Err(RenderError::InvalidGeometry(format!(
                "frame of {} bytes exceeds the {} byte input buffer for {geometry}",
                frame.len(),
                buffer.len()
            )));
        }
        buffer[..frame.len()].copy_from_slice(frame);
        debug!(%geometry, bytes = frame.len(), "Frame copied");
        self.present(frame.len() as u32)
    }

    /// Disable the display and release the component.
    pub fn close(mut self) -> RenderResult<()> {
        self.geometry = None;
        self.render.disable_display()?;
        self.render.teardown()
    }
}
