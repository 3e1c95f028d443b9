//! Backend-agnostic view of an IL core and one of its components.
//!
//! The lifecycle code only talks to these traits. Every method returns the
//! raw [`OmxStatus`] on failure so the caller classifies it at the call site.

use std::ptr::NonNull;
use std::sync::Arc;

use vr_common::{ComponentState, Geometry};

use crate::events::EventSync;
use crate::ffi::{
    state_to_raw, OmxBufferHeader, OMX_COMMAND_PORT_DISABLE, OMX_COMMAND_PORT_ENABLE,
    OMX_COMMAND_STATE_SET,
};
use crate::status::OmxStatus;

/// An asynchronous command. Completion is reported through [`EventSync`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    StateSet(ComponentState),
    PortEnable(u32),
    PortDisable(u32),
}

impl Command {
    /// `(OMX_COMMANDTYPE, nParam1)`.
    pub fn to_raw(self) -> (u32, u32) {
        match self {
            Command::StateSet(state) => (OMX_COMMAND_STATE_SET, state_to_raw(state)),
            Command::PortEnable(port) => (OMX_COMMAND_PORT_ENABLE, port),
            Command::PortDisable(port) => (OMX_COMMAND_PORT_DISABLE, port),
        }
    }
}

/// Negotiated definition of a video port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortDefinition {
    pub port_index: u32,
    pub enabled: bool,
    pub populated: bool,
    pub buffer_count_actual: u32,
    pub buffer_count_min: u32,
    pub buffer_size: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub stride: u32,
    pub slice_height: u32,
}

impl PortDefinition {
    /// Overlay the caller's frame geometry. Everything else keeps the value
    /// the hardware last reported.
    pub fn overlay_geometry(&mut self, geometry: &Geometry) {
        self.frame_width = geometry.width;
        self.frame_height = geometry.height;
        self.stride = geometry.stride;
        self.slice_height = geometry.slice_height();
    }

    pub fn matches_geometry(&self, geometry: &Geometry) -> bool {
        self.frame_width == geometry.width
            && self.frame_height == geometry.height
            && self.stride == geometry.stride
    }
}

/// A hardware-allocated buffer header.
///
/// Owned by the buffer pool. The header and its payload stay valid until the
/// header is passed to [`IlComponent::free_buffer`].
#[derive(Debug)]
pub struct BufferHeader {
    raw: NonNull<OmxBufferHeader>,
}

// SAFETY: the header is only touched by the thread owning the pool; the
// component reads it between EmptyThisBuffer and EmptyBufferDone, during which
// the pool does not hand it out.
unsafe impl Send for BufferHeader {}

impl BufferHeader {
    /// Wrap a header returned by `AllocateBuffer`.
    ///
    /// # Safety
    /// `raw` must be null or point to a live header whose `buffer` points to
    /// `alloc_len` writable bytes, valid until the header is freed.
    pub unsafe fn from_raw(raw: *mut OmxBufferHeader) -> Option<Self> {
        NonNull::new(raw).map(|raw| Self { raw })
    }

    pub fn as_ptr(&self) -> *mut OmxBufferHeader {
        self.raw.as_ptr()
    }

    /// Stable identity; the same value arrives in `EmptyBufferDone`.
    pub fn id(&self) -> usize {
        self.raw.as_ptr() as usize
    }

    pub fn capacity(&self) -> usize {
        // SAFETY: live header per `from_raw`.
        unsafe { self.raw.as_ref().alloc_len as usize }
    }

    pub fn filled_len(&self) -> u32 {
        // SAFETY: live header per `from_raw`.
        unsafe { self.raw.as_ref().filled_len }
    }

    pub fn offset(&self) -> u32 {
        // SAFETY: live header per `from_raw`.
        unsafe { self.raw.as_ref().offset }
    }

    /// Record how much of the payload is valid before submission.
    pub fn set_fill(&mut self, filled_len: u32, offset: u32) {
        // SAFETY: live header per `from_raw`, exclusively borrowed.
        unsafe {
            let header = self.raw.as_mut();
            header.filled_len = filled_len;
            header.offset = offset;
        }
    }

    /// Writable payload.
    pub fn data_mut(&mut self) -> &mut [u8] {
        // SAFETY: live header per `from_raw`; `buffer` spans `alloc_len` bytes.
        unsafe {
            let header = self.raw.as_ref();
            if header.buffer.is_null() {
                return &mut [];
            }
            std::slice::from_raw_parts_mut(header.buffer, header.alloc_len as usize)
        }
    }

    /// The filled part of the payload.
    pub fn filled(&self) -> &[u8] {
        // SAFETY: live header per `from_raw`; offset + filled_len is bounded
        // by alloc_len when produced by `set_fill` through the pool.
        unsafe {
            let header = self.raw.as_ref();
            if header.buffer.is_null() {
                return &[];
            }
            let start = header.offset.min(header.alloc_len) as usize;
            let end = (header.offset.saturating_add(header.filled_len)).min(header.alloc_len) as usize;
            std::slice::from_raw_parts(header.buffer.add(start), end - start)
        }
    }
}

/// One IL component instance.
pub trait IlComponent: Send {
    /// Component name it was created with.
    fn name(&self) -> &str;

    /// Issue an asynchronous command.
    fn send_command(&mut self, command: Command) -> Result<(), OmxStatus>;

    /// Query the current state directly.
    fn get_state(&self) -> Result<ComponentState, OmxStatus>;

    fn get_port_definition(&self, port: u32) -> Result<PortDefinition, OmxStatus>;

    /// Write a port definition. The hardware may adjust buffer count and size.
    fn set_port_definition(&mut self, definition: &PortDefinition) -> Result<(), OmxStatus>;

    /// Configure the display region of `port` as fullscreen (or not).
    fn set_fullscreen(&mut self, port: u32, on: bool) -> Result<(), OmxStatus>;

    fn allocate_buffer(&mut self, port: u32, size: u32) -> Result<BufferHeader, OmxStatus>;

    fn free_buffer(&mut self, port: u32, buffer: BufferHeader) -> Result<(), OmxStatus>;

    /// Hand a filled input buffer to the component.
    fn empty_this_buffer(&mut self, buffer: &BufferHeader) -> Result<(), OmxStatus>;
}

/// The IL core: process-wide init plus component creation.
pub trait IlCore: Send + Sync {
    fn init(&self) -> Result<(), OmxStatus>;

    /// Create a component whose notifications are delivered to `events`.
    fn get_handle(&self, name: &str, events: Arc<EventSync>) -> Result<Box<dyn IlComponent>, OmxStatus>;

    fn deinit(&self) -> Result<(), OmxStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> PortDefinition {
        PortDefinition {
            port_index: 90,
            enabled: false,
            populated: false,
            buffer_count_actual: 1,
            buffer_count_min: 1,
            buffer_size: 1024,
            frame_width: 0,
            frame_height: 0,
            stride: 0,
            slice_height: 0,
        }
    }

    #[test]
    fn command_raw_encoding() {
        assert_eq!(Command::StateSet(ComponentState::Idle).to_raw(), (0, 2));
        assert_eq!(Command::PortDisable(90).to_raw(), (2, 90));
        assert_eq!(Command::PortEnable(90).to_raw(), (3, 90));
    }

    #[test]
    fn overlay_keeps_hardware_fields() {
        let mut def = definition();
        let geometry = Geometry::new(640, 480, 704).unwrap();
        def.overlay_geometry(&geometry);
        assert_eq!(def.frame_width, 640);
        assert_eq!(def.stride, 704);
        assert_eq!(def.slice_height, 480);
        assert_eq!(def.buffer_size, 1024);
        assert_eq!(def.buffer_count_actual, 1);
        assert!(def.matches_geometry(&geometry));
    }

    #[test]
    fn buffer_header_fill_and_view() {
        let mut payload = vec![0u8; 16];
        let mut raw = OmxBufferHeader {
            size: std::mem::size_of::<OmxBufferHeader>() as u32,
            version: crate::ffi::OMX_VERSION,
            buffer: payload.as_mut_ptr(),
            alloc_len: 16,
            filled_len: 0,
            offset: 0,
            app_private: std::ptr::null_mut(),
            platform_private: std::ptr::null_mut(),
            input_port_private: std::ptr::null_mut(),
            output_port_private: std::ptr::null_mut(),
            mark_target_component: std::ptr::null_mut(),
            mark_data: std::ptr::null_mut(),
            tick_count: 0,
            time_stamp: Default::default(),
            flags: 0,
            output_port_index: 0,
            input_port_index: 90,
        };
        let mut header = unsafe { BufferHeader::from_raw(&mut raw) }.unwrap();
        assert_eq!(header.capacity(), 16);
        header.data_mut()[..4].copy_from_slice(&[1, 2, 3, 4]);
        header.set_fill(4, 0);
        assert_eq!(header.filled(), &[1, 2, 3, 4]);
        assert_eq!(header.filled_len(), 4);
        assert!(unsafe { BufferHeader::from_raw(std::ptr::null_mut()) }.is_none());
    }
}
