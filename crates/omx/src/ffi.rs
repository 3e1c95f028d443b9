//! Raw FFI bindings for the OpenMAX IL 1.1.2 core and component API.
//!
//! The core library is loaded dynamically at runtime via `libloading`. Only
//! the four core entry points are exported symbols; every per-component call
//! goes through the function table at the start of the component handle
//! (`OMX_COMPONENTTYPE`), which is what the C `OMX_SendCommand(...)` family of
//! macros expands to.
//!
//! Reference: Khronos `OMX_Core.h`, `OMX_Component.h`, `OMX_IVCommon.h`,
//! `OMX_Video.h`, and the VideoCore `OMX_Broadcom.h` display-region extension.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_void};
use std::path::Path;

use libloading::Library;
use tracing::{debug, info};

use vr_common::ComponentState;

use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Scalar types
// ---------------------------------------------------------------------------

/// Opaque component handle (`OMX_HANDLETYPE`).
pub type OmxHandle = *mut c_void;

/// `OMX_ERRORTYPE`.
pub type OmxErrorType = u32;

/// `OMX_BOOL`.
pub type OmxBool = u32;

pub const OMX_FALSE: OmxBool = 0;
pub const OMX_TRUE: OmxBool = 1;

/// Packed IL version 1.1.2.0 (`nVersionMajor | nVersionMinor << 8 | nRevision << 16`).
pub const OMX_VERSION: u32 = 0x0002_0101;

/// `OMX_TICKS`. VideoCore builds with `OMX_SKIP64BIT`, splitting the
/// timestamp so the header layout does not depend on 64-bit alignment.
#[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct OmxTicks {
    pub low_part: u32,
    pub high_part: u32,
}

#[cfg(not(any(target_arch = "arm", target_arch = "aarch64")))]
pub type OmxTicks = i64;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

// OMX_COMMANDTYPE
pub const OMX_COMMAND_STATE_SET: u32 = 0;
pub const OMX_COMMAND_FLUSH: u32 = 1;
pub const OMX_COMMAND_PORT_DISABLE: u32 = 2;
pub const OMX_COMMAND_PORT_ENABLE: u32 = 3;
pub const OMX_COMMAND_MARK_BUFFER: u32 = 4;

// OMX_STATETYPE
pub const OMX_STATE_INVALID: u32 = 0;
pub const OMX_STATE_LOADED: u32 = 1;
pub const OMX_STATE_IDLE: u32 = 2;
pub const OMX_STATE_EXECUTING: u32 = 3;
pub const OMX_STATE_PAUSE: u32 = 4;
pub const OMX_STATE_WAIT_FOR_RESOURCES: u32 = 5;

// OMX_EVENTTYPE
pub const OMX_EVENT_CMD_COMPLETE: u32 = 0;
pub const OMX_EVENT_ERROR: u32 = 1;
pub const OMX_EVENT_MARK: u32 = 2;
pub const OMX_EVENT_PORT_SETTINGS_CHANGED: u32 = 3;
pub const OMX_EVENT_BUFFER_FLAG: u32 = 4;

// OMX_INDEXTYPE
pub const OMX_INDEX_PARAM_PORT_DEFINITION: u32 = 0x0200_0001;
/// VideoCore vendor index for `OMX_CONFIG_DISPLAYREGIONTYPE`.
pub const OMX_INDEX_CONFIG_DISPLAY_REGION: u32 = 0x7F00_0010;

// OMX_DISPLAYSETTYPE bits
pub const OMX_DISPLAY_SET_FULLSCREEN: u32 = 0x2;

/// Map a raw `OMX_STATETYPE` to the lifecycle state.
pub fn state_from_raw(raw: u32) -> Option<ComponentState> {
    Some(match raw {
        OMX_STATE_INVALID => ComponentState::Invalid,
        OMX_STATE_LOADED => ComponentState::Loaded,
        OMX_STATE_IDLE => ComponentState::Idle,
        OMX_STATE_EXECUTING => ComponentState::Executing,
        OMX_STATE_PAUSE => ComponentState::Pause,
        OMX_STATE_WAIT_FOR_RESOURCES => ComponentState::WaitForResources,
        _ => return None,
    })
}

pub fn state_to_raw(state: ComponentState) -> u32 {
    match state {
        ComponentState::Invalid => OMX_STATE_INVALID,
        ComponentState::Loaded => OMX_STATE_LOADED,
        ComponentState::Idle => OMX_STATE_IDLE,
        ComponentState::Executing => OMX_STATE_EXECUTING,
        ComponentState::Pause => OMX_STATE_PAUSE,
        ComponentState::WaitForResources => OMX_STATE_WAIT_FOR_RESOURCES,
    }
}

// ---------------------------------------------------------------------------
// Parameter structs
// ---------------------------------------------------------------------------

/// `OMX_VIDEO_PORTDEFINITIONTYPE`. The largest member of the port
/// definition's `format` union, so it stands in for the whole union.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct OmxVideoPortDefinition {
    pub mime_type: *mut c_char,
    pub native_render: *mut c_void,
    pub frame_width: u32,
    pub frame_height: u32,
    pub stride: i32,
    pub slice_height: u32,
    pub bitrate: u32,
    pub framerate_q16: u32,
    pub flag_error_concealment: OmxBool,
    pub compression_format: u32,
    pub color_format: u32,
    pub native_window: *mut c_void,
}

/// `OMX_PARAM_PORTDEFINITIONTYPE`.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct OmxParamPortDefinition {
    pub size: u32,
    pub version: u32,
    pub port_index: u32,
    pub dir: u32,
    pub buffer_count_actual: u32,
    pub buffer_count_min: u32,
    pub buffer_size: u32,
    pub enabled: OmxBool,
    pub populated: OmxBool,
    pub domain: u32,
    pub video: OmxVideoPortDefinition,
    pub buffers_contiguous: OmxBool,
    pub buffer_alignment: u32,
}

impl OmxParamPortDefinition {
    /// Zeroed struct with the size/version header and port index filled in.
    pub fn for_port(port_index: u32) -> Self {
        Self {
            size: std::mem::size_of::<Self>() as u32,
            version: OMX_VERSION,
            port_index,
            dir: 0,
            buffer_count_actual: 0,
            buffer_count_min: 0,
            buffer_size: 0,
            enabled: OMX_FALSE,
            populated: OMX_FALSE,
            domain: 0,
            video: OmxVideoPortDefinition {
                mime_type: std::ptr::null_mut(),
                native_render: std::ptr::null_mut(),
                frame_width: 0,
                frame_height: 0,
                stride: 0,
                slice_height: 0,
                bitrate: 0,
                framerate_q16: 0,
                flag_error_concealment: OMX_FALSE,
                compression_format: 0,
                color_format: 0,
                native_window: std::ptr::null_mut(),
            },
            buffers_contiguous: OMX_FALSE,
            buffer_alignment: 0,
        }
    }
}

/// `OMX_DISPLAYRECTTYPE`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct OmxDisplayRect {
    pub x_offset: i16,
    pub y_offset: i16,
    pub width: i16,
    pub height: i16,
}

/// `OMX_CONFIG_DISPLAYREGIONTYPE` (VideoCore extension).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct OmxConfigDisplayRegion {
    pub size: u32,
    pub version: u32,
    pub port_index: u32,
    pub set: u32,
    pub num: u32,
    pub fullscreen: OmxBool,
    pub transform: u32,
    pub dest_rect: OmxDisplayRect,
    pub src_rect: OmxDisplayRect,
    pub noaspect: OmxBool,
    pub mode: u32,
    pub pixel_x: u32,
    pub pixel_y: u32,
    pub layer: i32,
    pub copyprotect_required: OmxBool,
    pub alpha: u32,
    pub wfc_context_width: u32,
    pub wfc_context_height: u32,
}

impl OmxConfigDisplayRegion {
    pub fn fullscreen(port_index: u32, on: bool) -> Self {
        Self {
            size: std::mem::size_of::<Self>() as u32,
            version: OMX_VERSION,
            port_index,
            set: OMX_DISPLAY_SET_FULLSCREEN,
            fullscreen: if on { OMX_TRUE } else { OMX_FALSE },
            ..Self::default()
        }
    }
}

/// `OMX_BUFFERHEADERTYPE`.
#[repr(C)]
#[derive(Debug)]
pub struct OmxBufferHeader {
    pub size: u32,
    pub version: u32,
    pub buffer: *mut u8,
    pub alloc_len: u32,
    pub filled_len: u32,
    pub offset: u32,
    pub app_private: *mut c_void,
    pub platform_private: *mut c_void,
    pub input_port_private: *mut c_void,
    pub output_port_private: *mut c_void,
    pub mark_target_component: OmxHandle,
    pub mark_data: *mut c_void,
    pub tick_count: u32,
    pub time_stamp: OmxTicks,
    pub flags: u32,
    pub output_port_index: u32,
    pub input_port_index: u32,
}

// ---------------------------------------------------------------------------
// Callback and component tables
// ---------------------------------------------------------------------------

pub type EventHandlerFn = unsafe extern "C" fn(
    component: OmxHandle,
    app_data: *mut c_void,
    event: u32,
    data1: u32,
    data2: u32,
    event_data: *mut c_void,
) -> OmxErrorType;

pub type BufferDoneFn = unsafe extern "C" fn(
    component: OmxHandle,
    app_data: *mut c_void,
    buffer: *mut OmxBufferHeader,
) -> OmxErrorType;

/// `OMX_CALLBACKTYPE`.
#[repr(C)]
pub struct OmxCallbacks {
    pub event_handler: EventHandlerFn,
    pub empty_buffer_done: BufferDoneFn,
    pub fill_buffer_done: BufferDoneFn,
}

/// `OMX_COMPONENTTYPE`: the function table a component handle points to.
///
/// Entries this crate never calls are kept as untyped pointers so the
/// layout stays correct without committing to their signatures.
#[repr(C)]
#[allow(non_snake_case)]
pub struct OmxComponentType {
    pub size: u32,
    pub version: u32,
    pub component_private: *mut c_void,
    pub application_private: *mut c_void,
    pub GetComponentVersion: *const c_void,
    pub SendCommand: Option<
        unsafe extern "C" fn(OmxHandle, u32, u32, *mut c_void) -> OmxErrorType,
    >,
    pub GetParameter: Option<unsafe extern "C" fn(OmxHandle, u32, *mut c_void) -> OmxErrorType>,
    pub SetParameter: Option<unsafe extern "C" fn(OmxHandle, u32, *mut c_void) -> OmxErrorType>,
    pub GetConfig: Option<unsafe extern "C" fn(OmxHandle, u32, *mut c_void) -> OmxErrorType>,
    pub SetConfig: Option<unsafe extern "C" fn(OmxHandle, u32, *mut c_void) -> OmxErrorType>,
    pub GetExtensionIndex: *const c_void,
    pub GetState: Option<unsafe extern "C" fn(OmxHandle, *mut u32) -> OmxErrorType>,
    pub ComponentTunnelRequest: *const c_void,
    pub UseBuffer: *const c_void,
    pub AllocateBuffer: Option<
        unsafe extern "C" fn(OmxHandle, *mut *mut OmxBufferHeader, u32, *mut c_void, u32) -> OmxErrorType,
    >,
    pub FreeBuffer: Option<unsafe extern "C" fn(OmxHandle, u32, *mut OmxBufferHeader) -> OmxErrorType>,
    pub EmptyThisBuffer: Option<unsafe extern "C" fn(OmxHandle, *mut OmxBufferHeader) -> OmxErrorType>,
    pub FillThisBuffer: *const c_void,
    pub SetCallbacks: *const c_void,
    pub ComponentDeInit: *const c_void,
    pub UseEGLImage: *const c_void,
    pub ComponentRoleEnum: *const c_void,
}

// ---------------------------------------------------------------------------
// Core library
// ---------------------------------------------------------------------------

/// Function pointers exported by the IL core library.
#[allow(non_snake_case)]
pub struct OmxCoreFunctions {
    pub OMX_Init: unsafe extern "C" fn() -> OmxErrorType,
    pub OMX_Deinit: unsafe extern "C" fn() -> OmxErrorType,
    pub OMX_GetHandle: unsafe extern "C" fn(
        *mut OmxHandle,
        *mut c_char,
        *mut c_void,
        *mut OmxCallbacks,
    ) -> OmxErrorType,
    pub OMX_FreeHandle: unsafe extern "C" fn(OmxHandle) -> OmxErrorType,
    /// VideoCore only: must run once before `OMX_Init`.
    pub bcm_host_init: Option<unsafe extern "C" fn()>,
}

impl std::fmt::Debug for OmxCoreFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OmxCoreFunctions")
            .field("loaded", &true)
            .field("bcm_host", &self.bcm_host_init.is_some())
            .finish()
    }
}

/// Dynamically loaded IL core library with its entry points.
pub struct OmxLibrary {
    /// The loaded library handles; must outlive every copied symbol.
    _lib: Library,
    _host: Option<Library>,
    pub api: OmxCoreFunctions,
}

// SAFETY: the library handles only keep the shared objects mapped, and the
// IL core entry points are callable from any thread.
unsafe impl Send for OmxLibrary {}
unsafe impl Sync for OmxLibrary {}

impl std::fmt::Debug for OmxLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OmxLibrary").field("api", &self.api).finish()
    }
}

impl OmxLibrary {
    /// Load the IL core from the platform default location.
    ///
    /// On VideoCore this is `libopenmaxil.so` plus `libbcm_host.so`; elsewhere
    /// the Bellagio core `libomxil-bellagio.so.0`.
    pub fn load() -> Result<Self, LoadError> {
        let lib_name = Self::library_name();
        info!(library = %lib_name, "Loading IL core library");

        // SAFETY: loading a well-known vendor library whose initializers only
        // register the IL core.
        let lib = unsafe { Library::new(lib_name) }.map_err(|e| {
            LoadError::LibraryNotFound(format!("Failed to load {lib_name}: {e}"))
        })?;

        Self::load_functions(lib)
    }

    /// Load from a specific path (non-standard installs).
    pub fn load_from(path: &Path) -> Result<Self, LoadError> {
        info!(path = %path.display(), "Loading IL core library from custom path");

        // SAFETY: the caller asserts this is an OpenMAX IL core library.
        let lib = unsafe { Library::new(path) }.map_err(|e| {
            LoadError::LibraryNotFound(format!("Failed to load {}: {e}", path.display()))
        })?;

        Self::load_functions(lib)
    }

    fn load_functions(lib: Library) -> Result<Self, LoadError> {
        // VideoCore keeps bcm_host_init in a separate library. Missing is fine
        // on every other platform.
        // SAFETY: loading the VideoCore host support library.
        let host = Self::host_library_name().and_then(|name| unsafe { Library::new(name) }.ok());

        // SAFETY: the symbol names and signatures below are the ones declared
        // in OMX_Core.h / bcm_host.h. Each Symbol is dereferenced to copy the
        // raw function pointer; the Library handles are kept alive in `Self`.
        unsafe {
            let omx_init = *lib
                .get::<unsafe extern "C" fn() -> OmxErrorType>(b"OMX_Init\0")
                .map_err(|e| LoadError::SymbolNotFound(format!("OMX_Init: {e}")))?;

            let omx_deinit = *lib
                .get::<unsafe extern "C" fn() -> OmxErrorType>(b"OMX_Deinit\0")
                .map_err(|e| LoadError::SymbolNotFound(format!("OMX_Deinit: {e}")))?;

            let omx_get_handle = *lib
                .get::<unsafe extern "C" fn(
                    *mut OmxHandle,
                    *mut c_char,
                    *mut c_void,
                    *mut OmxCallbacks,
                ) -> OmxErrorType>(b"OMX_GetHandle\0")
                .map_err(|e| LoadError::SymbolNotFound(format!("OMX_GetHandle: {e}")))?;

            let omx_free_handle = *lib
                .get::<unsafe extern "C" fn(OmxHandle) -> OmxErrorType>(b"OMX_FreeHandle\0")
                .map_err(|e| LoadError::SymbolNotFound(format!("OMX_FreeHandle: {e}")))?;

            let bcm_host_init = host
                .as_ref()
                .and_then(|h| h.get::<unsafe extern "C" fn()>(b"bcm_host_init\0").ok())
                .map(|sym| *sym);

            debug!(bcm_host = bcm_host_init.is_some(), "IL core symbols loaded");

            Ok(Self {
                _lib: lib,
                _host: host,
                api: OmxCoreFunctions {
                    OMX_Init: omx_init,
                    OMX_Deinit: omx_deinit,
                    OMX_GetHandle: omx_get_handle,
                    OMX_FreeHandle: omx_free_handle,
                    bcm_host_init,
                },
            })
        }
    }

    /// Platform-specific core library filename.
    fn library_name() -> &'static str {
        if cfg!(any(target_arch = "arm", target_arch = "aarch64")) {
            "libopenmaxil.so"
        } else {
            "libomxil-bellagio.so.0"
        }
    }

    fn host_library_name() -> Option<&'static str> {
        if cfg!(any(target_arch = "arm", target_arch = "aarch64")) {
            Some("libbcm_host.so")
        } else {
            None
        }
    }
}
