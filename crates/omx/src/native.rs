//! Native OpenMAX IL backend on top of the dynamically loaded core library.

use std::ffi::{c_void, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use vr_common::ComponentState;

use crate::component::{BufferHeader, Command, IlComponent, IlCore, PortDefinition};
use crate::events::{EventSync, Notification};
use crate::ffi::{
    state_from_raw, OmxBufferHeader, OmxCallbacks, OmxComponentType, OmxConfigDisplayRegion,
    OmxErrorType, OmxHandle, OmxLibrary, OmxParamPortDefinition, OMX_FALSE,
    OMX_INDEX_CONFIG_DISPLAY_REGION, OMX_INDEX_PARAM_PORT_DEFINITION, OMX_TRUE,
};
use crate::status::OmxStatus;

/// IL core backed by the vendor library.
pub struct NativeCore {
    lib: Arc<OmxLibrary>,
    host_initialized: AtomicBool,
}

impl NativeCore {
    pub fn new(lib: OmxLibrary) -> Self {
        Self {
            lib: Arc::new(lib),
            host_initialized: AtomicBool::new(false),
        }
    }
}

impl IlCore for NativeCore {
    fn init(&self) -> Result<(), OmxStatus> {
        if let Some(bcm_host_init) = self.lib.api.bcm_host_init {
            if !self.host_initialized.swap(true, Ordering::SeqCst) {
                // SAFETY: idempotent VideoCore host setup with no arguments.
                unsafe { bcm_host_init() };
                debug!("bcm_host initialized");
            }
        }
        // SAFETY: OMX_Init takes no arguments and is reference counted.
        OmxStatus(unsafe { (self.lib.api.OMX_Init)() }).result()
    }

    fn get_handle(&self, name: &str, events: Arc<EventSync>) -> Result<Box<dyn IlComponent>, OmxStatus> {
        let c_name = CString::new(name).map_err(|_| OmxStatus::INVALID_COMPONENT_NAME)?;

        let mut context = Box::new(CallbackContext { events });
        let mut callbacks = Box::new(OmxCallbacks {
            event_handler: on_event,
            empty_buffer_done: on_empty_buffer_done,
            fill_buffer_done: on_fill_buffer_done,
        });

        let mut handle: OmxHandle = ptr::null_mut();
        // SAFETY: every pointer is valid for the call; the context and the
        // callback table are boxed and kept alive by the component.
        let status = OmxStatus(unsafe {
            (self.lib.api.OMX_GetHandle)(
                &mut handle,
                c_name.as_ptr() as *mut _,
                &mut *context as *mut CallbackContext as *mut c_void,
                &mut *callbacks,
            )
        });
        status.result()?;
        if handle.is_null() {
            return Err(OmxStatus::INVALID_COMPONENT);
        }

        info!(component = %name, "IL component handle created");
        Ok(Box::new(NativeComponent {
            handle,
            lib: Arc::clone(&self.lib),
            name: name.to_string(),
            _context: context,
            _callbacks: callbacks,
        }))
    }

    fn deinit(&self) -> Result<(), OmxStatus> {
        // SAFETY: balanced with `init`.
        OmxStatus(unsafe { (self.lib.api.OMX_Deinit)() }).result()
    }
}

/// Target of the C callbacks (`pAppData`).
struct CallbackContext {
    events: Arc<EventSync>,
}

/// Recover the context from `pAppData` and deliver a notification. Panics
/// never cross the FFI boundary.
fn deliver(app_data: *mut c_void, notification: Notification) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: `app_data` is the boxed CallbackContext registered in
        // `get_handle`, alive until the handle is freed.
        if let Some(context) = unsafe { (app_data as *const CallbackContext).as_ref() } {
            context.events.notify(notification);
        }
    }));
    if outcome.is_err() {
        error!("Panic while delivering an IL notification");
    }
}

unsafe extern "C" fn on_event(
    _component: OmxHandle,
    app_data: *mut c_void,
    event: u32,
    data1: u32,
    data2: u32,
    _event_data: *mut c_void,
) -> OmxErrorType {
    deliver(app_data, Notification::from_raw_event(event, data1, data2));
    OmxStatus::NONE.code()
}

unsafe extern "C" fn on_empty_buffer_done(
    _component: OmxHandle,
    app_data: *mut c_void,
    buffer: *mut OmxBufferHeader,
) -> OmxErrorType {
    deliver(
        app_data,
        Notification::InputBufferReturned {
            buffer: buffer as usize,
        },
    );
    OmxStatus::NONE.code()
}

unsafe extern "C" fn on_fill_buffer_done(
    _component: OmxHandle,
    app_data: *mut c_void,
    buffer: *mut OmxBufferHeader,
) -> OmxErrorType {
    deliver(
        app_data,
        Notification::OutputBufferProduced {
            buffer: buffer as usize,
        },
    );
    OmxStatus::NONE.code()
}

impl From<&OmxParamPortDefinition> for PortDefinition {
    fn from(raw: &OmxParamPortDefinition) -> Self {
        Self {
            port_index: raw.port_index,
            enabled: raw.enabled != OMX_FALSE,
            populated: raw.populated != OMX_FALSE,
            buffer_count_actual: raw.buffer_count_actual,
            buffer_count_min: raw.buffer_count_min,
            buffer_size: raw.buffer_size,
            frame_width: raw.video.frame_width,
            frame_height: raw.video.frame_height,
            stride: raw.video.stride.max(0) as u32,
            slice_height: raw.video.slice_height,
        }
    }
}

/// A live component handle. Freed on drop.
pub struct NativeComponent {
    handle: OmxHandle,
    lib: Arc<OmxLibrary>,
    name: String,
    _context: Box<CallbackContext>,
    _callbacks: Box<OmxCallbacks>,
}

// SAFETY: IL component handles may be driven from any single thread at a time;
// the callback context is only read through `EventSync`, which is Sync.
unsafe impl Send for NativeComponent {}

impl NativeComponent {
    fn vtable(&self) -> &OmxComponentType {
        // SAFETY: an IL handle points to its OMX_COMPONENTTYPE for its lifetime.
        unsafe { &*(self.handle as *const OmxComponentType) }
    }

    fn read_port(&self, port: u32) -> Result<OmxParamPortDefinition, OmxStatus> {
        let get = self.vtable().GetParameter.ok_or(OmxStatus::NOT_IMPLEMENTED)?;
        let mut raw = OmxParamPortDefinition::for_port(port);
        // SAFETY: `raw` carries a correct nSize/nVersion header for this index.
        OmxStatus(unsafe {
            get(
                self.handle,
                OMX_INDEX_PARAM_PORT_DEFINITION,
                &mut raw as *mut OmxParamPortDefinition as *mut c_void,
            )
        })
        .result()?;
        Ok(raw)
    }
}

impl IlComponent for NativeComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_command(&mut self, command: Command) -> Result<(), OmxStatus> {
        let send = self.vtable().SendCommand.ok_or(OmxStatus::NOT_IMPLEMENTED)?;
        let (cmd, param) = command.to_raw();
        // SAFETY: none of the issued commands takes command data.
        OmxStatus(unsafe { send(self.handle, cmd, param, ptr::null_mut()) }).result()
    }

    fn get_state(&self) -> Result<ComponentState, OmxStatus> {
        let get_state = self.vtable().GetState.ok_or(OmxStatus::NOT_IMPLEMENTED)?;
        let mut raw = 0u32;
        // SAFETY: writes one OMX_STATETYPE.
        OmxStatus(unsafe { get_state(self.handle, &mut raw) }).result()?;
        state_from_raw(raw).ok_or(OmxStatus::UNDEFINED)
    }

    fn get_port_definition(&self, port: u32) -> Result<PortDefinition, OmxStatus> {
        self.read_port(port).map(|raw| PortDefinition::from(&raw))
    }

    fn set_port_definition(&mut self, definition: &PortDefinition) -> Result<(), OmxStatus> {
        // Start from the hardware's own struct so fields this crate does not
        // model (format, alignment, mime) are written back untouched.
        let mut raw = self.read_port(definition.port_index)?;
        raw.buffer_count_actual = definition.buffer_count_actual;
        raw.enabled = if definition.enabled { OMX_TRUE } else { OMX_FALSE };
        raw.video.frame_width = definition.frame_width;
        raw.video.frame_height = definition.frame_height;
        raw.video.stride = definition.stride as i32;
        raw.video.slice_height = definition.slice_height;

        let set = self.vtable().SetParameter.ok_or(OmxStatus::NOT_IMPLEMENTED)?;
        // SAFETY: `raw` was filled by GetParameter for the same index.
        OmxStatus(unsafe {
            set(
                self.handle,
                OMX_INDEX_PARAM_PORT_DEFINITION,
                &mut raw as *mut OmxParamPortDefinition as *mut c_void,
            )
        })
        .result()
    }

    fn set_fullscreen(&mut self, port: u32, on: bool) -> Result<(), OmxStatus> {
        let set_config = self.vtable().SetConfig.ok_or(OmxStatus::NOT_IMPLEMENTED)?;
        let mut region = OmxConfigDisplayRegion::fullscreen(port, on);
        // SAFETY: `region` carries a correct header for the display-region index.
        OmxStatus(unsafe {
            set_config(
                self.handle,
                OMX_INDEX_CONFIG_DISPLAY_REGION,
                &mut region as *mut OmxConfigDisplayRegion as *mut c_void,
            )
        })
        .result()
    }

    fn allocate_buffer(&mut self, port: u32, size: u32) -> Result<BufferHeader, OmxStatus> {
        let allocate = self.vtable().AllocateBuffer.ok_or(OmxStatus::NOT_IMPLEMENTED)?;
        let mut header: *mut OmxBufferHeader = ptr::null_mut();
        // SAFETY: the component writes one header pointer on success.
        OmxStatus(unsafe { allocate(self.handle, &mut header, port, ptr::null_mut(), size) })
            .result()?;
        // SAFETY: a successful AllocateBuffer returns a live header with an
        // `nAllocLen`-sized payload owned by the component.
        unsafe { BufferHeader::from_raw(header) }.ok_or(OmxStatus::INSUFFICIENT_RESOURCES)
    }

    fn free_buffer(&mut self, port: u32, buffer: BufferHeader) -> Result<(), OmxStatus> {
        let free = self.vtable().FreeBuffer.ok_or(OmxStatus::NOT_IMPLEMENTED)?;
        // SAFETY: `buffer` was allocated on this port of this handle and is
        // consumed here.
        OmxStatus(unsafe { free(self.handle, port, buffer.as_ptr()) }).result()
    }

    fn empty_this_buffer(&mut self, buffer: &BufferHeader) -> Result<(), OmxStatus> {
        let empty = self.vtable().EmptyThisBuffer.ok_or(OmxStatus::NOT_IMPLEMENTED)?;
        // SAFETY: the header is live and owned by the caller's pool.
        OmxStatus(unsafe { empty(self.handle, buffer.as_ptr()) }).result()
    }
}

impl Drop for NativeComponent {
    fn drop(&mut self) {
        // SAFETY: the handle came from OMX_GetHandle and is freed exactly once.
        let status = OmxStatus(unsafe { (self.lib.api.OMX_FreeHandle)(self.handle) });
        match status.classify() {
            None => debug!(component = %self.name, "IL component handle freed"),
            Some(kind) => warn!(
                component = %self.name,
                %status,
                %kind,
                "OMX_FreeHandle failed during cleanup"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::OmxVideoPortDefinition;

    #[test]
    fn raw_port_definition_converts() {
        let mut raw = OmxParamPortDefinition::for_port(90);
        raw.enabled = OMX_TRUE;
        raw.buffer_count_actual = 3;
        raw.buffer_count_min = 1;
        raw.buffer_size = 460_800;
        raw.video = OmxVideoPortDefinition {
            frame_width: 640,
            frame_height: 480,
            stride: 640,
            slice_height: 480,
            ..raw.video
        };
        let def = PortDefinition::from(&raw);
        assert!(def.enabled);
        assert!(!def.populated);
        assert_eq!(def.buffer_count_actual, 3);
        assert_eq!(def.stride, 640);
        assert_eq!(def.slice_height, 480);
    }

    #[test]
    fn negative_stride_clamps_to_zero() {
        let mut raw = OmxParamPortDefinition::for_port(0);
        raw.video.stride = -640;
        assert_eq!(PortDefinition::from(&raw).stride, 0);
    }

    #[test]
    fn callbacks_ignore_null_app_data() {
        // SAFETY: a null context is tolerated by `deliver`.
        let status = unsafe { on_event(ptr::null_mut(), ptr::null_mut(), 0, 0, 2, ptr::null_mut()) };
        assert_eq!(status, OmxStatus::NONE.code());
    }

    #[test]
    fn callback_reaches_event_sync() {
        let mut context = CallbackContext {
            events: Arc::new(EventSync::new()),
        };
        let app_data = &mut context as *mut CallbackContext as *mut c_void;
        // SAFETY: `app_data` points to a live CallbackContext.
        unsafe {
            on_event(ptr::null_mut(), app_data, 0, 0, 2, ptr::null_mut());
            on_empty_buffer_done(ptr::null_mut(), app_data, 0x40 as *mut OmxBufferHeader);
        }
        assert_eq!(context.events.state(), Some(ComponentState::Idle));
        assert!(context.events.take_returned(0x40));
    }

    #[test]
    #[ignore]
    fn open_render_component() {
        let lib = OmxLibrary::load().unwrap();
        let core = NativeCore::new(lib);
        core.init().unwrap();
        let component = core
            .get_handle("OMX.broadcom.video_render", Arc::new(EventSync::new()))
            .unwrap();
        assert_eq!(component.get_state().unwrap(), ComponentState::Loaded);
        drop(component);
        core.deinit().unwrap();
    }
}
