//! In-process IL component that follows the OpenMAX state machine.
//!
//! Used as the software fallback when no vendor IL core is present and as the
//! test double for the lifecycle code. Commands complete asynchronously on a
//! worker thread, the way a real component calls back from its own context:
//!
//! ```text
//!  caller thread                 worker thread ("omx-sim")
//!  ─────────────                 ─────────────────────────
//!  send_command(StateSet Idle)
//!    └─ pending = Idle ──Evaluate──► sleep(latency)
//!  allocate_buffer × n               lock model, complete what is ready
//!    └─ ─────────────────Evaluate──► unlock, notify EventSync
//! ```
//!
//! Loaded→Idle completes only once the enabled port is populated, Idle→Loaded
//! and port disable only once every buffer is freed.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use vr_common::ComponentState;

use crate::component::{BufferHeader, Command, IlComponent, IlCore, PortDefinition};
use crate::events::{EventSync, Notification};
use crate::ffi::{OmxBufferHeader, OmxTicks, OMX_VERSION};
use crate::status::OmxStatus;

/// Event id delivered when `emit_unrecognized` is set (vendor extension range).
pub const SIM_UNRECOGNIZED_EVENT: u32 = 0x7F00_00A0;

/// Behaviour knobs of the simulated component.
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Index of the render input port.
    pub port: u32,
    /// Buffer count the component insists on; requests below are raised.
    pub min_buffer_count: u32,
    /// Buffer size floor in bytes.
    pub min_buffer_size: u32,
    /// Delay before each asynchronous completion.
    pub latency: Duration,
    pub port_initially_enabled: bool,
    /// Silently drop every transition request into this state.
    pub stall_on: Option<ComponentState>,
    /// Silently drop every transition request out of this state.
    pub stall_from: Option<ComponentState>,
    /// Fail `AllocateBuffer` with `InsufficientResources` once this many
    /// buffers are live.
    pub fail_allocation_at: Option<usize>,
    /// Deliver an unrecognized event before every completion.
    pub emit_unrecognized: bool,
    /// Hand submitted buffers back via `EmptyBufferDone`.
    pub return_buffers: bool,
    pub fail_get_handle: bool,
    pub support_display_region: bool,
    /// Status returned by every `EmptyThisBuffer`.
    pub fail_submit_with: Option<OmxStatus>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            port: 90,
            min_buffer_count: 1,
            min_buffer_size: 4096,
            latency: Duration::from_millis(2),
            port_initially_enabled: true,
            stall_on: None,
            stall_from: None,
            fail_allocation_at: None,
            emit_unrecognized: false,
            return_buffers: true,
            fail_get_handle: false,
            support_display_region: true,
            fail_submit_with: None,
        }
    }
}

/// A frame the simulated display consumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimFrame {
    pub buffer: usize,
    pub data: Vec<u8>,
}

/// Everything the simulated hardware observed, across handles.
#[derive(Clone, Debug, Default)]
pub struct SimLog {
    /// Hardware-confirmed states, starting with `Loaded` for each handle.
    pub transitions: Vec<ComponentState>,
    pub allocate_calls: usize,
    pub free_calls: usize,
    pub frames: Vec<SimFrame>,
    /// Every display-region fullscreen value written.
    pub fullscreen: Vec<bool>,
    pub handles_opened: usize,
    pub handles_open: usize,
    pub inits: usize,
    pub deinits: usize,
    /// Buffers still allocated when a handle was freed.
    pub leaked_on_close: usize,
}

enum SimMsg {
    Evaluate,
    Consume(usize),
    Emit(Notification),
}

/// Backing storage of one allocated buffer.
struct SimBuffer {
    header: Box<OmxBufferHeader>,
    _payload: Vec<u8>,
}

// SAFETY: the raw pointers inside the header point into `_payload`, owned by
// the same value.
unsafe impl Send for SimBuffer {}

impl SimBuffer {
    fn new(port: u32, size: u32) -> Self {
        let mut payload = vec![0u8; size as usize];
        let header = Box::new(OmxBufferHeader {
            size: std::mem::size_of::<OmxBufferHeader>() as u32,
            version: OMX_VERSION,
            buffer: payload.as_mut_ptr(),
            alloc_len: size,
            filled_len: 0,
            offset: 0,
            app_private: std::ptr::null_mut(),
            platform_private: std::ptr::null_mut(),
            input_port_private: std::ptr::null_mut(),
            output_port_private: std::ptr::null_mut(),
            mark_target_component: std::ptr::null_mut(),
            mark_data: std::ptr::null_mut(),
            tick_count: 0,
            time_stamp: OmxTicks::default(),
            flags: 0,
            output_port_index: 0,
            input_port_index: port,
        });
        Self {
            header,
            _payload: payload,
        }
    }

    fn id(&self) -> usize {
        &*self.header as *const OmxBufferHeader as usize
    }
}

/// Hardware-side state of the current component.
struct Model {
    state: ComponentState,
    pending_state: Option<ComponentState>,
    port: PortDefinition,
    pending_port: Option<bool>,
    live: HashMap<usize, SimBuffer>,
}

impl Model {
    fn new(config: &SimConfig) -> Self {
        Self {
            state: ComponentState::Loaded,
            pending_state: None,
            port: PortDefinition {
                port_index: config.port,
                enabled: config.port_initially_enabled,
                populated: false,
                buffer_count_actual: config.min_buffer_count.max(1),
                buffer_count_min: config.min_buffer_count.max(1),
                buffer_size: config.min_buffer_size.max(1),
                frame_width: 0,
                frame_height: 0,
                stride: 0,
                slice_height: 0,
            },
            pending_port: None,
            live: HashMap::new(),
        }
    }

    fn populated(&self) -> bool {
        self.live.len() >= self.port.buffer_count_actual as usize
    }

    /// Complete every pending command whose precondition now holds.
    fn evaluate(&mut self, log: &mut SimLog) -> Vec<Notification> {
        let mut out = Vec::new();

        if let Some(target) = self.pending_state {
            let ready = match (self.state, target) {
                (ComponentState::Loaded, ComponentState::Idle) => !self.port.enabled || self.populated(),
                (ComponentState::Idle, ComponentState::Loaded) => self.live.is_empty(),
                _ => true,
            };
            if ready {
                self.state = target;
                self.pending_state = None;
                log.transitions.push(target);
                out.push(Notification::StateChanged(target));
            }
        }

        match self.pending_port {
            Some(true) if self.state == ComponentState::Loaded || self.populated() => {
                self.port.enabled = true;
                self.pending_port = None;
                out.push(Notification::PortEnabled {
                    port: self.port.port_index,
                });
            }
            Some(false) if self.live.is_empty() => {
                self.port.enabled = false;
                self.pending_port = None;
                out.push(Notification::PortDisabled {
                    port: self.port.port_index,
                });
            }
            _ => {}
        }

        self.port.populated = self.port.enabled && self.populated();
        out
    }
}

struct Shared {
    model: Model,
    log: SimLog,
    worker: Option<Sender<SimMsg>>,
}

/// Simulated IL core. Hands out one component at a time.
pub struct SimulatedCore {
    config: SimConfig,
    shared: Arc<Mutex<Shared>>,
}

impl SimulatedCore {
    pub fn new(config: SimConfig) -> Self {
        let shared = Shared {
            model: Model::new(&config),
            log: SimLog::default(),
            worker: None,
        };
        Self {
            config,
            shared: Arc::new(Mutex::new(shared)),
        }
    }

    /// Observation and fault-injection handle.
    pub fn probe(&self) -> SimProbe {
        SimProbe {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl IlCore for SimulatedCore {
    fn init(&self) -> Result<(), OmxStatus> {
        self.shared.lock().log.inits += 1;
        Ok(())
    }

    fn get_handle(&self, name: &str, events: Arc<EventSync>) -> Result<Box<dyn IlComponent>, OmxStatus> {
        if name.is_empty() {
            return Err(OmxStatus::INVALID_COMPONENT_NAME);
        }
        if self.config.fail_get_handle {
            return Err(OmxStatus::COMPONENT_NOT_FOUND);
        }
        {
            let shared = self.shared.lock();
            if shared.log.inits <= shared.log.deinits {
                return Err(OmxStatus::NOT_READY);
            }
            if shared.worker.is_some() {
                return Err(OmxStatus::INSUFFICIENT_RESOURCES);
            }
        }

        let (tx, rx) = channel::unbounded::<SimMsg>();
        let worker_shared = Arc::clone(&self.shared);
        let worker_config = self.config.clone();
        let worker = thread::Builder::new()
            .name("omx-sim".to_string())
            .spawn(move || {
                for msg in rx.iter() {
                    thread::sleep(worker_config.latency);
                    let notifications = match msg {
                        SimMsg::Evaluate => {
                            let mut shared = worker_shared.lock();
                            let Shared { model, log, .. } = &mut *shared;
                            model.evaluate(log)
                        }
                        SimMsg::Consume(buffer) => {
                            if worker_shared.lock().model.live.contains_key(&buffer) {
                                vec![Notification::InputBufferReturned { buffer }]
                            } else {
                                Vec::new()
                            }
                        }
                        SimMsg::Emit(notification) => vec![notification],
                    };
                    for notification in notifications {
                        if worker_config.emit_unrecognized {
                            events.notify(Notification::Unrecognized {
                                event: SIM_UNRECOGNIZED_EVENT,
                                data1: 0,
                                data2: 0,
                            });
                        }
                        events.notify(notification);
                    }
                }
                trace!("Simulated component worker exiting");
            })
            .map_err(|_| OmxStatus::INSUFFICIENT_RESOURCES)?;

        let mut shared = self.shared.lock();
        shared.model = Model::new(&self.config);
        shared.log.transitions.push(ComponentState::Loaded);
        shared.log.handles_opened += 1;
        shared.log.handles_open += 1;
        shared.worker = Some(tx.clone());
        drop(shared);

        info!(component = %name, port = self.config.port, "Simulated IL component created");
        Ok(Box::new(SimComponent {
            name: name.to_string(),
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            tx: Some(tx),
            worker: Some(worker),
        }))
    }

    fn deinit(&self) -> Result<(), OmxStatus> {
        let mut shared = self.shared.lock();
        if shared.log.deinits >= shared.log.inits {
            return Err(OmxStatus::INCORRECT_STATE_OPERATION);
        }
        shared.log.deinits += 1;
        Ok(())
    }
}

/// Read-only view of the simulated hardware plus fault injection.
#[derive(Clone)]
pub struct SimProbe {
    shared: Arc<Mutex<Shared>>,
}

impl SimProbe {
    pub fn log(&self) -> SimLog {
        self.shared.lock().log.clone()
    }

    pub fn transitions(&self) -> Vec<ComponentState> {
        self.shared.lock().log.transitions.clone()
    }

    pub fn state(&self) -> ComponentState {
        self.shared.lock().model.state
    }

    pub fn live_buffers(&self) -> usize {
        self.shared.lock().model.live.len()
    }

    pub fn port_definition(&self) -> PortDefinition {
        self.shared.lock().model.port.clone()
    }

    /// Deliver an error event from the component's context.
    pub fn inject_error(&self, status: OmxStatus) {
        if let Some(worker) = self.shared.lock().worker.as_ref() {
            let _ = worker.send(SimMsg::Emit(Notification::Error { status, data: 0 }));
        }
    }

    /// Deliver an arbitrary raw event from the component's context.
    pub fn inject_raw_event(&self, event: u32, data1: u32, data2: u32) {
        if let Some(worker) = self.shared.lock().worker.as_ref() {
            let _ = worker.send(SimMsg::Emit(Notification::from_raw_event(event, data1, data2)));
        }
    }
}

pub struct SimComponent {
    name: String,
    config: SimConfig,
    shared: Arc<Mutex<Shared>>,
    tx: Option<Sender<SimMsg>>,
    worker: Option<JoinHandle<()>>,
}

impl SimComponent {
    fn post(&self, msg: SimMsg) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(msg);
        }
    }

    fn check_port(&self, port: u32) -> Result<(), OmxStatus> {
        if port == self.config.port {
            Ok(())
        } else {
            Err(OmxStatus::BAD_PORT_INDEX)
        }
    }

    fn request_state(&mut self, target: ComponentState) -> Result<(), OmxStatus> {
        let mut shared = self.shared.lock();
        let model = &mut shared.model;
        if model.pending_state.is_some() {
            return Err(OmxStatus::INCORRECT_STATE_OPERATION);
        }
        let current = model.state;
        if current == target {
            drop(shared);
            self.post(SimMsg::Emit(Notification::Error {
                status: OmxStatus::SAME_STATE,
                data: 0,
            }));
            return Ok(());
        }
        if !current.can_transition_to(target) {
            drop(shared);
            self.post(SimMsg::Emit(Notification::Error {
                status: OmxStatus::INCORRECT_STATE_TRANSITION,
                data: 0,
            }));
            return Ok(());
        }
        if self.config.stall_on == Some(target) || self.config.stall_from == Some(current) {
            debug!(from = %current, to = %target, "Simulated component ignores transition");
            return Ok(());
        }
        debug!(from = %current, to = %target, "Simulated transition requested");
        model.pending_state = Some(target);
        drop(shared);
        self.post(SimMsg::Evaluate);
        Ok(())
    }

    fn request_port(&mut self, enable: bool) -> Result<(), OmxStatus> {
        let mut shared = self.shared.lock();
        let model = &mut shared.model;
        if model.port.enabled == enable || model.pending_port.is_some() {
            return Err(OmxStatus::INCORRECT_STATE_OPERATION);
        }
        model.pending_port = Some(enable);
        drop(shared);
        self.post(SimMsg::Evaluate);
        Ok(())
    }
}

impl IlComponent for SimComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_command(&mut self, command: Command) -> Result<(), OmxStatus> {
        match command {
            Command::StateSet(target) => self.request_state(target),
            Command::PortEnable(port) => {
                self.check_port(port)?;
                self.request_port(true)
            }
            Command::PortDisable(port) => {
                self.check_port(port)?;
                self.request_port(false)
            }
        }
    }

    fn get_state(&self) -> Result<ComponentState, OmxStatus> {
        Ok(self.shared.lock().model.state)
    }

    fn get_port_definition(&self, port: u32) -> Result<PortDefinition, OmxStatus> {
        self.check_port(port)?;
        Ok(self.shared.lock().model.port.clone())
    }

    fn set_port_definition(&mut self, definition: &PortDefinition) -> Result<(), OmxStatus> {
        self.check_port(definition.port_index)?;
        let mut shared = self.shared.lock();
        let model = &mut shared.model;
        if model.state != ComponentState::Loaded && model.port.enabled {
            return Err(OmxStatus::INCORRECT_STATE_OPERATION);
        }

        let port = &mut model.port;
        port.frame_width = definition.frame_width;
        port.frame_height = definition.frame_height;
        port.stride = definition.stride;
        port.slice_height = definition.slice_height;
        port.buffer_count_actual = definition.buffer_count_actual.max(port.buffer_count_min);
        let frame = (definition.stride as u64 * definition.slice_height as u64 * 3 / 2)
            .min(u32::MAX as u64) as u32;
        port.buffer_size = frame.max(self.config.min_buffer_size).max(1);
        Ok(())
    }

    fn set_fullscreen(&mut self, port: u32, on: bool) -> Result<(), OmxStatus> {
        self.check_port(port)?;
        if !self.config.support_display_region {
            return Err(OmxStatus::UNSUPPORTED_INDEX);
        }
        self.shared.lock().log.fullscreen.push(on);
        Ok(())
    }

    fn allocate_buffer(&mut self, port: u32, size: u32) -> Result<BufferHeader, OmxStatus> {
        self.check_port(port)?;
        let mut shared = self.shared.lock();
        let Shared { model, log, .. } = &mut *shared;
        let allowed = (model.state == ComponentState::Loaded
            && model.pending_state == Some(ComponentState::Idle))
            || model.pending_port == Some(true);
        if !allowed {
            return Err(OmxStatus::INCORRECT_STATE_OPERATION);
        }
        if size < model.port.buffer_size {
            return Err(OmxStatus::BAD_PARAMETER);
        }
        log.allocate_calls += 1;
        if self.config.fail_allocation_at == Some(model.live.len()) {
            return Err(OmxStatus::INSUFFICIENT_RESOURCES);
        }

        let mut buffer = SimBuffer::new(port, size);
        let raw = &mut *buffer.header as *mut OmxBufferHeader;
        model.live.insert(buffer.id(), buffer);
        drop(shared);
        self.post(SimMsg::Evaluate);
        // SAFETY: the header and payload live in the model until freed.
        unsafe { BufferHeader::from_raw(raw) }.ok_or(OmxStatus::UNDEFINED)
    }

    fn free_buffer(&mut self, port: u32, buffer: BufferHeader) -> Result<(), OmxStatus> {
        self.check_port(port)?;
        let mut shared = self.shared.lock();
        shared.log.free_calls += 1;
        if shared.model.live.remove(&buffer.id()).is_none() {
            return Err(OmxStatus::BAD_PARAMETER);
        }
        drop(shared);
        self.post(SimMsg::Evaluate);
        Ok(())
    }

    fn empty_this_buffer(&mut self, buffer: &BufferHeader) -> Result<(), OmxStatus> {
        if let Some(status) = self.config.fail_submit_with {
            return Err(status);
        }
        let mut shared = self.shared.lock();
        let Shared { model, log, .. } = &mut *shared;
        if !matches!(
            model.state,
            ComponentState::Idle | ComponentState::Executing | ComponentState::Pause
        ) {
            return Err(OmxStatus::INCORRECT_STATE_OPERATION);
        }
        if !model.port.enabled {
            return Err(OmxStatus::INCORRECT_STATE_OPERATION);
        }
        if !model.live.contains_key(&buffer.id()) {
            return Err(OmxStatus::BAD_PARAMETER);
        }
        log.frames.push(SimFrame {
            buffer: buffer.id(),
            data: buffer.filled().to_vec(),
        });
        drop(shared);
        if self.config.return_buffers {
            self.post(SimMsg::Consume(buffer.id()));
        }
        Ok(())
    }
}

impl Drop for SimComponent {
    fn drop(&mut self) {
        {
            let mut shared = self.shared.lock();
            shared.worker = None;
            shared.log.handles_open = shared.log.handles_open.saturating_sub(1);
            let leaked = shared.model.live.len();
            if leaked > 0 {
                warn!(component = %self.name, leaked, "Simulated component freed with live buffers");
                shared.log.leaked_on_close += leaked;
                shared.model.live.clear();
            }
        }
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        debug!(component = %self.name, "Simulated IL component freed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(config: SimConfig) -> (SimulatedCore, Arc<EventSync>, Box<dyn IlComponent>) {
        let core = SimulatedCore::new(config);
        core.init().unwrap();
        let events = Arc::new(EventSync::new());
        let component = core.get_handle("OMX.sim.video_render", Arc::clone(&events)).unwrap();
        (core, events, component)
    }

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn starts_loaded_with_initial_port() {
        let (core, _events, component) = open(SimConfig {
            min_buffer_count: 2,
            ..SimConfig::default()
        });
        assert_eq!(component.get_state().unwrap(), ComponentState::Loaded);
        let def = component.get_port_definition(90).unwrap();
        assert_eq!(def.buffer_count_actual, 2);
        assert!(def.enabled);
        assert_eq!(core.probe().transitions(), vec![ComponentState::Loaded]);
    }

    #[test]
    fn idle_waits_for_population() {
        let (core, events, mut component) = open(SimConfig {
            min_buffer_count: 2,
            ..SimConfig::default()
        });
        component.send_command(Command::StateSet(ComponentState::Idle)).unwrap();
        let a = component.allocate_buffer(90, 4096).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(core.probe().state(), ComponentState::Loaded);

        let b = component.allocate_buffer(90, 4096).unwrap();
        events.wait_state_reached(ComponentState::Idle, WAIT).unwrap();
        assert!(core.probe().port_definition().populated);

        component.send_command(Command::StateSet(ComponentState::Loaded)).unwrap();
        component.free_buffer(90, a).unwrap();
        component.free_buffer(90, b).unwrap();
        events.wait_state_reached(ComponentState::Loaded, WAIT).unwrap();
        assert_eq!(core.probe().live_buffers(), 0);
    }

    #[test]
    fn skipping_idle_reports_error_event() {
        let (_core, events, mut component) = open(SimConfig::default());
        component
            .send_command(Command::StateSet(ComponentState::Executing))
            .unwrap();
        let err = events
            .wait_state_reached(ComponentState::Executing, WAIT)
            .unwrap_err();
        assert!(err.to_string().contains("OMX_ErrorIncorrectStateTransition"));
    }

    #[test]
    fn allocation_outside_transition_is_rejected() {
        let (_core, _events, mut component) = open(SimConfig::default());
        assert_eq!(
            component.allocate_buffer(90, 4096).unwrap_err(),
            OmxStatus::INCORRECT_STATE_OPERATION
        );
    }

    #[test]
    fn hardware_raises_buffer_count() {
        let (_core, _events, mut component) = open(SimConfig {
            min_buffer_count: 3,
            ..SimConfig::default()
        });
        let mut def = component.get_port_definition(90).unwrap();
        def.buffer_count_actual = 1;
        def.frame_width = 640;
        def.frame_height = 480;
        def.stride = 640;
        def.slice_height = 480;
        component.set_port_definition(&def).unwrap();
        let def = component.get_port_definition(90).unwrap();
        assert_eq!(def.buffer_count_actual, 3);
        assert_eq!(def.buffer_size, 640 * 480 * 3 / 2);
    }

    #[test]
    fn stalled_transition_never_completes() {
        let (_core, events, mut component) = open(SimConfig {
            port_initially_enabled: false,
            stall_on: Some(ComponentState::Idle),
            ..SimConfig::default()
        });
        component.send_command(Command::StateSet(ComponentState::Idle)).unwrap();
        let err = events
            .wait_state_reached(ComponentState::Idle, Duration::from_millis(50))
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn port_enable_needs_a_command() {
        let (core, events, mut component) = open(SimConfig {
            port_initially_enabled: false,
            ..SimConfig::default()
        });
        let mut def = component.get_port_definition(90).unwrap();
        def.enabled = true;
        component.set_port_definition(&def).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(!core.probe().port_definition().enabled);

        component.send_command(Command::PortEnable(90)).unwrap();
        events.wait_port_enabled(90, true, WAIT).unwrap();
        assert!(core.probe().port_definition().enabled);
    }

    #[test]
    fn stall_from_drops_transitions_out_of_state() {
        let (core, events, mut component) = open(SimConfig {
            port_initially_enabled: false,
            stall_from: Some(ComponentState::Idle),
            ..SimConfig::default()
        });
        component.send_command(Command::StateSet(ComponentState::Idle)).unwrap();
        events.wait_state_reached(ComponentState::Idle, WAIT).unwrap();

        component
            .send_command(Command::StateSet(ComponentState::Executing))
            .unwrap();
        let err = events
            .wait_state_reached(ComponentState::Executing, Duration::from_millis(50))
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(core.probe().state(), ComponentState::Idle);
    }

    #[test]
    fn drop_joins_worker_and_counts_leaks() {
        let (core, _events, mut component) = open(SimConfig::default());
        component.send_command(Command::StateSet(ComponentState::Idle)).unwrap();
        let _leaked = component.allocate_buffer(90, 4096).unwrap();
        drop(component);
        let log = core.probe().log();
        assert_eq!(log.handles_open, 0);
        assert_eq!(log.leaked_on_close, 1);
    }

    #[test]
    fn get_handle_requires_init() {
        let core = SimulatedCore::new(SimConfig::default());
        let result = core.get_handle("OMX.sim.video_render", Arc::new(EventSync::new()));
        assert_eq!(result.err(), Some(OmxStatus::NOT_READY));
    }
}
