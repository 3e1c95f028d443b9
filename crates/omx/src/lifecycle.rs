//! Lifecycle manager for the video-render component.
//!
//! Drives the component through Loaded → Idle → Executing and back, with the
//! render port and its buffer pool negotiated, populated and freed in
//! lock-step with those states.
//!
//! # Enable sequence
//!
//! ```text
//! fullscreen region (optional)
//! negotiate port definition ─► wait port enabled
//! StateSet(Idle) ─► allocate buffers ─► wait Idle
//! StateSet(Executing) ─► wait Executing
//! ```
//!
//! Disable runs the reverse: Executing → Idle, port disable, free buffers,
//! wait port disabled, Idle → Loaded.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use vr_common::{ComponentState, ErrorKind, Geometry, RenderConfig, RenderError, RenderResult};

use crate::buffer::BufferPool;
use crate::component::{Command, IlComponent, IlCore, PortDefinition};
use crate::events::EventSync;
use crate::ffi::OmxLibrary;
use crate::native::NativeCore;
use crate::port::PortController;
use crate::sim::{SimConfig, SimulatedCore};
use crate::status::OmxStatus;

/// Counters reported by [`VideoRender::stats`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames_submitted: u64,
    pub buffers_returned: u64,
    pub enables: u64,
    pub disables: u64,
    pub error_events: u64,
    pub unrecognized_events: u64,
}

/// Owner of one hardware video-render component.
pub struct VideoRender {
    config: RenderConfig,
    core: Arc<dyn IlCore>,
    core_initialized: bool,
    events: Arc<EventSync>,
    ports: PortController,
    /// Declared before `component` so buffers go before the handle.
    pool: BufferPool,
    component: Option<Box<dyn IlComponent>>,
    port_definition: Option<PortDefinition>,
    /// Geometry the current buffers were negotiated for.
    geometry: Option<Geometry>,
    enabled: bool,
    latched: Option<ErrorKind>,
    torn_down: bool,
    transitions: Vec<ComponentState>,
    frames_submitted: u64,
    enables: u64,
    disables: u64,
}

impl VideoRender {
    /// Create a render manager on top of `core`. No hardware call is made
    /// until [`initialize`](Self::initialize).
    pub fn new(config: RenderConfig, core: Arc<dyn IlCore>) -> RenderResult<Self> {
        config.validate()?;
        let events = Arc::new(EventSync::new());
        let ports = PortController::new(
            config.render_port,
            Arc::clone(&events),
            config.port_timeout(),
            config.requery_interval(),
        );
        let pool = BufferPool::new(config.render_port, config.return_policy, config.buffer_timeout());

        Ok(Self {
            config,
            core,
            core_initialized: false,
            events,
            ports,
            pool,
            component: None,
            port_definition: None,
            geometry: None,
            enabled: false,
            latched: None,
            torn_down: false,
            transitions: Vec::new(),
            frames_submitted: 0,
            enables: 0,
            disables: 0,
        })
    }

    /// Use the vendor IL core (`library_path` or the platform default).
    pub fn native(config: RenderConfig) -> RenderResult<Self> {
        config.validate()?;
        let lib = match &config.library_path {
            Some(path) => OmxLibrary::load_from(path)?,
            None => OmxLibrary::load()?,
        };
        Self::new(config, Arc::new(NativeCore::new(lib)))
    }

    /// Use the vendor IL core when it can be loaded, the simulated component
    /// otherwise.
    pub fn with_fallback(config: RenderConfig) -> RenderResult<Self> {
        match Self::native(config.clone()) {
            Err(RenderError::Load(reason)) => {
                warn!(%reason, "IL core unavailable, falling back to the simulated render component");
                let sim = SimConfig {
                    port: config.render_port,
                    ..SimConfig::default()
                };
                Self::new(config, Arc::new(SimulatedCore::new(sim)))
            }
            other => other,
        }
    }

    // -- Accessors --

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Last component state confirmed by the hardware.
    pub fn state(&self) -> Option<ComponentState> {
        self.events.state()
    }

    /// Port definition as last negotiated.
    pub fn port_definition(&self) -> Option<&PortDefinition> {
        self.port_definition.as_ref()
    }

    pub fn buffer_count(&self) -> usize {
        self.pool.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Error class that latched the manager, if any.
    pub fn latched(&self) -> Option<ErrorKind> {
        self.latched.or_else(|| {
            self.component.as_ref()?;
            let status = self.events.fatal_error()?;
            Some(status.classify().unwrap_or(ErrorKind::Unknown))
        })
    }

    /// Confirmed states since the component was created, starting with its
    /// initial state.
    pub fn transitions(&self) -> &[ComponentState] {
        &self.transitions
    }

    pub fn last_hardware_error(&self) -> Option<OmxStatus> {
        self.events.last_error()
    }

    pub fn stats(&self) -> RenderStats {
        let events = self.events.stats();
        RenderStats {
            frames_submitted: self.frames_submitted,
            buffers_returned: events.buffers_returned,
            enables: self.enables,
            disables: self.disables,
            error_events: events.errors,
            unrecognized_events: events.unrecognized,
        }
    }

    // -- Lifecycle --

    /// Initialize the IL core and create the render component.
    ///
    /// After a latched error this releases the old handle first.
    pub fn initialize(&mut self) -> RenderResult<()> {
        self.absorb_fatal_event();
        if self.component.is_some() {
            if self.latched.is_none() {
                return Err(RenderError::Protocol(
                    "render component already initialized".to_string(),
                ));
            }
            warn!(kind = ?self.latched, "Re-initializing after a latched error");
            self.discard_component();
        }

        if !self.core_initialized {
            self.core.init().map_err(|status| {
                let err = status.into_error("OMX_Init");
                error!(%status, kind = %err.kind(), "IL core initialization failed");
                err
            })?;
            self.core_initialized = true;
        }

        self.events.reset();
        let name = self.config.component_name.clone();
        let component = self
            .core
            .get_handle(&name, Arc::clone(&self.events))
            .map_err(|status| {
                error!(
                    component = %name,
                    %status,
                    kind = ?status.classify(),
                    "Failed to create IL component"
                );
                RenderError::NotFound(format!("{name}: {status}"))
            })?;

        let state = component
            .get_state()
            .map_err(|status| status.into_error("GetState"))?;
        if state != ComponentState::Loaded {
            warn!(%state, "New component is not in Loaded");
        }
        self.events.observe_state(state);

        self.component = Some(component);
        self.transitions = vec![state];
        self.port_definition = None;
        self.geometry = None;
        self.enabled = false;
        self.latched = None;
        self.torn_down = false;

        info!(
            component = %name,
            port = self.config.render_port,
            %state,
            "Video render component initialized"
        );
        Ok(())
    }

    /// Negotiate `width`×`height` (`stride` bytes per row) on the render port
    /// and bring the component to Executing.
    ///
    /// A no-op when the display is already enabled with this geometry. With
    /// another geometry the display is disabled first and the port
    /// renegotiated.
    pub fn enable_display(&mut self, width: u32, height: u32, stride: u32) -> RenderResult<()> {
        self.ensure_usable()?;
        let geometry = Geometry::new(width, height, stride)?;

        if let Some(current) = self.geometry.filter(|current| *current != geometry) {
            if !self.pool.is_empty() {
                info!(from = %current, to = %geometry, "Geometry changed, renegotiating render port");
                let result = self.run_disable();
                self.enabled = false;
                self.settle("enable_display", result)?;
                self.disables += 1;
            }
        }

        if self.enabled
            && !self.pool.is_empty()
            && self.events.state() == Some(ComponentState::Executing)
        {
            debug!(%geometry, "Display already enabled");
            return Ok(());
        }

        info!(%geometry, component = %self.config.component_name, "Enabling display");
        let result = self.run_enable(&geometry);
        self.settle("enable_display", result)?;

        self.enabled = true;
        self.enables += 1;
        info!(
            %geometry,
            buffers = self.pool.len(),
            buffer_size = self.pool.buffer_size(),
            "Display enabled"
        );
        Ok(())
    }

    fn run_enable(&mut self, geometry: &Geometry) -> RenderResult<()> {
        let state_timeout = self.config.state_timeout();
        let requery = self.config.requery_interval();
        let component = self.component.as_deref_mut().ok_or_else(not_initialized)?;

        match self.events.state() {
            Some(ComponentState::Loaded) => {
                if self.config.fullscreen {
                    self.ports.set_fullscreen(component, true)?;
                }

                let definition = self.ports.negotiate(component, geometry)?;
                let (count, size) = (definition.buffer_count_actual, definition.buffer_size);
                let port_enabled = definition.enabled;
                self.port_definition = Some(definition);
                self.geometry = Some(*geometry);
                if !port_enabled {
                    self.ports.enable_port(component)?;
                }
                self.ports.wait_port_enabled(component, true)?;

                request_state(component, &self.events, ComponentState::Idle)?;
                self.pool.allocate(component, count, size)?;
                await_state(
                    component,
                    &self.events,
                    ComponentState::Idle,
                    state_timeout,
                    requery,
                    &mut self.transitions,
                )?;
            }
            Some(ComponentState::Idle) if !self.pool.is_empty() => {
                debug!("Resuming enable from Idle");
            }
            Some(ComponentState::Executing) if !self.pool.is_empty() => {
                debug!("Component already Executing");
                return Ok(());
            }
            other => {
                return Err(RenderError::Protocol(format!(
                    "cannot enable display from state {}",
                    state_name(other)
                )));
            }
        }

        request_state(component, &self.events, ComponentState::Executing)?;
        await_state(
            component,
            &self.events,
            ComponentState::Executing,
            state_timeout,
            requery,
            &mut self.transitions,
        )
    }

    /// Writable memory of the next input buffer.
    pub fn input_buffer(&mut self) -> RenderResult<&mut [u8]> {
        self.ensure_enabled()?;
        let prepared = self.pool.prepare_fill(&self.events);
        let index = self.settle("input_buffer", prepared)?;
        self.pool.buffer_mut(index)
    }

    /// Submit the buffer from the last [`input_buffer`](Self::input_buffer)
    /// with `filled_len` valid bytes.
    pub fn submit(&mut self, filled_len: u32) -> RenderResult<()> {
        self.ensure_enabled()?;
        let index = self.pool.offered().ok_or_else(|| {
            RenderError::Protocol("submit without an acquired input buffer".to_string())
        })?;
        let component = self.component.as_deref_mut().ok_or_else(not_initialized)?;
        let result = self.pool.submit_filled(component, index, filled_len);
        self.settle("submit", result)?;
        self.frames_submitted += 1;
        Ok(())
    }

    /// Bring the component back to Loaded with the port disabled and every
    /// buffer freed. A no-op when the display is not enabled.
    pub fn disable_display(&mut self) -> RenderResult<()> {
        self.check_latched()?;
        if self.component.is_none() {
            debug!("disable_display without a component");
            return Ok(());
        }
        if self.events.state() == Some(ComponentState::Loaded) && self.pool.is_empty() {
            debug!("Display not enabled");
            self.enabled = false;
            return Ok(());
        }

        info!(component = %self.config.component_name, "Disabling display");
        let result = self.run_disable();
        self.enabled = false;
        self.settle("disable_display", result)?;

        self.disables += 1;
        info!(frames_submitted = self.frames_submitted, "Display disabled");
        Ok(())
    }

    fn run_disable(&mut self) -> RenderResult<()> {
        let state_timeout = self.config.state_timeout();
        let requery = self.config.requery_interval();
        let component = self.component.as_deref_mut().ok_or_else(not_initialized)?;

        if self.config.fullscreen {
            if let Err(e) = self.ports.set_fullscreen(component, false) {
                warn!(error = %e, kind = %e.kind(), "Failed to reset the fullscreen display region");
            }
        }

        if self.events.state() == Some(ComponentState::Executing) {
            request_state(component, &self.events, ComponentState::Idle)?;
            await_state(
                component,
                &self.events,
                ComponentState::Idle,
                state_timeout,
                requery,
                &mut self.transitions,
            )?;
        }

        let state = self.events.state();
        if state != Some(ComponentState::Idle) {
            return Err(RenderError::Protocol(format!(
                "cannot disable display from state {}",
                state_name(state)
            )));
        }

        let port = self.ports.port();
        if self.events.port_enabled(port) != Some(false) {
            self.ports.disable_port(component)?;
            self.pool.release(component, &self.events)?;
            self.ports.wait_port_enabled(component, false)?;
        } else {
            self.pool.release(component, &self.events)?;
        }
        self.geometry = None;
        if let Some(definition) = self.port_definition.as_mut() {
            definition.enabled = false;
        }

        request_state(component, &self.events, ComponentState::Loaded)?;
        await_state(
            component,
            &self.events,
            ComponentState::Loaded,
            state_timeout,
            requery,
            &mut self.transitions,
        )
    }

    /// Release the component handle and the IL core.
    ///
    /// Only valid once, with the component in Loaded and no buffers, or after
    /// a latched error.
    pub fn teardown(&mut self) -> RenderResult<()> {
        if self.torn_down {
            return Err(RenderError::Protocol("teardown called twice".to_string()));
        }
        if self.component.is_none() {
            return Err(RenderError::Protocol(
                "teardown before initialize".to_string(),
            ));
        }
        self.absorb_fatal_event();

        match self.latched {
            Some(kind) => warn!(%kind, "Tearing down after a latched error"),
            None => {
                let state = self.events.state();
                if state != Some(ComponentState::Loaded) || !self.pool.is_empty() {
                    return Err(RenderError::Protocol(format!(
                        "teardown requires Loaded with no buffers (state {}, {} buffers)",
                        state_name(state),
                        self.pool.len()
                    )));
                }
            }
        }

        self.events.cancel();
        self.discard_component();
        self.torn_down = true;
        self.enabled = false;
        self.latched = None;

        let result = if self.core_initialized {
            self.core_initialized = false;
            self.core
                .deinit()
                .map_err(|status| status.into_error("OMX_Deinit"))
        } else {
            Ok(())
        };

        info!(
            component = %self.config.component_name,
            frames_submitted = self.frames_submitted,
            "Video render torn down"
        );
        result
    }

    // -- Internals --

    /// Latch on a fatal error event the component reported outside a wait.
    fn absorb_fatal_event(&mut self) {
        if self.latched.is_some() || self.component.is_none() {
            return;
        }
        if let Some(status) = self.events.fatal_error() {
            let kind = status.classify().unwrap_or(ErrorKind::Unknown);
            error!(%status, %kind, "Component reported a fatal error, latching until re-initialized");
            self.latched = Some(kind);
        }
    }

    fn check_latched(&mut self) -> RenderResult<()> {
        self.absorb_fatal_event();
        match self.latched {
            Some(kind) => Err(RenderError::Latched(kind)),
            None => Ok(()),
        }
    }

    fn ensure_usable(&mut self) -> RenderResult<()> {
        self.check_latched()?;
        if self.component.is_none() {
            return Err(not_initialized());
        }
        Ok(())
    }

    fn ensure_enabled(&mut self) -> RenderResult<()> {
        self.ensure_usable()?;
        if !self.enabled {
            return Err(RenderError::Protocol("display is not enabled".to_string()));
        }
        Ok(())
    }

    /// Log a failed operation and latch on fatal errors.
    fn settle<T>(&mut self, op: &'static str, result: RenderResult<T>) -> RenderResult<T> {
        if let Err(e) = &result {
            let kind = e.kind();
            if kind.is_fatal() {
                error!(op, error = %e, %kind, "Fatal render error, latching until re-initialized");
                self.latched = Some(kind);
            } else {
                error!(op, error = %e, %kind, "Render operation failed");
            }
        }
        result
    }

    /// Free buffers and the handle, ignoring failures.
    fn discard_component(&mut self) {
        if let Some(component) = self.component.as_deref_mut() {
            if let Err(e) = self.pool.release(component, &self.events) {
                warn!(error = %e, "Failed to free input buffers while discarding the component");
            }
        }
        self.component = None;
        self.geometry = None;
    }
}

impl Drop for VideoRender {
    fn drop(&mut self) {
        if self.component.is_none() {
            return;
        }

        self.absorb_fatal_event();
        if self.latched.is_none() {
            if let Err(e) = self.disable_display() {
                warn!(error = %e, "Failed to disable display during cleanup");
            }
        }
        if let Err(e) = self.teardown() {
            warn!(error = %e, "Teardown failed during cleanup");
            self.discard_component();
            if self.core_initialized {
                if let Err(status) = self.core.deinit() {
                    warn!(%status, "OMX_Deinit failed during cleanup");
                }
                self.core_initialized = false;
            }
        }

        info!(
            frames_submitted = self.frames_submitted,
            "Video render destroyed"
        );
    }
}

fn not_initialized() -> RenderError {
    RenderError::Protocol("render component not initialized".to_string())
}

fn state_name(state: Option<ComponentState>) -> &'static str {
    state.map_or("unknown", ComponentState::display_name)
}

/// Issue a state transition after checking it against the mirrored state.
fn request_state(component: &mut dyn IlComponent, events: &EventSync, target: ComponentState) -> RenderResult<()> {
    if let Some(current) = events.state() {
        if !current.can_transition_to(target) {
            return Err(RenderError::Protocol(format!(
                "illegal state transition {current} -> {target}"
            )));
        }
    }
    debug!(to = %target, "Requesting state transition");
    component
        .send_command(Command::StateSet(target))
        .map_err(|status| status.into_error("SendCommand(StateSet)"))
}

/// Wait until the hardware confirms `target` and record it.
fn await_state(
    component: &dyn IlComponent,
    events: &EventSync,
    target: ComponentState,
    timeout: Duration,
    requery: Duration,
    transitions: &mut Vec<ComponentState>,
) -> RenderResult<()> {
    events.wait_with_requery(
        || format!("component state {target}"),
        timeout,
        requery,
        |mirror| mirror.state() == Some(target),
        || {
            let state = component
                .get_state()
                .map_err(|status| status.into_error("GetState"))?;
            if state == target {
                events.observe_state(state);
                return Ok(true);
            }
            Ok(false)
        },
    )?;
    transitions.push(target);
    debug!(state = %target, "Component state reached");
    Ok(())
}
