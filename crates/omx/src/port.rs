//! Port controller: definition negotiation and enable/disable of the render
//! input port.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use vr_common::{Geometry, RenderError, RenderResult};

use crate::component::{Command, IlComponent, PortDefinition};
use crate::events::EventSync;

pub struct PortController {
    port: u32,
    events: Arc<EventSync>,
    timeout: Duration,
    requery: Duration,
}

impl PortController {
    pub fn new(port: u32, events: Arc<EventSync>, timeout: Duration, requery: Duration) -> Self {
        Self {
            port,
            events,
            timeout,
            requery,
        }
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    /// Read the port definition as the hardware reports it.
    pub fn get(&self, component: &dyn IlComponent) -> RenderResult<PortDefinition> {
        component
            .get_port_definition(self.port)
            .map_err(|status| status.into_error("GetParameter(PortDefinition)"))
    }

    /// Write a port definition. Callers re-read before trusting buffer
    /// count or size.
    pub fn set(&self, component: &mut dyn IlComponent, definition: &PortDefinition) -> RenderResult<()> {
        component
            .set_port_definition(definition)
            .map_err(|status| status.into_error("SetParameter(PortDefinition)"))
    }

    /// Negotiate `geometry` on the port and mark it enabled.
    ///
    /// Only the geometry and the enabled flag are overlaid on the hardware's
    /// own definition; buffer count and size come from the re-read. A port
    /// the re-read still reports disabled needs [`enable_port`](Self::enable_port).
    pub fn negotiate(&self, component: &mut dyn IlComponent, geometry: &Geometry) -> RenderResult<PortDefinition> {
        let mut requested = self.get(component)?;
        requested.overlay_geometry(geometry);
        requested.enabled = true;
        self.set(component, &requested)?;

        let negotiated = self.get(component)?;
        if negotiated.buffer_count_actual == 0 || negotiated.buffer_size == 0 {
            return Err(RenderError::Protocol(format!(
                "port {} negotiated {} buffers of {} bytes",
                self.port, negotiated.buffer_count_actual, negotiated.buffer_size
            )));
        }
        self.events.observe_port(self.port, negotiated.enabled);
        if !negotiated.matches_geometry(geometry) {
            warn!(
                port = self.port,
                requested = %geometry,
                width = negotiated.frame_width,
                height = negotiated.frame_height,
                stride = negotiated.stride,
                "Hardware adjusted the requested geometry"
            );
        }
        info!(
            port = self.port,
            buffers = negotiated.buffer_count_actual,
            buffer_size = negotiated.buffer_size,
            "Port definition negotiated"
        );
        Ok(negotiated)
    }

    pub fn enable_port(&self, component: &mut dyn IlComponent) -> RenderResult<()> {
        debug!(port = self.port, "Enabling port");
        component
            .send_command(Command::PortEnable(self.port))
            .map_err(|status| status.into_error("SendCommand(PortEnable)"))
    }

    pub fn disable_port(&self, component: &mut dyn IlComponent) -> RenderResult<()> {
        debug!(port = self.port, "Disabling port");
        component
            .send_command(Command::PortDisable(self.port))
            .map_err(|status| status.into_error("SendCommand(PortDisable)"))
    }

    /// Block until the hardware-reported enabled flag equals `want`.
    pub fn wait_port_enabled(&self, component: &dyn IlComponent, want: bool) -> RenderResult<()> {
        let port = self.port;
        self.events.wait_with_requery(
            || format!("port {port} {}", if want { "enabled" } else { "disabled" }),
            self.timeout,
            self.requery,
            |mirror| mirror.port_enabled(port) == Some(want),
            || {
                let definition = self.get(component)?;
                if definition.enabled == want {
                    self.events.observe_port(port, want);
                    return Ok(true);
                }
                Ok(false)
            },
        )
    }

    pub fn set_fullscreen(&self, component: &mut dyn IlComponent, on: bool) -> RenderResult<()> {
        debug!(port = self.port, on, "Configuring fullscreen display region");
        component
            .set_fullscreen(self.port, on)
            .map_err(|status| status.into_error("SetConfig(DisplayRegion)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::IlCore;
    use crate::sim::{SimConfig, SimulatedCore};
    use vr_common::ErrorKind;

    fn open(config: SimConfig) -> (PortController, Box<dyn IlComponent>) {
        let events = Arc::new(EventSync::new());
        let core = SimulatedCore::new(config.clone());
        core.init().unwrap();
        let component = core.get_handle("OMX.sim.video_render", Arc::clone(&events)).unwrap();
        let ports = PortController::new(
            config.port,
            events,
            Duration::from_millis(500),
            Duration::from_millis(10),
        );
        (ports, component)
    }

    #[test]
    fn negotiation_takes_hardware_buffer_count() {
        let (ports, mut component) = open(SimConfig {
            min_buffer_count: 3,
            ..SimConfig::default()
        });
        let geometry = Geometry::new(640, 480, 640).unwrap();
        let def = ports.negotiate(component.as_mut(), &geometry).unwrap();
        assert_eq!(def.buffer_count_actual, 3);
        assert_eq!(def.slice_height, 480);
        assert!(def.buffer_size as usize >= geometry.i420_frame_size());
    }

    #[test]
    fn enable_and_disable_round_trip() {
        let (ports, mut component) = open(SimConfig {
            port_initially_enabled: false,
            ..SimConfig::default()
        });
        let geometry = Geometry::new(320, 240, 320).unwrap();
        let def = ports.negotiate(component.as_mut(), &geometry).unwrap();
        assert!(!def.enabled);
        ports.enable_port(component.as_mut()).unwrap();
        ports.wait_port_enabled(component.as_ref(), true).unwrap();

        ports.disable_port(component.as_mut()).unwrap();
        ports.wait_port_enabled(component.as_ref(), false).unwrap();
        assert!(!ports.get(component.as_ref()).unwrap().enabled);
    }

    #[test]
    fn bad_port_is_configuration_error() {
        let (_, component) = open(SimConfig::default());
        let ports = PortController::new(
            7,
            Arc::new(EventSync::new()),
            Duration::from_millis(50),
            Duration::from_millis(10),
        );
        let err = ports.get(component.as_ref()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("GetParameter"));
    }

    #[test]
    fn unsupported_display_region() {
        let (ports, mut component) = open(SimConfig {
            support_display_region: false,
            ..SimConfig::default()
        });
        let err = ports.set_fullscreen(component.as_mut(), true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
