//! Render core configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{RenderError, RenderResult};

/// What `acquire` does with a buffer that the hardware has not returned yet.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnPolicy {
    /// Block until the hardware reports the buffer as consumed (bounded by
    /// `buffer_timeout_ms`).
    #[default]
    WaitForReturn,
    /// Reclaim the buffer immediately without waiting for the return
    /// notification. Lowest latency; the hardware may still be reading it.
    FireAndForget,
}

/// Configuration of a single hardware video-render endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// IL component name passed to `GetHandle`.
    pub component_name: String,
    /// Index of the render input port.
    pub render_port: u32,
    /// Configure a fullscreen display region on enable.
    pub fullscreen: bool,
    /// Upper bound for any state transition wait.
    pub state_timeout_ms: u64,
    /// Upper bound for a port enable/disable wait.
    pub port_timeout_ms: u64,
    /// Upper bound for a buffer-returned wait.
    pub buffer_timeout_ms: u64,
    /// How often a waiter re-queries the hardware directly in case a
    /// notification never arrives.
    pub requery_interval_ms: u64,
    pub return_policy: ReturnPolicy,
    /// Explicit path to the IL library. `None` uses the platform default.
    pub library_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let broadcom = Self::is_broadcom_platform();
        Self {
            component_name: if broadcom {
                "OMX.broadcom.video_render".to_string()
            } else {
                "OMX.st.video.xvideosink".to_string()
            },
            render_port: if broadcom { 90 } else { 0 },
            fullscreen: broadcom,
            state_timeout_ms: 2000,
            port_timeout_ms: 2000,
            buffer_timeout_ms: 500,
            requery_interval_ms: 50,
            return_policy: ReturnPolicy::WaitForReturn,
            library_path: None,
        }
    }
}

impl RenderConfig {
    /// VideoCore IL (Raspberry Pi) exposes the broadcom render component.
    fn is_broadcom_platform() -> bool {
        cfg!(all(target_os = "linux", any(target_arch = "arm", target_arch = "aarch64")))
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> RenderResult<Self> {
        let config: RenderConfig = serde_json::from_str(json)?;
        config.validate()?;
        debug!(
            component = %config.component_name,
            port = config.render_port,
            "Parsed render config"
        );
        Ok(config)
    }

    /// Load a config from a JSON file.
    pub fn load(path: &Path) -> RenderResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        info!(path = %path.display(), "Render config loaded");
        Ok(config)
    }

    /// Reject configurations that can never work.
    pub fn validate(&self) -> RenderResult<()> {
        if self.component_name.is_empty() {
            return Err(RenderError::InvalidConfig(
                "component name is empty".to_string(),
            ));
        }
        for (name, value) in [
            ("state_timeout_ms", self.state_timeout_ms),
            ("port_timeout_ms", self.port_timeout_ms),
            ("buffer_timeout_ms", self.buffer_timeout_ms),
            ("requery_interval_ms", self.requery_interval_ms),
        ] {
            if value == 0 {
                return Err(RenderError::InvalidConfig(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }

    pub fn state_timeout(&self) -> Duration {
        Duration::from_millis(self.state_timeout_ms)
    }

    pub fn port_timeout(&self) -> Duration {
        Duration::from_millis(self.port_timeout_ms)
    }

    pub fn buffer_timeout(&self) -> Duration {
        Duration::from_millis(self.buffer_timeout_ms)
    }

    pub fn requery_interval(&self) -> Duration {
        Duration::from_millis(self.requery_interval_ms)
    }
}
