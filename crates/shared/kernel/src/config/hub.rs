use hearth_bus::BusConfig;
use hearth_logger::LogSettings;
use serde::Deserialize;

/// Top-level configuration of the hub process.
///
/// ```toml
/// [log]
/// level = "debug"
///
/// [bus]
/// startup_timeout_ms = 10000
/// subscription_lifetime_ms = 300000
/// ```
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub log: LogSettings,
    pub bus: BusConfig,
}
