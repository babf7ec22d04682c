//! Kernel utilities shared by the hub binary and its applications.
//! Keep this crate lightweight; it only knows how to assemble configuration.
//!
//! ## Config loading
//! ```rust,no_run
//! use hearth_kernel::config::{HubConfig, load_config_or_defaults};
//!
//! let cfg: HubConfig = load_config_or_defaults(Some("/etc/hearth/hub")).unwrap();
//! assert!(cfg.bus.command_timeout_ms > 0);
//! ```
pub mod config;

pub use hearth_bus::BusConfig;
pub use hearth_logger::LogSettings;
