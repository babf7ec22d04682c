mod monitor;
mod system;

pub use monitor::{MONITOR, MonitorApp};
pub use system::{SYSTEM, SystemApp};
