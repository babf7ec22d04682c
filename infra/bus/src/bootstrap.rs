use crate::bus::MessageBus;
use crate::crash::{CrashReporter, LogCrashReporter};
use std::sync::Arc;

/// Everything an application needs to talk to the platform.
///
/// Cloned into every [`BusClient`](crate::BusClient); both handles are shared.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    pub bus: MessageBus,
    pub crash_reporter: Arc<dyn CrashReporter>,
}

impl Bootstrap {
    /// Bundles `bus` with the logging crash collector.
    #[must_use]
    pub fn new(bus: MessageBus) -> Self {
        Self { bus, crash_reporter: Arc::new(LogCrashReporter) }
    }

    #[must_use]
    pub fn with_crash_reporter(mut self, reporter: Arc<dyn CrashReporter>) -> Self {
        self.crash_reporter = reporter;
        self
    }
}
