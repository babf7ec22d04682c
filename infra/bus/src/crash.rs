use std::fmt::Debug;
use tracing::error;

/// Where a fault happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashContext {
    pub module: String,
    /// Command or event name being processed, if any.
    pub operation: Option<String>,
}

impl CrashContext {
    pub fn new(module: impl Into<String>) -> Self {
        Self { module: module.into(), operation: None }
    }

    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }
}

/// Collector for unexpected faults raised by command handlers and event hooks.
pub trait CrashReporter: Debug + Send + Sync + 'static {
    fn report(&self, message: &str, context: &CrashContext);
}

/// Default collector: emits one structured `error` event per fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCrashReporter;

impl CrashReporter for LogCrashReporter {
    fn report(&self, message: &str, context: &CrashContext) {
        error!(
            module = %context.module,
            operation = context.operation.as_deref().unwrap_or("-"),
            fault = message,
            "Unexpected fault"
        );
    }
}
