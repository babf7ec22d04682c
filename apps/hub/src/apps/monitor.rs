use hearth_bus::{Application, Command, CommandError, CommandTable, Request};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

pub const MONITOR: &str = "monitor";

/// Logs every event crossing the bus and keeps a count.
#[derive(Debug, Default)]
pub struct MonitorApp {
    events: AtomicU64,
    core_events: AtomicU64,
}

impl MonitorApp {
    #[must_use]
    pub fn events_seen(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }
}

impl Application for MonitorApp {
    fn name(&self) -> &str {
        MONITOR
    }

    fn commands(&self) -> CommandTable<Self> {
        CommandTable::new().register(Command::new("get_stats"), |app: Arc<Self>, _| async move {
            Ok(json!({
                "events": app.events.load(Ordering::Relaxed),
                "core_events": app.core_events.load(Ordering::Relaxed),
            }))
        })
    }

    async fn on_event(&self, event: &Request) -> Result<(), CommandError> {
        self.events.fetch_add(1, Ordering::Relaxed);
        if event.is_core_event() {
            self.core_events.fetch_add(1, Ordering::Relaxed);
        }
        info!(
            event = event.name(),
            sender = event.sender(),
            device_id = event.device_id(),
            core = event.is_core_event(),
            external = event.is_external(),
            "Event observed"
        );
        Ok(())
    }
}
