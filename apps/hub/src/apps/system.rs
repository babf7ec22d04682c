use hearth_bus::{Application, Command, CommandTable, MessageBus};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::time::Instant;

pub const SYSTEM: &str = "system";

/// Built-in application answering platform-level queries.
#[derive(Debug)]
pub struct SystemApp {
    bus: MessageBus,
    started: Instant,
}

impl SystemApp {
    #[must_use]
    pub fn new(bus: MessageBus) -> Self {
        Self { bus, started: Instant::now() }
    }
}

impl Application for SystemApp {
    fn name(&self) -> &str {
        SYSTEM
    }

    fn commands(&self) -> CommandTable<Self> {
        CommandTable::new()
            .register(Command::new("ping"), |_, _| async { Ok("pong") })
            .register(Command::new("echo").required("p"), |_, params| async move {
                params.get::<Value>("p")
            })
            .register(Command::new("get_modules"), |app: Arc<Self>, _| async move {
                Ok(app.bus.subscriptions())
            })
            .register(Command::new("uptime"), |app: Arc<Self>, _| async move {
                Ok(json!({ "seconds": app.started.elapsed().as_secs() }))
            })
    }
}
