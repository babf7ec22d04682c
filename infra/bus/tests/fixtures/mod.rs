use hearth_bus::{
    Application, Bootstrap, BusConfig, Command, CommandError, CommandTable, CrashContext,
    CrashReporter, MessageBus, Request,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Crash collector keeping every report for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(String, CrashContext)>>,
}

impl RecordingReporter {
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.reports.lock().iter().map(|(message, _)| message.clone()).collect()
    }

    #[must_use]
    pub fn contexts(&self) -> Vec<CrashContext> {
        self.reports.lock().iter().map(|(_, context)| context.clone()).collect()
    }
}

impl CrashReporter for RecordingReporter {
    fn report(&self, message: &str, context: &CrashContext) {
        self.reports.lock().push((message.to_owned(), context.clone()));
    }
}

/// Test application exposing one command per dispatch outcome and recording
/// every event it receives.
#[derive(Debug)]
pub struct Echo {
    name: String,
    pub events: Mutex<Vec<Request>>,
    pub echo_calls: Mutex<u32>,
}

impl Echo {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self { name: name.to_owned(), events: Mutex::new(Vec::new()), echo_calls: Mutex::new(0) }
    }

    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.events.lock().iter().map(|event| event.name().to_owned()).collect()
    }
}

impl Application for Echo {
    fn name(&self) -> &str {
        &self.name
    }

    fn commands(&self) -> CommandTable<Self> {
        CommandTable::new()
            .register(Command::new("echo").required("p"), |app: Arc<Self>, params| async move {
                *app.echo_calls.lock() += 1;
                params.get::<serde_json::Value>("p")
            })
            .register(
                Command::new("greet").required("who").optional("greeting", "Hello"),
                |_, params| async move {
                    let who: String = params.get("who")?;
                    let greeting: String = params.get("greeting")?;
                    Ok(format!("{greeting}, {who}!"))
                },
            )
            .register(Command::new("status"), |app: Arc<Self>, _| async move {
                Ok(json!({ "name": app.name, "events": app.events.lock().len() }))
            })
            .register(Command::new("fail"), |_, _| async {
                Err::<(), _>(CommandError::failed("Light is unreachable"))
            })
            .register(Command::new("progress"), |_, _| async {
                Err::<(), _>(CommandError::info("Update in progress"))
            })
            .register(Command::new("fault"), |_, _| async {
                Err::<(), _>(CommandError::fault("Disk is full"))
            })
            .register(Command::new("crash"), |_, _| async {
                Err::<(), _>(CommandError::from("database handle poisoned"))
            })
            .register(Command::new("panic"), |_, params| async move {
                let message: String = params.get_opt("message")?.unwrap_or_else(|| "boom".to_owned());
                if !message.is_empty() {
                    panic!("{message}");
                }
                Ok(())
            })
            .register(Command::new("sleep").required("ms"), |_, params| async move {
                let ms: u64 = params.get("ms")?;
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(ms)
            })
    }

    async fn on_event(&self, event: &Request) -> Result<(), CommandError> {
        self.events.lock().push(event.clone());
        match event.name() {
            "test.explode" => Err(CommandError::from("event hook exploded")),
            "test.panic" => panic!("event hook panicked"),
            _ => Ok(()),
        }
    }
}

/// Application without commands or hooks.
#[derive(Debug)]
pub struct Silent(pub &'static str);

impl Application for Silent {
    fn name(&self) -> &str {
        self.0
    }
}

/// Fast-cycling configuration for client tests.
#[must_use]
pub fn fast_config() -> BusConfig {
    BusConfig::default()
        .with_pull_timeout(Duration::from_millis(10))
        .with_command_timeout(Duration::from_secs(2))
}

#[must_use]
pub fn bootstrap(config: BusConfig) -> (Bootstrap, Arc<RecordingReporter>) {
    let reporter = Arc::new(RecordingReporter::default());
    let bootstrap = Bootstrap::new(MessageBus::new(config))
        .with_crash_reporter(Arc::clone(&reporter) as Arc<dyn CrashReporter>);
    (bootstrap, reporter)
}

/// Polls `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
