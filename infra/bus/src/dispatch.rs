use crate::crash::{CrashContext, CrashReporter};
use crate::message::{Params, Response};
use fxhash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Message shown to callers for faults that do not carry their own.
pub const INTERNAL_ERROR: &str = "Internal error";
pub(crate) const MISSING_PARAMETERS: &str = "Some command parameters are missing";

/// Outcomes a command handler or event hook can signal besides success.
#[hearth_derive::hearth_error]
pub enum CommandError {
    /// A regular command failure; `message` is shown to the caller.
    #[error("{message}{}", format_context(.context))]
    Failed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Not an error: the handler reports progress or a notice without data.
    #[error("{message}{}", format_context(.context))]
    Info { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// An unexpected fault whose message is meant for the caller.
    /// Reported to the crash collector.
    #[error("{message}{}", format_context(.context))]
    Fault { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// An unexpected fault. Reported to the crash collector; the caller only sees
    /// `Internal error`.
    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl CommandError {
    pub fn failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Failed { message: message.into(), context: None }
    }

    pub fn info(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Info { message: message.into(), context: None }
    }

    pub fn fault(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Fault { message: message.into(), context: None }
    }

    /// Whether the crash collector must hear about this outcome.
    #[must_use]
    pub const fn is_unexpected(&self) -> bool {
        matches!(self, Self::Fault { .. } | Self::Internal { .. })
    }

    /// Converts the outcome into the response the caller sees, reporting
    /// unexpected faults on the way.
    pub(crate) fn into_response(self, reporter: &dyn CrashReporter, context: &CrashContext) -> Response {
        let message = self.to_string();
        if self.is_unexpected() {
            reporter.report(&message, context);
        }
        match self {
            Self::Failed { .. } | Self::Fault { .. } => Response::failure(message),
            Self::Info { .. } => Response::info(message),
            Self::Internal { .. } => Response::failure(INTERNAL_ERROR),
        }
    }
}

pub type CommandResult = Result<Value, CommandError>;

type BoxFuture = Pin<Box<dyn Future<Output = CommandResult> + Send>>;
type Handler<A> = Arc<dyn Fn(Arc<A>, Params) -> BoxFuture + Send + Sync>;

/// Declares a command name and the parameters it accepts.
///
/// ```rust
/// use hearth_bus::Command;
///
/// let command = Command::new("set_volume").required("volume").optional("mute", false);
/// assert_eq!(command.name(), "set_volume");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    required: Vec<String>,
    optional: Vec<(String, Value)>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), required: Vec::new(), optional: Vec::new() }
    }

    /// The handler never runs unless `param` is present.
    #[must_use]
    pub fn required(mut self, param: impl Into<String>) -> Self {
        self.required.push(param.into());
        self
    }

    /// `default` is filled in when the caller leaves `param` out.
    #[must_use]
    pub fn optional(mut self, param: impl Into<String>, default: impl Into<Value>) -> Self {
        self.optional.push((param.into(), default.into()));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn has_required(&self, params: &Params) -> bool {
        self.required.iter().all(|param| params.contains(param))
    }

    fn fill_defaults(&self, params: &mut Params) {
        for (param, default) in &self.optional {
            if !params.contains(param) {
                params.insert(param.clone(), default.clone());
            }
        }
    }
}

struct Entry<A> {
    command: Command,
    handler: Handler<A>,
}

/// Commands exposed by one application, looked up by name.
///
/// ```rust
/// use hearth_bus::{Command, CommandTable};
///
/// struct Lights;
///
/// let table = CommandTable::<Lights>::new()
///     .register(Command::new("turn_on").required("light_id"), |_lights, params| async move {
///         let id: String = params.get("light_id")?;
///         Ok(serde_json::json!({ "light_id": id, "on": true }))
///     });
/// assert!(table.contains("turn_on"));
/// ```
pub struct CommandTable<A> {
    entries: FxHashMap<String, Entry<A>>,
}

impl<A> fmt::Debug for CommandTable<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTable").field("commands", &self.names()).finish()
    }
}

impl<A> Default for CommandTable<A> {
    fn default() -> Self {
        Self { entries: FxHashMap::default() }
    }
}

impl<A> CommandTable<A> {
    /// Sorted command names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<A: Send + Sync + 'static> CommandTable<A> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `command`, replacing a previous registration of the same name.
    #[must_use]
    pub fn register<F, Fut, R>(mut self, command: Command, handler: F) -> Self
    where
        F: Fn(Arc<A>, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, CommandError>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let handler: Handler<A> = Arc::new(move |app, params| {
            let running = handler(app, params);
            Box::pin(async move {
                let output = running.await?;
                serde_json::to_value(output)
                    .map_err(|e| CommandError::from(format!("Unserializable command output: {e}")))
            })
        });
        self.entries.insert(command.name.clone(), Entry { command, handler });
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs `name` on behalf of `module` and turns every outcome into a [`Response`].
    ///
    /// The handler runs on its own task: a panic inside it is reported and
    /// answered with `Internal error` instead of tearing down the caller.
    pub async fn dispatch(
        &self,
        app: &Arc<A>,
        module: &str,
        name: &str,
        mut params: Params,
        reporter: &dyn CrashReporter,
    ) -> Response {
        let Some(entry) = self.entries.get(name) else {
            debug!(module, command = name, "Unknown command");
            return Response::failure(format!("Command \"{name}\" doesn't exist in \"{module}\" module"));
        };
        if !entry.command.has_required(&params) {
            debug!(module, command = name, "Command parameters missing");
            return Response::failure(MISSING_PARAMETERS);
        }
        entry.command.fill_defaults(&mut params);

        trace!(module, command = name, "Executing command");
        let handler = Arc::clone(&entry.handler);
        let app = Arc::clone(app);
        let context = CrashContext::new(module).with_operation(name);
        match run_isolated(async move { handler(app, params).await }).await {
            Ok(Ok(data)) => Response::ok(data),
            Ok(Err(err)) => err.into_response(reporter, &context),
            Err(panic) => {
                error!(module, command = name, panic = %panic, "Command handler panicked");
                CommandError::from(panic).into_response(reporter, &context)
            },
        }
    }
}

/// Runs `future` on its own task and turns a panic into its message.
pub(crate) async fn run_isolated<T: Send + 'static>(
    future: impl Future<Output = T> + Send + 'static,
) -> Result<T, String> {
    tokio::spawn(future).await.map_err(|err| {
        if err.is_panic() { panic_message(&*err.into_panic()) } else { "Task cancelled".to_owned() }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Unknown panic".to_owned())
}
