use crate::bootstrap::Bootstrap;
use crate::bus::MessageBus;
use crate::crash::{CrashContext, CrashReporter};
use crate::dispatch::{CommandError, CommandTable, run_isolated};
use crate::envelope::Envelope;
use crate::error::BusError;
use crate::message::{Params, Request, Response};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

const MIN_PULL_TIMEOUT: Duration = Duration::from_millis(10);

/// A component living on the bus.
///
/// Commands are declared once through [`Application::commands`]; events
/// arrive through [`Application::on_event`].
pub trait Application: Send + Sync + Sized + 'static {
    /// Unique client name on the bus.
    fn name(&self) -> &str;

    fn commands(&self) -> CommandTable<Self> {
        CommandTable::new()
    }

    /// Called once per received event. Errors and panics are reported and
    /// never stop the processing loop.
    fn on_event(&self, event: &Request) -> impl Future<Output = Result<(), CommandError>> + Send {
        let _ = event;
        async { Ok(()) }
    }
}

/// Runs one [`Application`] on the bus: owns its processing loop and sends on
/// its behalf.
///
/// Clones share the same loop.
pub struct BusClient<A: Application> {
    inner: Arc<ClientInner<A>>,
    worker: Arc<Mutex<Option<Worker>>>,
}

struct ClientInner<A: Application> {
    name: String,
    app: Arc<A>,
    commands: CommandTable<A>,
    bus: MessageBus,
    reporter: Arc<dyn CrashReporter>,
}

#[derive(Debug)]
struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl<A: Application> Clone for BusClient<A> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner), worker: Arc::clone(&self.worker) }
    }
}

impl<A: Application> fmt::Debug for BusClient<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusClient")
            .field("name", &self.inner.name)
            .field("commands", &self.inner.commands)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<A: Application> BusClient<A> {
    pub fn new(app: impl Into<Arc<A>>, bootstrap: &Bootstrap) -> Self {
        let app = app.into();
        let inner = ClientInner {
            name: app.name().to_owned(),
            commands: app.commands(),
            app,
            bus: bootstrap.bus.clone(),
            reporter: Arc::clone(&bootstrap.crash_reporter),
        };
        Self { inner: Arc::new(inner), worker: Arc::new(Mutex::new(None)) }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn app(&self) -> &Arc<A> {
        &self.inner.app
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.lock().as_ref().is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Subscribes the client and spawns its processing loop. No-op when running.
    ///
    /// # Errors
    /// [`BusError::InvalidParameter`] when the application name is blank.
    pub fn start(&self) -> Result<(), BusError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }
        self.inner.bus.add_subscription(&self.inner.name)?;

        let (shutdown, signal) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&self.inner).run(signal));
        *worker = Some(Worker { shutdown, handle });
        debug!(module = %self.inner.name, "Client started");
        Ok(())
    }

    /// Ends the processing loop, waits for it and unsubscribes.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        worker.shutdown.send_replace(true);
        if let Err(err) = worker.handle.await {
            warn!(module = %self.inner.name, error = %err, "Processing loop did not end cleanly");
        }
        if let Err(err) = self.inner.bus.remove_subscription(&self.inner.name) {
            debug!(module = %self.inner.name, error = %err, "Already unsubscribed");
        }
        debug!(module = %self.inner.name, "Client stopped");
    }

    /// [`BusClient::send_command_with_timeout`] with the configured command timeout.
    ///
    /// # Errors
    /// See [`MessageBus::push`].
    pub async fn send_command(&self, command: &str, to: &str, params: Params) -> Result<Response, BusError> {
        let timeout = self.inner.bus.config().command_timeout();
        self.send_command_with_timeout(command, to, params, timeout).await
    }

    /// Runs `command` on `to` and waits up to `timeout` for its response.
    ///
    /// Commands addressed to this client run locally, without the queue. A zero
    /// `timeout` sends without waiting and yields an empty response.
    ///
    /// # Errors
    /// See [`MessageBus::push`].
    pub async fn send_command_with_timeout(
        &self,
        command: &str,
        to: &str,
        params: Params,
        timeout: Duration,
    ) -> Result<Response, BusError> {
        let mut request = Request::command(command).to(to).with_params(params);
        if to == self.inner.name {
            request.validate()?;
            request.stamp_sender(&self.inner.name);
            trace!(module = %self.inner.name, command, "Dispatching locally");
            return Ok(self.inner.execute(request).await);
        }
        let response = self.inner.bus.push(&self.inner.name, request, Some(timeout)).await?;
        Ok(response.unwrap_or_else(Response::empty))
    }

    /// Emits an event, broadcast unless `to` is given. Never waits for recipients.
    ///
    /// # Errors
    /// See [`MessageBus::push`].
    pub async fn send_event(
        &self,
        event: &str,
        params: Params,
        to: Option<&str>,
        device_id: Option<&str>,
    ) -> Result<Response, BusError> {
        let mut request = Request::event(event).with_params(params);
        if let Some(device_id) = device_id {
            request = request.with_device_id(device_id);
        }
        self.emit(request, to).await
    }

    /// Broadcasts an event originated by the platform itself.
    ///
    /// # Errors
    /// See [`MessageBus::push`].
    pub async fn send_core_event(&self, event: &str, params: Params) -> Result<Response, BusError> {
        self.emit(Request::event(event).with_params(params).as_core_event(), None).await
    }

    /// Emits an event relayed from an external peer described by `peer_infos`.
    ///
    /// # Errors
    /// See [`MessageBus::push`].
    pub async fn send_external_event(
        &self,
        event: &str,
        params: Params,
        peer_infos: Params,
        to: Option<&str>,
    ) -> Result<Response, BusError> {
        self.emit(Request::event(event).with_params(params).with_peer_infos(peer_infos), to).await
    }

    /// Pushes a prebuilt request as this client.
    ///
    /// # Errors
    /// [`BusError::Internal`] when the request targets this client, otherwise
    /// see [`MessageBus::push`].
    pub async fn push(&self, request: Request, timeout: Option<Duration>) -> Result<Option<Response>, BusError> {
        if request.target() == Some(self.inner.name.as_str()) {
            return Err(BusError::Internal {
                message: "A client cannot push to itself".into(),
                context: Some(self.inner.name.clone().into()),
            });
        }
        self.inner.bus.push(&self.inner.name, request, timeout).await
    }

    async fn emit(&self, mut request: Request, to: Option<&str>) -> Result<Response, BusError> {
        if let Some(to) = to {
            request = request.to(to);
        }
        let broadcast = request.is_broadcast();
        self.inner.bus.push(&self.inner.name, request, None).await?;
        Ok(if broadcast { Response::broadcast() } else { Response::empty() })
    }
}

impl<A: Application> ClientInner<A> {
    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let pull_timeout = self.bus.config().pull_timeout().max(MIN_PULL_TIMEOUT);
        debug!(module = %self.name, "Processing loop started");
        loop {
            let pulled = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                pulled = self.bus.pull(&self.name, Some(pull_timeout)) => pulled,
            };
            match pulled {
                Ok(envelope) => self.handle(envelope).await,
                Err(BusError::NoMessageAvailable { .. }) => {},
                Err(err) => {
                    error!(module = %self.name, error = %err, "Processing loop ended");
                    break;
                },
            }
        }
        debug!(module = %self.name, "Processing loop finished");
    }

    async fn handle(&self, envelope: Envelope) {
        let (request, responder) = envelope.into_parts();
        let response = if request.is_command() {
            self.execute(request).await
        } else {
            self.notify(request).await;
            Response::empty()
        };
        responder.respond(response);
    }

    async fn execute(&self, request: Request) -> Response {
        let name = request.name().to_owned();
        let params = request.params().clone();
        self.commands.dispatch(&self.app, &self.name, &name, params, self.reporter.as_ref()).await
    }

    async fn notify(&self, event: Request) {
        let context = CrashContext::new(&self.name).with_operation(event.name());
        let app = Arc::clone(&self.app);
        trace!(module = %self.name, event = event.name(), sender = event.sender(), "Event received");

        match run_isolated(async move { app.on_event(&event).await }).await {
            Ok(Ok(())) => {},
            Ok(Err(CommandError::Info { message, .. })) => {
                debug!(module = %self.name, event = ?context.operation, %message, "Event hook notice");
            },
            Ok(Err(err)) => {
                let message = err.to_string();
                error!(module = %self.name, event = ?context.operation, error = %message, "Event hook failed");
                self.reporter.report(&message, &context);
            },
            Err(panic) => {
                error!(module = %self.name, event = ?context.operation, panic = %panic, "Event hook panicked");
                self.reporter.report(&panic, &context);
            },
        }
    }
}
