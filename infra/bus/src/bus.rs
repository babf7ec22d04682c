use crate::config::BusConfig;
use crate::envelope::Envelope;
use crate::error::BusError;
use crate::message::{Request, Response};
use crate::registry::SubscriptionRegistry;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

const MIN_JANITOR_PERIOD: Duration = Duration::from_millis(10);
// Roughly thirty years, the same horizon tokio uses for its own far-future deadlines.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

type Parked = (Request, Option<oneshot::Sender<Response>>);

/// The router: owns every client queue and decides where a request goes.
///
/// `MessageBus` is a cheap handle; clones share the same queues. Requests are
/// broadcast when they have no target, or delivered to exactly one subscribed
/// client otherwise. Until [`MessageBus::app_configured`] runs, broadcasts are
/// held back and unicast pushes may wait for their target to subscribe.
///
/// ```rust
/// use hearth_bus::{BusConfig, MessageBus, Request, Response};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), hearth_bus::BusError> {
/// let bus = MessageBus::new(BusConfig::default());
/// bus.add_subscription("lights")?;
/// bus.app_configured();
///
/// let server = bus.clone();
/// tokio::spawn(async move {
///     let envelope = server.pull("lights", Some(Duration::from_secs(1))).await?;
///     let (_, responder) = envelope.into_parts();
///     responder.respond(Response::ok(true));
///     Ok::<_, hearth_bus::BusError>(())
/// });
///
/// let response = bus
///     .push("ui", Request::command("turn_on").to("lights"), Some(Duration::from_secs(1)))
///     .await?;
/// assert_eq!(response.and_then(|r| r.data().cloned()), Some(serde_json::json!(true)));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MessageBus {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: BusConfig,
    state: Mutex<State>,
    /// Signalled on subscription changes, configuration and stop.
    changed: Notify,
}

#[derive(Debug, Default)]
struct State {
    registry: SubscriptionRegistry,
    deferred: VecDeque<Request>,
    configured: bool,
    stopped: bool,
}

impl State {
    /// Copies `request` into every queue but its sender's. Returns the number of recipients.
    fn fan_out(&self, request: &Request, startup: bool) -> usize {
        let mut delivered = 0;
        for (name, subscription) in self.registry.iter() {
            if name == request.sender() {
                continue;
            }
            if subscription.deliver(Envelope::new(request.clone(), None, startup)).is_ok() {
                delivered += 1;
            } else {
                warn!(module = name, request = request.name(), "Broadcast dropped: queue closed");
            }
        }
        delivered
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl MessageBus {
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(Inner { config, state: Mutex::new(State::default()), changed: Notify::new() }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Attaches `name` to the bus. Re-adding a known name keeps its queue.
    ///
    /// # Errors
    /// [`BusError::InvalidParameter`] for a blank name.
    pub fn add_subscription(&self, name: &str) -> Result<(), BusError> {
        if name.trim().is_empty() {
            return Err(BusError::InvalidParameter {
                message: "Subscription name cannot be empty".into(),
                context: None,
            });
        }
        let added = self.inner.state.lock().registry.add(name);
        self.inner.changed.notify_waiters();
        if added {
            debug!(module = name, "Subscription added");
        }
        Ok(())
    }

    /// Detaches `name`. Messages still queued for it are dropped.
    ///
    /// # Errors
    /// [`BusError::InvalidModule`] when `name` is not subscribed.
    pub fn remove_subscription(&self, name: &str) -> Result<(), BusError> {
        if !self.inner.state.lock().registry.remove(name) {
            return Err(BusError::invalid_module(name));
        }
        self.inner.changed.notify_waiters();
        debug!(module = name, "Subscription removed");
        Ok(())
    }

    #[must_use]
    pub fn is_subscribed(&self, name: &str) -> bool {
        self.inner.state.lock().registry.contains(name)
    }

    /// Sorted names of every subscribed client.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.state.lock().registry.names()
    }

    /// Drops subscriptions idle for longer than the configured lifetime and
    /// returns their names.
    pub fn purge_subscriptions(&self) -> Vec<String> {
        let lifetime = self.inner.config.subscription_lifetime();
        let purged = self.inner.state.lock().registry.purge(lifetime);
        if !purged.is_empty() {
            self.inner.changed.notify_waiters();
            for name in &purged {
                warn!(module = %name, ?lifetime, "Subscription expired");
            }
        }
        purged
    }

    /// Purges expired subscriptions every `period` until the bus stops.
    pub fn spawn_janitor(&self, period: Duration) -> JoinHandle<()> {
        let bus = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period.max(MIN_JANITOR_PERIOD));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                let mut changed = pin!(bus.inner.changed.notified());
                changed.as_mut().enable();
                if bus.is_stopped() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {
                        bus.purge_subscriptions();
                    },
                    () = changed => {},
                }
            }
            debug!("Subscription janitor stopped");
        })
    }

    /// Declares every application configured. Idempotent.
    ///
    /// Broadcasts pushed while starting are flushed in arrival order to the
    /// clients subscribed right now; later subscribers never see them.
    pub fn app_configured(&self) {
        let flushed = {
            let mut state = self.inner.state.lock();
            if state.configured {
                return;
            }
            state.configured = true;
            let deferred = std::mem::take(&mut state.deferred);
            for request in &deferred {
                state.fan_out(request, true);
            }
            deferred.len()
        };
        self.inner.changed.notify_waiters();
        debug!(flushed, "Applications configured");
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.state.lock().configured
    }

    /// Number of broadcasts waiting for [`MessageBus::app_configured`].
    #[must_use]
    pub fn pending_startup_messages(&self) -> usize {
        self.inner.state.lock().deferred.len()
    }

    /// Refuses every later push. Queued messages can still be pulled.
    pub fn stop(&self) {
        let was_stopped = std::mem::replace(&mut self.inner.state.lock().stopped, true);
        self.inner.changed.notify_waiters();
        if !was_stopped {
            debug!("Bus stopped");
        }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.state.lock().stopped
    }

    /// Routes `request` on behalf of `sender`.
    ///
    /// Broadcasts and fire-and-forget unicasts (`timeout` of `None` or zero)
    /// return `Ok(None)` once queued. A unicast with a positive `timeout` waits
    /// for the target's response for at most that long, target resolution
    /// during startup included.
    ///
    /// # Errors
    /// - [`BusError::Stopped`] once [`MessageBus::stop`] has run.
    /// - [`BusError::InvalidMessage`] / [`BusError::InvalidParameter`] for a malformed request.
    /// - [`BusError::Internal`] when `sender` targets itself.
    /// - [`BusError::InvalidModule`] when the target is unknown.
    /// - [`BusError::NoResponse`] when the target does not answer, or does not subscribe
    ///   during the startup grace period.
    pub async fn push(
        &self,
        sender: &str,
        mut request: Request,
        timeout: Option<Duration>,
    ) -> Result<Option<Response>, BusError> {
        if self.is_stopped() {
            return Err(BusError::stopped());
        }
        request.validate()?;
        if sender.trim().is_empty() {
            return Err(BusError::InvalidParameter {
                message: "Sender name cannot be empty".into(),
                context: Some(request.name().to_owned().into()),
            });
        }
        request.stamp_sender(sender);

        let Some(target) = request.target().map(str::to_owned) else {
            self.broadcast(request)?;
            return Ok(None);
        };
        if target == sender {
            return Err(BusError::Internal {
                message: format!("\"{sender}\" cannot send \"{}\" to itself", request.name()).into(),
                context: None,
            });
        }

        match timeout.filter(|t| !t.is_zero()) {
            None => {
                self.enqueue(&target, request, None, None).await?;
                Ok(None)
            },
            Some(timeout) => self.request(&target, request, timeout).await.map(Some),
        }
    }

    /// Takes the next envelope queued for `name`.
    ///
    /// `None` or a zero `timeout` checks the queue once without waiting.
    /// While another positive-timeout `pull` is waiting on the same name, that
    /// waiter owns the queue and receives anything queued, so the
    /// non-blocking check reports [`BusError::NoMessageAvailable`].
    ///
    /// # Errors
    /// - [`BusError::InvalidModule`] when `name` is not subscribed.
    /// - [`BusError::NoMessageAvailable`] when nothing arrived in time.
    /// - [`BusError::Queue`] when the subscription was removed while waiting.
    pub async fn pull(&self, name: &str, timeout: Option<Duration>) -> Result<Envelope, BusError> {
        let inbox = self
            .inner
            .state
            .lock()
            .registry
            .touch(name)
            .ok_or_else(|| BusError::invalid_module(name))?;

        let received = match timeout.filter(|t| !t.is_zero()) {
            None => match inbox.try_lock() {
                Ok(mut queue) => match queue.try_recv() {
                    Ok(envelope) => Some(envelope),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => return Err(queue_closed(name)),
                },
                Err(_) => None,
            },
            Some(timeout) => {
                match tokio::time::timeout(timeout, async { inbox.lock().await.recv().await }).await {
                    Ok(Some(envelope)) => Some(envelope),
                    Ok(None) => return Err(queue_closed(name)),
                    Err(_) => None,
                }
            },
        };

        let envelope =
            received.ok_or_else(|| BusError::NoMessageAvailable { module: name.to_owned(), context: None })?;
        self.inner.state.lock().registry.touch(name);
        trace!(module = name, request = envelope.request().name(), "Envelope pulled");
        Ok(envelope)
    }

    fn broadcast(&self, request: Request) -> Result<(), BusError> {
        let mut state = self.inner.state.lock();
        if state.stopped {
            return Err(BusError::stopped());
        }
        if !state.configured {
            trace!(sender = request.sender(), request = request.name(), "Broadcast deferred until configured");
            state.deferred.push_back(request);
            return Ok(());
        }
        let recipients = state.fan_out(&request, false);
        trace!(sender = request.sender(), request = request.name(), recipients, "Broadcast delivered");
        Ok(())
    }

    async fn request(
        &self,
        target: &str,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, BusError> {
        let deadline = deadline_after(timeout);
        let diagnostic = request.clone();
        let (reply, response) = oneshot::channel();
        self.enqueue(target, request, Some(reply), Some((deadline, timeout))).await?;

        match tokio::time::timeout_at(deadline, response).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(BusError::Queue {
                message: "Reply dropped before a response was sent".into(),
                context: Some(format!("{target}:{}", diagnostic.name()).into()),
            }),
            Err(_) => {
                warn!(to = target, request = diagnostic.name(), ?timeout, "No response");
                Err(no_response(target, timeout, diagnostic))
            },
        }
    }

    /// Queues a unicast envelope, waiting for the target during the startup
    /// grace period. The wait ends at the earlier of the grace period and `deadline`.
    async fn enqueue(
        &self,
        target: &str,
        request: Request,
        reply: Option<oneshot::Sender<Response>>,
        deadline: Option<(Instant, Duration)>,
    ) -> Result<(), BusError> {
        let startup_timeout = self.inner.config.startup_timeout();
        let grace_end = deadline_after(startup_timeout);
        let (limit, waited) = match deadline {
            Some((deadline, timeout)) if deadline < grace_end => (deadline, timeout),
            _ => (grace_end, startup_timeout),
        };

        let mut parked = (request, reply);
        loop {
            let mut changed = pin!(self.inner.changed.notified());
            changed.as_mut().enable();

            parked = match self.try_enqueue(target, parked)? {
                None => return Ok(()),
                Some(parked) => parked,
            };

            trace!(to = target, request = parked.0.name(), "Target not subscribed yet");
            if tokio::time::timeout_at(limit, changed).await.is_err() {
                warn!(to = target, request = parked.0.name(), ?waited, "Target never subscribed");
                return Err(no_response(target, waited, parked.0));
            }
        }
    }

    /// Delivers `parked` if `target` is subscribed, hands it back while the
    /// bus is still starting.
    fn try_enqueue(&self, target: &str, parked: Parked) -> Result<Option<Parked>, BusError> {
        let state = self.inner.state.lock();
        if state.stopped {
            return Err(BusError::stopped());
        }
        let Some(subscription) = state.registry.get(target) else {
            if state.configured {
                return Err(BusError::invalid_module(target));
            }
            return Ok(Some(parked));
        };

        let (request, reply) = parked;
        let name = request.name().to_owned();
        subscription
            .deliver(Envelope::new(request, reply, !state.configured))
            .map_err(|_| queue_closed(target))?;
        trace!(to = target, request = %name, "Envelope queued");
        Ok(None)
    }
}

/// Saturates at a far-future instant instead of overflowing on huge timeouts.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).or_else(|| now.checked_add(FAR_FUTURE)).unwrap_or(now)
}

fn no_response(target: &str, timeout: Duration, request: Request) -> BusError {
    BusError::NoResponse { target: target.to_owned(), timeout, request: Box::new(request), context: None }
}

fn queue_closed(name: &str) -> BusError {
    BusError::Queue { message: "Queue closed".into(), context: Some(name.to_owned().into()) }
}
