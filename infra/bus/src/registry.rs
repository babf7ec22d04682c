use crate::envelope::Envelope;
use fxhash::FxHashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::time::Instant;

pub(crate) type Inbox = Arc<AsyncMutex<mpsc::UnboundedReceiver<Envelope>>>;

/// One attached client: its queue and when it was last active.
#[derive(Debug)]
pub(crate) struct Subscription {
    sender: mpsc::UnboundedSender<Envelope>,
    inbox: Inbox,
    last_seen: Instant,
}

impl Subscription {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, inbox: Arc::new(AsyncMutex::new(receiver)), last_seen: Instant::now() }
    }

    /// Enqueues `envelope`. Hands it back when the queue is closed.
    pub(crate) fn deliver(&self, envelope: Envelope) -> Result<(), Envelope> {
        self.sender.send(envelope).map_err(|err| err.0)
    }

    pub(crate) fn inbox(&self) -> Inbox {
        Arc::clone(&self.inbox)
    }

    fn is_expired(&self, now: Instant, lifetime: Duration) -> bool {
        lifetime.is_zero() || now.saturating_duration_since(self.last_seen) > lifetime
    }
}

/// Names attached to the bus. Owned by the router and only touched under its lock.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionRegistry {
    entries: FxHashMap<String, Subscription>,
}

impl SubscriptionRegistry {
    /// Registers `name`, or refreshes it if present. Returns `true` when new.
    pub(crate) fn add(&mut self, name: &str) -> bool {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.last_seen = Instant::now();
            return false;
        }
        self.entries.insert(name.to_owned(), Subscription::new());
        true
    }

    /// Dropping the entry closes its queue, which wakes a pending `pull`.
    pub(crate) fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Subscription> {
        self.entries.get(name)
    }

    /// Marks `name` as active and hands out its queue.
    pub(crate) fn touch(&mut self, name: &str) -> Option<Inbox> {
        let entry = self.entries.get_mut(name)?;
        entry.last_seen = Instant::now();
        Some(entry.inbox())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Subscription)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Sorted names.
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Drops entries idle for longer than `lifetime` (all of them when zero).
    pub(crate) fn purge(&mut self, lifetime: Duration) -> Vec<String> {
        let now = Instant::now();
        let mut purged = Vec::new();
        self.entries.retain(|name, entry| {
            let expired = entry.is_expired(now, lifetime);
            if expired {
                purged.push(name.clone());
            }
            !expired
        });
        purged.sort_unstable();
        purged
    }
}
