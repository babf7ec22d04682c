use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_SUBSCRIPTION_LIFETIME_MS: u64 = 600_000;
const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_PULL_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_PURGE_INTERVAL_MS: u64 = 60_000;

/// Timing knobs of the bus. Every value is in milliseconds so it can be set from
/// a config file or `HEARTH__BUS__*` environment variables.
///
/// `startup_timeout_ms` and `subscription_lifetime_ms` accept `0` for immediate,
/// deterministic behavior in tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Grace period for unicast targets that have not subscribed yet, before
    /// applications are configured.
    pub startup_timeout_ms: u64,
    /// Idle time after which a subscription may be purged.
    pub subscription_lifetime_ms: u64,
    /// Default timeout of [`BusClient::send_command`](crate::BusClient::send_command).
    pub command_timeout_ms: u64,
    /// How long a client loop waits on its queue before cycling.
    pub pull_timeout_ms: u64,
    /// Period of the subscription janitor.
    pub purge_interval_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
            subscription_lifetime_ms: DEFAULT_SUBSCRIPTION_LIFETIME_MS,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            pull_timeout_ms: DEFAULT_PULL_TIMEOUT_MS,
            purge_interval_ms: DEFAULT_PURGE_INTERVAL_MS,
        }
    }
}

impl BusConfig {
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    #[must_use]
    pub const fn subscription_lifetime(&self) -> Duration {
        Duration::from_millis(self.subscription_lifetime_ms)
    }

    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    #[must_use]
    pub const fn pull_timeout(&self) -> Duration {
        Duration::from_millis(self.pull_timeout_ms)
    }

    #[must_use]
    pub const fn purge_interval(&self) -> Duration {
        Duration::from_millis(self.purge_interval_ms)
    }

    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout_ms = duration_ms(timeout);
        self
    }

    #[must_use]
    pub fn with_subscription_lifetime(mut self, lifetime: Duration) -> Self {
        self.subscription_lifetime_ms = duration_ms(lifetime);
        self
    }

    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = duration_ms(timeout);
        self
    }

    #[must_use]
    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout_ms = duration_ms(timeout);
        self
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
