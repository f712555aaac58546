//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings for the supervisor runtime.
//!
//! ## Sentinel values
//! - `grace = 0s` → shutdown does not wait; anything still running is reported as stuck
//! - `retired_capacity = 0` → finished monitors are dropped from the registry immediately

use std::sync::Arc;
use std::time::Duration;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `node_id`: Cluster node recorded as the owner of every monitor started here
/// - `grace`: Maximum wait for tasks to stop on shutdown
/// - `cancel_timeout`: Default bound for the waiting part of `Supervisor::cancel`
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `retired_capacity`: How many finished monitors stay queryable (`0` = none)
/// - `history_capacity`: Size of the default in-memory run history (min 1)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Node that owns the monitors created by this supervisor.
    pub node_id: Arc<str>,

    /// Maximum time to wait for graceful shutdown.
    ///
    /// On shutdown every active task is asked to cancel, then the supervisor waits up
    /// to `grace`; tasks still running afterwards are reported via
    /// `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// How long `Supervisor::cancel` waits for a task to honor the request.
    pub cancel_timeout: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` messages skip older items.
    pub bus_capacity: usize,

    /// Number of finished monitors kept for late status queries.
    pub retired_capacity: usize,

    /// Capacity of the default [`InMemoryHistory`](crate::InMemoryHistory).
    pub history_capacity: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the shutdown grace as an `Option`.
    ///
    /// - `None` → do not wait
    /// - `Some(d)` → wait up to `d`
    #[inline]
    pub fn shutdown_grace(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }

    /// Returns a history capacity clamped to a minimum of 1.
    #[inline]
    pub fn history_capacity_clamped(&self) -> usize {
        self.history_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `node_id = "local"`
    /// - `grace = 60s`
    /// - `cancel_timeout = 10s`
    /// - `bus_capacity = 1024`
    /// - `retired_capacity = 64`
    /// - `history_capacity = 256`
    fn default() -> Self {
        Self {
            node_id: Arc::from("local"),
            grace: Duration::from_secs(60),
            cancel_timeout: Duration::from_secs(10),
            bus_capacity: 1024,
            retired_capacity: 64,
            history_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        let cfg = Config {
            grace: Duration::ZERO,
            bus_capacity: 0,
            history_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.shutdown_grace(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.history_capacity_clamped(), 1);
        assert_eq!(Config::default().shutdown_grace(), Some(Duration::from_secs(60)));
    }
}
