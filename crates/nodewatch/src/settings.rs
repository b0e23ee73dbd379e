//! Process-wide monitor settings.
//!
//! Node registrations fall back to the defaults held here, and the scheduler
//! and dispatcher take their sizing and deadlines from it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// How often a node that stays down past its failure threshold is re-alerted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RealertPolicy {
    /// Alert on every qualifying down cycle.
    #[default]
    EveryCycle,
    /// Alert once per outage, the cycle the threshold is crossed.
    OncePerOutage,
    /// Alert at most once per `secs` while the outage lasts.
    Interval { secs: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Number of probe workers.
    pub workers: usize,
    /// Period of the due-node scan.
    pub tick_millis: u64,
    pub default_interval_secs: u64,
    pub default_timeout_secs: u64,
    pub default_failure_threshold: u32,
    /// Hard deadline for a single notifier call.
    pub notification_deadline_secs: u64,
    /// Capacity of the work queue between the scan and the workers.
    pub queue_capacity: usize,
    pub realert: RealertPolicy,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            tick_millis: 1000,
            default_interval_secs: 30,
            default_timeout_secs: 10,
            default_failure_threshold: 3,
            notification_deadline_secs: 15,
            queue_capacity: 1024,
            realert: RealertPolicy::default(),
        }
    }
}

impl MonitorSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    pub fn default_interval(&self) -> Duration {
        Duration::from_secs(self.default_interval_secs)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn notification_deadline(&self) -> Duration {
        Duration::from_secs(self.notification_deadline_secs)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        let zero = |name: &str| Err(MonitorError::Settings(format!("{name} must be greater than zero")));

        if self.workers == 0 {
            return zero("workers");
        }
        if self.tick_millis == 0 {
            return zero("tick_millis");
        }
        if self.default_interval_secs == 0 {
            return zero("default_interval_secs");
        }
        if self.default_timeout_secs == 0 {
            return zero("default_timeout_secs");
        }
        if self.default_failure_threshold == 0 {
            return zero("default_failure_threshold");
        }
        if self.notification_deadline_secs == 0 {
            return zero("notification_deadline_secs");
        }
        if self.queue_capacity == 0 {
            return zero("queue_capacity");
        }
        if let RealertPolicy::Interval { secs: 0 } = self.realert {
            return zero("realert interval");
        }

        Ok(())
    }
}
