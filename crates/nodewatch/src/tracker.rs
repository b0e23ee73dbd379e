//! Up/down state tracking.
//!
//! [`apply`] is the only place a node record changes after registration. The
//! stored status always follows the latest probe; the failure threshold only
//! gates the downtime alert.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::node::{Node, NodeStatus};
use crate::probe::ProbeOutcome;
use crate::settings::RealertPolicy;

/// Facts about a down to up transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovery {
    /// Start of the outage, if it was ever recorded.
    pub went_down_at: Option<DateTime<Utc>>,
    pub recovered_at: DateTime<Utc>,
    pub downtime: Duration,
}

/// What changed when a probe outcome was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub previous_status: NodeStatus,
    pub status_changed: bool,
    /// Set exactly when the node went from down to up.
    pub recovery: Option<Recovery>,
    /// The node is down at or past its threshold and the re-alert policy
    /// allows another alert.
    pub downtime_alert: bool,
}

pub fn apply(
    previous: &Node,
    outcome: &ProbeOutcome,
    now: DateTime<Utc>,
    policy: RealertPolicy,
) -> (Node, Transition) {
    let mut node = previous.clone();
    let new_status = outcome.status;
    let status_changed = previous.status != new_status;

    node.last_checked = Some(now);
    if status_changed {
        node.last_status_change = Some(match previous.last_status_change {
            Some(last) if last > now => last,
            _ => now,
        });
    }
    node.status = new_status;

    let mut recovery = None;
    let mut downtime_alert = false;

    match new_status {
        NodeStatus::Up => {
            node.failure_count = 0;
            node.last_seen_up = Some(now);
            node.last_downtime_alert = None;

            if previous.status == NodeStatus::Down {
                let downtime = previous
                    .last_status_change
                    .and_then(|went_down| (now - went_down).to_std().ok())
                    .unwrap_or_default();
                recovery = Some(Recovery {
                    went_down_at: previous.last_status_change,
                    recovered_at: now,
                    downtime,
                });
            }
        }
        NodeStatus::Down => {
            node.failure_count = previous.failure_count.saturating_add(1);

            if node.failure_count >= node.failure_threshold
                && realert_due(previous.last_downtime_alert, now, policy)
            {
                downtime_alert = true;
                node.last_downtime_alert = Some(now);
            }
        }
    }

    let transition =
        Transition { previous_status: previous.status, status_changed, recovery, downtime_alert };
    (node, transition)
}

fn realert_due(last_alert: Option<DateTime<Utc>>, now: DateTime<Utc>, policy: RealertPolicy) -> bool {
    let Some(last_alert) = last_alert else {
        return true;
    };
    match policy {
        RealertPolicy::EveryCycle => true,
        RealertPolicy::OncePerOutage => false,
        RealertPolicy::Interval { secs } => (now - last_alert)
            .to_std()
            .is_ok_and(|elapsed| elapsed >= Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::node::ProtocolKind;

    fn node(threshold: u32) -> Node {
        Node::new("peer0", "peer0", "peer0.org1:7051", ProtocolKind::Consensus)
            .with_interval(Duration::from_secs(10))
            .with_timeout(Duration::from_secs(2))
            .with_failure_threshold(threshold)
    }

    fn down() -> ProbeOutcome {
        ProbeOutcome::down(
            Duration::from_millis(5),
            ProbeError::Handshake("unexpected EOF".into()),
        )
    }

    fn up() -> ProbeOutcome {
        ProbeOutcome::up(Duration::from_millis(7))
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    #[test]
    fn test_failure_counter_increments_and_resets() {
        let start = Utc::now();
        let mut current = node(3);

        for cycle in 1..=4 {
            let (next, _) = apply(&current, &down(), start + secs(cycle), RealertPolicy::EveryCycle);
            assert_eq!(next.failure_count, cycle as u32);
            assert_eq!(next.status, NodeStatus::Down);
            current = next;
        }

        let (next, _) = apply(&current, &up(), start + secs(5), RealertPolicy::EveryCycle);
        assert_eq!(next.failure_count, 0);
        assert_eq!(next.status, NodeStatus::Up);
        assert_eq!(next.last_checked, Some(start + secs(5)));
    }

    #[test]
    fn test_downtime_alert_waits_for_threshold() {
        let start = Utc::now();
        let mut current = node(3);
        let mut alerts = Vec::new();

        for cycle in 1..=3 {
            let (next, transition) =
                apply(&current, &down(), start + secs(cycle), RealertPolicy::EveryCycle);
            alerts.push(transition.downtime_alert);
            current = next;
        }

        assert_eq!(alerts, vec![false, false, true]);
        // Status is stored as down from the first failure on.
        assert_eq!(current.last_status_change, Some(start + secs(1)));
    }

    #[test]
    fn test_realert_policies() {
        let start = Utc::now();
        let cases = [
            (RealertPolicy::EveryCycle, vec![true, true, true, true]),
            (RealertPolicy::OncePerOutage, vec![true, false, false, false]),
            (RealertPolicy::Interval { secs: 20 }, vec![true, false, true, false]),
        ];

        for (policy, expected) in cases {
            let mut current = node(1);
            let mut alerts = Vec::new();
            for cycle in 0..4 {
                let (next, transition) = apply(&current, &down(), start + secs(cycle * 10), policy);
                alerts.push(transition.downtime_alert);
                current = next;
            }
            assert_eq!(alerts, expected, "policy {policy:?}");
        }
    }

    #[test]
    fn test_recovery_only_after_down() {
        let start = Utc::now();

        let (up_again, transition) = apply(&node(3), &up(), start, RealertPolicy::EveryCycle);
        assert!(transition.recovery.is_none());
        assert!(!transition.status_changed);

        let (went_down, transition) =
            apply(&up_again, &down(), start + secs(10), RealertPolicy::EveryCycle);
        assert!(transition.status_changed);
        assert!(transition.recovery.is_none());

        let (recovered, transition) =
            apply(&went_down, &up(), start + secs(70), RealertPolicy::EveryCycle);
        let recovery = transition.recovery.expect("down to up must report a recovery");
        assert_eq!(transition.previous_status, NodeStatus::Down);
        assert_eq!(recovery.went_down_at, Some(start + secs(10)));
        assert_eq!(recovery.recovered_at, start + secs(70));
        assert_eq!(recovery.downtime, Duration::from_secs(60));
        assert_eq!(recovered.last_status_change, Some(start + secs(70)));
        assert_eq!(recovered.last_seen_up, Some(start + secs(70)));
    }

    #[test]
    fn test_recovery_clears_alert_state() {
        let start = Utc::now();
        let (down_node, _) = apply(&node(1), &down(), start, RealertPolicy::OncePerOutage);
        assert_eq!(down_node.last_downtime_alert, Some(start));

        let (up_node, _) = apply(&down_node, &up(), start + secs(1), RealertPolicy::OncePerOutage);
        assert_eq!(up_node.last_downtime_alert, None);

        let (_, transition) =
            apply(&up_node, &down(), start + secs(2), RealertPolicy::OncePerOutage);
        assert!(transition.downtime_alert, "a new outage alerts again");
    }

    #[test]
    fn test_status_change_never_moves_backwards() {
        let start = Utc::now();
        let mut current = node(3);
        current.last_status_change = Some(start + secs(100));

        let (next, _) = apply(&current, &down(), start, RealertPolicy::EveryCycle);
        assert_eq!(next.last_status_change, Some(start + secs(100)));
    }
}
