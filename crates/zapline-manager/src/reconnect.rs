// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exponential backoff bookkeeping for transient disconnections.
//!
//! The supervisor only decides *whether* and *when* to retry. Arming the
//! timer and calling the adapter is the manager's job, which keeps every
//! await outside the supervisor's map.

use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use zapline_config::ReconnectConfig;
use zapline_core::InstanceId;

/// Backoff parameters. The delay before attempt `n` (1-based) is
/// `min(initial_delay * multiplier^(n-1), max_delay)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(2_000),
            multiplier: 2.0,
            max_delay: Duration::from_millis(60_000),
        }
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before `attempt` (1-based). Saturates at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let max = self.max_delay.as_millis() as f64;
        if !millis.is_finite() || millis >= max {
            self.max_delay
        } else {
            Duration::from_millis(millis.round() as u64)
        }
    }
}

/// Outcome of [`ReconnectSupervisor::plan`].
#[derive(Debug, Clone)]
pub enum ReconnectPlan {
    /// Arm a timer for `delay`; abandon it once `token` is cancelled.
    Scheduled {
        attempt: u32,
        delay: Duration,
        token: CancellationToken,
    },
    /// The attempt budget is spent; state has been cleared.
    Exhausted { attempts: u32 },
}

#[derive(Debug, Default)]
struct ReconnectState {
    attempt: u32,
    /// Token of the armed timer and the session generation it belongs to.
    pending: Option<(CancellationToken, u64)>,
}

/// Per-instance reconnect attempt counters and pending timers.
#[derive(Debug)]
pub struct ReconnectSupervisor {
    policy: ReconnectPolicy,
    states: DashMap<InstanceId, ReconnectState>,
}

impl ReconnectSupervisor {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            states: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Register a transient closure of session `generation` and decide the next step.
    ///
    /// Any timer still pending for the instance is cancelled first.
    pub fn plan(&self, instance_id: &InstanceId, generation: u64) -> ReconnectPlan {
        let mut state = self.states.entry(instance_id.clone()).or_default();
        if let Some((token, _)) = state.pending.take() {
            token.cancel();
        }

        if state.attempt >= self.policy.max_attempts {
            let attempts = state.attempt;
            drop(state);
            self.states.remove(instance_id);
            warn!(
                instance_id = %instance_id,
                attempts,
                "reconnect attempts exhausted, instance stays disconnected"
            );
            return ReconnectPlan::Exhausted { attempts };
        }

        state.attempt += 1;
        let attempt = state.attempt;
        let delay = self.policy.delay_for(attempt);
        let token = CancellationToken::new();
        state.pending = Some((token.clone(), generation));
        debug!(
            instance_id = %instance_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );
        ReconnectPlan::Scheduled {
            attempt,
            delay,
            token,
        }
    }

    /// The timer fired and is about to call the adapter. Keeps the attempt count.
    pub fn mark_fired(&self, instance_id: &InstanceId) {
        if let Some(mut state) = self.states.get_mut(instance_id) {
            state.pending = None;
        }
    }

    /// Cancel a pending timer but keep the attempt count.
    pub fn cancel(&self, instance_id: &InstanceId) {
        if let Some(mut state) = self.states.get_mut(instance_id)
            && let Some((token, _)) = state.pending.take()
        {
            token.cancel();
        }
    }

    /// Forget the instance entirely, cancelling any pending timer.
    pub fn clear(&self, instance_id: &InstanceId) {
        if let Some((_, mut state)) = self.states.remove(instance_id)
            && let Some((token, _)) = state.pending.take()
        {
            token.cancel();
        }
    }

    /// Cancel every pending timer and forget all state.
    pub fn cancel_all(&self) {
        for mut entry in self.states.iter_mut() {
            if let Some((token, _)) = entry.pending.take() {
                token.cancel();
            }
        }
        self.states.clear();
    }

    /// Attempts made since the last successful connect.
    pub fn attempt(&self, instance_id: &InstanceId) -> u32 {
        self.states.get(instance_id).map_or(0, |s| s.attempt)
    }

    pub fn has_pending(&self, instance_id: &InstanceId) -> bool {
        self.states
            .get(instance_id)
            .is_some_and(|s| s.pending.is_some())
    }

    /// Generation the pending timer of `instance_id` was armed for.
    pub fn pending_generation(&self, instance_id: &InstanceId) -> Option<u64> {
        self.states
            .get(instance_id)
            .and_then(|s| s.pending.as_ref().map(|(_, generation)| *generation))
    }

    pub fn is_tracked(&self, instance_id: &InstanceId) -> bool {
        self.states.contains_key(instance_id)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn id() -> InstanceId {
        InstanceId::from("inst")
    }

    #[test]
    fn default_delays_double_until_capped() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (1..=7)
            .map(|n| policy.delay_for(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![2_000, 4_000, 8_000, 16_000, 32_000, 60_000, 60_000]);
    }

    #[test]
    fn huge_attempt_numbers_saturate() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(u32::MAX), policy.max_delay);
    }

    #[test]
    fn plan_counts_attempts_and_exhausts() {
        let supervisor = ReconnectSupervisor::new(ReconnectPolicy {
            max_attempts: 2,
            ..ReconnectPolicy::default()
        });

        let first = supervisor.plan(&id(), 1);
        assert!(matches!(first, ReconnectPlan::Scheduled { attempt: 1, .. }));
        let second = supervisor.plan(&id(), 1);
        assert!(matches!(second, ReconnectPlan::Scheduled { attempt: 2, .. }));
        assert!(matches!(
            supervisor.plan(&id(), 1),
            ReconnectPlan::Exhausted { attempts: 2 }
        ));
        assert!(!supervisor.is_tracked(&id()));
    }

    #[test]
    fn replanning_cancels_the_previous_timer() {
        let supervisor = ReconnectSupervisor::new(ReconnectPolicy::default());
        let ReconnectPlan::Scheduled { token: first, .. } = supervisor.plan(&id(), 1) else {
            panic!("expected scheduled");
        };
        let ReconnectPlan::Scheduled { token: second, .. } = supervisor.plan(&id(), 2) else {
            panic!("expected scheduled");
        };
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(supervisor.pending_generation(&id()), Some(2));
    }

    #[test]
    fn cancel_keeps_count_and_clear_resets() {
        let supervisor = ReconnectSupervisor::new(ReconnectPolicy::default());
        let ReconnectPlan::Scheduled { token, .. } = supervisor.plan(&id(), 1) else {
            panic!("expected scheduled");
        };
        supervisor.cancel(&id());
        assert!(token.is_cancelled());
        assert!(!supervisor.has_pending(&id()));
        assert_eq!(supervisor.attempt(&id()), 1);

        supervisor.clear(&id());
        assert_eq!(supervisor.attempt(&id()), 0);
    }

    #[test]
    fn mark_fired_drops_pending_without_cancelling() {
        let supervisor = ReconnectSupervisor::new(ReconnectPolicy::default());
        let ReconnectPlan::Scheduled { token, .. } = supervisor.plan(&id(), 1) else {
            panic!("expected scheduled");
        };
        supervisor.mark_fired(&id());
        assert!(!supervisor.has_pending(&id()));
        assert!(!token.is_cancelled());
        assert_eq!(supervisor.attempt(&id()), 1);
    }

    #[test]
    fn cancel_all_cancels_every_timer() {
        let supervisor = ReconnectSupervisor::new(ReconnectPolicy::default());
        let tokens: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .filter_map(|name| match supervisor.plan(&InstanceId::from(name), 1) {
                ReconnectPlan::Scheduled { token, .. } => Some(token),
                ReconnectPlan::Exhausted { .. } => None,
            })
            .collect();
        supervisor.cancel_all();
        assert_eq!(tokens.len(), 3);
        assert!(tokens.iter().all(CancellationToken::is_cancelled));
    }

    proptest! {
        #[test]
        fn delays_are_monotonic_and_bounded(
            initial_ms in 1u64..10_000,
            extra_ms in 0u64..600_000,
            multiplier in 1.0f64..4.0,
            attempt in 1u32..64,
        ) {
            let policy = ReconnectPolicy {
                max_attempts: 64,
                initial_delay: Duration::from_millis(initial_ms),
                multiplier,
                max_delay: Duration::from_millis(initial_ms + extra_ms),
            };
            let current = policy.delay_for(attempt);
            let next = policy.delay_for(attempt + 1);
            prop_assert!(current <= next);
            prop_assert!(next <= policy.max_delay);
            prop_assert!(policy.delay_for(1) >= Duration::from_millis(initial_ms).min(policy.max_delay));
        }
    }
}
