//! Readiness evaluation.
//!
//! A stateless function of the lifecycle timestamps, the policy, and the
//! current instant. It never fails: a missing timestamp only means the
//! corresponding gate has not opened yet.

use std::sync::Arc;

use grace_core::time::secs_to_millis;
use grace_core::{LifecycleClock, SharedConfig, WarmUpPolicy, epoch_millis};

/// Why an instance is not ready yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    /// Warm-up gating is on but warm-up has not begun.
    WarmUpNotStarted,
    /// Warm-up has begun but the window has not elapsed.
    WarmingUp,
    /// No registry has reported and the bounded wait has not elapsed.
    AwaitingRegistry,
    /// The primary registry finished but its settle window is still open.
    FirstRegistrySettling,
    /// Migration mode: the secondary registry has not settled.
    SecondRegistrySettling,
}

impl NotReadyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotReadyReason::WarmUpNotStarted => "warm_up_not_started",
            NotReadyReason::WarmingUp => "warming_up",
            NotReadyReason::AwaitingRegistry => "awaiting_registry",
            NotReadyReason::FirstRegistrySettling => "first_registry_settling",
            NotReadyReason::SecondRegistrySettling => "second_registry_settling",
        }
    }
}

/// Verdict of a single readiness evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady(NotReadyReason),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }

    fn gate(open: bool, reason: NotReadyReason) -> Self {
        if open {
            Readiness::Ready
        } else {
            Readiness::NotReady(reason)
        }
    }
}

#[derive(Debug, Clone)]
enum PolicySource {
    Fixed(WarmUpPolicy),
    Live(SharedConfig),
}

/// Evaluates readiness for this process.
#[derive(Debug, Clone)]
pub struct ReadinessEvaluator {
    source: PolicySource,
    clock: Arc<LifecycleClock>,
}

impl ReadinessEvaluator {
    /// Evaluator with a policy fixed for its lifetime.
    pub fn new(policy: WarmUpPolicy, clock: Arc<LifecycleClock>) -> Self {
        Self {
            source: PolicySource::Fixed(policy),
            clock,
        }
    }

    /// Evaluator that re-reads the policy from `config` on every call.
    pub fn live(config: SharedConfig, clock: Arc<LifecycleClock>) -> Self {
        Self {
            source: PolicySource::Live(config),
            clock,
        }
    }

    /// Policy in effect right now.
    pub fn policy(&self) -> WarmUpPolicy {
        match &self.source {
            PolicySource::Fixed(policy) => *policy,
            PolicySource::Live(config) => config.warm_up_policy(),
        }
    }

    pub fn clock(&self) -> &Arc<LifecycleClock> {
        &self.clock
    }

    /// Whether the instance is ready at `now_ms`.
    pub fn is_ready(&self, now_ms: u64) -> bool {
        self.evaluate(now_ms).is_ready()
    }

    /// Whether the instance is ready right now.
    pub fn is_ready_now(&self) -> bool {
        self.is_ready(epoch_millis())
    }

    /// Full verdict at `now_ms`, including the reason when not ready.
    pub fn evaluate(&self, now_ms: u64) -> Readiness {
        let policy = self.policy();
        if policy.enabled && policy.ready_before_warm_up_completes {
            return match self.clock.start_warm_up_time() {
                None => Readiness::NotReady(NotReadyReason::WarmUpNotStarted),
                Some(started) => Readiness::gate(
                    elapsed_at_least(now_ms, started, policy.warm_up_secs),
                    NotReadyReason::WarmingUp,
                ),
            };
        }
        self.evaluate_registry(&policy, now_ms)
    }

    fn evaluate_registry(&self, policy: &WarmUpPolicy, now_ms: u64) -> Readiness {
        let Some(first_finish) = self.clock.registry_finish_time() else {
            return Readiness::gate(
                self.no_registry_wait_elapsed(policy, now_ms),
                NotReadyReason::AwaitingRegistry,
            );
        };

        let wait = policy.registry_readiness_wait_secs;
        if !elapsed_at_least(now_ms, first_finish, wait) {
            return Readiness::NotReady(NotReadyReason::FirstRegistrySettling);
        }
        if !policy.dual_registry_required {
            return Readiness::Ready;
        }

        let second_ready = match self.clock.second_registry_finish_time() {
            Some(second_finish) => elapsed_at_least(now_ms, second_finish, wait),
            None => self.no_registry_wait_elapsed(policy, now_ms),
        };
        Readiness::gate(second_ready, NotReadyReason::SecondRegistrySettling)
    }

    fn no_registry_wait_elapsed(&self, policy: &WarmUpPolicy, now_ms: u64) -> bool {
        elapsed_at_least(
            now_ms,
            self.clock.start_time(),
            policy.no_registry_max_wait_secs,
        )
    }
}

/// `now - since >= secs`, signed so a `since` in the future never passes
/// a positive wait.
fn elapsed_at_least(now_ms: u64, since_ms: u64, secs: u64) -> bool {
    let elapsed = i128::from(now_ms) - i128::from(since_ms);
    elapsed >= i128::from(secs_to_millis(secs))
}
