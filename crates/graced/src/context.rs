//! Process-wide grace context.
//!
//! Built once at startup and cloned into every handler. All shared
//! state lives behind `Arc`, so clones are cheap and observe the same
//! clock, shutdown flag, live configuration and injection-time cache.

use std::sync::Arc;

use grace_core::{GraceConfig, LifecycleClock, SharedConfig, build_endpoint};
use grace_readiness::ReadinessEvaluator;
use grace_shutdown::{DrainCoordinator, ShutdownNotifier, ShutdownState};
use grace_warmup::WarmUpBalancer;

#[derive(Clone)]
pub struct GraceContext {
    pub config: SharedConfig,
    pub clock: Arc<LifecycleClock>,
    pub shutdown: Arc<ShutdownState>,
    pub readiness: Arc<ReadinessEvaluator>,
    pub notifier: ShutdownNotifier,
    pub balancer: Arc<WarmUpBalancer>,
}

impl GraceContext {
    /// Assemble the context for a service instance reachable at `host:port`.
    pub fn new(config: GraceConfig, service_name: &str, host: &str, port: u16) -> Self {
        Self::with_clock(config, service_name, host, port, LifecycleClock::started_now())
    }

    pub fn with_clock(
        config: GraceConfig,
        service_name: &str,
        host: &str,
        port: u16,
        clock: LifecycleClock,
    ) -> Self {
        let grace_address = build_endpoint(host, config.http_server_port);
        let config = SharedConfig::new(config);
        let clock = Arc::new(clock);
        let shutdown = Arc::new(ShutdownState::new());
        let readiness = Arc::new(ReadinessEvaluator::live(config.clone(), clock.clone()));

        let local_endpoint = build_endpoint(host, port);
        let notifier = ShutdownNotifier::new(
            shutdown.clone(),
            config.clone(),
            &local_endpoint,
            service_name,
            &grace_address,
        );

        Self {
            config,
            clock,
            shutdown,
            readiness,
            notifier,
            balancer: Arc::new(WarmUpBalancer::new()),
        }
    }

    /// Drain coordinator using the drain settings in effect right now.
    pub fn drain_coordinator(&self) -> DrainCoordinator {
        DrainCoordinator::new(self.config.shutdown_config(), self.shutdown.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn addresses_derive_from_host_and_ports() {
        let config = GraceConfig {
            http_server_port: 17000,
            ..GraceConfig::default()
        };
        let ctx = GraceContext::new(config, "orders", "10.0.0.1", 8080);
        let headers = ctx.notifier.outgoing_headers();
        assert_eq!(headers[grace_core::GRACE_ADDRESS_HEADER], "10.0.0.1:17000");
    }

    #[test]
    fn clones_share_state() {
        let ctx = GraceContext::new(GraceConfig::default(), "orders", "127.0.0.1", 8080);
        let other = ctx.clone();
        ctx.shutdown.begin_shutdown();
        assert!(other.shutdown.is_shutting_down());
        assert!(Arc::ptr_eq(&ctx.clock, other.readiness.clock()));
    }

    #[test]
    fn drain_coordinator_reads_current_settings() {
        let ctx = GraceContext::new(GraceConfig::default(), "orders", "127.0.0.1", 8080);
        ctx.config.apply_overrides(&HashMap::from([(
            "grace.rule.shutdownWaitTime".to_string(),
            "7".to_string(),
        )]));
        assert_eq!(ctx.config.shutdown_config().wait_secs, 7);
        assert_eq!(ctx.readiness.policy(), ctx.config.warm_up_policy());
    }
}
