//! Shutdown announcement between peers.
//!
//! While this instance drains, every response it serves carries its own
//! endpoint in [`MARK_SHUTDOWN_SERVICE_ENDPOINT`]. Callers that see the
//! header record the endpoint and ask their routing cache to stop sending
//! traffic there, so load moves away before the instance disappears from
//! the registry.

use std::sync::Arc;

use http::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use grace_core::{
    GRACE_ADDRESS_HEADER, GRACE_OFFLINE_SOURCE_KEY, GRACE_OFFLINE_SOURCE_VALUE,
    MARK_SHUTDOWN_SERVICE_ENDPOINT, MARK_SHUTDOWN_SERVICE_NAME, SharedConfig,
};

use crate::state::ShutdownState;

/// Routing-cache collaborator told to drop a peer that is shutting down.
pub trait RoutingCacheRefresher: Send + Sync {
    /// Stop routing to `endpoint`. `services` lists the service names the
    /// endpoint is known under (the called service and any announced ones).
    fn evict(&self, endpoint: &str, services: &[String]);
}

/// Adds and interprets shutdown announcement headers.
#[derive(Clone)]
pub struct ShutdownNotifier {
    state: Arc<ShutdownState>,
    config: SharedConfig,
    refresher: Option<Arc<dyn RoutingCacheRefresher>>,
    /// This instance's `host:port` as seen by callers.
    local_endpoint: String,
    service_name: String,
    /// This instance's grace address (`ip:http_server_port`).
    grace_address: String,
}

impl ShutdownNotifier {
    pub fn new(
        state: Arc<ShutdownState>,
        config: SharedConfig,
        local_endpoint: &str,
        service_name: &str,
        grace_address: &str,
    ) -> Self {
        Self {
            state,
            config,
            refresher: None,
            local_endpoint: local_endpoint.to_string(),
            service_name: service_name.to_string(),
            grace_address: grace_address.to_string(),
        }
    }

    /// Set the routing-cache collaborator.
    pub fn with_refresher(mut self, refresher: Arc<dyn RoutingCacheRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn state(&self) -> &Arc<ShutdownState> {
        &self.state
    }

    /// Add shutdown markers to a response this instance is serving.
    ///
    /// No-op unless offline notification is enabled and shutdown has begun.
    pub fn annotate_response(&self, headers: &mut HeaderMap) {
        if !self.state.is_shutting_down() || !self.config.offline_notify_enabled() {
            return;
        }
        insert(headers, MARK_SHUTDOWN_SERVICE_ENDPOINT, &self.local_endpoint);
        insert(headers, MARK_SHUTDOWN_SERVICE_NAME, &self.service_name);
    }

    /// Headers to attach to outgoing calls so peers can address announcements.
    pub fn outgoing_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        insert(&mut headers, GRACE_ADDRESS_HEADER, &self.grace_address);
        insert(&mut headers, GRACE_OFFLINE_SOURCE_KEY, GRACE_OFFLINE_SOURCE_VALUE);
        headers
    }

    /// Inspect a peer's response for a shutdown announcement.
    ///
    /// Returns the announced endpoint if the response carried one. The
    /// routing cache is asked to evict it the first time it is seen.
    /// Announcements are ignored unless graceful shutdown is enabled.
    pub fn record_peer_response(
        &self,
        headers: &HeaderMap,
        target_service: Option<&str>,
    ) -> Option<String> {
        if !self.config.grace_shutdown_enabled() {
            return None;
        }
        let endpoint = headers
            .get(MARK_SHUTDOWN_SERVICE_ENDPOINT)?
            .to_str()
            .ok()?
            .trim()
            .to_string();
        if endpoint.is_empty() {
            return None;
        }

        if self.state.add_shutdown_endpoint(&endpoint) {
            let mut services: Vec<String> = target_service.map(str::to_string).into_iter().collect();
            for value in headers.get_all(MARK_SHUTDOWN_SERVICE_NAME) {
                if let Ok(name) = value.to_str() {
                    if !services.iter().any(|s| s == name) {
                        services.push(name.to_string());
                    }
                }
            }
            match &self.refresher {
                Some(refresher) => refresher.evict(&endpoint, &services),
                None => debug!(%endpoint, "no routing cache registered for shutdown eviction"),
            }
        }
        Some(endpoint)
    }
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => warn!(header = name, %value, "value is not a valid header"),
    }
}
