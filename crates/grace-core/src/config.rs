//! grace.toml configuration parser.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! a usable configuration. Dynamic updates arrive as flat `grace.rule.*`
//! keys and are folded in with [`GraceConfig::apply_overrides`].

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConfigResult;

/// Prefix for dynamically pushed grace configuration keys.
pub const GRACE_CONFIG_PREFIX: &str = "grace.rule.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraceConfig {
    /// Master switch for all grace behaviour.
    pub enable_spring: bool,
    pub enable_warm_up: bool,
    pub enable_grace_shutdown: bool,
    /// Announce this instance's shutdown to callers through response headers.
    pub enable_offline_notify: bool,
    /// Gate readiness on warm-up completion instead of registry completion.
    pub ready_before_warm_up: bool,
    /// Warm-up window in seconds.
    pub warm_up_time: u64,
    pub warm_up_weight: i32,
    pub warm_up_curve: i32,
    /// Upper bound on the drain wait, in seconds.
    pub shutdown_wait_time: i64,
    /// Drain poll interval, in seconds.
    pub shutdown_check_time_unit: i64,
    /// How long to wait for a registry that never reports, in seconds.
    pub no_registry_max_wait_time: u64,
    /// Settle time after a registry finished registering, in seconds.
    pub registry_readiness_wait_time: u64,
    /// Dual-registry migration mode: both registries must settle.
    pub open_migration: bool,
    /// Port the grace HTTP surface listens on.
    pub http_server_port: u16,
}

impl Default for GraceConfig {
    fn default() -> Self {
        Self {
            enable_spring: false,
            enable_warm_up: false,
            enable_grace_shutdown: false,
            enable_offline_notify: false,
            ready_before_warm_up: false,
            warm_up_time: 120,
            warm_up_weight: 100,
            warm_up_curve: 2,
            shutdown_wait_time: 30,
            shutdown_check_time_unit: 1,
            no_registry_max_wait_time: 60,
            registry_readiness_wait_time: 10,
            open_migration: false,
            http_server_port: 16688,
        }
    }
}

/// Immutable view of the warm-up and readiness settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmUpPolicy {
    pub enabled: bool,
    pub ready_before_warm_up_completes: bool,
    pub warm_up_secs: u64,
    pub weight: i32,
    pub curve: i32,
    pub no_registry_max_wait_secs: u64,
    pub registry_readiness_wait_secs: u64,
    pub dual_registry_required: bool,
}

/// Immutable view of the drain settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownConfig {
    /// Master switch. When off, shutdown neither drains nor waits.
    pub enabled: bool,
    /// Observe in-flight requests while waiting; otherwise sleep the full wait.
    pub graceful: bool,
    pub wait_secs: i64,
    pub check_interval_secs: i64,
}

impl GraceConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let mut config: GraceConfig = toml::from_str(content)?;
        config.fix_grace_switch();
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Turn the master switch on when any grace feature is enabled.
    pub fn fix_grace_switch(&mut self) {
        if self.enable_warm_up || self.enable_grace_shutdown || self.enable_offline_notify {
            self.enable_spring = true;
        }
    }

    /// Fold dynamically pushed `grace.rule.*` keys into this config.
    ///
    /// Keys are matched case-insensitively with `_`/`-` ignored, so both
    /// `grace.rule.warmUpTime` and `grace.rule.warm_up_time` work. Unknown
    /// keys are skipped; unparsable values keep the current value.
    /// Returns the number of fields that changed.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, String>) -> usize {
        let mut changed = 0;
        for (key, value) in overrides {
            let Some(field) = key.strip_prefix(GRACE_CONFIG_PREFIX) else {
                continue;
            };
            let normalized: String = field
                .chars()
                .filter(|c| *c != '_' && *c != '-')
                .map(|c| c.to_ascii_lowercase())
                .collect();
            let applied = match normalized.as_str() {
                "enablespring" => set_parsed(&mut self.enable_spring, key, value),
                "enablewarmup" => set_parsed(&mut self.enable_warm_up, key, value),
                "enablegraceshutdown" => set_parsed(&mut self.enable_grace_shutdown, key, value),
                "enableofflinenotify" => set_parsed(&mut self.enable_offline_notify, key, value),
                "readybeforewarmup" => set_parsed(&mut self.ready_before_warm_up, key, value),
                "warmuptime" => set_parsed(&mut self.warm_up_time, key, value),
                "warmupweight" => set_parsed(&mut self.warm_up_weight, key, value),
                "warmupcurve" => set_parsed(&mut self.warm_up_curve, key, value),
                "shutdownwaittime" => set_parsed(&mut self.shutdown_wait_time, key, value),
                "shutdownchecktimeunit" => {
                    set_parsed(&mut self.shutdown_check_time_unit, key, value)
                }
                "noregistrymaxwaittime" => {
                    set_parsed(&mut self.no_registry_max_wait_time, key, value)
                }
                "registryreadinesswaittime" | "k8sreadinesswaittime" => {
                    set_parsed(&mut self.registry_readiness_wait_time, key, value)
                }
                "openmigration" => set_parsed(&mut self.open_migration, key, value),
                "httpserverport" => set_parsed(&mut self.http_server_port, key, value),
                _ => {
                    debug!(%key, "ignoring unknown grace config key");
                    false
                }
            };
            if applied {
                changed += 1;
            }
        }
        self.fix_grace_switch();
        changed
    }

    pub fn warm_up_policy(&self) -> WarmUpPolicy {
        WarmUpPolicy {
            enabled: self.enable_warm_up,
            ready_before_warm_up_completes: self.ready_before_warm_up,
            warm_up_secs: self.warm_up_time,
            weight: self.warm_up_weight,
            curve: self.warm_up_curve,
            no_registry_max_wait_secs: self.no_registry_max_wait_time,
            registry_readiness_wait_secs: self.registry_readiness_wait_time,
            dual_registry_required: self.open_migration,
        }
    }

    pub fn shutdown_config(&self) -> ShutdownConfig {
        ShutdownConfig {
            enabled: self.enable_spring,
            graceful: self.enable_grace_shutdown,
            wait_secs: self.shutdown_wait_time,
            check_interval_secs: self.shutdown_check_time_unit,
        }
    }
}

/// Qualify a dynamic config key with [`GRACE_CONFIG_PREFIX`] if it lacks one.
pub fn rule_key(key: &str) -> String {
    let key = key.trim();
    if key.starts_with(GRACE_CONFIG_PREFIX) {
        key.to_string()
    } else {
        format!("{GRACE_CONFIG_PREFIX}{key}")
    }
}

/// Live configuration shared by every component of a running process.
///
/// Readers take a fresh projection on each call, so overrides pushed
/// while the process runs take effect on the next evaluation.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<GraceConfig>>,
}

impl SharedConfig {
    pub fn new(mut config: GraceConfig) -> Self {
        config.fix_grace_switch();
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy of the current configuration.
    pub fn snapshot(&self) -> GraceConfig {
        self.inner.read().clone()
    }

    pub fn warm_up_policy(&self) -> WarmUpPolicy {
        self.inner.read().warm_up_policy()
    }

    pub fn shutdown_config(&self) -> ShutdownConfig {
        self.inner.read().shutdown_config()
    }

    pub fn enabled(&self) -> bool {
        self.inner.read().enable_spring
    }

    /// Whether this instance announces its own shutdown to callers.
    pub fn offline_notify_enabled(&self) -> bool {
        let config = self.inner.read();
        config.enable_spring && config.enable_offline_notify
    }

    /// Whether peer shutdown announcements are honoured.
    pub fn grace_shutdown_enabled(&self) -> bool {
        let config = self.inner.read();
        config.enable_spring && config.enable_grace_shutdown
    }

    /// Fold `grace.rule.*` overrides into the live configuration. Turning a
    /// feature on also turns the master switch on.
    pub fn apply_overrides(&self, overrides: &HashMap<String, String>) -> usize {
        let changed = {
            let mut config = self.inner.write();
            let changed = config.apply_overrides(overrides);
            config.fix_grace_switch();
            changed
        };
        if changed > 0 {
            info!(changed, "grace config updated");
        }
        changed
    }
}

fn set_parsed<T>(field: &mut T, key: &str, raw: &str) -> bool
where
    T: FromStr + PartialEq,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value != *field => {
            *field = value;
            true
        }
        Ok(_) => false,
        Err(_) => {
            warn!(%key, value = raw, "invalid grace config value, keeping current");
            false
        }
    }
}
