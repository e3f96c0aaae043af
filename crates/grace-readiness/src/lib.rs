//! grace-readiness — decides whether this instance may receive traffic.
//!
//! Readiness is recomputed from the shared `LifecycleClock` on every
//! poll; nothing is cached. Two gating modes exist:
//!
//! - **Warm-up gated** (`enable_warm_up` + `ready_before_warm_up`): ready
//!   once local warm-up has run for the full warm-up window.
//! - **Registry gated** (everything else): ready once the registry (or
//!   both registries in migration mode) finished registering and the
//!   settle window passed, or after a bounded wait if no registry ever
//!   reports.
//!
//! The verdict is exposed over HTTP by [`endpoint::health_router`].

pub mod endpoint;
pub mod readiness;

pub use endpoint::health_router;
pub use readiness::{NotReadyReason, Readiness, ReadinessEvaluator};
