//! graced — HTTP front end for the grace lifecycle crates.
//!
//! # Architecture
//!
//! ```text
//! graced run
//!   ├── GraceContext (config, LifecycleClock, ShutdownState, notifier, balancer)
//!   ├── api::build_router()
//!   │     ├── track_requests middleware → in-flight count + shutdown markers
//!   │     ├── /grace/health            → grace-readiness
//!   │     ├── /grace/lifecycle/*       → LifecycleClock
//!   │     ├── /grace/notify            → ShutdownNotifier
//!   │     └── /grace/select            → WarmUpBalancer
//!   └── on SIGTERM / Ctrl-C → DrainCoordinator::run()
//! ```

pub mod api;
pub mod context;

pub use api::build_router;
pub use context::GraceContext;
