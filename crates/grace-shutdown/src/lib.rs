//! grace-shutdown — graceful draining of in-flight requests.
//!
//! # Architecture
//!
//! ```text
//! ShutdownState (one per process, shared via Arc)
//!   ├── shutting_down flag (false → true, once)
//!   ├── InFlightCounter (enter/exit around every inbound request)
//!   └── announced shutdown endpoints learned from peers
//!
//! DrainCoordinator ── on termination signal
//!   └── polls the counter every check interval until it reaches zero
//!       or the wait budget runs out
//!
//! ShutdownNotifier
//!   ├── annotates outbound responses while shutting down
//!   └── records peers' announcements and evicts them from routing caches
//! ```
//!
//! The drain is best-effort: it bounds shutdown latency rather than
//! guaranteeing that every request completes.

pub mod drain;
pub mod notify;
pub mod state;

pub use drain::{DrainCoordinator, DrainOutcome, DrainReport};
pub use notify::{RoutingCacheRefresher, ShutdownNotifier};
pub use state::{InFlightCounter, RequestGuard, ShutdownState};
