//! grace-warmup — traffic weighting for instances that are warming up.
//!
//! A freshly started instance publishes warm-up metadata (injection time,
//! window, target weight, curve) to its registry. Callers selecting among
//! candidate instances turn that metadata into a weight that ramps from 1
//! to the target over the window, then draw a candidate proportionally.
//!
//! # Architecture
//!
//! ```text
//! WarmUpBalancer
//!   ├── InjectionTimeCache (host:port:injectTime → stable warm-up start)
//!   ├── InstanceWarmUpMetadata::from_map() → window / weight / curve
//!   ├── curve::instance_weight() → per-candidate weight
//!   └── selector::choose() → weighted random pick
//! ```
//!
//! When every candidate has finished warming up the balancer returns
//! `None` so the caller keeps its own default selection.

pub mod balancer;
pub mod cache;
pub mod curve;
pub mod metadata;
pub mod selector;

pub use balancer::{Instance, InstanceWeight, WarmUpBalancer, WarmUpCandidate};
pub use cache::InjectionTimeCache;
pub use curve::{instance_weight, weight};
pub use metadata::{InstanceWarmUpMetadata, warm_up_metadata};
pub use selector::choose;
