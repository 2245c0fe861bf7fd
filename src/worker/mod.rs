//! Offline cache worker
//!
//! Sits between the app and the network. Install caches the app shell,
//! activate removes namespaces from older versions, and each intercepted
//! fetch is routed to one of the caching strategies.

mod controller;
mod lifecycle;
mod routing;

pub use controller::{CacheController, ControlCommand, SKIP_WAITING};
pub use lifecycle::{Registration, WorkerState};
pub use routing::ExclusionRule;
