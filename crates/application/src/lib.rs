//! Sentinel DNS application layer: ports, snapshots, the decision engine,
//! and runtime telemetry.
pub mod catalog;
pub mod engine;
pub mod ports;
pub mod snapshot;
pub mod telemetry;

pub use catalog::AppCatalog;
pub use engine::{evaluate, resolve_client, EffectivePolicy, ResolvedClient};
pub use snapshot::{BlocklistInfo, PolicySnapshot, RulesIndex};
pub use telemetry::{CountersSnapshot, RuntimeCounters};
