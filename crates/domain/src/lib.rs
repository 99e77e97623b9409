//! Sentinel DNS domain layer: policy vocabulary, decisions, and config.
pub mod apps;
pub mod blocklist;
pub mod client;
pub mod config;
pub mod decision;
pub mod errors;
pub mod name;
pub mod pause;
pub mod query_log;
pub mod rewrite;
pub mod rule;
pub mod schedule;

pub use apps::GlobalAppsSetting;
pub use blocklist::{Blocklist, ListMode};
pub use client::{ClientPolicy, ClientProfile};
pub use config::{BindMode, Config, ForwardOptions, UpstreamConfig};
pub use decision::{blocklist_marker, AllowReason, Decision, Scope};
pub use errors::DomainError;
pub use pause::ProtectionPause;
pub use query_log::{ListenerTransport, QueryRecord, QueryStatus};
pub use rewrite::{Rewrite, RewriteTable};
pub use rule::{Rule, RuleKind, RuleScope};
pub use schedule::{DaySet, Schedule, ScheduleEffect, ScheduleMode};
