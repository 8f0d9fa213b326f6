//! Collection orchestration: source planning, cooldown, the multi-source
//! collector, and the subscribe-by-name entry point.

mod collector;
pub mod cooldown;
mod error;
pub mod plan;
pub mod service;

pub use collector::{
    CollectionSummary, CollectorConfig, Progress, SharedTopicCollector, TopicCollectionOutcome,
};
pub use cooldown::CooldownPolicy;
pub use error::CollectError;
pub use plan::{group_by_source, sources_for_topic};
pub use service::{subscribe, Subscribed};
