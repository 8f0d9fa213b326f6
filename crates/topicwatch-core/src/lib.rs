//! Shared configuration, value types, and text normalization for topicwatch.

pub mod app_config;
pub mod config;
pub mod normalize;
pub mod types;

use thiserror::Error;

pub use app_config::{AppConfig, BrevoConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use normalize::{
    canonicalize_post_url, merge_csv_tokens, normalize_topic_name, split_csv, summarize_errors,
};
pub use types::{CollectionStatus, DigestFrequency, FetchedPost, Source, TopicRef};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown source: {0}")]
    InvalidSource(String),
    #[error("unknown collection status: {0}")]
    InvalidCollectionStatus(String),
    #[error("invalid digest frequency: {0}")]
    InvalidDigestFrequency(String),
}
