use thiserror::Error;
use topicwatch_db::DbError;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("email provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error(transparent)]
    Db(#[from] DbError),
}
