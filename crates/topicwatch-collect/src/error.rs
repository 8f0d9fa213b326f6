use thiserror::Error;
use topicwatch_db::DbError;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("shared topic {0} not found")]
    TopicNotFound(i64),

    #[error(transparent)]
    Db(#[from] DbError),
}
