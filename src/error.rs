use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("couldn't find maximum approved date")]
    MissingMaxApprovedDate,

    #[error("couldn't find maximum user id")]
    MissingMaxUserId,

    #[error("failed to read configuration file: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to parse configuration file: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("failed to install statsd recorder: {0}")]
    Metrics(String)
}
