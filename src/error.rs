use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("epoch source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("delegation directory query failed: {0}")]
    DirectoryQueryFailed(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("failed to fetch rewards for transaction {transaction_id} after {attempts} attempts: {reason}")]
    RewardFetchFailed {
        transaction_id: String,
        attempts: u32,
        reason: String,
    },

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write report: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }
}
