use thiserror::Error;

#[derive(Error, Debug)]
pub enum ElocuteError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid Rollup Options: {0}")]
    InvalidOptions(String),
}

pub type Result<T> = std::result::Result<T, ElocuteError>;
