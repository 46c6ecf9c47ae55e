use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Transaction store unavailable: {0}")]
    SourceUnavailable(#[from] rusqlite::Error),

    #[error("Invalid parameter '{name}': {value} is outside {allowed}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        allowed: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type GraphResult<T> = Result<T, GraphError>;
