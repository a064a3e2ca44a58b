use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parsing error")]
    Parse,
    /// Storage error shows label and error message
    #[error("Storage error: {0} {1}")]
    Storage(String, String),
    #[error("Rehydration error: {0}")]
    Rehydration(String),
    #[error("Image error: {0}")]
    Image(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for AppError {
    fn from(_: serde_json::Error) -> Self {
        Self::Parse
    }
}
