#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("corrupt user store: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
