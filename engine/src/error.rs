use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document not found: {0}")]
    DocumentNotFound(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
