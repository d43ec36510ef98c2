use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad page size: expected {expected} bytes, got {got}")]
    BadPageSize { expected: usize, got: usize },

    #[error("writer already active")]
    WriterBusy,

    #[error("WAL corruption: {0}")]
    Corruption(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
