use thiserror::Error;

/// Top-level error type for netmon.
#[derive(Error, Debug)]
pub enum NetmonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed {field}: {value:?}")]
    Malformed { field: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, NetmonError>;
