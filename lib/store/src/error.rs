use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    /// Primary key or unique-field violation.
    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("backend error: {0}")]
    Backend(String),
}
