use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("record schema v{found} is newer than supported v{supported}")]
    UnsupportedSchema { found: u32, supported: u32 },
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}
