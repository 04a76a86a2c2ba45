//! Error types for qrstudio operations

use thiserror::Error;

/// Result type alias using qrstudio's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for qrstudio operations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote store request failed (lookup, insert, update)
    #[error("Store error: {0}")]
    Store(String),

    /// AI provider returned an error or an unusable response
    #[error("{0}")]
    Ai(String),

    /// AI drafting requested without an API key
    #[error("AI text generation is not configured")]
    AiNotConfigured,

    /// Input rejected before reaching the network
    #[error("Validation error: {0}")]
    Validation(String),

    /// QR code encoding failed
    #[error("Failed to encode QR code: {0}")]
    QrEncode(String),

    /// Image processing error
    #[error("Image processing error: {0}")]
    Image(String),

    /// PDF assembly error
    #[error("PDF error: {0}")]
    Pdf(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}

impl From<qrcode::types::QrError> for Error {
    fn from(e: qrcode::types::QrError) -> Self {
        Error::QrEncode(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Other(format!("JSON error: {}", e))
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Validation(format!("Invalid color: {}", e))
    }
}

impl From<lopdf::Error> for Error {
    fn from(e: lopdf::Error) -> Self {
        Error::Pdf(e.to_string())
    }
}
