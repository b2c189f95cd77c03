// SPDX-License-Identifier: MPL-2.0

//! Error types for the compression core and the command line front end

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Compression pipeline errors
    #[error("Compression error: {0}")]
    Compression(#[from] VideoCompressionError),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
    /// Storage/filesystem errors
    #[error("Storage error: {0}")]
    Storage(String),
    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the compression pipeline
///
/// Every internal failure maps to exactly one of these kinds. Only the first
/// error of a session reaches the completion callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VideoCompressionError {
    /// The container or track configuration is not supported
    #[error("container track configuration not supported")]
    NotSupported,
    /// The compression session could not be created
    #[error("compression session could not be created")]
    SessionInitFailure,
    /// The container writer could not be constructed or started
    #[error("container writer could not be initialized")]
    WriterInitFailure,
    /// An operation needed a live compression session and there was none
    #[error("no compression session")]
    NoCompressSession,
    /// The encoder reported a bad status, dropped the frame, or produced
    /// no usable output
    #[error("frame compression failed")]
    CompressionFailure,
    /// The input frame carried no decodable image
    #[error("input frame has no image")]
    ImageMissing,
    /// The container writer rejected a sample or could not finalize the file
    #[error("container writer failed: {0}")]
    WriterFailure(String),
    /// The pipeline was driven out of order by its caller
    #[error("operation not valid in pipeline state {0}")]
    InvalidState(String),
}

/// Still image side channel errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum PhotoError {
    /// Pixel data could not be converted for encoding
    #[error("Unsupported pixel data: {0}")]
    UnsupportedFormat(String),
    /// Encoding failed
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
    /// Save failed
    #[error("Save failed: {0}")]
    SaveFailed(String),
}

/// Errors reported by encoder and muxer backends
///
/// Backends never decide how a failure is reported to the caller; the
/// encoder and writer wrappers map these onto [`VideoCompressionError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Backend is not available on this system
    #[error("Backend not available: {0}")]
    NotAvailable(String),
    /// Failed to initialize the backend session
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
    /// The session refused a property, frame or sample
    #[error("Rejected: {0}")]
    Rejected(String),
    /// The backend timed out
    #[error("Timed out: {0}")]
    Timeout(String),
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(String),
    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

// Conversion from String for backward compatibility
impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for PhotoError {
    fn from(err: std::io::Error) -> Self {
        PhotoError::SaveFailed(err.to_string())
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err.to_string())
    }
}

impl From<gstreamer::glib::Error> for BackendError {
    fn from(err: gstreamer::glib::Error) -> Self {
        BackendError::InitializationFailed(err.to_string())
    }
}

impl From<gstreamer::glib::BoolError> for BackendError {
    fn from(err: gstreamer::glib::BoolError) -> Self {
        BackendError::Other(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Short label used in logs for an error kind
pub struct ErrorKind<'a>(pub &'a VideoCompressionError);

impl fmt::Display for ErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.0 {
            VideoCompressionError::NotSupported => "NotSupported",
            VideoCompressionError::SessionInitFailure => "SessionInitFailure",
            VideoCompressionError::WriterInitFailure => "WriterInitFailure",
            VideoCompressionError::NoCompressSession => "NoCompressSession",
            VideoCompressionError::CompressionFailure => "CompressionFailure",
            VideoCompressionError::ImageMissing => "ImageMissing",
            VideoCompressionError::WriterFailure(_) => "WriterFailure",
            VideoCompressionError::InvalidState(_) => "InvalidState",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_error_converts_to_app_error() {
        let err: AppError = VideoCompressionError::CompressionFailure.into();
        assert!(matches!(
            err,
            AppError::Compression(VideoCompressionError::CompressionFailure)
        ));
    }

    #[test]
    fn test_error_kind_labels() {
        let err = VideoCompressionError::WriterFailure("disk full".into());
        assert_eq!(ErrorKind(&err).to_string(), "WriterFailure");
        assert_eq!(err.to_string(), "container writer failed: disk full");
    }
}
