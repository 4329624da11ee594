//! Error types for the Prensa server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors raised by the document-processing operations themselves
/// (compression, merging, conversion), independent of HTTP concerns.
#[derive(Error, Debug)]
pub enum PdfOpError {
    /// The input could not be opened or parsed as a PDF.
    #[error("Invalid or corrupted PDF file: {0}")]
    InvalidPdf(String),

    /// Any other failure during processing or serialization.
    #[error("Processing error: {0}")]
    Processing(String),
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Pdf(#[from] PdfOpError),

    #[error("File size exceeds maximum allowed size of {max_mb}MB")]
    FileTooLarge { max_mb: u64 },

    #[error("File type '{0}' not allowed")]
    UnsupportedFileType(String),

    #[error("Too many files. Maximum allowed: {0}")]
    TooManyFiles(usize),

    #[error("No files provided")]
    NoFiles,

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Convert(#[from] crate::convert::ConvertError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Upload(err.to_string())
    }
}

impl From<crate::workers::WorkerError> for AppError {
    fn from(err: crate::workers::WorkerError) -> Self {
        AppError::Pdf(PdfOpError::Processing(err.to_string()))
    }
}

/// Error response body: `{"success": false, "error": "<message>"}`
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Pdf(PdfOpError::InvalidPdf(_)) => StatusCode::BAD_REQUEST,
            AppError::Pdf(PdfOpError::Processing(msg)) => {
                tracing::error!(error = %msg, "processing failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::TooManyFiles(_) | AppError::NoFiles => StatusCode::BAD_REQUEST,
            AppError::Upload(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Convert(crate::convert::ConvertError::InvalidImage { .. }) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Convert(crate::convert::ConvertError::Pdf(e)) => match e {
                PdfOpError::InvalidPdf(_) => StatusCode::BAD_REQUEST,
                PdfOpError::Processing(msg) => {
                    tracing::error!(error = %msg, "conversion failed");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::Io(e) => {
                tracing::error!(error = %e, "io error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}
