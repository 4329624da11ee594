//! Route modules for the Prensa server

pub mod compress;
pub mod convert;
pub mod health;
pub mod merge;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    // Browser clients need the result headers readable cross-origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            header::CONTENT_DISPOSITION,
            HeaderName::from_static("x-processing-time-ms"),
            HeaderName::from_static("x-original-size"),
            HeaderName::from_static("x-compressed-size"),
            HeaderName::from_static("x-compression-ratio"),
            HeaderName::from_static("x-pages-count"),
            HeaderName::from_static("x-total-pages"),
            HeaderName::from_static("x-files-merged"),
        ]);

    // Room for a full batch of maximum-size uploads plus multipart framing.
    let body_limit = state.files().max_file_size() as usize
        * state.config().files.max_files_count
        + 1024 * 1024;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::health_check))
        .route("/api/v1/compress-pdf", post(compress::compress_pdf))
        .route("/api/v1/merge-pdfs", post(merge::merge_pdfs))
        .route("/api/v1/images-to-pdf", post(convert::images_to_pdf))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Interpret a multipart text field as a flag.
pub(crate) fn parse_bool(value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(AppError::BadRequest(format!(
            "expected a boolean, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_fields_accept_form_spellings() {
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool("ON").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }
}
