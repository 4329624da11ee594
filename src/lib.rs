//! Prensa
//!
//! An HTTP service for PDF processing: image recompression, document
//! merging, and image-to-PDF conversion. The compression engine walks a
//! document's image XObjects and re-encodes the ones worth shrinking as
//! JPEG, replacing each object in place only when the result is strictly
//! smaller.

pub mod compress;
pub mod config;
pub mod convert;
pub mod error;
pub mod files;
pub mod merge;
pub mod routes;
pub mod state;
pub mod workers;

pub use config::Config;
pub use error::{AppError, PdfOpError, Result};
pub use routes::app;
pub use state::AppState;
