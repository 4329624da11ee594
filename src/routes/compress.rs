//! POST /api/v1/compress-pdf

use std::path::PathBuf;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::compress::{self, CompressOptions, CompressionSummary};
use crate::error::{AppError, PdfOpError, Result};
use crate::files;
use crate::state::AppState;

use super::parse_bool;

/// Recompress the embedded raster images of one uploaded PDF.
pub async fn compress_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response> {
    let started = Instant::now();
    let mut upload: Option<(String, Bytes)> = None;
    let mut options = CompressOptions::default();

    while let Some(field) = multipart.next_field().await? {
        match field.name().unwrap_or("") {
            "file" => {
                let filename = field.file_name().unwrap_or("document.pdf").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                files::check_pdf_type(content_type.as_deref(), &filename)?;
                state.files().check_file_size(data.len() as u64)?;
                upload = Some((filename, data));
            }
            "level" => {
                options.level = field.text().await?.trim().parse().map_err(AppError::BadRequest)?;
            }
            "quality" => {
                let quality: u8 = field.text().await?.trim().parse().map_err(|_| {
                    AppError::BadRequest("quality must be an integer between 10 and 100".into())
                })?;
                options.quality = Some(quality);
            }
            "remove_metadata" => {
                options.remove_metadata = parse_bool(&field.text().await?)?;
            }
            "linearize" => {
                options.linearize = parse_bool(&field.text().await?)?;
            }
            _ => {}
        }
    }

    let (filename, data) = upload.ok_or(AppError::NoFiles)?;
    let input = state.files().save_bytes(&data, ".pdf").await?;
    let output = state.files().temp_path(".pdf");

    let result = run_compression(&state, input.clone(), output.clone(), options).await;
    state.files().cleanup(&[input, output]).await;
    // The engine only sees the anonymous temp file; key parse errors by
    // the uploaded name.
    let (summary, body) = result.map_err(|err| match err {
        AppError::Pdf(PdfOpError::InvalidPdf(msg)) => {
            AppError::Pdf(PdfOpError::InvalidPdf(format!("{filename}: {msg}")))
        }
        other => other,
    })?;

    info!(
        filename = %filename,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "compress request served"
    );

    let attachment = format!("{}_compressed.pdf", files::file_stem(&filename));
    let mut headers = pdf_attachment_headers(&attachment)?;
    headers.insert("x-processing-time-ms", numeric(started.elapsed().as_millis() as u64));
    headers.insert("x-original-size", numeric(summary.original_size));
    headers.insert("x-compressed-size", numeric(summary.compressed_size));
    headers.insert(
        "x-compression-ratio",
        HeaderValue::from_str(&format!("{:.1}", summary.reduction_percent()))
            .unwrap_or_else(|_| HeaderValue::from_static("0.0")),
    );
    headers.insert("x-pages-count", numeric(summary.page_count as u64));

    Ok((headers, body).into_response())
}

async fn run_compression(
    state: &AppState,
    input: PathBuf,
    output: PathBuf,
    options: CompressOptions,
) -> Result<(CompressionSummary, Vec<u8>)> {
    let job_output = output.clone();
    let summary = state
        .workers()
        .run(move || compress::compress_pdf(&input, &job_output, &options))
        .await??;
    let body = tokio::fs::read(&output).await?;
    Ok((summary, body))
}

pub(super) fn pdf_attachment_headers(filename: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
            .map_err(|_| AppError::BadRequest("invalid output filename".into()))?,
    );
    Ok(headers)
}

pub(super) fn numeric(value: u64) -> HeaderValue {
    HeaderValue::from(value)
}
