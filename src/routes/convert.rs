//! POST /api/v1/images-to-pdf

use std::path::PathBuf;
use std::time::Instant;

use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::convert::{self, ConvertOptions, ConvertSummary};
use crate::error::{AppError, Result};
use crate::files;
use crate::state::AppState;

use super::compress::{numeric, pdf_attachment_headers};

/// Convert the uploaded images into a single PDF, one page per image.
pub async fn images_to_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response> {
    let started = Instant::now();
    let mut inputs: Vec<(String, Vec<u8>)> = Vec::new();
    let mut options = ConvertOptions::default();
    let mut output_filename = "converted.pdf".to_string();

    while let Some(field) = multipart.next_field().await? {
        match field.name().unwrap_or("") {
            "files" => {
                let filename = field.file_name().unwrap_or("image").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                files::check_image_type(content_type.as_deref())?;
                state.files().check_file_size(data.len() as u64)?;
                inputs.push((filename, data.to_vec()));
            }
            "page_size" => {
                options.page_size =
                    field.text().await?.trim().parse().map_err(AppError::BadRequest)?;
            }
            "orientation" => {
                options.orientation =
                    field.text().await?.trim().parse().map_err(AppError::BadRequest)?;
            }
            "margin" => {
                options.margin_mm = field.text().await?.trim().parse().map_err(|_| {
                    AppError::BadRequest("margin must be a number of millimeters".into())
                })?;
            }
            "output_filename" => {
                output_filename = files::sanitize_filename(&field.text().await?);
            }
            _ => {}
        }
    }

    state.files().check_files_count(inputs.len())?;

    let output = state.files().temp_path(".pdf");
    let job_output = output.clone();
    let result: Result<(ConvertSummary, Vec<u8>)> = async {
        let summary = state
            .workers()
            .run(move || convert::images_to_pdf(&inputs, &job_output, &options))
            .await?
            .map_err(AppError::from)?;
        let body = tokio::fs::read(&output).await?;
        Ok((summary, body))
    }
    .await;
    state.files().cleanup(&[output]).await;
    let (summary, body) = result?;

    info!(
        page_count = summary.page_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "convert request served"
    );

    let mut headers = pdf_attachment_headers(&output_filename)?;
    headers.insert("x-processing-time-ms", numeric(started.elapsed().as_millis() as u64));
    headers.insert("x-pages-count", numeric(summary.page_count as u64));

    Ok((headers, body).into_response())
}
