//! POST /api/v1/merge-pdfs

use std::path::PathBuf;
use std::time::Instant;

use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::error::{AppError, Result};
use crate::files;
use crate::merge::{merge_paths, MergeSummary};
use crate::state::AppState;

use super::compress::{numeric, pdf_attachment_headers};
use super::parse_bool;

/// Concatenate the uploaded PDFs, in upload order, into one document.
pub async fn merge_pdfs(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response> {
    let started = Instant::now();
    let mut inputs: Vec<(String, PathBuf)> = Vec::new();
    let mut output_filename = "merged.pdf".to_string();
    let mut add_bookmarks = true;

    let result = async {
        while let Some(field) = multipart.next_field().await? {
            match field.name().unwrap_or("") {
                "files" => {
                    let filename = field.file_name().unwrap_or("document.pdf").to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await?;
                    files::check_pdf_type(content_type.as_deref(), &filename)?;
                    state.files().check_file_size(data.len() as u64)?;
                    let path = state.files().save_bytes(&data, ".pdf").await?;
                    inputs.push((filename, path));
                }
                "output_filename" => {
                    output_filename = files::sanitize_filename(&field.text().await?);
                }
                "add_bookmarks" => {
                    add_bookmarks = parse_bool(&field.text().await?)?;
                }
                _ => {}
            }
        }

        state.files().check_files_count(inputs.len())?;
        if inputs.len() < 2 {
            return Err(AppError::BadRequest(
                "merging requires at least two PDF files".into(),
            ));
        }

        let output = state.files().temp_path(".pdf");
        let job_inputs = inputs.clone();
        let job_output = output.clone();
        let summary: MergeSummary = state
            .workers()
            .run(move || merge_paths(&job_inputs, &job_output, add_bookmarks))
            .await??;
        let body = tokio::fs::read(&output).await?;
        Ok((output, summary, body))
    }
    .await;

    let mut temp: Vec<PathBuf> = inputs.into_iter().map(|(_, path)| path).collect();
    let outcome = match result {
        Ok((output, summary, body)) => {
            temp.push(output);
            Ok((summary, body))
        }
        Err(e) => Err(e),
    };
    state.files().cleanup(&temp).await;
    let (summary, body) = outcome?;

    info!(
        file_count = summary.file_count,
        page_count = summary.page_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "merge request served"
    );

    let mut headers = pdf_attachment_headers(&output_filename)?;
    headers.insert("x-processing-time-ms", numeric(started.elapsed().as_millis() as u64));
    headers.insert("x-total-pages", numeric(summary.page_count as u64));
    headers.insert("x-files-merged", numeric(summary.file_count as u64));

    Ok((headers, body).into_response())
}
