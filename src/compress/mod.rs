//! PDF compression engine
//!
//! The pipeline: load, enumerate image XObjects, run each through the
//! recompression policy, strip document metadata, and serialize with
//! compact numbering and object/xref streams. Per-image failures are
//! tallied, never fatal; only a document that cannot be parsed or
//! written aborts the run.

pub mod assembler;
pub mod codec;
pub mod policy;
pub mod scanner;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info};

use crate::error::PdfOpError;
use policy::{DedupCache, ImageOutcome};

/// Named quality presets exposed by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    Low,
    #[default]
    Medium,
    High,
    Maximum,
}

impl CompressionLevel {
    /// JPEG quality for this preset. Higher compression means lower
    /// quality.
    pub fn quality(self) -> u8 {
        match self {
            CompressionLevel::Low => 90,
            CompressionLevel::Medium => 75,
            CompressionLevel::High => 60,
            CompressionLevel::Maximum => 40,
        }
    }
}

impl FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(CompressionLevel::Low),
            "medium" => Ok(CompressionLevel::Medium),
            "high" => Ok(CompressionLevel::High),
            "maximum" => Ok(CompressionLevel::Maximum),
            other => Err(format!(
                "unknown compression level '{other}' (expected low, medium, high, or maximum)"
            )),
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompressionLevel::Low => "low",
            CompressionLevel::Medium => "medium",
            CompressionLevel::High => "high",
            CompressionLevel::Maximum => "maximum",
        };
        f.write_str(s)
    }
}

/// Knobs for one compression run.
#[derive(Debug, Clone)]
pub struct CompressOptions {
    pub level: CompressionLevel,
    /// Explicit JPEG quality. Overrides the preset when set; clamped to
    /// 10..=100.
    pub quality: Option<u8>,
    /// Drop the document info dictionary and XMP metadata stream.
    pub remove_metadata: bool,
    /// Compact object numbering in the output.
    pub linearize: bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        CompressOptions {
            level: CompressionLevel::default(),
            quality: None,
            remove_metadata: false,
            linearize: true,
        }
    }
}

impl CompressOptions {
    pub fn effective_quality(&self) -> u8 {
        self.quality.unwrap_or_else(|| self.level.quality()).clamp(10, 100)
    }
}

/// Per-image tallies for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageStats {
    pub total: usize,
    pub replaced: usize,
    pub from_cache: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// What a compression run did, for response headers and logs.
#[derive(Debug, Clone)]
pub struct CompressionSummary {
    pub original_size: u64,
    pub compressed_size: u64,
    pub page_count: usize,
    pub images: ImageStats,
}

impl CompressionSummary {
    /// Size reduction as a percentage of the original, floored at zero.
    pub fn reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        let saved = self.original_size.saturating_sub(self.compressed_size);
        saved as f64 / self.original_size as f64 * 100.0
    }
}

/// Compress the PDF at `input`, writing the result to `output`.
pub fn compress_pdf(
    input: &Path,
    output: &Path,
    options: &CompressOptions,
) -> Result<CompressionSummary, PdfOpError> {
    let original_size = std::fs::metadata(input)
        .map_err(|e| PdfOpError::Processing(format!("stat input: {e}")))?
        .len();

    let mut doc = assembler::load_document(input)?;
    let page_count = doc.get_pages().len();
    let quality = options.effective_quality();

    let candidates = scanner::collect_candidates(&doc);
    let mut cache = DedupCache::new();
    let mut images = ImageStats {
        total: candidates.len(),
        ..ImageStats::default()
    };

    for candidate in &candidates {
        match policy::process_candidate(&mut doc, candidate, quality, &mut cache) {
            ImageOutcome::Replaced { .. } => images.replaced += 1,
            ImageOutcome::ReplacedFromCache { .. } => images.from_cache += 1,
            ImageOutcome::Rejected { .. } => images.rejected += 1,
            ImageOutcome::Skipped(_) => images.skipped += 1,
            ImageOutcome::Failed(msg) => {
                images.failed += 1;
                debug!(id = candidate.id.0, error = %msg, "image recompression failed");
            }
        }
    }

    if options.remove_metadata {
        assembler::strip_metadata(&mut doc);
    }
    assembler::write_document(&mut doc, output, options.linearize)?;

    let compressed_size = std::fs::metadata(output)
        .map_err(|e| PdfOpError::Processing(format!("stat output: {e}")))?
        .len();

    let summary = CompressionSummary {
        original_size,
        compressed_size,
        page_count,
        images,
    };
    info!(
        original_size,
        compressed_size,
        page_count,
        images_total = images.total,
        images_replaced = images.replaced + images.from_cache,
        reduction_percent = format!("{:.1}", summary.reduction_percent()),
        "compressed document"
    );
    Ok(summary)
}
