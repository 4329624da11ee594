//! Recompression policy
//!
//! Decides, per candidate image, whether to recompress and applies the
//! replacement in place. Individual image failures never abort the
//! document; they are reported as outcomes and the original object is
//! left untouched.

use std::collections::HashMap;

use lopdf::{dictionary, Document, Object, Stream};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::codec::{self, EncodedJpeg};
use super::scanner::{ColorSpaceKind, ImageCandidate, PdfFilter};

/// Minimum edge length for recompression candidates.
pub const MIN_DIMENSION_PX: u32 = 50;
/// Minimum stored stream size for recompression candidates.
pub const MIN_STREAM_BYTES: usize = 10 * 1024;
/// Longest edge after downscaling.
pub const MAX_DIMENSION_PX: u32 = 2000;
/// Bytes of stored stream content hashed for the dedup fingerprint.
const FINGERPRINT_PREFIX: usize = 1024;

/// Why an image was left alone without attempting a recompression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Already DCT or JPX encoded.
    AlreadyCompressed,
    ZeroDimension,
    TooSmall,
    BelowSizeThreshold,
}

/// The result of running one candidate through the policy.
#[derive(Debug)]
pub enum ImageOutcome {
    /// Replaced with a freshly encoded JPEG.
    Replaced { old_size: usize, new_size: usize },
    /// Replaced with a payload found in the dedup cache.
    ReplacedFromCache { old_size: usize, new_size: usize },
    /// Recompression produced a payload no smaller than the original.
    Rejected { old_size: usize, new_size: usize },
    Skipped(SkipReason),
    /// Decode or encode failed; the original object is untouched.
    Failed(String),
}

/// Identity of a recompression result: hash of the first KiB of stored
/// content plus the quality it was encoded at. The prefix is a heuristic;
/// streams sharing their first KiB but diverging later would collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    prefix_hash: [u8; 32],
    quality: u8,
}

impl Fingerprint {
    fn of(content: &[u8], quality: u8) -> Self {
        let prefix = &content[..content.len().min(FINGERPRINT_PREFIX)];
        let digest = Sha256::digest(prefix);
        Fingerprint {
            prefix_hash: digest.into(),
            quality,
        }
    }

    fn short_hex(&self) -> String {
        hex::encode(&self.prefix_hash[..8])
    }
}

#[derive(Clone)]
struct CachedJpeg {
    data: Vec<u8>,
    width: u32,
    height: u32,
    grayscale: bool,
}

/// Per-run cache of encoded payloads, keyed by [`Fingerprint`]. Never
/// shared across documents.
#[derive(Default)]
pub struct DedupCache {
    entries: HashMap<Fingerprint, CachedJpeg>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Run one candidate through the policy, replacing the object in `doc`
/// when recompression wins.
pub fn process_candidate(
    doc: &mut Document,
    candidate: &ImageCandidate,
    quality: u8,
    cache: &mut DedupCache,
) -> ImageOutcome {
    if matches!(candidate.filter, PdfFilter::Dct | PdfFilter::Jpx) {
        return ImageOutcome::Skipped(SkipReason::AlreadyCompressed);
    }
    if candidate.width == 0 || candidate.height == 0 {
        return ImageOutcome::Skipped(SkipReason::ZeroDimension);
    }
    if candidate.width < MIN_DIMENSION_PX || candidate.height < MIN_DIMENSION_PX {
        return ImageOutcome::Skipped(SkipReason::TooSmall);
    }

    let (stored, palette) = match fetch_source(doc, candidate) {
        Ok(parts) => parts,
        Err(msg) => return ImageOutcome::Failed(msg),
    };
    let old_size = stored.len();
    if old_size < MIN_STREAM_BYTES {
        return ImageOutcome::Skipped(SkipReason::BelowSizeThreshold);
    }

    let fingerprint = Fingerprint::of(&stored, quality);
    if let Some(cached) = cache.entries.get(&fingerprint) {
        let new_size = cached.data.len();
        if new_size < old_size {
            let cached = cached.clone();
            debug!(
                id = candidate.id.0,
                fingerprint = %fingerprint.short_hex(),
                old_size,
                new_size,
                "reused cached payload"
            );
            replace_with_jpeg(doc, candidate, cached.data, cached.width, cached.height, cached.grayscale);
            return ImageOutcome::ReplacedFromCache { old_size, new_size };
        }
        return ImageOutcome::Rejected { old_size, new_size };
    }

    let decoded = match decode_candidate(doc, candidate, palette.as_deref()) {
        Ok(img) => img,
        Err(msg) => return ImageOutcome::Failed(msg),
    };

    let decoded = if decoded.width() > MAX_DIMENSION_PX || decoded.height() > MAX_DIMENSION_PX {
        decoded.resize(
            MAX_DIMENSION_PX,
            MAX_DIMENSION_PX,
            image::imageops::FilterType::Lanczos3,
        )
    } else {
        decoded
    };

    let encoded = match codec::encode_jpeg(&decoded, quality) {
        Ok(e) => e,
        Err(e) => return ImageOutcome::Failed(e.to_string()),
    };
    cache.entries.insert(
        fingerprint,
        CachedJpeg {
            data: encoded.data.clone(),
            width: encoded.width,
            height: encoded.height,
            grayscale: encoded.grayscale,
        },
    );

    let new_size = encoded.data.len();
    if new_size < old_size {
        let EncodedJpeg {
            data,
            width,
            height,
            grayscale,
        } = encoded;
        replace_with_jpeg(doc, candidate, data, width, height, grayscale);
        debug!(id = candidate.id.0, old_size, new_size, "replaced image");
        ImageOutcome::Replaced { old_size, new_size }
    } else {
        ImageOutcome::Rejected { old_size, new_size }
    }
}

/// Stored stream bytes plus, for indexed images, the resolved palette.
fn fetch_source(
    doc: &Document,
    candidate: &ImageCandidate,
) -> Result<(Vec<u8>, Option<Vec<u8>>), String> {
    let stream = match doc.get_object(candidate.id) {
        Ok(Object::Stream(s)) => s,
        _ => return Err("image object disappeared".into()),
    };
    let palette = if candidate.color_space == ColorSpaceKind::Indexed {
        Some(indexed_palette(doc, stream).ok_or("unresolvable indexed palette")?)
    } else {
        None
    };
    Ok((stream.content.clone(), palette))
}

fn decode_candidate(
    doc: &Document,
    candidate: &ImageCandidate,
    palette: Option<&[u8]>,
) -> Result<image::DynamicImage, String> {
    let stream = match doc.get_object(candidate.id) {
        Ok(Object::Stream(s)) => s,
        _ => return Err("image object disappeared".into()),
    };
    let samples = match candidate.filter {
        PdfFilter::None => stream.content.clone(),
        // decompressed_content honors DecodeParms predictors, which raw
        // inflate would not.
        PdfFilter::Flate => stream
            .decompressed_content()
            .map_err(|e| format!("flate decode failed: {e}"))?,
        PdfFilter::Other => return Err("unsupported stream filter".into()),
        PdfFilter::Dct | PdfFilter::Jpx => unreachable!("filtered out earlier"),
    };
    if candidate.bits_per_component != 8 {
        return Err(format!(
            "unsupported bit depth: {}",
            candidate.bits_per_component
        ));
    }
    codec::decode_raw_samples(
        candidate.width,
        candidate.height,
        &samples,
        candidate.color_space,
        palette,
    )
    .map_err(|e| e.to_string())
}

/// Resolve the lookup table of an `[/Indexed base hival lookup]` color
/// space. Only a DeviceRGB base is supported.
fn indexed_palette(doc: &Document, stream: &Stream) -> Option<Vec<u8>> {
    let cs = match stream.dict.get(b"ColorSpace").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = match cs {
        Object::Array(arr) if arr.len() == 4 => arr,
        _ => return None,
    };
    match &arr[1] {
        Object::Name(n) if n.as_slice() == b"DeviceRGB" => {}
        _ => return None,
    }
    match &arr[3] {
        Object::String(bytes, _) => Some(bytes.clone()),
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Stream(s) => s.decompressed_content().ok().or_else(|| Some(s.content.clone())),
            Object::String(bytes, _) => Some(bytes.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn replace_with_jpeg(
    doc: &mut Document,
    candidate: &ImageCandidate,
    data: Vec<u8>,
    width: u32,
    height: u32,
    grayscale: bool,
) {
    let color_space = if grayscale { "DeviceGray" } else { "DeviceRGB" };
    let stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        data,
    );
    // Insertion by id also rewires every page that shares this XObject.
    doc.objects.insert(candidate.id, Object::Stream(stream));
}
