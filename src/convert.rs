//! Image to PDF conversion
//!
//! Each uploaded image becomes one page: the image is decoded, flattened
//! onto white, re-encoded as JPEG, and placed centered on the page scaled
//! proportionally to fit inside the margins.

use std::path::Path;
use std::str::FromStr;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use thiserror::Error;
use tracing::info;

use crate::compress::assembler;
use crate::compress::codec;
use crate::error::PdfOpError;

/// JPEG quality for converted pages.
const CONVERT_QUALITY: u8 = 95;

const MM_TO_PT: f32 = 72.0 / 25.4;
const MAX_MARGIN_MM: f32 = 50.0;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("'{name}' is not a decodable image: {reason}")]
    InvalidImage { name: String, reason: String },
    #[error(transparent)]
    Pdf(#[from] PdfOpError),
}

/// Target page dimensions, portrait orientation, in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    #[default]
    A4,
    A3,
    Letter,
    Legal,
}

impl PageSize {
    fn dimensions(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
        }
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "a3" => Ok(PageSize::A3),
            "letter" => Ok(PageSize::Letter),
            "legal" => Ok(PageSize::Legal),
            other => Err(format!(
                "unknown page size '{other}' (expected A4, A3, Letter, or Legal)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            other => Err(format!(
                "unknown orientation '{other}' (expected portrait or landscape)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub page_size: PageSize,
    pub orientation: Orientation,
    /// Page margin in millimeters, clamped to 0..=50.
    pub margin_mm: f32,
}

impl ConvertOptions {
    fn page_dimensions(&self) -> (f32, f32) {
        let (w, h) = self.page_size.dimensions();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }

    fn margin_pt(&self) -> f32 {
        self.margin_mm.clamp(0.0, MAX_MARGIN_MM) * MM_TO_PT
    }
}

/// What a conversion produced, for response headers and logs.
#[derive(Debug, Clone)]
pub struct ConvertSummary {
    pub page_count: usize,
    pub output_size: u64,
}

/// Build a PDF at `output` with one page per input image.
pub fn images_to_pdf(
    inputs: &[(String, Vec<u8>)],
    output: &Path,
    options: &ConvertOptions,
) -> Result<ConvertSummary, ConvertError> {
    if inputs.is_empty() {
        return Err(PdfOpError::Processing("no images to convert".into()).into());
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for (name, bytes) in inputs {
        let payload = prepare_jpeg(name, bytes)?;
        let page_id = add_image_page(&mut doc, pages_id, payload, options)?;
        kids.push(page_id.into());
    }

    let page_count = kids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    assembler::write_document(&mut doc, output, true)?;
    let output_size = std::fs::metadata(output)
        .map_err(|e| PdfOpError::Processing(format!("stat output: {e}")))
        .map_err(ConvertError::from)?
        .len();

    let summary = ConvertSummary {
        page_count,
        output_size,
    };
    info!(
        page_count = summary.page_count,
        output_size = summary.output_size,
        "converted images"
    );
    Ok(summary)
}

/// JPEG bytes plus the attributes the XObject dictionary needs.
#[derive(Debug)]
struct JpegPayload {
    data: Vec<u8>,
    width: u32,
    height: u32,
    grayscale: bool,
}

fn prepare_jpeg(name: &str, bytes: &[u8]) -> Result<JpegPayload, ConvertError> {
    let invalid = |reason: String| ConvertError::InvalidImage {
        name: name.to_string(),
        reason,
    };

    let decoded = image::load_from_memory(bytes).map_err(|e| invalid(e.to_string()))?;
    let encoded =
        codec::encode_jpeg(&decoded, CONVERT_QUALITY).map_err(|e| invalid(e.to_string()))?;
    Ok(JpegPayload {
        data: encoded.data,
        width: encoded.width,
        height: encoded.height,
        grayscale: encoded.grayscale,
    })
}

fn add_image_page(
    doc: &mut Document,
    pages_id: ObjectId,
    payload: JpegPayload,
    options: &ConvertOptions,
) -> Result<ObjectId, PdfOpError> {
    let color_space = if payload.grayscale { "DeviceGray" } else { "DeviceRGB" };
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => payload.width as i64,
            "Height" => payload.height as i64,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        payload.data,
    ));

    let (page_w, page_h) = options.page_dimensions();
    let margin = options.margin_pt();
    let (draw_w, draw_h, x, y) = fit_on_page(
        payload.width as f32,
        payload.height as f32,
        page_w,
        page_h,
        margin,
    );

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    draw_w.into(),
                    0.into(),
                    0.into(),
                    draw_h.into(),
                    x.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| PdfOpError::Processing(format!("encode page content: {e}")))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    }))
}

/// Scale proportionally to fit inside the margins and center the result.
/// Returns (drawn width, drawn height, x offset, y offset) in points.
fn fit_on_page(img_w: f32, img_h: f32, page_w: f32, page_h: f32, margin: f32) -> (f32, f32, f32, f32) {
    let avail_w = (page_w - 2.0 * margin).max(1.0);
    let avail_h = (page_h - 2.0 * margin).max(1.0);
    let scale = (avail_w / img_w).min(avail_h / img_h);
    let draw_w = img_w * scale;
    let draw_h = img_h * scale;
    let x = (page_w - draw_w) / 2.0;
    let y = (page_h - draw_h) / 2.0;
    (draw_w, draw_h, x, y)
}
