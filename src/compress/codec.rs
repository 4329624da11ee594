//! Decoding and re-encoding of image payloads
//!
//! Raw sample buffers carry no self-describing header, so the component
//! layout is inferred from the declared color space and cross-checked
//! against the buffer length. A buffer that matches none of the known
//! layouts is rejected rather than guessed at.

use image::{DynamicImage, GrayImage, RgbImage};
use jpeg_encoder::{ColorType, Encoder};
use thiserror::Error;

use super::scanner::ColorSpaceKind;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported image encoding: {0}")]
    Unsupported(&'static str),
    #[error("sample buffer length {got} does not match {width}x{height} {layout}")]
    LengthMismatch {
        width: u32,
        height: u32,
        got: usize,
        layout: &'static str,
    },
    #[error("jpeg encode failed: {0}")]
    JpegEncode(String),
    #[error("image dimensions {0}x{1} exceed encoder limits")]
    TooLarge(u32, u32),
}

/// A finished JPEG payload ready to be wrapped in a DCTDecode stream.
pub struct EncodedJpeg {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
}

/// Interpret a raw (post-Flate or unfiltered) sample buffer as pixels.
///
/// The component layout is chosen by buffer length (RGB, then Gray, then
/// CMYK) rather than by the declared color space, which scanned PDFs
/// routinely mislabel. Indexed images are the exception and need their
/// palette resolved by the caller.
pub fn decode_raw_samples(
    width: u32,
    height: u32,
    data: &[u8],
    color_space: ColorSpaceKind,
    palette: Option<&[u8]>,
) -> Result<DynamicImage, CodecError> {
    let pixels = width as usize * height as usize;
    let rgb_len = pixels * 3;
    let gray_len = pixels;
    let cmyk_len = pixels * 4;

    if color_space == ColorSpaceKind::Indexed {
        let palette = palette.ok_or(CodecError::Unsupported("indexed image without palette"))?;
        return decode_indexed(width, height, data, palette);
    }

    if data.len() == rgb_len {
        rgb_from_raw(width, height, data.to_vec())
    } else if data.len() == gray_len {
        gray_from_raw(width, height, data.to_vec())
    } else if data.len() == cmyk_len {
        let rgb = cmyk_to_rgb(data);
        rgb_from_raw(width, height, rgb)
    } else {
        Err(CodecError::LengthMismatch {
            width,
            height,
            got: data.len(),
            layout: "RGB, Gray, or CMYK",
        })
    }
}

fn decode_indexed(
    width: u32,
    height: u32,
    data: &[u8],
    palette: &[u8],
) -> Result<DynamicImage, CodecError> {
    let pixels = width as usize * height as usize;
    if data.len() < pixels {
        return Err(CodecError::LengthMismatch {
            width,
            height,
            got: data.len(),
            layout: "8-bit palette indices",
        });
    }
    let mut rgb = Vec::with_capacity(pixels * 3);
    for &idx in &data[..pixels] {
        let base = idx as usize * 3;
        if base + 3 <= palette.len() {
            rgb.extend_from_slice(&palette[base..base + 3]);
        } else {
            rgb.extend_from_slice(&[0, 0, 0]);
        }
    }
    rgb_from_raw(width, height, rgb)
}

fn rgb_from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<DynamicImage, CodecError> {
    RgbImage::from_raw(width, height, data)
        .map(DynamicImage::ImageRgb8)
        .ok_or(CodecError::LengthMismatch {
            width,
            height,
            got: 0,
            layout: "RGB",
        })
}

fn gray_from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<DynamicImage, CodecError> {
    GrayImage::from_raw(width, height, data)
        .map(DynamicImage::ImageLuma8)
        .ok_or(CodecError::LengthMismatch {
            width,
            height,
            got: 0,
            layout: "Gray",
        })
}

fn cmyk_to_rgb(data: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(data.len() / 4 * 3);
    for px in data.chunks_exact(4) {
        let (c, m, y, k) = (px[0] as u32, px[1] as u32, px[2] as u32, px[3] as u32);
        rgb.push((255 - c.min(255)).saturating_sub(k).min(255) as u8);
        rgb.push((255 - m.min(255)).saturating_sub(k).min(255) as u8);
        rgb.push((255 - y.min(255)).saturating_sub(k).min(255) as u8);
    }
    rgb
}

/// Flatten transparency onto white and encode as baseline JPEG.
///
/// Grayscale sources stay single-channel; everything else goes out as RGB.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<EncodedJpeg, CodecError> {
    let (width, height) = (img.width(), img.height());
    if width > u16::MAX as u32 || height > u16::MAX as u32 {
        return Err(CodecError::TooLarge(width, height));
    }

    let mut data = Vec::new();
    let grayscale = matches!(
        img,
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageLuma16(_)
    );

    if grayscale {
        let gray = img.to_luma8();
        let encoder = Encoder::new(&mut data, quality);
        encoder
            .encode(gray.as_raw(), width as u16, height as u16, ColorType::Luma)
            .map_err(|e| CodecError::JpegEncode(e.to_string()))?;
    } else {
        let rgb = flatten_to_rgb(img);
        let encoder = Encoder::new(&mut data, quality);
        encoder
            .encode(rgb.as_raw(), width as u16, height as u16, ColorType::Rgb)
            .map_err(|e| CodecError::JpegEncode(e.to_string()))?;
    }

    Ok(EncodedJpeg {
        data,
        width,
        height,
        grayscale,
    })
}

/// Composite any alpha channel over a white background.
fn flatten_to_rgb(img: &DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb.clone(),
        other => {
            let rgba = other.to_rgba8();
            let mut rgb = RgbImage::new(rgba.width(), rgba.height());
            for (out, px) in rgb.pixels_mut().zip(rgba.pixels()) {
                let a = px[3] as u32;
                for c in 0..3 {
                    let v = px[c] as u32;
                    out[c] = ((v * a + 255 * (255 - a)) / 255) as u8;
                }
            }
            rgb
        }
    }
}
