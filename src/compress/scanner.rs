//! Image XObject enumeration
//!
//! Walks the page tree and each page's resource dictionary to materialize
//! one candidate per distinct image object, in page order then resource-key
//! order. An image shared across pages appears exactly once (deduplicated
//! by object identity). Non-image and malformed resource entries are
//! skipped silently; real documents routinely mix forms, fonts, and broken
//! references into the same dictionaries.

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Encoding filter declared on an image stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfFilter {
    /// No filter: stream content is raw sample data.
    None,
    Flate,
    Dct,
    Jpx,
    Other,
}

/// Declared color space, reduced to the families the codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpaceKind {
    Rgb,
    Gray,
    Cmyk,
    Indexed,
    Other,
    /// No /ColorSpace entry at all.
    Unknown,
}

/// One distinct image object reachable from a page's resources.
#[derive(Debug, Clone)]
pub struct ImageCandidate {
    pub id: ObjectId,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u16,
    pub color_space: ColorSpaceKind,
    pub filter: PdfFilter,
}

/// Enumerate every unique image XObject reachable from any page.
pub fn collect_candidates(doc: &Document) -> Vec<ImageCandidate> {
    let mut seen: HashSet<ObjectId> = HashSet::new();
    let mut candidates = Vec::new();

    for (_, page_id) in doc.get_pages() {
        let page_dict = match doc.get_object(page_id) {
            Ok(Object::Dictionary(d)) => d,
            _ => continue,
        };
        let resources = match page_resources(doc, page_dict) {
            Some(r) => r,
            None => continue,
        };
        let xobjects = match resources.get(b"XObject").ok().and_then(|o| resolve(doc, o)) {
            Some(Object::Dictionary(d)) => d,
            _ => continue,
        };

        for (_, entry) in xobjects.iter() {
            // Only indirect objects can be replaced (and shared); inline
            // dictionary entries are not image streams.
            let id = match entry {
                Object::Reference(id) => *id,
                _ => continue,
            };
            if seen.contains(&id) {
                continue;
            }
            let stream = match doc.get_object(id) {
                Ok(Object::Stream(s)) => s,
                _ => continue,
            };
            if !is_image_subtype(&stream.dict) {
                continue;
            }
            seen.insert(id);
            candidates.push(ImageCandidate {
                id,
                width: dict_u32(&stream.dict, b"Width").unwrap_or(0),
                height: dict_u32(&stream.dict, b"Height").unwrap_or(0),
                bits_per_component: dict_u32(&stream.dict, b"BitsPerComponent").unwrap_or(8)
                    as u16,
                color_space: parse_color_space(doc, &stream.dict),
                filter: parse_filter(&stream.dict),
            });
        }
    }

    candidates
}

fn is_image_subtype(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n.as_slice() == b"Image")
}

/// Resources may live on the page itself or be inherited from its parent
/// page-tree node.
fn page_resources<'a>(doc: &'a Document, page_dict: &'a Dictionary) -> Option<&'a Dictionary> {
    if let Ok(obj) = page_dict.get(b"Resources") {
        if let Some(Object::Dictionary(d)) = resolve(doc, obj) {
            return Some(d);
        }
    }
    if let Ok(Object::Reference(parent_id)) = page_dict.get(b"Parent") {
        if let Ok(Object::Dictionary(parent)) = doc.get_object(*parent_id) {
            if let Ok(obj) = parent.get(b"Resources") {
                if let Some(Object::Dictionary(d)) = resolve(doc, obj) {
                    return Some(d);
                }
            }
        }
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    match dict.get(key) {
        Ok(Object::Integer(n)) if *n >= 0 => Some(*n as u32),
        _ => None,
    }
}

pub(crate) fn parse_filter(dict: &Dictionary) -> PdfFilter {
    let first = match dict.get(b"Filter") {
        Ok(Object::Name(n)) => Some(n.as_slice()),
        Ok(Object::Array(arr)) => arr.first().and_then(|f| match f {
            Object::Name(n) => Some(n.as_slice()),
            _ => None,
        }),
        _ => None,
    };
    match first {
        None => PdfFilter::None,
        Some(b"FlateDecode") => PdfFilter::Flate,
        Some(b"DCTDecode") => PdfFilter::Dct,
        Some(b"JPXDecode") => PdfFilter::Jpx,
        Some(_) => PdfFilter::Other,
    }
}

fn parse_color_space(doc: &Document, dict: &Dictionary) -> ColorSpaceKind {
    match dict.get(b"ColorSpace") {
        Ok(obj) => color_space_kind(doc, obj, 0),
        Err(_) => ColorSpaceKind::Unknown,
    }
}

fn color_space_kind(doc: &Document, obj: &Object, depth: u8) -> ColorSpaceKind {
    if depth > 4 {
        return ColorSpaceKind::Other;
    }
    match obj {
        Object::Name(n) => match n.as_slice() {
            b"DeviceRGB" | b"CalRGB" => ColorSpaceKind::Rgb,
            b"DeviceGray" | b"CalGray" => ColorSpaceKind::Gray,
            b"DeviceCMYK" => ColorSpaceKind::Cmyk,
            _ => ColorSpaceKind::Other,
        },
        Object::Array(arr) => match arr.first() {
            Some(Object::Name(n)) if n.as_slice() == b"Indexed" => ColorSpaceKind::Indexed,
            _ => ColorSpaceKind::Other,
        },
        Object::Reference(id) => doc
            .get_object(*id)
            .ok()
            .map(|o| color_space_kind(doc, o, depth + 1))
            .unwrap_or(ColorSpaceKind::Other),
        _ => ColorSpaceKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn image_stream(width: i64, height: i64) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![0u8; (width * height * 3) as usize],
        )
    }

    /// Build a one-page document whose resources hold the given XObject
    /// dictionary. Entries are wired by the caller via object ids from `doc`.
    fn single_page_doc(doc: &mut Document, xobjects: Dictionary) {
        let pages_id = doc.new_object_id();
        let resources_id = doc.add_object(dictionary! { "XObject" => xobjects });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
    }

    #[test]
    fn finds_images_and_reads_attributes() {
        let mut doc = Document::with_version("1.5");
        let image_id = doc.add_object(Object::Stream(image_stream(120, 80)));
        let mut xobjects = Dictionary::new();
        xobjects.set("Im0", Object::Reference(image_id));
        single_page_doc(&mut doc, xobjects);

        let candidates = collect_candidates(&doc);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].width, 120);
        assert_eq!(candidates[0].height, 80);
        assert_eq!(candidates[0].color_space, ColorSpaceKind::Rgb);
        assert_eq!(candidates[0].filter, PdfFilter::None);
    }

    #[test]
    fn shared_image_is_reported_once() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let image_id = doc.add_object(Object::Stream(image_stream(60, 60)));
        let resources_id = doc.add_object(dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for _ in 0..2 {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        let candidates = collect_candidates(&doc);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, image_id);
    }

    #[test]
    fn non_image_entries_are_skipped() {
        let mut doc = Document::with_version("1.5");
        let form_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! { "Type" => "XObject", "Subtype" => "Form" },
            vec![],
        )));
        let mut xobjects = Dictionary::new();
        xobjects.set("Fm0", Object::Reference(form_id));
        xobjects.set("Broken", Object::Reference((9999, 0)));
        single_page_doc(&mut doc, xobjects);

        assert!(collect_candidates(&doc).is_empty());
    }

    #[test]
    fn page_without_resources_contributes_nothing() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        assert!(collect_candidates(&doc).is_empty());
    }
}
