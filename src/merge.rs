//! PDF concatenation
//!
//! Inputs are renumbered into one id space, their page objects re-parented
//! under a fresh page tree, and each source file gets a top-level outline
//! bookmark pointing at its first page. Source catalogs, page trees, and
//! outlines are dropped; everything else (fonts, images, annotations)
//! rides along untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lopdf::{dictionary, Bookmark, Document, Object, ObjectId};
use tracing::info;

use crate::compress::assembler;
use crate::error::PdfOpError;

/// What a merge produced, for response headers and logs.
#[derive(Debug, Clone)]
pub struct MergeSummary {
    pub file_count: usize,
    pub page_count: usize,
    pub output_size: u64,
}

/// Concatenate the given PDFs, in order, into `output`. With bookmarks
/// enabled, the name of each input becomes its outline entry title.
pub fn merge_paths(
    inputs: &[(String, PathBuf)],
    output: &Path,
    add_bookmarks: bool,
) -> Result<MergeSummary, PdfOpError> {
    if inputs.len() < 2 {
        return Err(PdfOpError::Processing(
            "merge requires at least two documents".into(),
        ));
    }

    let mut merged = Document::with_version("1.5");
    let mut max_id = 1u32;
    let mut all_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    // Page order must follow input order; a BTreeMap over renumbered ids
    // happens to preserve it, but the Vec makes it explicit.
    let mut all_pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut first_pages: Vec<(String, ObjectId)> = Vec::new();

    for (name, path) in inputs {
        let mut doc = Document::load(path)
            .map_err(|e| PdfOpError::InvalidPdf(format!("{name}: {e}")))?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(PdfOpError::InvalidPdf(format!("{name}: document has no pages")));
        }
        first_pages.push((name.clone(), page_ids[0]));
        for id in &page_ids {
            let page = doc
                .get_object(*id)
                .map_err(|e| PdfOpError::InvalidPdf(format!("{name}: {e}")))?
                .to_owned();
            all_pages.push((*id, page));
        }
        all_objects.append(&mut doc.objects);
    }

    // Source structure nodes are rebuilt below; carrying them over would
    // leave dangling duplicates.
    for (id, object) in all_objects {
        if !is_structure_node(&object) {
            merged.objects.insert(id, object);
        }
    }

    merged.max_id = max_id;
    let pages_root_id = merged.new_object_id();
    for (id, object) in &all_pages {
        if let Object::Dictionary(dict) = object {
            let mut dict = dict.clone();
            dict.set("Parent", pages_root_id);
            merged.objects.insert(*id, Object::Dictionary(dict));
        }
    }
    let kids: Vec<Object> = all_pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    let page_count = kids.len();
    merged.objects.insert(
        pages_root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => page_count as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_root_id,
    });
    merged.trailer.set("Root", catalog_id);

    if add_bookmarks {
        for (title, page_id) in first_pages {
            let bookmark = Bookmark::new(title, [0.0, 0.0, 0.0], 0, page_id);
            merged.add_bookmark(bookmark, None);
        }
    }

    merged.renumber_objects();
    merged.adjust_zero_pages();
    if let Some(outline_id) = merged.build_outline() {
        // Renumbering moved the catalog; the trailer has its current id.
        if let Ok(Object::Reference(root_id)) = merged.trailer.get(b"Root") {
            let root_id = *root_id;
            if let Ok(Object::Dictionary(catalog)) = merged.get_object_mut(root_id) {
                catalog.set("Outlines", Object::Reference(outline_id));
            }
        }
    }

    assembler::write_document(&mut merged, output, false)?;
    let output_size = std::fs::metadata(output)
        .map_err(|e| PdfOpError::Processing(format!("stat output: {e}")))?
        .len();

    let summary = MergeSummary {
        file_count: inputs.len(),
        page_count,
        output_size,
    };
    info!(
        file_count = summary.file_count,
        page_count = summary.page_count,
        output_size = summary.output_size,
        "merged documents"
    );
    Ok(summary)
}

fn is_structure_node(object: &Object) -> bool {
    let Object::Dictionary(dict) = object else {
        return false;
    };
    matches!(
        dict.get(b"Type"),
        Ok(Object::Name(n)) if matches!(n.as_slice(), b"Catalog" | b"Pages" | b"Outlines" | b"Outline")
    )
}
