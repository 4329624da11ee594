//! Document load, metadata strip, and serialization.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use lopdf::{Document, Object, ObjectId, SaveOptions};

use crate::error::PdfOpError;

/// Parse a PDF from disk. Anything lopdf rejects is reported as an
/// invalid upload, not a server fault.
pub fn load_document(path: &Path) -> Result<Document, PdfOpError> {
    Document::load(path).map_err(|e| PdfOpError::InvalidPdf(e.to_string()))
}

/// Drop the trailer /Info dictionary and the catalog /Metadata stream,
/// including the objects they point at.
pub fn strip_metadata(doc: &mut Document) {
    let mut orphans: Vec<ObjectId> = Vec::new();

    if let Ok(Object::Reference(id)) = doc.trailer.get(b"Info") {
        orphans.push(*id);
    }
    doc.trailer.remove(b"Info");

    if let Ok(Object::Reference(root_id)) = doc.trailer.get(b"Root") {
        let root_id = *root_id;
        if let Ok(Object::Dictionary(catalog)) = doc.get_object_mut(root_id) {
            if let Ok(Object::Reference(meta_id)) = catalog.get(b"Metadata") {
                orphans.push(*meta_id);
            }
            catalog.remove(b"Metadata");
        }
    }

    for id in orphans {
        doc.objects.remove(&id);
    }
}

/// Write the document with object streams and a cross-reference stream.
/// `renumber` compacts object ids first, the closest lopdf gets to a
/// linearized layout.
pub fn write_document(doc: &mut Document, path: &Path, renumber: bool) -> Result<(), PdfOpError> {
    if renumber {
        doc.renumber_objects();
    }
    doc.compress();
    let file =
        File::create(path).map_err(|e| PdfOpError::Processing(format!("create output: {e}")))?;
    let mut writer = BufWriter::new(file);
    doc.save_with_options(
        &mut writer,
        SaveOptions::builder()
            .use_object_streams(true)
            .use_xref_streams(true)
            .build(),
    )
    .map_err(|e| PdfOpError::Processing(format!("write output: {e}")))?;
    Ok(())
}
