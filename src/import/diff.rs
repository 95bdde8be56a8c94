use std::collections::HashSet;

use crate::document::{Document, document_id};

/// Keep the snapshot documents whose ids are not in `existing_ids`.
///
/// Order follows the snapshot. An id repeated in the snapshot is kept once,
/// at its first position. Documents without an id are dropped.
pub fn select_missing(
    docs: Vec<Document>,
    id_field: &str,
    existing_ids: &HashSet<String>,
) -> Vec<Document> {
    let snapshot_ids: HashSet<String> = docs
        .iter()
        .filter_map(|doc| document_id(doc, id_field))
        .collect();
    let to_upload: HashSet<&String> = snapshot_ids.difference(existing_ids).collect();
    log::info!("{} documents will be created", to_upload.len());

    let mut seen = HashSet::with_capacity(to_upload.len());
    let mut without_id = 0usize;
    let mut selected = Vec::with_capacity(to_upload.len());

    for doc in docs {
        let Some(id) = document_id(&doc, id_field) else {
            without_id += 1;
            continue;
        };
        if to_upload.contains(&id) && seen.insert(id) {
            selected.push(doc);
        }
    }

    if without_id > 0 {
        log::warn!(
            "Skipped {} snapshot documents without '{}'",
            without_id,
            id_field
        );
    }
    selected
}
