mod diff;
mod upload;

pub use diff::select_missing;
pub use upload::{
    BatchFailure, COMMIT_WITHIN_MS, ROOT_FIELD, UploadReport, VERSION_FIELD, sanitize,
    upload_all, upload_batch,
};

use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use crate::confirm::{ActionSummary, Confirm};
use crate::error::{Result, SolrDumpError};
use crate::progress::document_bar;
use crate::retrieval::{DEFAULT_BATCH_SIZE, scan_ids};
use crate::snapshot;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub id_field: String,
    pub batch_size: usize,
    /// Upload every snapshot document instead of only the missing ones
    pub overwrite: bool,
    pub quiet: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            id_field: "id".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            overwrite: false,
            quiet: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The operator declined; nothing was uploaded
    Declined,
    /// Every snapshot document is already in the collection
    NothingToImport,
    Finished(ImportReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub collection: String,
    pub selected: usize,
    pub upload: UploadReport,
}

/// Import a snapshot file into `collection` (or the collection it was exported from).
///
/// Without `overwrite`, ids already present in the live collection are skipped.
/// Failed batches do not stop the import; see [`UploadReport`].
pub async fn import_data(
    transport: &dyn Transport,
    snapshot_path: &Path,
    collection: Option<&str>,
    options: &ImportOptions,
    confirm: &dyn Confirm,
) -> Result<ImportOutcome> {
    let start_time = Instant::now();
    let snapshot = snapshot::read(snapshot_path).await?;
    let collection = match collection {
        Some(c) => c.to_string(),
        None => {
            debug!("Target collection inferred from snapshot: {}", snapshot.collection);
            snapshot.collection.clone()
        }
    };
    if collection.is_empty() {
        return Err(SolrDumpError::MissingPrecondition(
            "no target collection given and the snapshot names none".to_string(),
        ));
    }

    info!("Number of docs in snapshot: {}", snapshot.docs.len());
    let docs = if options.overwrite {
        snapshot.docs
    } else {
        info!("Fetching ids of '{}' documents...", collection);
        let existing: HashSet<String> = scan_ids(transport, &collection, "*:*", &options.id_field)
            .await?
            .into_iter()
            .collect();
        info!("Number of docs found: {}", existing.len());
        select_missing(snapshot.docs, &options.id_field, &existing)
    };

    if docs.is_empty() {
        info!("No documents to import into '{}'", collection);
        return Ok(ImportOutcome::NothingToImport);
    }

    let summary = ActionSummary::new(format!("Import {} documents", docs.len()))
        .line("Source file", snapshot_path.display())
        .line("Collection", &collection)
        .line("Batch size", options.batch_size)
        .line("Overwrite", options.overwrite);
    let confirmed = confirm
        .confirm(&summary)
        .map_err(SolrDumpError::Prompt)?;
    if !confirmed {
        info!("Import into '{}' cancelled", collection);
        return Ok(ImportOutcome::Declined);
    }

    let bar = document_bar(docs.len() as u64, "Uploading", options.quiet);
    let upload = upload_all(transport, &collection, &docs, options.batch_size, &bar).await?;
    bar.finish_with_message(format!("{} uploaded", upload.uploaded));

    if upload.is_complete() {
        info!(
            "Import completed: {} documents into '{}' in {:.2?}",
            upload.uploaded,
            collection,
            start_time.elapsed()
        );
    } else {
        warn!(
            "Import finished with {} failed batches ({} documents) out of {}; re-run without --overwrite to retry the missing documents",
            upload.failures.len(),
            upload.failed_documents(),
            upload.batches
        );
    }

    Ok(ImportOutcome::Finished(ImportReport {
        collection,
        selected: docs.len(),
        upload,
    }))
}
