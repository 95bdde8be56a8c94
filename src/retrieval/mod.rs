mod batch;
mod id_scan;

pub use batch::{BatchWindow, NESTED_FIELD_LIST, WindowQuery, fetch_window, windows};
pub use id_scan::scan_ids;

use bytesize::ByteSize;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::document::{Document, document_id};
use crate::error::Result;
use crate::progress::document_bar;
use crate::snapshot::{self, Snapshot};
use crate::transport::Transport;

/// Default number of documents fetched per request
pub const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub query: String,
    pub id_field: String,
    pub batch_size: usize,
    pub nested: bool,
    /// Snapshot file name; `{collection}_{DD-MM-YYYY}.json` when unset
    pub file_name: Option<String>,
    pub quiet: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            query: "*:*".to_string(),
            id_field: "id".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            nested: false,
            file_name: None,
            quiet: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub documents: usize,
}

/// Export every document of `collection` matching the query into a snapshot in `dest_dir`.
///
/// Nothing is written unless every window was fetched.
pub async fn export_data(
    transport: &dyn Transport,
    collection: &str,
    dest_dir: &Path,
    options: &ExportOptions,
) -> Result<ExportReport> {
    debug!("Starting data export for collection: {}", collection);
    info!("Export nested documents: {}", options.nested);
    info!("Batch size: {}", options.batch_size);
    let start_time = Instant::now();

    let ids = scan_ids(transport, collection, &options.query, &options.id_field).await?;
    let docs = fetch_all(transport, collection, ids.len(), options).await?;

    let snapshot = Snapshot::new(collection, transport.base_url(), docs);
    let path = snapshot::write(dest_dir, &snapshot, options.file_name.as_deref()).await?;

    let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
    info!(
        "Export completed: {} documents ({}) written to {} in {:.2?}",
        snapshot.docs.len(),
        ByteSize(size),
        path.display(),
        start_time.elapsed()
    );

    Ok(ExportReport {
        path,
        documents: snapshot.docs.len(),
    })
}

/// Walk the windows over `total` ids, keeping the first copy of every id.
async fn fetch_all(
    transport: &dyn Transport,
    collection: &str,
    total: usize,
    options: &ExportOptions,
) -> Result<Vec<Document>> {
    let query = WindowQuery {
        collection,
        query: &options.query,
        id_field: &options.id_field,
        nested: options.nested,
    };

    let bar = document_bar(total as u64, "Downloading", options.quiet);
    let mut docs = Vec::with_capacity(total);
    let mut seen = HashSet::with_capacity(total);

    for window in windows(total, options.batch_size) {
        let batch = match fetch_window(transport, &query, window).await {
            Ok(batch) => batch,
            Err(e) => {
                bar.abandon_with_message("failed");
                return Err(e);
            }
        };
        bar.inc(batch.len() as u64);

        for doc in batch {
            match document_id(&doc, &options.id_field) {
                Some(id) if !seen.insert(id.clone()) => {
                    warn!("Document '{}' returned twice, keeping the first copy", id);
                }
                Some(_) => docs.push(doc),
                None => {
                    warn!("Document without '{}' exported as is", options.id_field);
                    docs.push(doc);
                }
            }
        }
    }

    if docs.len() != total {
        warn!(
            "Scanned {} ids but fetched {} documents; '{}' changed during export",
            total,
            docs.len(),
            collection
        );
    }

    bar.finish_with_message(format!("{} docs", docs.len()));
    Ok(docs)
}
