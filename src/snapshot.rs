//! On-disk snapshot envelope.
//!
//! A snapshot is one JSON document holding the whole exported set:
//!
//! ```json
//! { "collection": "books", "solr_url": "http://localhost:8983",
//!   "date": "15-10-2026", "docs": [ ... ] }
//! ```

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::document::Document;
use crate::error::{Result, SolrDumpError};

/// Date format of the `date` field and of default file names
pub const DATE_FORMAT: &str = "%d-%m-%Y";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub collection: String,
    #[serde(default)]
    pub solr_url: String,
    #[serde(default)]
    pub date: String,
    pub docs: Vec<Document>,
}

impl Snapshot {
    /// New snapshot dated today
    pub fn new(collection: impl Into<String>, solr_url: impl Into<String>, docs: Vec<Document>) -> Self {
        Snapshot {
            collection: collection.into(),
            solr_url: solr_url.into(),
            date: Local::now().format(DATE_FORMAT).to_string(),
            docs,
        }
    }

    /// `{collection}_{DD-MM-YYYY}.json`
    pub fn default_file_name(&self) -> String {
        format!("{}_{}.json", self.collection, self.date)
    }
}

/// Write `snapshot` into `dir`, creating it if needed. Returns the file path.
pub async fn write(dir: &Path, snapshot: &Snapshot, name: Option<&str>) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| SolrDumpError::io(dir, e))?;

    let path = match name {
        Some(name) => dir.join(name),
        None => dir.join(snapshot.default_file_name()),
    };

    let body = serde_json::to_vec(snapshot)
        .map_err(|e| SolrDumpError::decode(format!("snapshot of '{}'", snapshot.collection), e))?;
    fs::write(&path, &body)
        .await
        .map_err(|e| SolrDumpError::io(&path, e))?;

    log::debug!("Wrote {} bytes to {}", body.len(), path.display());
    Ok(path)
}

/// Load a whole snapshot file.
pub async fn read(path: &Path) -> Result<Snapshot> {
    let body = fs::read(path).await.map_err(|e| SolrDumpError::InvalidSnapshot {
        path: path.to_path_buf(),
        reason: format!("cannot read file: {}", e),
    })?;

    let snapshot: Snapshot =
        serde_json::from_slice(&body).map_err(|e| SolrDumpError::InvalidSnapshot {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    log::debug!(
        "Loaded snapshot of '{}' with {} documents from {}",
        snapshot.collection,
        snapshot.docs.len(),
        path.display()
    );
    Ok(snapshot)
}
