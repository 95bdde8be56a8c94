use indicatif::ProgressBar;
use serde_json::Value;

use crate::document::Document;
use crate::error::{Result, SolrDumpError};
use crate::transport::{Payload, SolrRequest, Transport};

/// Optimistic concurrency field assigned by Solr on every write
pub const VERSION_FIELD: &str = "_version_";
/// Block-join parent link assigned by Solr to nested documents
pub const ROOT_FIELD: &str = "_root_";
/// Soft commit window for uploaded batches, in milliseconds
pub const COMMIT_WITHIN_MS: u64 = 5000;

/// Drop the fields Solr assigns itself so the document can be replayed.
pub fn sanitize(mut doc: Document) -> Document {
    doc.remove(VERSION_FIELD);
    doc.into_iter()
        .filter(|(k, _)| k != ROOT_FIELD)
        .map(|(k, v)| (k, strip_field(v, ROOT_FIELD)))
        .collect()
}

fn strip_field(value: Value, field: &str) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| k != field)
                .map(|(k, v)| (k, strip_field(v, field)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| strip_field(v, field)).collect())
        }
        other => other,
    }
}

/// Post one batch to the update handler.
pub async fn upload_batch(
    transport: &dyn Transport,
    collection: &str,
    batch: &[Document],
) -> Result<()> {
    let sanitized: Vec<Document> = batch.iter().cloned().map(sanitize).collect();
    let body = serde_json::to_vec(&sanitized)
        .map_err(|e| SolrDumpError::decode(format!("update batch for '{}'", collection), e))?;

    let request = SolrRequest::post(format!("/solr/{}/update", collection), Payload::Json(body))
        .param("commitWithin", COMMIT_WITHIN_MS)
        .param("overwrite", "true")
        .param("wt", "json");

    transport
        .send(request)
        .await
        .map(|_| ())
        .map_err(|e| match e {
            SolrDumpError::Auth { .. } => e,
            other => SolrDumpError::UploadFailed {
                collection: collection.to_string(),
                documents: batch.len(),
                source: Box::new(other),
            },
        })
}

/// A batch that did not land
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub batch: usize,
    pub documents: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub batches: usize,
    pub uploaded: usize,
    pub failures: Vec<BatchFailure>,
}

impl UploadReport {
    pub fn failed_documents(&self) -> usize {
        self.failures.iter().map(|f| f.documents).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Upload `docs` in batches, continuing past failed batches.
///
/// Only an authentication failure stops the run; every other failure is
/// logged and recorded in the report.
pub async fn upload_all(
    transport: &dyn Transport,
    collection: &str,
    docs: &[Document],
    batch_size: usize,
    bar: &ProgressBar,
) -> Result<UploadReport> {
    let mut report = UploadReport::default();

    for (index, batch) in docs.chunks(batch_size.max(1)).enumerate() {
        report.batches += 1;
        match upload_batch(transport, collection, batch).await {
            Ok(()) => report.uploaded += batch.len(),
            Err(e) if e.is_auth() => {
                bar.abandon_with_message("authentication rejected");
                return Err(e);
            }
            Err(e) => {
                log::error!("Batch {} ({} documents) failed: {}", index, batch.len(), e);
                report.failures.push(BatchFailure {
                    batch: index,
                    documents: batch.len(),
                    error: e.to_string(),
                });
            }
        }
        bar.inc(batch.len() as u64);
    }

    Ok(report)
}
