use serde::Deserialize;
use serde_json::Value;

use crate::document::value_id;
use crate::error::{Result, SolrDumpError};
use crate::transport::{SolrRequest, Transport, send_json};

#[derive(Debug, Deserialize)]
struct ExportResponse {
    response: ExportBody,
}

#[derive(Debug, Deserialize)]
struct ExportBody {
    #[serde(default)]
    docs: Vec<serde_json::Map<String, Value>>,
}

/// Fetch every id matching `query`, sorted descending by `id_field`.
///
/// Uses the `/export` handler, so the whole id list comes back in one response.
pub async fn scan_ids(
    transport: &dyn Transport,
    collection: &str,
    query: &str,
    id_field: &str,
) -> Result<Vec<String>> {
    log::debug!("Scanning ids of '{}' matching {}", collection, query);
    let request = SolrRequest::get(format!("/solr/{}/export", collection))
        .param("q", query)
        .param("fl", id_field)
        .param("sort", format!("{} desc", id_field));

    let response: ExportResponse = send_json(transport, request).await.map_err(|e| match e {
        SolrDumpError::Auth { .. } => e,
        other => SolrDumpError::FetchIdsFailed {
            collection: collection.to_string(),
            source: Box::new(other),
        },
    })?;

    let ids: Vec<String> = response
        .response
        .docs
        .iter()
        .filter_map(|doc| doc.get(id_field).and_then(value_id))
        .collect();

    if ids.len() != response.response.docs.len() {
        log::warn!(
            "{} of {} scanned documents in '{}' have no usable '{}' value",
            response.response.docs.len() - ids.len(),
            response.response.docs.len(),
            collection,
            id_field
        );
    }

    log::info!("Found {} document ids in '{}'", ids.len(), collection);
    Ok(ids)
}
