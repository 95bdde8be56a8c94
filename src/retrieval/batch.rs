use serde::Deserialize;

use crate::document::Document;
use crate::error::{Result, SolrDumpError};
use crate::transport::{SolrRequest, Transport, send_json};

/// Child document expansion requested in nested mode
pub const NESTED_FIELD_LIST: &str = "*, [child limit=-1]";

/// Offset/size slice of a query's result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
    pub start: usize,
    pub size: usize,
}

/// Windows tiling `0..total` in steps of `batch_size`.
///
/// Every window asks for a full batch; the last one simply returns fewer rows.
pub fn windows(total: usize, batch_size: usize) -> impl Iterator<Item = BatchWindow> {
    let step = batch_size.max(1);
    (0..total)
        .step_by(step)
        .map(move |start| BatchWindow { start, size: step })
}

#[derive(Debug, Deserialize)]
struct SelectResponse {
    response: SelectBody,
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    #[serde(default)]
    docs: Vec<Document>,
}

/// Parameters shared by every window of one export
#[derive(Debug, Clone)]
pub struct WindowQuery<'a> {
    pub collection: &'a str,
    pub query: &'a str,
    pub id_field: &'a str,
    pub nested: bool,
}

/// Fetch the documents of one window.
///
/// Sorted the same way as the id scan so consecutive windows never overlap.
pub async fn fetch_window(
    transport: &dyn Transport,
    query: &WindowQuery<'_>,
    window: BatchWindow,
) -> Result<Vec<Document>> {
    let mut request = SolrRequest::get(format!("/solr/{}/select", query.collection))
        .param("q", query.query)
        .param("q.op", "OR")
        .param("start", window.start)
        .param("rows", window.size)
        .param("sort", format!("{} desc", query.id_field));
    if query.nested {
        request = request.param("fl", NESTED_FIELD_LIST);
    }

    let response: SelectResponse = send_json(transport, request).await.map_err(|e| match e {
        SolrDumpError::Auth { .. } => e,
        other => SolrDumpError::FetchDocumentsFailed {
            collection: query.collection.to_string(),
            start: window.start,
            rows: window.size,
            source: Box::new(other),
        },
    })?;

    log::debug!(
        "Window start={} rows={} returned {} documents",
        window.start,
        window.size,
        response.response.docs.len()
    );
    Ok(response.response.docs)
}
