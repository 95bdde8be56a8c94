use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Result, SolrDumpError};
use crate::transport::{SolrRequest, Transport, send_json};

const COLLECTIONS_API: &str = "/solr/admin/collections";

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterStatus {
    pub cluster: Cluster,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cluster {
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionDescriptor>,
    #[serde(default)]
    pub live_nodes: Vec<String>,
}

/// What the cluster reports about one collection
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CollectionDescriptor {
    #[serde(rename = "configName")]
    pub config_name: String,
    #[serde(default)]
    pub shards: BTreeMap<String, Value>,
}

impl CollectionDescriptor {
    pub fn num_shards(&self) -> usize {
        self.shards.len().max(1)
    }
}

pub async fn cluster_status(transport: &dyn Transport) -> Result<ClusterStatus> {
    let request = SolrRequest::get(COLLECTIONS_API)
        .param("action", "CLUSTERSTATUS")
        .param("wt", "json");
    send_json(transport, request).await
}

/// Look up `collection` in the cluster status.
pub async fn describe_collection(
    transport: &dyn Transport,
    collection: &str,
) -> Result<CollectionDescriptor> {
    let mut status = cluster_status(transport).await?;
    status
        .cluster
        .collections
        .remove(collection)
        .ok_or_else(|| SolrDumpError::CollectionNotFound(collection.to_string()))
}

pub async fn delete_collection(transport: &dyn Transport, collection: &str) -> Result<()> {
    log::info!("Removing collection '{}'", collection);
    let request = SolrRequest::get(COLLECTIONS_API)
        .param("action", "DELETE")
        .param("name", collection);
    admin_call(transport, request, "DELETE", collection).await
}

pub async fn create_collection(
    transport: &dyn Transport,
    collection: &str,
    config_name: &str,
    num_shards: usize,
) -> Result<()> {
    log::info!(
        "Creating collection '{}' on config '{}' with {} shard(s)",
        collection,
        config_name,
        num_shards
    );
    let request = SolrRequest::get(COLLECTIONS_API)
        .param("action", "CREATE")
        .param("name", collection)
        .param("collection.configName", config_name)
        .param("numShards", num_shards);
    admin_call(transport, request, "CREATE", collection).await
}

async fn admin_call(
    transport: &dyn Transport,
    request: SolrRequest,
    action: &'static str,
    collection: &str,
) -> Result<()> {
    transport
        .send(request)
        .await
        .map(|_| ())
        .map_err(|e| SolrDumpError::CollectionAdminFailed {
            action,
            collection: collection.to_string(),
            source: Box::new(e),
        })
}
