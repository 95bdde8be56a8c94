use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{Result, SolrDumpError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Request body sent to Solr
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Vec<u8>),
    Zip(Vec<u8>),
}

impl Payload {
    pub fn content_type(&self) -> &'static str {
        match self {
            Payload::Json(_) => "application/json",
            Payload::Zip(_) => "application/octet-stream",
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Payload::Json(b) | Payload::Zip(b) => b,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Json(b) | Payload::Zip(b) => b,
        }
    }
}

/// A single call against the Solr admin or core API.
///
/// `path` is relative to the cluster base URL and always starts with `/`.
#[derive(Debug, Clone)]
pub struct SolrRequest {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub payload: Option<Payload>,
}

impl SolrRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, payload: Payload) -> Self {
        let mut req = Self::new(Method::Post, path);
        req.payload = Some(payload);
        req
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    fn new(method: Method, path: impl Into<String>) -> Self {
        SolrRequest {
            method,
            path: path.into(),
            params: Vec::new(),
            payload: None,
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    /// Look up the first value of a query parameter
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Capability to issue requests against one Solr cluster.
///
/// Implementations return the raw response body for 2xx answers. A 401 must
/// surface as [`SolrDumpError::Auth`], any other failure as
/// [`SolrDumpError::Transport`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: SolrRequest) -> Result<Vec<u8>>;

    /// Cluster base URL, recorded in snapshots as the source
    fn base_url(&self) -> &str;
}

/// Send a request and decode the JSON body into `T`.
pub async fn send_json<T: DeserializeOwned>(
    transport: &dyn Transport,
    request: SolrRequest,
) -> Result<T> {
    let what = format!("response of {} {}", request.method, request.path);
    let body = transport.send(request).await?;
    serde_json::from_slice(&body).map_err(|e| SolrDumpError::decode(what, e))
}
