use std::{io, path::PathBuf};

use thiserror::Error;

use crate::transport::Method;

/// Errors raised while talking to Solr or touching local dump files.
#[derive(Debug, Error)]
pub enum SolrDumpError {
    /// Non-2xx response or connection failure.
    #[error("{method} {url} failed ({}): {body}", .status.map_or_else(|| "no response".to_string(), |s| s.to_string()))]
    Transport {
        method: Method,
        url: String,
        status: Option<u16>,
        body: String,
    },

    #[error("authentication rejected by {url} (401)")]
    Auth { url: String },

    #[error("failed to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid snapshot {}: {reason}", .path.display())]
    InvalidSnapshot { path: PathBuf, reason: String },

    #[error("missing precondition: {0}")]
    MissingPrecondition(String),

    #[error("collection '{0}' not found on the cluster")]
    CollectionNotFound(String),

    #[error("failed to fetch document ids from '{collection}': {source}")]
    FetchIdsFailed {
        collection: String,
        #[source]
        source: Box<SolrDumpError>,
    },

    #[error("failed to fetch documents [start={start}, rows={rows}] from '{collection}': {source}")]
    FetchDocumentsFailed {
        collection: String,
        start: usize,
        rows: usize,
        #[source]
        source: Box<SolrDumpError>,
    },

    #[error("failed to upload {documents} documents to '{collection}': {source}")]
    UploadFailed {
        collection: String,
        documents: usize,
        #[source]
        source: Box<SolrDumpError>,
    },

    #[error("failed to fetch config entry '{path}' via '{collection}': {source}")]
    ConfigFetchFailed {
        collection: String,
        path: String,
        #[source]
        source: Box<SolrDumpError>,
    },

    #[error("failed to upload config '{name}': {source}")]
    ConfigUploadFailed {
        name: String,
        #[source]
        source: Box<SolrDumpError>,
    },

    #[error("failed to delete config '{name}': {source}")]
    ConfigDeleteFailed {
        name: String,
        #[source]
        source: Box<SolrDumpError>,
    },

    #[error("collection {action} failed for '{collection}': {source}")]
    CollectionAdminFailed {
        action: &'static str,
        collection: String,
        #[source]
        source: Box<SolrDumpError>,
    },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read confirmation: {0}")]
    Prompt(#[source] io::Error),

    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, SolrDumpError>;

impl SolrDumpError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SolrDumpError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(what: impl Into<String>, source: serde_json::Error) -> Self {
        SolrDumpError::Decode {
            what: what.into(),
            source,
        }
    }

    /// True for a 401 anywhere in the cause chain.
    pub fn is_auth(&self) -> bool {
        match self {
            SolrDumpError::Auth { .. } => true,
            SolrDumpError::FetchIdsFailed { source, .. }
            | SolrDumpError::FetchDocumentsFailed { source, .. }
            | SolrDumpError::UploadFailed { source, .. }
            | SolrDumpError::ConfigFetchFailed { source, .. }
            | SolrDumpError::ConfigUploadFailed { source, .. }
            | SolrDumpError::ConfigDeleteFailed { source, .. }
            | SolrDumpError::CollectionAdminFailed { source, .. } => source.is_auth(),
            _ => false,
        }
    }
}
