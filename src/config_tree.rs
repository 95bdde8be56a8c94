//! Configset synchronisation between the cluster and the local filesystem.
//!
//! Export walks the `admin/file` listing of a collection and mirrors the
//! configset into a local directory. Import packs a local directory into a zip
//! archive and uploads it through the configset API.

use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::confirm::{ActionSummary, Confirm};
use crate::error::{Result, SolrDumpError};
use crate::transport::{Payload, SolrRequest, Transport, send_json};

/// One entry of a configset tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigNode {
    File(Vec<u8>),
    Directory(BTreeMap<String, ConfigNode>),
}

impl ConfigNode {
    pub fn empty_dir() -> Self {
        ConfigNode::Directory(BTreeMap::new())
    }

    /// Insert `node` at the '/'-separated `path`, creating missing directories.
    ///
    /// Returns false when a file sits where a directory is needed.
    pub fn insert_path(&mut self, path: &str, node: ConfigNode) -> bool {
        let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let Some(name) = parts.pop() else {
            return false;
        };

        let mut current = self;
        for part in parts {
            let ConfigNode::Directory(children) = current else {
                return false;
            };
            current = children
                .entry(part.to_string())
                .or_insert_with(ConfigNode::empty_dir);
        }

        let ConfigNode::Directory(children) = current else {
            return false;
        };
        if matches!(
            (children.get(name), &node),
            (Some(ConfigNode::Directory(_)), ConfigNode::Directory(_))
        ) {
            return true;
        }
        children.insert(name.to_string(), node);
        true
    }

    /// Every entry below this node in pre-order, as ('/'-separated path, file content).
    ///
    /// Directories carry `None` and always precede their contents.
    pub fn entries(&self) -> Vec<(String, Option<&[u8]>)> {
        let mut out = Vec::new();
        collect_entries(self, "", &mut out);
        out
    }

    pub fn file_count(&self) -> usize {
        self.entries().iter().filter(|(_, c)| c.is_some()).count()
    }

    /// Read a local directory tree.
    pub fn load(dir: &Path) -> Result<ConfigNode> {
        let mut root = ConfigNode::empty_dir();
        for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                SolrDumpError::io(path, io::Error::from(e))
            })?;

            let rel = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| SolrDumpError::io(entry.path(), io::Error::other(e)))?;
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");

            let node = if entry.file_type().is_dir() {
                ConfigNode::empty_dir()
            } else {
                let content =
                    std::fs::read(entry.path()).map_err(|e| SolrDumpError::io(entry.path(), e))?;
                ConfigNode::File(content)
            };
            root.insert_loaded(&rel, node, entry.path())?;
        }
        Ok(root)
    }

    fn insert_loaded(&mut self, rel: &str, node: ConfigNode, origin: &Path) -> Result<()> {
        if self.insert_path(rel, node) {
            return Ok(());
        }
        Err(SolrDumpError::io(
            origin,
            io::Error::other(format!("cannot place '{}' in the config tree", rel)),
        ))
    }

    /// Write the tree below `dest`, which is created if needed.
    pub async fn write_to(&self, dest: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|e| SolrDumpError::io(dest, e))?;

        for (rel, content) in self.entries() {
            let path = dest.join(&rel);
            match content {
                None => tokio::fs::create_dir_all(&path)
                    .await
                    .map_err(|e| SolrDumpError::io(&path, e))?,
                Some(bytes) => tokio::fs::write(&path, bytes)
                    .await
                    .map_err(|e| SolrDumpError::io(&path, e))?,
            }
        }
        Ok(())
    }

    /// Pack the tree into an in-memory zip archive with paths relative to this node.
    pub fn to_zip(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (rel, content) in self.entries() {
            match content {
                None => writer.add_directory(rel, options)?,
                Some(bytes) => {
                    writer.start_file(rel, options)?;
                    writer.write_all(bytes).map_err(zip::result::ZipError::from)?;
                }
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

fn collect_entries<'a>(node: &'a ConfigNode, prefix: &str, out: &mut Vec<(String, Option<&'a [u8]>)>) {
    let ConfigNode::Directory(children) = node else {
        return;
    };
    for (name, child) in children {
        let path = format!("{}{}", prefix, name);
        match child {
            ConfigNode::File(content) => out.push((path, Some(content.as_slice()))),
            ConfigNode::Directory(_) => {
                out.push((path.clone(), None));
                collect_entries(child, &format!("{}/", path), out);
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileListing {
    #[serde(default)]
    files: BTreeMap<String, ListingEntry>,
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    #[serde(default)]
    directory: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Directory,
}

fn safe_entry_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// List one directory of the configset; `dir` is "" for the root or ends with '/'.
async fn list_dir(
    transport: &dyn Transport,
    collection: &str,
    dir: &str,
) -> Result<Vec<(String, EntryKind)>> {
    let mut request = SolrRequest::get(format!("/solr/{}/admin/file", collection)).param("wt", "json");
    if !dir.is_empty() {
        request = request.param("file", dir.trim_end_matches('/'));
    }

    let listing: FileListing = send_json(transport, request).await.map_err(|e| {
        SolrDumpError::ConfigFetchFailed {
            collection: collection.to_string(),
            path: if dir.is_empty() { "/".to_string() } else { dir.to_string() },
            source: Box::new(e),
        }
    })?;

    listing
        .files
        .into_iter()
        .map(|(name, entry)| {
            if !safe_entry_name(&name) {
                return Err(SolrDumpError::ConfigFetchFailed {
                    collection: collection.to_string(),
                    path: format!("{}{}", dir, name),
                    source: Box::new(SolrDumpError::MissingPrecondition(
                        "listing contains an unusable file name".to_string(),
                    )),
                });
            }
            let kind = if entry.directory.unwrap_or(false) {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            Ok((name, kind))
        })
        .collect()
}

async fn fetch_file(transport: &dyn Transport, collection: &str, path: &str) -> Result<Vec<u8>> {
    let request = SolrRequest::get(format!("/solr/{}/admin/file", collection)).param("file", path);
    transport
        .send(request)
        .await
        .map_err(|e| SolrDumpError::ConfigFetchFailed {
            collection: collection.to_string(),
            path: path.to_string(),
            source: Box::new(e),
        })
}

fn fetch_dir<'a>(
    transport: &'a dyn Transport,
    collection: &'a str,
    prefix: String,
) -> BoxFuture<'a, Result<ConfigNode>> {
    async move {
        let mut children = BTreeMap::new();
        for (name, kind) in list_dir(transport, collection, &prefix).await? {
            let path = format!("{}{}", prefix, name);
            let node = match kind {
                EntryKind::Directory => {
                    log::debug!("Entering config directory {}", path);
                    fetch_dir(transport, collection, format!("{}/", path)).await?
                }
                EntryKind::File => {
                    log::debug!("Fetching config file {}", path);
                    ConfigNode::File(fetch_file(transport, collection, &path).await?)
                }
            };
            children.insert(name, node);
        }
        Ok(ConfigNode::Directory(children))
    }
    .boxed()
}

/// Fetch the whole configset used by `collection`.
pub async fn fetch_tree(transport: &dyn Transport, collection: &str) -> Result<ConfigNode> {
    fetch_dir(transport, collection, String::new()).await
}

/// Export the configset used by `collection` into `dest`.
///
/// The tree is fetched completely before the first file is written, so a
/// failing file leaves nothing behind.
pub async fn export_tree(
    transport: &dyn Transport,
    collection: &str,
    dest: &Path,
) -> Result<PathBuf> {
    log::info!("Exporting config of '{}' to {}", collection, dest.display());
    let tree = fetch_tree(transport, collection).await?;
    tree.write_to(dest).await?;
    log::info!("Exported {} config files", tree.file_count());
    Ok(dest.to_path_buf())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigImportOutcome {
    Declined,
    Uploaded { name: String, files: usize },
}

/// Upload the local configset in `src_dir` under `name` (default: the directory name).
///
/// With `overwrite`, an existing configset of that name is deleted first and
/// the import fails if it cannot be.
pub async fn import_tree(
    transport: &dyn Transport,
    src_dir: &Path,
    name: Option<&str>,
    overwrite: bool,
    confirm: &dyn Confirm,
) -> Result<ConfigImportOutcome> {
    let name = match name {
        Some(n) => n.to_string(),
        None => src_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                SolrDumpError::MissingPrecondition(format!(
                    "cannot derive a config name from {}",
                    src_dir.display()
                ))
            })?,
    };

    let meta = tokio::fs::metadata(src_dir)
        .await
        .map_err(|e| SolrDumpError::io(src_dir, e))?;
    if !meta.is_dir() {
        return Err(SolrDumpError::MissingPrecondition(format!(
            "{} is not a directory",
            src_dir.display()
        )));
    }

    let dir = src_dir.to_path_buf();
    let (files, archive) = tokio::task::spawn_blocking(move || -> Result<(usize, Vec<u8>)> {
        let tree = ConfigNode::load(&dir)?;
        Ok((tree.file_count(), tree.to_zip()?))
    })
    .await
    .map_err(|e| SolrDumpError::io(src_dir, io::Error::other(e)))??;

    let summary = ActionSummary::new(format!("Upload config '{}'", name))
        .line("Source path", src_dir.display())
        .line("Config name", &name)
        .line("Files", files)
        .line("Overwrite", overwrite);
    if !confirm.confirm(&summary).map_err(SolrDumpError::Prompt)? {
        log::info!("Config upload of '{}' cancelled", name);
        return Ok(ConfigImportOutcome::Declined);
    }

    if overwrite {
        log::info!("Removing old config '{}'", name);
        delete_config(transport, &name).await?;
    }

    log::info!(
        "Uploading config '{}' ({} files, {} byte archive)",
        name,
        files,
        archive.len()
    );
    let flag = if overwrite { "true" } else { "false" };
    let request = SolrRequest::post("/solr/admin/configs", Payload::Zip(archive))
        .param("action", "UPLOAD")
        .param("name", &name)
        .param("overwrite", flag)
        .param("cleanup", flag);
    transport
        .send(request)
        .await
        .map_err(|e| SolrDumpError::ConfigUploadFailed {
            name: name.clone(),
            source: Box::new(e),
        })?;

    Ok(ConfigImportOutcome::Uploaded { name, files })
}

/// Delete configset `name`.
pub async fn delete_config(transport: &dyn Transport, name: &str) -> Result<()> {
    let request =
        SolrRequest::delete(format!("/api/cluster/configs/{}", name)).param("omitHeader", "true");
    transport
        .send(request)
        .await
        .map(|_| ())
        .map_err(|e| SolrDumpError::ConfigDeleteFailed {
            name: name.to_string(),
            source: Box::new(e),
        })
}

/// Delete configset `name` once the operator agrees. Returns whether it was deleted.
pub async fn remove_config(
    transport: &dyn Transport,
    name: &str,
    confirm: &dyn Confirm,
) -> Result<bool> {
    let summary = ActionSummary::new(format!("Delete config '{}'", name)).line("Config name", name);
    if !confirm.confirm(&summary).map_err(SolrDumpError::Prompt)? {
        return Ok(false);
    }
    delete_config(transport, name).await?;
    log::info!("Config '{}' deleted", name);
    Ok(true)
}
