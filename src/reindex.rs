//! Reindex: move a collection onto a fresh configset.
//!
//! The steps run strictly in order and stop at the first failure. There is no
//! rollback: once the collection has been removed, the exported data and
//! config under the work directory are the only copy until the import ends.

use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cluster::{self, CollectionDescriptor};
use crate::config_tree::{self, ConfigImportOutcome};
use crate::confirm::{ActionSummary, AssumeYes, Confirm};
use crate::error::SolrDumpError;
use crate::import::{self, ImportOptions, ImportOutcome, ImportReport};
use crate::retrieval::{self, ExportOptions};
use crate::transport::Transport;

/// Last step a reindex completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReindexState {
    NotStarted,
    ConfigExported,
    DataExported,
    ConfigImported,
    CollectionRemoved,
    CollectionCreated,
    DataImported,
    Done,
}

impl fmt::Display for ReindexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
pub struct ReindexPlan {
    pub collection: String,
    /// Exported config goes to `{work_dir}/config`, data to `{work_dir}/data`
    pub work_dir: PathBuf,
    /// Local configset to upload instead of exporting the current one
    pub config_path: Option<PathBuf>,
    pub id_field: String,
    pub batch_size: usize,
    pub nested: bool,
    pub quiet: bool,
}

impl ReindexPlan {
    pub fn new(collection: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        ReindexPlan {
            collection: collection.into(),
            work_dir: work_dir.into(),
            config_path: None,
            id_field: "id".to_string(),
            batch_size: retrieval::DEFAULT_BATCH_SIZE,
            nested: false,
            quiet: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReindexOutcome {
    Declined,
    Done(ReindexReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexReport {
    pub collection: String,
    pub previous_config: String,
    pub new_config: String,
    pub snapshot: PathBuf,
    pub documents_exported: usize,
    /// `None` when the collection was empty
    pub import: Option<ImportReport>,
}

/// A reindex that stopped before `Done`
#[derive(Debug, Error)]
#[error("reindex of '{collection}' stopped after {reached} (data: {}, config: {}): {source}", .data_dir.display(), .config_dir.display())]
pub struct ReindexFailure {
    pub collection: String,
    pub reached: ReindexState,
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
    #[source]
    pub source: SolrDumpError,
}

impl ReindexFailure {
    /// The old collection is gone and its data has not been reloaded
    pub fn collection_lost(&self) -> bool {
        self.reached >= ReindexState::CollectionRemoved && self.reached < ReindexState::DataImported
    }

    /// Operator instructions for finishing the job by hand
    pub fn recovery_hint(&self) -> String {
        if self.collection_lost() {
            format!(
                "Collection '{}' was removed and has NOT been restored. Recover it manually:\n  \
                 data:   {}\n  config: {}\n\
                 Create the collection on the uploaded config if needed, then run `import` with the snapshot above.",
                self.collection,
                self.data_dir.display(),
                self.config_dir.display()
            )
        } else {
            format!(
                "Collection '{}' was not removed. Exported material is kept in:\n  data:   {}\n  config: {}",
                self.collection,
                self.data_dir.display(),
                self.config_dir.display()
            )
        }
    }
}

/// `{collection}_{DD_MM_YYYY_HH_MM}`
pub fn generated_config_name(collection: &str, now: DateTime<Local>) -> String {
    format!("{}_{}", collection, now.format("%d_%m_%Y_%H_%M"))
}

pub struct Reindexer<'a> {
    transport: &'a dyn Transport,
    plan: ReindexPlan,
    new_config: String,
    state: ReindexState,
}

impl<'a> Reindexer<'a> {
    pub fn new(transport: &'a dyn Transport, plan: ReindexPlan) -> Self {
        let new_config = generated_config_name(plan.collection.trim(), Local::now());
        Reindexer {
            transport,
            plan,
            new_config,
            state: ReindexState::NotStarted,
        }
    }

    pub fn state(&self) -> ReindexState {
        self.state
    }

    pub fn new_config_name(&self) -> &str {
        &self.new_config
    }

    pub fn config_dir(&self) -> PathBuf {
        self.plan
            .config_path
            .clone()
            .unwrap_or_else(|| self.plan.work_dir.join("config"))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.plan.work_dir.join("data")
    }

    fn snapshot_name(&self) -> String {
        format!("{}.json", self.plan.collection.trim())
    }

    fn fail(&self, source: SolrDumpError) -> ReindexFailure {
        ReindexFailure {
            collection: self.plan.collection.trim().to_string(),
            reached: self.state,
            data_dir: self.data_dir(),
            config_dir: self.config_dir(),
            source,
        }
    }

    fn advance(&mut self, next: ReindexState) {
        debug_assert!(next > self.state, "{} -> {}", self.state, next);
        log::info!("Reindex step done: {}", next);
        self.state = next;
    }

    /// Run every step; `confirm` is asked once before anything changes.
    pub async fn run(&mut self, confirm: &dyn Confirm) -> Result<ReindexOutcome, ReindexFailure> {
        let collection = self.plan.collection.trim().to_string();
        if collection.is_empty() {
            return Err(self.fail(SolrDumpError::MissingPrecondition(
                "a collection name is required for reindex".to_string(),
            )));
        }

        let descriptor = cluster::describe_collection(self.transport, &collection)
            .await
            .map_err(|e| self.fail(e))?;
        if self.plan.config_path.is_none() {
            self.check_config_dir_free().await.map_err(|e| self.fail(e))?;
        }
        self.check_snapshot_free().await.map_err(|e| self.fail(e))?;

        let summary = self.summary(&collection, &descriptor);
        match confirm.confirm(&summary) {
            Ok(true) => {}
            Ok(false) => {
                log::info!("Reindex of '{}' cancelled", collection);
                return Ok(ReindexOutcome::Declined);
            }
            Err(e) => return Err(self.fail(SolrDumpError::Prompt(e))),
        }

        // 1. current config -> work dir
        if self.plan.config_path.is_none() {
            log::info!("Exporting config '{}'", descriptor.config_name);
            config_tree::export_tree(self.transport, &collection, &self.config_dir())
                .await
                .map_err(|e| self.fail(e))?;
        } else {
            log::info!("Using local config {}", self.config_dir().display());
        }
        self.advance(ReindexState::ConfigExported);

        // 2. data -> work dir
        let export_options = ExportOptions {
            query: "*:*".to_string(),
            id_field: self.plan.id_field.clone(),
            batch_size: self.plan.batch_size,
            nested: self.plan.nested,
            file_name: Some(self.snapshot_name()),
            quiet: self.plan.quiet,
        };
        let export = retrieval::export_data(self.transport, &collection, &self.data_dir(), &export_options)
            .await
            .map_err(|e| self.fail(e))?;
        self.advance(ReindexState::DataExported);

        // 3. config -> cluster under a fresh name
        let outcome = config_tree::import_tree(
            self.transport,
            &self.config_dir(),
            Some(self.new_config.as_str()),
            false,
            &AssumeYes,
        )
        .await
        .map_err(|e| self.fail(e))?;
        if let ConfigImportOutcome::Uploaded { files, .. } = outcome {
            log::info!("Uploaded config '{}' ({} files)", self.new_config, files);
        }
        self.advance(ReindexState::ConfigImported);

        // 4. drop the collection
        cluster::delete_collection(self.transport, &collection)
            .await
            .map_err(|e| self.fail(e))?;
        self.advance(ReindexState::CollectionRemoved);

        // 5. recreate it on the new config
        cluster::create_collection(
            self.transport,
            &collection,
            &self.new_config,
            descriptor.num_shards(),
        )
        .await
        .map_err(|e| self.fail(e))?;
        self.advance(ReindexState::CollectionCreated);

        // 6. reload the data; the collection is empty so nothing needs diffing
        let import_options = ImportOptions {
            id_field: self.plan.id_field.clone(),
            batch_size: self.plan.batch_size,
            overwrite: true,
            quiet: self.plan.quiet,
        };
        let imported = import::import_data(
            self.transport,
            &export.path,
            Some(&collection),
            &import_options,
            &AssumeYes,
        )
        .await
        .map_err(|e| self.fail(e))?;
        self.advance(ReindexState::DataImported);

        let import = match imported {
            ImportOutcome::Finished(report) => Some(report),
            ImportOutcome::NothingToImport | ImportOutcome::Declined => None,
        };
        self.advance(ReindexState::Done);

        Ok(ReindexOutcome::Done(ReindexReport {
            collection,
            previous_config: descriptor.config_name,
            new_config: self.new_config.clone(),
            snapshot: export.path,
            documents_exported: export.documents,
            import,
        }))
    }

    fn summary(&self, collection: &str, descriptor: &CollectionDescriptor) -> ActionSummary {
        let source = match &self.plan.config_path {
            Some(path) => path.display().to_string(),
            None => format!("current config '{}'", descriptor.config_name),
        };
        ActionSummary::new(format!(
            "Reindex '{}': the collection will be DELETED and recreated",
            collection
        ))
        .line("Collection", collection)
        .line("Config source", source)
        .line("New config name", &self.new_config)
        .line("Shards", descriptor.num_shards())
        .line("Work directory", self.plan.work_dir.display())
        .line("Batch size", self.plan.batch_size)
    }

    fn snapshot_path(&self) -> PathBuf {
        self.data_dir().join(self.snapshot_name())
    }

    /// A snapshot left by an earlier run may be the only copy of the data.
    async fn check_snapshot_free(&self) -> Result<(), SolrDumpError> {
        let path = self.snapshot_path();
        if path_exists(&path).await {
            return Err(SolrDumpError::MissingPrecondition(format!(
                "{} already exists; import it or move it away before reindexing again",
                path.display()
            )));
        }
        Ok(())
    }

    /// Stale files in the export target would be uploaded with the new config.
    async fn check_config_dir_free(&self) -> Result<(), SolrDumpError> {
        let dir = self.config_dir();
        if !path_exists(&dir).await {
            return Ok(());
        }
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| SolrDumpError::io(&dir, e))?;
        let occupied = entries
            .next_entry()
            .await
            .map_err(|e| SolrDumpError::io(&dir, e))?
            .is_some();
        if occupied {
            return Err(SolrDumpError::MissingPrecondition(format!(
                "{} is not empty; use a fresh work directory or pass --config-path",
                dir.display()
            )));
        }
        Ok(())
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
