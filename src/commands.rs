//! Subcommand handlers.

use anyhow::{Context, Result, anyhow, bail};
use console::style;
use std::path::Path;

use crate::cli::{Cli, Command};
use crate::config_tree::{self, ConfigImportOutcome};
use crate::confirm::{AssumeYes, Confirm, TerminalPrompt};
use crate::import::{self, ImportOptions, ImportOutcome};
use crate::reindex::{ReindexOutcome, ReindexPlan, Reindexer};
use crate::retrieval::{self, ExportOptions};
use crate::transport::Transport;

/// Run the subcommand selected in `args`.
pub async fn execute(transport: &dyn Transport, args: &Cli) -> Result<()> {
    let confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(TerminalPrompt)
    };

    match &args.command {
        Command::Export {
            dir,
            nested,
            batch,
            name,
        } => {
            let collection = require_collection(args)?;
            let options = ExportOptions {
                query: args.query.clone(),
                id_field: args.id_field.clone(),
                batch_size: *batch,
                nested: *nested,
                file_name: name.clone(),
                quiet: args.quiet,
            };
            let report = retrieval::export_data(transport, collection, dir, &options)
                .await
                .with_context(|| format!("Export of '{}' to {} failed", collection, dir.display()))?;
            println!(
                "{} {} documents written to {}",
                style("Done!").green().bold(),
                report.documents,
                report.path.display()
            );
        }
        Command::ExportConfig { dir } => {
            let collection = require_collection(args)?;
            config_tree::export_tree(transport, collection, dir)
                .await
                .with_context(|| {
                    format!("Config export of '{}' to {} failed", collection, dir.display())
                })?;
            println!("{} config exported to {}", style("Done!").green().bold(), dir.display());
        }
        Command::Import {
            file,
            batch,
            overwrite,
        } => {
            let options = ImportOptions {
                id_field: args.id_field.clone(),
                batch_size: *batch,
                overwrite: *overwrite,
                quiet: args.quiet,
            };
            import_command(transport, file, args.collection(), &options, confirm.as_ref()).await?;
        }
        Command::ImportConfig {
            dir,
            name,
            overwrite,
        } => {
            let outcome =
                config_tree::import_tree(transport, dir, name.as_deref(), *overwrite, confirm.as_ref())
                    .await
                    .with_context(|| format!("Config import from {} failed", dir.display()))?;
            match outcome {
                ConfigImportOutcome::Declined => println!("{}", style("Stopping...").red()),
                ConfigImportOutcome::Uploaded { name, files } => println!(
                    "{} config '{}' uploaded ({} files)",
                    style("Done!").green().bold(),
                    name,
                    files
                ),
            }
        }
        Command::RemoveConfig { name } => {
            let removed = config_tree::remove_config(transport, name, confirm.as_ref())
                .await
                .with_context(|| format!("Removing config '{}' failed", name))?;
            if removed {
                println!("{} config '{}' removed", style("Ok").green(), name);
            }
        }
        Command::Reindex {
            work_dir,
            config_path,
            batch,
            nested,
        } => {
            let collection = require_collection(args)?;
            let mut plan = ReindexPlan::new(collection, work_dir.clone());
            plan.config_path = config_path.clone();
            plan.id_field = args.id_field.clone();
            plan.batch_size = *batch;
            plan.nested = *nested;
            plan.quiet = args.quiet;
            reindex_command(transport, plan, confirm.as_ref()).await?;
        }
    }

    Ok(())
}

fn require_collection(args: &Cli) -> Result<&str> {
    args.collection()
        .ok_or_else(|| anyhow!("--collection must be set for this command"))
}

async fn import_command(
    transport: &dyn Transport,
    file: &Path,
    collection: Option<&str>,
    options: &ImportOptions,
    confirm: &dyn Confirm,
) -> Result<()> {
    println!("Importing data from {}", style(file.display()).bold());
    let outcome = import::import_data(transport, file, collection, options, confirm)
        .await
        .with_context(|| format!("Import from {} failed", file.display()))?;

    match outcome {
        ImportOutcome::Declined => println!("{}", style("Cancelled").red()),
        ImportOutcome::NothingToImport => println!("No documents to import"),
        ImportOutcome::Finished(report) if report.upload.is_complete() => println!(
            "{} {} documents uploaded to '{}'",
            style("Done!").green().bold(),
            report.upload.uploaded,
            report.collection
        ),
        ImportOutcome::Finished(report) => {
            for failure in &report.upload.failures {
                eprintln!(
                    "{} batch {} ({} documents): {}",
                    style("failed").red(),
                    failure.batch,
                    failure.documents,
                    failure.error
                );
            }
            bail!(
                "{} of {} documents were not uploaded to '{}'",
                report.upload.failed_documents(),
                report.selected,
                report.collection
            );
        }
    }
    Ok(())
}

async fn reindex_command(
    transport: &dyn Transport,
    plan: ReindexPlan,
    confirm: &dyn Confirm,
) -> Result<()> {
    tokio::fs::create_dir_all(&plan.work_dir)
        .await
        .with_context(|| format!("Failed to create work directory {}", plan.work_dir.display()))?;

    let mut reindexer = Reindexer::new(transport, plan);
    match reindexer.run(confirm).await {
        Ok(ReindexOutcome::Declined) => println!("{}", style("Cancelled").red()),
        Ok(ReindexOutcome::Done(report)) => {
            println!(
                "{} '{}' moved from config '{}' to '{}' ({} documents exported)",
                style("Done!").green().bold(),
                report.collection,
                report.previous_config,
                report.new_config,
                report.documents_exported
            );
            if let Some(import) = report.import.filter(|i| !i.upload.is_complete()) {
                bail!(
                    "{} of {} documents were not re-imported; retry with `import {}`",
                    import.upload.failed_documents(),
                    import.selected,
                    report.snapshot.display()
                );
            }
        }
        Err(failure) => {
            let hint = failure.recovery_hint();
            if failure.collection_lost() {
                eprintln!("{}", style(hint).red().bold());
            } else {
                eprintln!("{}", style(hint).yellow());
            }
            return Err(failure.into());
        }
    }
    Ok(())
}
