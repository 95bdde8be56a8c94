pub mod cli;
pub mod cluster;
pub mod commands;
pub mod config_tree;
pub mod confirm;
pub mod document;
pub mod error;
pub mod import;
pub mod progress;
pub mod reindex;
pub mod retrieval;
pub mod snapshot;
pub mod solr;
pub mod transport;

pub use error::{Result, SolrDumpError};

pub async fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let args = cli::Cli::parse();

    // Configure logger based on debug flag
    if args.debug {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
        log::debug!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    // Enable colors if not in quiet mode
    if !args.quiet {
        console::set_colors_enabled(true);
        log::debug!("Console colors enabled");
    }

    // Parse the Solr URL and extract base URL/credentials
    let (base_url, auth_username, auth_password) = solr::parse_input_url(&args)?;

    log::info!("Using Solr at {}", base_url.as_str());

    let transport = solr::create_transport(
        base_url,
        auth_username,
        auth_password,
        args.compress,
        args.insecure,
    )?;

    commands::execute(&transport, &args).await
}
