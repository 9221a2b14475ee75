mod cli;

use pinforge::{
    backend::{self, UploadBackend},
    config,
    pipeline::{Phase, Pipeline, PipelineOutcome},
    progress,
};
use pinforge_common::ContentAddress;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    // Credentials may live in a .env next to the collection
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "pinforge=trace,pinforge_common=debug,reqwest=debug".to_string()
        } else {
            "pinforge=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    // Layout paths without a base directory resolve against the working directory
    let cwd = std::env::current_dir()?;
    let config_path = cli.config.as_deref();
    let dir = cli.dir.as_deref();

    match cli.command {
        Commands::Upload { collection } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(upload(&collection, &cwd, config_path, dir))
        }
        Commands::Stage { cid } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(stage(&cid, &cwd, config_path, dir))
        }
        Commands::Status { cid } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(status(&cid, config_path))
        }
        Commands::Unpin { cid } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(unpin(&cid, config_path))
        }
        Commands::Validate => validate_config(config_path, &cwd, dir),
        Commands::Version => {
            println!("pinforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Load the config, letting `--dir` replace the configured base directory.
fn load_settings(config_path: Option<&Path>, dir: Option<&Path>) -> Result<config::Config> {
    let mut config = config::load_config_or_default(config_path)?;
    if let Some(dir) = dir {
        config.layout.base_dir = Some(dir.to_path_buf());
    }
    Ok(config)
}

fn load_backend(
    config_path: Option<&Path>,
    dir: Option<&Path>,
) -> Result<(config::Config, Arc<dyn UploadBackend>)> {
    let config = load_settings(config_path, dir)?;
    config::validate_config(&config, true)?;
    let backend = backend::create_backend(&config.backend);
    tracing::debug!("Using {} backend", backend.name());
    Ok((config, backend))
}

fn parse_cid(cid: &str) -> Result<ContentAddress> {
    let cid = cid.trim();
    if cid.is_empty() {
        anyhow::bail!("content address cannot be empty");
    }
    Ok(ContentAddress::from(cid))
}

async fn upload(
    collection: &str,
    cwd: &Path,
    config_path: Option<&Path>,
    dir: Option<&Path>,
) -> Result<()> {
    let (config, backend) = load_backend(config_path, dir)?;

    let pipeline = Pipeline::from_config(&config, cwd, backend)
        .with_progress(Arc::new(|phase: Phase| progress::logging_sink(phase.to_string())));

    tracing::info!(
        "Uploading collection '{}' from {:?}",
        collection,
        pipeline.layout().media_dir
    );
    let outcome = pipeline.run(collection).await?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &PipelineOutcome) {
    println!("Media:    ipfs://{}", outcome.media_cid());
    println!("Metadata: ipfs://{}", outcome.metadata_cid());
    println!("Records:  {}", outcome.report.staged.len());
    if !outcome.report.missing.is_empty() {
        println!("Missing metadata: {}", outcome.report.missing.len());
    }
}

async fn stage(cid: &str, cwd: &Path, config_path: Option<&Path>, dir: Option<&Path>) -> Result<()> {
    let cid = parse_cid(cid)?;
    let config = load_settings(config_path, dir)?;
    config::validate_config(&config, false)?;

    // Reconciling never reaches the backend, so any instance will do.
    let backend = backend::create_backend(&config.backend);
    let pipeline = Pipeline::from_config(&config, cwd, backend);

    let (assets, report) = pipeline.stage(&cid).await?;
    println!(
        "Staged {} of {} records in {}",
        report.staged.len(),
        assets.len(),
        pipeline.layout().staging_dir.display()
    );
    Ok(())
}

async fn status(cid: &str, config_path: Option<&Path>) -> Result<()> {
    let cid = parse_cid(cid)?;
    let (_, backend) = load_backend(config_path, None)?;

    match backend.status(&cid).await? {
        Some(status) => {
            println!("CID:   {}", status.cid);
            println!("State: {}", status.state);
            if let Some(size) = status.size {
                println!("Size:  {} bytes", size);
            }
            if let Some(name) = status.name {
                println!("Name:  {}", name);
            }
            if let Some(created) = status.created {
                println!("Date:  {}", created.to_rfc3339());
            }
        }
        None => println!("{} is not known to {}", cid, backend.name()),
    }
    Ok(())
}

async fn unpin(cid: &str, config_path: Option<&Path>) -> Result<()> {
    let cid = parse_cid(cid)?;
    let (_, backend) = load_backend(config_path, None)?;
    backend.unpin(&cid).await?;
    println!("Unpinned {}", cid);
    Ok(())
}

fn validate_config(path: Option<&Path>, cwd: &Path, dir: Option<&Path>) -> Result<()> {
    let mut config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            config::load_config_or_default(None)?
        }
    };
    if let Some(dir) = dir {
        config.layout.base_dir = Some(dir.to_path_buf());
    }
    config::validate_config(&config, false)?;

    let layout = config.layout.resolve(cwd);
    println!("✓ Configuration is valid");
    println!("  Backend: {}", config.backend.kind);
    println!("  Media: {}", layout.media_dir.display());
    println!("  Metadata: {}", layout.metadata_dir.display());
    println!("  Staging: {}", layout.staging_dir.display());
    println!("  CID version: {}", u8::from(config.upload.cid_version));
    println!("  Timeout: {}s", config.upload.timeout_secs);

    let has_credentials = match config.backend.kind {
        config::BackendKind::Pinata => config.backend.pinata.has_credentials(),
        config::BackendKind::NftStorage => !config.backend.nft_storage.token.is_empty(),
    };
    println!("  Credentials: {}", if has_credentials { "set" } else { "missing" });

    Ok(())
}
