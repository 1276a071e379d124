use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use counsel_advisor::Orchestrator;
use counsel_core::{catalog, AddOutcome, AppConfig, CounselDeps};

mod profile_input;

#[derive(Parser)]
#[command(name = "counsel", about = "Education counselor: program, career and financial aid recommendations")]
struct Cli {
    /// Path to config TOML file (overrides COUNSEL_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Counsel one student and print the report as JSON
    Advise {
        /// Student profile JSON. Prompts on stdin when omitted.
        #[arg(long)]
        profile: Option<PathBuf>,
        /// Write the profile that was used to this file
        #[arg(long)]
        save_profile: Option<PathBuf>,
        /// Skip the LLM summary even if the config enables it
        #[arg(long)]
        no_summary: bool,
    },
    /// Embed the program catalog and fill the vector cache
    Warm,
    /// Inspect or manage the vector cache directory
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    Info,
    Clear,
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("counsel=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(path) = cli.config {
        config.config_path = path;
    }
    let deps = CounselDeps::from_config(config)
        .with_context(|| "Failed to load counsel configuration")?;

    match cli.command {
        Command::Advise {
            profile,
            save_profile,
            no_summary,
        } => advise(deps, profile, save_profile, no_summary).await,
        Command::Warm => warm(deps).await,
        Command::Cache { action } => cache(&deps, action),
    }
}

async fn advise(
    deps: CounselDeps,
    profile_path: Option<PathBuf>,
    save_profile: Option<PathBuf>,
    no_summary: bool,
) -> Result<()> {
    let profile = match profile_path {
        Some(path) => profile_input::load(&path)?,
        None => profile_input::prompt_stdin()?,
    };
    if let Some(path) = save_profile {
        profile_input::save(&path, &profile)?;
        info!(path = %path.display(), "Saved profile");
    }

    let mut orchestrator = Orchestrator::from_deps(deps).await?;
    if no_summary {
        orchestrator = orchestrator.with_summarizer(false);
    }

    let report = orchestrator.run(&profile).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn warm(deps: CounselDeps) -> Result<()> {
    let programs_path = deps
        .file_config
        .data
        .programs
        .as_deref()
        .map(|p| deps.resolve_path(p));
    let programs = catalog::load_or_builtin(programs_path.as_deref())?;
    let mut store = deps.similarity_store();

    match store.add_items(programs, true).await? {
        AddOutcome::Empty => println!("Program catalog is empty, nothing to embed"),
        AddOutcome::CacheHit { count } => println!("Cache already warm ({count} programs)"),
        AddOutcome::Embedded { count, cached } => println!(
            "Embedded {count} programs with {} ({})",
            deps.embedder.model_name(),
            if cached { "cached" } else { "cache write failed" }
        ),
    }
    Ok(())
}

fn cache(deps: &CounselDeps, action: CacheAction) -> Result<()> {
    let dir = deps.cache_dir();
    match action {
        CacheAction::Info => {
            let files = dir.info()?;
            println!("Cache directory: {}", dir.root().display());
            if files.is_empty() {
                println!("No cache files");
            }
            for file in files {
                let items = file
                    .items
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "unreadable".to_string());
                let model = file.model.as_deref().unwrap_or("?");
                println!(
                    "  {}  {} bytes  items={items}  model={model}",
                    file.path.display(),
                    file.size_bytes
                );
            }
        }
        CacheAction::Clear => {
            let removed = dir.clear()?;
            println!("Removed {removed} cache file(s) from {}", dir.root().display());
        }
        CacheAction::Validate => {
            let report = dir.validate()?;
            for path in &report.valid {
                println!("ok       {}", path.display());
            }
            for (path, reason) in &report.invalid {
                println!("invalid  {}: {reason}", path.display());
            }
            if !report.is_clean() {
                anyhow::bail!("{} invalid cache file(s)", report.invalid.len());
            }
        }
    }
    Ok(())
}
