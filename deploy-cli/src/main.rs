//! Deploy CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use deploy_churn::{compute_client_churn, format_churn_summary, local, RemoteBaselineStore, SshShell};
use deploy_cli::{utils, Config, DeployError, DeployOptions, Pipeline};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: ./deploy.toml when present)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Deploy profile to use
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Test, build, sync, restart and report churn
    Run {
        /// Build and preview churn without touching the remote host
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        skip_tests: bool,

        #[arg(long)]
        skip_build: bool,

        /// Print the deploy report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report client churn of the current build against the remote baseline
    Churn {
        /// Store the current manifest as the new baseline
        #[arg(long)]
        save: bool,

        /// Print metrics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the manifest of a local asset directory
    Manifest {
        /// Asset directory (default: the configured client asset root)
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::debug!("Starting deploy v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = dispatch(args.command, args.profile.as_deref(), &config).await {
        exit_with(&e);
    }

    Ok(())
}

async fn dispatch(command: Command, profile: Option<&str>, config: &Config) -> deploy_cli::Result<()> {
    match command {
        Command::Run {
            dry_run,
            skip_tests,
            skip_build,
            json,
        } => {
            let (name, profile) = config.resolve_profile(profile)?;
            let shell = SshShell::new(profile.remote_target());
            let pipeline = Pipeline::new(&config.app, name, &profile, shell);

            let options = DeployOptions {
                dry_run,
                skip_tests,
                skip_build,
            };
            let report = pipeline.run(&options).await?;

            if json {
                println!("{}", to_json(&report)?);
            } else if let Some(churn) = &report.churn {
                println!("{}", format_churn_summary(churn, dry_run));
            }
        }

        Command::Churn { save, json } => {
            let (_, profile) = config.resolve_profile(profile)?;
            let store = RemoteBaselineStore::new(SshShell::new(profile.remote_target()), &profile.remote_dir);
            let metrics = compute_client_churn(&config.app.asset_root(), &store, save).await?;

            if json {
                println!("{}", to_json(&metrics)?);
            } else {
                println!("{}", format_churn_summary(&metrics, !save));
            }
        }

        Command::Manifest { dir } => {
            let dir = dir.unwrap_or_else(|| config.app.asset_root());
            print!("{}", local::build_local_manifest_text(&dir)?);
        }
    }

    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> deploy_cli::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn exit_with(error: &DeployError) -> ! {
    eprintln!("error[{}]: {}", error.code(), error);
    std::process::exit(1);
}
