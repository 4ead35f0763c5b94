//! # Shipwright
//!
//! Drive Xcode build phases from the command line.
//!
//! ## Usage
//!
//! ```bash
//! shipwright build-for-testing --scheme App --destination 'platform=iOS Simulator,name=iPhone 15' --clean
//! shipwright test --scheme App --destination 'platform=iOS Simulator,name=iPhone 15'
//! shipwright archive production
//! shipwright export production
//! shipwright upload production
//! shipwright clean
//! shipwright toolchain resolve 15.2
//! shipwright --dry-run archive production
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use shipwright::config::loader::{find_settings_file, global_settings_path, load_settings_from_file};
use shipwright::log_collector::default_logs_path;
use shipwright::{
    BuildOrchestrator, BuildSettings, GitClient, LogCollector, OrchestratorError, ProcessEnv,
    ProcessRunner, SettingsProvider,
};

#[derive(Parser)]
#[command(name = "shipwright", version, about = "Xcode build orchestration")]
struct Cli {
    /// Settings file (defaults to the nearest shipwright.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print commands instead of running them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Echo every command and show info-level logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build test bundles with code coverage
    BuildForTesting {
        #[arg(long)]
        scheme: String,
        #[arg(long)]
        destination: String,
        /// Run xcodebuild clean first
        #[arg(long)]
        clean: bool,
    },
    /// Run previously built tests
    Test {
        #[arg(long)]
        scheme: String,
        #[arg(long)]
        destination: String,
    },
    /// Archive a release environment
    Archive { environment: String },
    /// Export the archive into an .ipa
    Export { environment: String },
    /// Upload the exported .ipa
    Upload { environment: String },
    /// Delete the build and reports directories
    Clean,
    /// Inspect installed Xcode versions
    Toolchain {
        #[command(subcommand)]
        command: ToolchainCommands,
    },
    /// Print the current git branch
    Branch,
}

#[derive(Subcommand)]
enum ToolchainCommands {
    /// Resolve a version constraint (defaults to the configured one)
    Resolve { version: Option<String> },
    /// List every installed toolchain
    List,
}

fn load_settings(explicit: Option<&Path>) -> Result<BuildSettings> {
    if let Some(path) = explicit {
        return load_settings_from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()));
    }

    let cwd = std::env::current_dir().context("reading current directory")?;
    if let Some(path) = find_settings_file(&cwd) {
        return load_settings_from_file(&path)
            .with_context(|| format!("loading settings from {}", path.display()));
    }
    if let Ok(global) = global_settings_path() {
        if global.is_file() {
            let mut settings = load_settings_from_file(&global)
                .with_context(|| format!("loading settings from {}", global.display()))?;
            // A per-user file describes tools, not a project location
            settings.project_root = cwd;
            return Ok(settings);
        }
    }

    log::debug!("[Main] No settings file found, using defaults");
    Ok(BuildSettings::for_project(cwd))
}

fn init_logging(verbose: bool) -> Option<LogCollector> {
    let console_level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    let collector = default_logs_path().and_then(|dir| LogCollector::new(&dir, console_level));
    match collector {
        Ok(collector) => {
            if let Err(e) = collector.install() {
                eprintln!("[Main] WARNING: Failed to register logger: {}", e);
            }
            Some(collector)
        }
        Err(e) => {
            eprintln!("[Main] WARNING: Session log unavailable: {}", e);
            None
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Arc::new(load_settings(cli.config.as_deref())?);
    let runner = ProcessRunner::new(cli.dry_run, cli.verbose);
    let orchestrator = BuildOrchestrator::new(
        runner.clone(),
        settings.clone(),
        Arc::new(ProcessEnv),
    );

    match cli.command {
        Commands::BuildForTesting {
            scheme,
            destination,
            clean,
        } => {
            let artifacts = orchestrator
                .build_for_testing(&scheme, clean, &destination)
                .await?;
            println!("Result bundle: {}", artifacts.result_bundle_path.display());
            println!("Log: {}", artifacts.log_path.display());
        }
        Commands::Test {
            scheme,
            destination,
        } => {
            let artifacts = orchestrator.run_tests(&scheme, &destination).await?;
            println!("Result bundle: {}", artifacts.result_bundle_path.display());
            println!("Log: {}", artifacts.log_path.display());
        }
        Commands::Archive { environment } => {
            let archive = orchestrator.archive(&environment).await?;
            println!("Archive: {}", archive.display());
        }
        Commands::Export { environment } => {
            let export_dir = orchestrator.generate_ipa(&environment).await?;
            println!("Exported to: {}", export_dir.display());
        }
        Commands::Upload { environment } => {
            let package = orchestrator.upload(&environment).await?;
            println!("Uploaded: {}", package.display());
        }
        Commands::Clean => {
            orchestrator.clean().await?;
            println!("Removed build outputs");
        }
        Commands::Toolchain { command } => match command {
            ToolchainCommands::Resolve { version } => {
                let version = version
                    .or_else(|| settings.toolchain_version().map(str::to_string))
                    .context("no version given and none configured")?;
                let toolchain = orchestrator.resolver().resolve(&version).await?;
                println!("{}\t{}", toolchain.version, toolchain.install_path.display());
            }
            ToolchainCommands::List => {
                let toolchains = orchestrator.resolver().installed_toolchains().await;
                if toolchains.is_empty() {
                    println!("No toolchains found");
                }
                for toolchain in toolchains {
                    println!("{}\t{}", toolchain.version, toolchain.install_path.display());
                }
            }
        },
        Commands::Branch => {
            let git = GitClient::new(runner, settings.tools().git.clone(), settings.project_root());
            match git.current_branch().await {
                Some(branch) => println!("{}", branch),
                None => println!("(no branch)"),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let collector = init_logging(cli.verbose);

    let outcome = run(cli).await;

    let code = match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<OrchestratorError>() {
                Some(orchestrator_error) => eprintln!("error: {}", orchestrator_error.user_message()),
                None => eprintln!("error: {:#}", e),
            }
            log::error!("[Main] {:#}", e);
            ExitCode::from(1)
        }
    };

    if let Some(collector) = collector {
        if let Err(e) = collector.wait_for_empty() {
            eprintln!("[Main] WARNING: {}", e);
        }
    }
    code
}
