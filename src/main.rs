//! BranchPilot - Local Git Automation Service
//!
//! Main entry point for the BranchPilot CLI.

use branchpilot::config::ConfigSnapshot;
use branchpilot::server::GitServer;
use branchpilot::{logging, Result};
use clap::{Parser, Subcommand};
use gitcmd::GitClient;
use std::path::PathBuf;
use std::process;

/// BranchPilot - localhost Git service for browser-driven branch creation
#[derive(Parser, Debug)]
#[command(name = "branchpilot")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ./config.json, then ~/.config/branchpilot/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the local Git service
    Serve {
        /// Port to listen on (overrides settings.serverPort)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check the local environment (git installation, current repository)
    Check,

    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() {
    let _ = logging::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = ConfigSnapshot::discover(cli.config);
    let config = config_path
        .as_deref()
        .map(ConfigSnapshot::load)
        .transpose()?
        .unwrap_or_default();

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or_else(|| config.server_port());
            let addr = format!("127.0.0.1:{port}");
            GitServer::new(config, config_path).run(&addr).await
        }
        Commands::Check => check().await,
        Commands::Config => {
            show_config(&config, config_path.as_deref());
            Ok(())
        }
    }
}

/// Environment self-test: platform, git installation, current repository
async fn check() -> Result<()> {
    println!("BranchPilot environment check");
    println!(
        "  platform:   {} {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );

    let cwd = std::env::current_dir()?;
    println!("  directory:  {}", cwd.display());

    let git = GitClient::new();
    let version = match git.git_version(&cwd).await {
        Ok(version) => version,
        Err(e) => {
            println!("  git:        not found. Install Git and make sure it is on PATH");
            return Err(e.into());
        }
    };
    println!("  git:        {version}");

    match git.validate(&cwd).await {
        Ok(validation) => println!("  repository: valid ({})", validation.path),
        Err(e) => println!("  repository: {e}"),
    }

    Ok(())
}

fn show_config(config: &ConfigSnapshot, path: Option<&std::path::Path>) {
    match path {
        Some(path) => println!("config file:       {}", path.display()),
        None => println!(
            "config file:       none found (looked for ./config.json and {})",
            ConfigSnapshot::default_path().display()
        ),
    }
    println!("api key:           {}", if config.has_api_key() { "configured" } else { "missing" });
    println!(
        "project path:      {}",
        config.project_path().unwrap_or("not set")
    );
    println!(
        "default base:      {}",
        config.default_base_branch().unwrap_or("current branch")
    );
    println!("server port:       {}", config.server_port());
}
