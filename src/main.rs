//! Agentpair - Main Entry Point
//!
//! Runs the writer or reviewer service, the interactive workflow, or prints the
//! effective service configuration.

use agentpair::config::{AgentKind, ServiceConfig, WorkflowConfig};
use agentpair::observability::{init_logging_from_env, LogFormat, LogOutput};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{debug, error, info};

/// Writer and reviewer agents plus a workflow runner
#[derive(Parser)]
#[command(name = "agentpair")]
#[command(about = "Writer and reviewer LLM agents with A2A and MCP front-ends")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override its values
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the writer service
    Writer,
    /// Run the reviewer service
    Reviewer,
    /// Run the interactive writer -> reviewer workflow
    Workflow,
    /// Validate a service configuration
    Config {
        /// Service whose configuration to load
        #[arg(long, value_name = "writer|reviewer")]
        service: AgentKind,
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let dotenv_loaded = dotenv::dotenv().is_ok();

    // Console output belongs to the workflow, so its logs go to stderr.
    match &cli.command {
        Commands::Workflow => init_logging_from_env(LogFormat::Compact, LogOutput::Stderr),
        _ => init_logging_from_env(LogFormat::Json, LogOutput::Stdout),
    }
    if dotenv_loaded {
        debug!("Loaded environment from .env");
    }

    let result = match cli.command {
        Commands::Writer => run_service(AgentKind::Writer, cli.config).await,
        Commands::Reviewer => run_service(AgentKind::Reviewer, cli.config).await,
        Commands::Workflow => run_workflow().await,
        Commands::Config { service, show } => handle_config_command(service, cli.config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(
    kind: AgentKind,
    config_path: Option<PathBuf>,
) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    if let Some(path) = &config_path {
        info!("Loading configuration from: {}", path.display());
    }
    Ok(ServiceConfig::load(kind, config_path.as_deref())?)
}

async fn run_service(
    kind: AgentKind,
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_configuration(kind, config_path)?;
    info!(
        "Starting {} v{} on {}:{}",
        config.service.name,
        env!("CARGO_PKG_VERSION"),
        config.service.host,
        config.service.port
    );
    agentpair::service::run(config).await?;
    info!("Application shutdown complete");
    Ok(())
}

async fn run_workflow() -> Result<(), Box<dyn std::error::Error>> {
    let config = WorkflowConfig::from_env()?;
    agentpair::workflow::run(config).await?;
    Ok(())
}

fn handle_config_command(
    kind: AgentKind,
    config_path: Option<PathBuf>,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_configuration(kind, config_path)?;
    if show {
        println!("Effective {} configuration:", config.service.name);
        println!("{}", config.to_toml()?);
    }

    info!("Configuration validation complete");
    Ok(())
}
