//! Wingman - command-line setup for Wingman Monitor.
//!
//! # Commands
//!
//! - `wingman init`: Create `.wingman.json` and send a test report
//! - `wingman enable` / `wingman disable`: Toggle reporting
//! - `wingman update`: Change token, environment or project id
//! - `wingman status`: Show the current configuration
//! - `wingman test`: Send a test report to the webhook
//!
//! # Environment Variables
//!
//! See the [`wingman_monitor::config`] module for available configuration options.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use wingman_monitor::config::{resolve_webhook_url, ConfigStore, ConfigUpdate, NewConfig};
use wingman_monitor::environment::{environment_config, EnvironmentProbe, ProcessEnvironment};
use wingman_monitor::project::project_info;
use wingman_monitor::sender::{Sender, SenderConfig};
use wingman_monitor::types::{ErrorReport, ErrorType};
use wingman_monitor::ProjectConfig;

/// Timeout of the test delivery made by `init` and `test`.
const TEST_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default environment label written by `init`.
const DEFAULT_ENVIRONMENT: &str = "production";

/// Wingman - runtime error monitoring.
///
/// Configures error reporting for a project and verifies the webhook.
#[derive(Parser, Debug)]
#[command(name = "wingman")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    WINGMAN_WEBHOOK_URL    Webhook receiving error reports
    WINGMAN_ENV            Runtime classification (development, production, ...)
    RUST_LOG               Log filter (default: info)

EXAMPLES:
    # Set up monitoring for the current project
    wingman init --token tok_live_123

    # Pause reporting
    wingman disable

    # Check the webhook
    wingman test
")]
struct Cli {
    /// Project root containing .wingman.json.
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Create the project config and send a test report.
    Init {
        /// Access token sent as the bearer credential.
        #[arg(short, long)]
        token: String,

        /// Environment label attached to reports.
        #[arg(short, long, default_value = DEFAULT_ENVIRONMENT)]
        environment: String,

        /// Project identifier on the receiving side.
        #[arg(long)]
        project_id: Option<String>,

        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,

        /// Do not send a test report.
        #[arg(long)]
        skip_test: bool,
    },

    /// Turn reporting on.
    Enable,

    /// Turn reporting off.
    Disable,

    /// Change configuration values.
    Update {
        #[arg(short, long)]
        token: Option<String>,

        #[arg(short, long)]
        environment: Option<String>,

        #[arg(long)]
        project_id: Option<String>,
    },

    /// Show the current configuration.
    Status,

    /// Send a test report to the webhook.
    Test,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match cli.command {
        Command::Init {
            token,
            environment,
            project_id,
            force,
            skip_test,
        } => run_init(
            &cli.project,
            NewConfig {
                access_token: token,
                project_id,
                environment,
            },
            force,
            skip_test,
        ),
        Command::Enable => run_toggle(&cli.project, true),
        Command::Disable => run_toggle(&cli.project, false),
        Command::Update {
            token,
            environment,
            project_id,
        } => run_update(
            &cli.project,
            ConfigUpdate {
                access_token: token,
                project_id,
                environment,
                enabled: None,
            },
        ),
        Command::Status => run_status(&cli.project),
        Command::Test => {
            let mut store = ConfigStore::new(&cli.project);
            let config = load_required(&mut store)?;
            send_test_report(&config)
        }
    }
}

/// Writes a fresh config and optionally verifies the webhook.
fn run_init(project: &Path, new: NewConfig, force: bool, skip_test: bool) -> Result<()> {
    let mut store = ConfigStore::new(project);

    if store.config_path().exists() && !force {
        bail!(
            "config already exists at {} (use --force to overwrite)",
            store.config_path().display()
        );
    }

    let config = store.initialize(new).clone();
    store
        .save(ConfigUpdate::default())
        .context("Failed to write config")?;
    println!("Created {}", store.config_path().display());

    if skip_test {
        return Ok(());
    }
    send_test_report(&config)
}

fn run_toggle(project: &Path, enabled: bool) -> Result<()> {
    let mut store = ConfigStore::new(project);
    load_required(&mut store)?;

    store
        .save(ConfigUpdate::enabled(enabled))
        .context("Failed to write config")?;
    println!(
        "Error reporting {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

fn run_update(project: &Path, update: ConfigUpdate) -> Result<()> {
    if update.access_token.is_none() && update.environment.is_none() && update.project_id.is_none()
    {
        bail!("nothing to update (pass --token, --environment or --project-id)");
    }

    let mut store = ConfigStore::new(project);
    load_required(&mut store)?;

    store.save(update).context("Failed to write config")?;
    println!("Updated {}", store.config_path().display());
    Ok(())
}

fn run_status(project: &Path) -> Result<()> {
    let mut store = ConfigStore::new(project);
    let config = load_required(&mut store)?;
    let derived = environment_config(&ProcessEnvironment);

    println!("Config:        {}", store.config_path().display());
    println!("Enabled:       {}", config.enabled);
    println!("Environment:   {}", config.environment);
    println!(
        "Project ID:    {}",
        config.project_id.as_deref().unwrap_or("-")
    );
    println!("Access token:  {}", mask_token(&config.access_token));
    println!("Created:       {}", config.created_at.to_rfc3339());
    println!("Webhook:       {}", resolve_webhook_url(None));
    println!();
    println!("Runtime:       {}", ProcessEnvironment.environment());
    println!("Reporting:     {}", derived.enable_error_reporting);
    println!("Performance:   {}", derived.enable_performance_monitoring);
    println!("Debug logs:    {}", derived.enable_debug_logs);
    println!("API endpoint:  {}", derived.api_endpoint);
    Ok(())
}

fn load_required(store: &mut ConfigStore) -> Result<ProjectConfig> {
    store.load().with_context(|| {
        format!(
            "no readable config at {} (run `wingman init` first)",
            store.config_path().display()
        )
    })
}

/// Posts a test report with the given config.
fn send_test_report(config: &ProjectConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let sender = Sender::new(
        SenderConfig::new(resolve_webhook_url(None)).with_timeout(TEST_REQUEST_TIMEOUT),
    );
    let report = ErrorReport {
        message: "Wingman test report: monitoring is configured correctly".to_string(),
        error_type: ErrorType::CustomError,
        severity: ErrorType::CustomError.severity(),
        environment: config.environment.clone(),
        access_token: config.access_token.clone(),
        timestamp: Utc::now(),
        stack: None,
        project_info: Some(project_info(&config.project_path)),
        metadata: None,
    };

    info!(url = %sender.webhook_url(), "Sending test report");
    runtime
        .block_on(sender.deliver(&report))
        .context("Test report was not accepted")?;

    println!("Test report delivered to {}", sender.webhook_url());
    Ok(())
}

/// Keeps the first four characters of a token.
fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    if token.chars().count() <= 4 {
        return "*".repeat(token.chars().count());
    }
    format!("{visible}{}", "*".repeat(8))
}

/// Initializes the tracing subscriber.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_level(true)
            .with_file(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .init();
    }
}
