//! CloudWarden CLI — the main entry point.
//!
//! Commands:
//! - `init`     — Create the config file and database
//! - `connect`  — Save AWS and model credentials
//! - `chat`     — Interactive or single-message chat with the agent
//! - `scan`     — Audit services across regions and classify findings
//! - `patch`    — Remediate a consented finding
//! - `pending` / `approve` / `reject` — Decide on proposed commands
//! - `settings` — Show or change model, monitor mode, request cap

use clap::{Parser, Subcommand, ValueEnum};
use cloudwarden_core::store::CommandDecision;

mod commands;

#[derive(Parser)]
#[command(
    name = "cloudwarden",
    about = "CloudWarden — AI-driven AWS security audits with human approval",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config file and database
    Init,

    /// Save AWS credentials and the model API key
    Connect {
        #[arg(long, env = "AWS_ACCESS_KEY_ID")]
        access_key: String,

        #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
        secret_key: String,

        #[arg(long, env = "AWS_DEFAULT_REGION")]
        region: String,

        #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
        session_token: Option<String>,

        /// Model backend API key
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Chat with the agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show the chat history
    History {
        /// Delete all chat messages instead
        #[arg(long)]
        clear: bool,
    },

    /// Scan services across regions for misconfigurations
    Scan {
        #[arg(long, value_delimiter = ',', required = true)]
        services: Vec<String>,

        #[arg(long, value_delimiter = ',', required = true)]
        regions: Vec<String>,
    },

    /// List stored findings
    Findings {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Allow (or stop allowing) a finding to be patched
    Consent {
        id: String,

        #[arg(long)]
        revoke: bool,
    },

    /// Remediate a finding
    Patch { finding_id: String },

    /// Show the status of a scan, patch, or chat
    Status { id: String },

    /// List commands awaiting approval
    Pending,

    /// Approve a pending command
    Approve { id: String },

    /// Reject a pending command
    Reject { id: String },

    /// Show or update runtime settings
    Settings {
        #[arg(long)]
        model: Option<String>,

        #[arg(long, value_enum)]
        monitor: Option<Toggle>,

        #[arg(long)]
        max_requests: Option<u32>,
    },

    /// List the configured models, services, and regions
    Options,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Connect {
            access_key,
            secret_key,
            region,
            session_token,
            api_key,
        } => {
            commands::connect::run(commands::connect::ConnectArgs {
                access_key,
                secret_key,
                region,
                session_token,
                api_key,
            })
            .await?
        }
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::History { clear } => commands::chat::history(clear).await?,
        Commands::Scan { services, regions } => commands::scan::run(services, regions).await?,
        Commands::Findings { json } => commands::findings::list(json).await?,
        Commands::Consent { id, revoke } => commands::findings::consent(&id, revoke).await?,
        Commands::Patch { finding_id } => commands::patch::run(&finding_id).await?,
        Commands::Status { id } => commands::status::run(&id).await?,
        Commands::Pending => commands::approval::pending().await?,
        Commands::Approve { id } => commands::approval::decide(&id, CommandDecision::Accept).await?,
        Commands::Reject { id } => commands::approval::decide(&id, CommandDecision::Reject).await?,
        Commands::Settings {
            model,
            monitor,
            max_requests,
        } => {
            let monitor = monitor.map(|t| matches!(t, Toggle::On));
            commands::settings::run(model, monitor, max_requests).await?
        }
        Commands::Options => commands::options::run().await?,
    }

    Ok(())
}
