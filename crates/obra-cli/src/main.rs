//! obra - terminal front end for the construction dashboard session.
//!
//! Logs in against the users/auth service, keeps the session in the same
//! storage layout the dashboard uses, and shows the expiry warning and
//! forced logout as they happen.

mod app;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

#[derive(Parser, Debug)]
#[command(name = "obra", version, about = "Construction dashboard session client")]
struct Args {
    /// Users/auth service base URL (overrides the config file)
    #[arg(long, env = "OBRA_API_URL", global = true)]
    api_url: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Show who is logged in and for how long
    Whoami,
    /// End the session and clear stored data
    Logout,
    /// Stay attached to the session, showing the expiry warning and countdown
    Watch,
    /// Recover a forgotten password with an emailed code
    ResetPassword {
        #[arg(long)]
        email: String,
    },
    /// Check whether the current session may open a view (e.g. /admin)
    CanOpen { route: String },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().map(|n| n.to_owned()).unwrap_or_else(|| "obra.log".into());
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let _log_guard = init_tracing(args.log_file.as_deref());
    info!("obra starting");

    let mut app = App::new(args.api_url)?;
    app.restore();

    let result = match args.command {
        Command::Login { email } => app.login(email).await,
        Command::Whoami => app.whoami(),
        Command::Logout => app.logout(),
        Command::Watch => app.watch().await,
        Command::ResetPassword { email } => app.reset_password(&email).await,
        Command::CanOpen { route } => app.can_open(&route),
    };

    info!("obra shutting down");
    result
}
