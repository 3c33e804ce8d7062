//! uxlaws - command-line client for the UX laws learning service.
//!
//! Signs in, shows the cached profile and reads or updates learning
//! progress. Credentials live in the OS keychain by default, or in an
//! obfuscated local file when `UXLAWS_STORAGE=local`.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use uxlaws_core::auth::AuthError;
use uxlaws_core::{open_store, ApiClient, ApiError, AuthState, Config, Session};

/// Total number of laws in the catalog, for progress percentages
const TOTAL_LAWS: usize = 30;

/// Log file name prefix inside `--log-dir`
const LOG_FILE_PREFIX: &str = "uxlaws.log";

#[derive(Debug, Parser)]
#[command(name = "uxlaws", version, about = "Learn the laws of UX from the terminal")]
struct Cli {
    /// Override the API base URL
    #[arg(long, env = "UXLAWS_API_URL", global = true)]
    api_url: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Forget the stored token and user
    Logout,
    /// Show who is signed in, from the local cache
    Whoami,
    /// Fetch the profile from the server
    Profile,
    /// Show learned laws
    Progress,
    /// Mark a law as learned
    Complete {
        /// Law identifier, e.g. `fitts-law`
        law_id: String,
    },
    /// Clear all learning progress
    ResetProgress,
    /// Show which credential storage backend is in use
    Storage,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
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

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_ref());

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });
    config.apply_env();
    if let Some(url) = cli.api_url.clone() {
        config.api_base_url = Some(url);
    }
    debug!(api = config.api_base_url(), storage = %config.storage_backend(), "Config loaded");

    let store = open_store(&config).context("Failed to open credential store")?;
    let api = ApiClient::new(&config, store).context("Failed to create API client")?;
    let session = Session::new(api);

    let result = run(cli.command, &session, &mut config).await;
    if let Err(ref e) = result {
        if is_unauthorized(e) {
            eprintln!("Your session has expired. Run `uxlaws login` to sign in again.");
        }
    }
    result
}

fn is_unauthorized(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(cause.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized))
            || matches!(
                cause.downcast_ref::<AuthError>(),
                Some(AuthError::Api(ApiError::Unauthorized))
            )
    })
}

async fn run(command: Command, session: &Session, config: &mut Config) -> Result<()> {
    match command {
        Command::Login { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            let password = rpassword::prompt_password("Password: ")?;
            let user = session.login(&email, &password).await?;

            config.last_email = Some(email);
            if let Err(e) = config.save() {
                tracing::warn!(error = %e, "Failed to save config");
            }
            info!("Login successful");
            println!("Welcome back, {}!", user.display_name());
        }
        Command::Register { name, email } => {
            let password = rpassword::prompt_password("Choose a password: ")?;
            let confirm = rpassword::prompt_password("Confirm password: ")?;
            if password != confirm {
                anyhow::bail!("Passwords do not match");
            }
            let user = session.register(&name, &email, &password).await?;

            config.last_email = Some(email);
            if let Err(e) = config.save() {
                tracing::warn!(error = %e, "Failed to save config");
            }
            println!("Welcome, {}!", user.display_name());
        }
        Command::Logout => {
            session.logout().await;
            println!("Signed out.");
        }
        Command::Whoami => match session.state().await {
            AuthState::Authenticated(user) => println!("{} <{}>", user.name, user.email),
            AuthState::Unauthenticated => println!("Not signed in."),
        },
        Command::Profile => {
            let user = session.refresh_profile().await?;
            println!("Name:   {}", user.name);
            println!("Email:  {}", user.email);
            if let Some(created) = user.created_at {
                println!("Joined: {}", created.format("%b %d, %Y"));
            }
        }
        Command::Progress => {
            let progress = session.api().fetch_progress().await?;
            println!(
                "{} of {} laws learned ({}%)",
                progress.completed_count(),
                TOTAL_LAWS,
                progress.percent_of(TOTAL_LAWS)
            );
            for law in &progress.completed_laws {
                println!("  - {}", law);
            }
        }
        Command::Complete { law_id } => {
            let progress = session.api().complete_law(&law_id).await?;
            println!(
                "Marked {} as learned ({} total).",
                law_id,
                progress.completed_count()
            );
        }
        Command::ResetProgress => {
            session.api().reset_progress().await?;
            println!("Progress cleared.");
        }
        Command::Storage => {
            println!("{}", session.api().store().backend());
        }
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
