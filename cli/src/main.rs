use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chatdesk_session::collab::{Level, Notifier};
use chatdesk_session::config::ConfigError;
use chatdesk_session::services::{self, Bootstrap};
use chatdesk_session::types::mask_token;
use chatdesk_session::{ApiError, AuthError, LoginOutcome, SessionConfig, SessionManager, StageFailure};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{}", .0.error.user_message())]
    Stage(#[from] StageFailure),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("token refresh failed")]
    RefreshFailed,
    #[error("not signed in")]
    Unauthenticated,
}

#[derive(Parser, Debug)]
#[command(name = "chatdesk", about = "Chatdesk session CLI")]
struct Cli {
    /// Session file; overrides CHATDESK_STORAGE_PATH.
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit credentials (stage 1).
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CHATDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Submit the one-time code (stage 2).
    VerifyOtp { code: String },
    ResendOtp,
    CancelOtp,
    /// Validate the stored session against the backend.
    Check,
    Refresh,
    /// Print the stored session.
    Status,
    Logout {
        /// Skip revoking the refresh token on the backend.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    SwitchTenant { tenant_id: String },
}

/// Prints toasts to stderr so stdout stays machine-readable.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, level: Level, message: &str) {
        let tag = match level {
            Level::Success => "ok",
            Level::Info => "info",
            Level::Warning => "warn",
            Level::Error => "error",
        };
        eprintln!("[{tag}] {message}");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = SessionConfig::from_env()?;
    if let Some(store) = cli.store {
        config.storage_path = store;
    }
    let session = Arc::new(SessionManager::from_config(config)?.with_notifier(Arc::new(ConsoleNotifier)));

    match cli.command {
        Command::Login { email, password } => match services::login(&session, &email, &password).await? {
            LoginOutcome::OtpRequired { otp_session_id } => {
                print_json(&json!({ "stage": "otp_pending", "otpSessionId": otp_session_id }))
            }
            LoginOutcome::Authenticated(user) => print_json(&json!({ "stage": "authenticated", "user": user })),
        },
        Command::VerifyOtp { code } => {
            let user = services::verify_otp(&session, &code).await?;
            print_json(&json!({ "stage": "authenticated", "user": user }))
        }
        Command::ResendOtp => Ok(services::resend_otp(&session).await?),
        Command::CancelOtp => Ok(services::cancel_otp_verification(&session)?),
        Command::Check => {
            let outcome = session.bootstrap().await;
            print_json(&json!({ "result": format!("{outcome:?}") }))?;
            match outcome {
                Bootstrap::Authenticated | Bootstrap::TimedOut { cached: true } => Ok(()),
                Bootstrap::Unauthenticated | Bootstrap::TimedOut { cached: false } => Err(CliError::Unauthenticated),
            }
        }
        Command::Refresh => {
            if services::refresh_token(&session).await {
                print_status(&session)
            } else {
                Err(CliError::RefreshFailed)
            }
        }
        Command::Status => print_status(&session),
        Command::Logout { force } => {
            if force {
                services::force_logout(&session, false);
            } else {
                services::logout(&session, true, false).await;
            }
            Ok(())
        }
        Command::SwitchTenant { tenant_id } => {
            let tenant = services::switch_tenant(&session, &tenant_id).await?;
            print_json(&json!({ "tenant": tenant }))
        }
    }
}

fn print_status(session: &SessionManager) -> Result<(), CliError> {
    let snapshot = session.state().snapshot();
    print_json(&json!({
        "stage": format!("{:?}", snapshot.stage()),
        "user": snapshot.user,
        "tenant": snapshot.tenant,
        "accessToken": snapshot.access_token.as_deref().map(mask_token),
        "hasRefreshToken": snapshot.refresh_token.is_some(),
        "otpSessionId": snapshot.otp_session_id,
    }))
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
