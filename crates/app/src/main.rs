//! `securelearn` binary: HTTP server plus a couple of maintenance commands.

use std::fmt;

use anyhow::Context;
use chrono::Duration;
use clap::{Args as ClapArgs, Parser, Subcommand};
use services::{
    AppServices, Clock, DEFAULT_SESSION_TTL_HOURS, GoogleOAuthConfig, SeedOutcome, ServicesConfig,
    seed_sample_content,
};
use training_core::model::AttemptWindow;
use tracing_subscriber::{EnvFilter, fmt as log_fmt, prelude::*};

const DEFAULT_DB_URL: &str = "sqlite://securelearn.sqlite3";
const DEFAULT_BIND: &str = "0.0.0.0:5000";

#[derive(Debug)]
enum ArgsError {
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid database url: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

/// Security-awareness training portal.
#[derive(Parser)]
#[command(name = "securelearn", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// SQLite database url or path.
    #[arg(long = "db", env = "SECURELEARN_DB_URL", default_value = DEFAULT_DB_URL, global = true)]
    db_url: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default).
    Serve(ServeArgs),
    /// Insert the sample "Password & Authentication" section if missing.
    Seed,
    /// Grant the admin role to an existing user.
    MakeAdmin {
        /// Email the user signed in with.
        email: String,
    },
}

#[derive(ClapArgs)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "SECURELEARN_BIND", default_value = DEFAULT_BIND)]
    bind: String,

    /// Public URL of the portal; the OAuth redirect is derived from it.
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:5000")]
    base_url: String,

    #[arg(long, env = "GOOGLE_CLIENT_ID", default_value = "", hide_env_values = true)]
    google_client_id: String,

    #[arg(long, env = "GOOGLE_CLIENT_SECRET", default_value = "", hide_env_values = true)]
    google_client_secret: String,

    /// Only accept sign-ins from this email domain.
    #[arg(long, env = "ALLOWED_EMAIL_DOMAIN")]
    allowed_email_domain: Option<String>,

    #[arg(long, env = "SESSION_TTL_HOURS", default_value_t = DEFAULT_SESSION_TTL_HOURS)]
    session_ttl_hours: i64,

    #[arg(long, env = "ASSESSMENT_TIME_LIMIT_MINUTES")]
    time_limit_minutes: Option<i64>,
}

impl ServeArgs {
    /// Serve settings when no subcommand is given: env vars and defaults only.
    fn parse_from_env() -> Self {
        #[derive(Parser)]
        struct Bare {
            #[command(flatten)]
            serve: ServeArgs,
        }
        Bare::parse_from(["securelearn"]).serve
    }

    fn services_config(&self) -> anyhow::Result<ServicesConfig> {
        let mut attempt_window = AttemptWindow::default();
        if let Some(minutes) = self.time_limit_minutes.filter(|m| *m > 0) {
            attempt_window.limit = Duration::try_minutes(minutes)
                .with_context(|| format!("ASSESSMENT_TIME_LIMIT_MINUTES out of range: {minutes}"))?;
        }
        let session_ttl = Duration::try_hours(self.session_ttl_hours.max(1)).with_context(|| {
            format!("SESSION_TTL_HOURS out of range: {}", self.session_ttl_hours)
        })?;
        let oauth = GoogleOAuthConfig::new(
            self.google_client_id.clone(),
            self.google_client_secret.clone(),
            &self.base_url,
        );
        if oauth.is_none() {
            tracing::warn!("GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET not set; sign-in is disabled");
        }
        Ok(ServicesConfig {
            session_ttl,
            allowed_email_domain: self.allowed_email_domain.clone(),
            attempt_window,
            oauth,
        })
    }
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), ArgsError> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let invalid = || ArgsError::InvalidDbUrl {
        raw: db_url.to_owned(),
    };
    let path = db_url.strip_prefix("sqlite://").ok_or_else(invalid)?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(invalid());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|_| invalid())?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|_| invalid())?;
    }
    Ok(())
}

async fn open_services(db_url: &str, config: ServicesConfig) -> anyhow::Result<AppServices> {
    let db_url = normalize_sqlite_url(db_url);
    // Open + migrate at startup; the service crates never touch the filesystem.
    prepare_sqlite_file(&db_url)?;
    AppServices::new_sqlite(&db_url, Clock::system(), config)
        .await
        .with_context(|| format!("opening database {db_url}"))
}

async fn serve(db_url: &str, args: ServeArgs) -> anyhow::Result<()> {
    let secure_cookies = args.base_url.starts_with("https://");
    let services = open_services(db_url, args.services_config()?).await?;
    services.auth().purge_expired_sessions().await?;

    let app = api::router(api::AppState::new(services, secure_cookies));
    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    tracing::info!(addr = %args.bind, "securelearn listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}

async fn seed(db_url: &str) -> anyhow::Result<()> {
    let services = open_services(db_url, ServicesConfig::default()).await?;
    match seed_sample_content(
        &services.sections(),
        &services.modules(),
        &services.assessments(),
    )
    .await?
    {
        SeedOutcome::Inserted {
            section_id,
            modules,
            questions,
        } => println!("seeded section {section_id} ({modules} modules, {questions} questions)"),
        SeedOutcome::AlreadyPresent(section_id) => {
            println!("sample content already present (section {section_id})");
        }
    }
    Ok(())
}

async fn make_admin(db_url: &str, email: &str) -> anyhow::Result<()> {
    let services = open_services(db_url, ServicesConfig::default()).await?;
    match services.auth().promote(email).await {
        Ok(user) => {
            println!("{} is now an admin", user.email);
            Ok(())
        }
        Err(e) if e.is_unknown_user() => {
            anyhow::bail!("no user with email {email}; they must sign in once first")
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone());
    tracing_subscriber::registry()
        .with(log_fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)))
        .init();

    match cli.command {
        None => serve(&cli.db_url, ServeArgs::parse_from_env()).await,
        Some(Command::Serve(args)) => serve(&cli.db_url, args).await,
        Some(Command::Seed) => seed(&cli.db_url).await,
        Some(Command::MakeAdmin { email }) => make_admin(&cli.db_url, &email).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_become_absolute_urls() {
        let url = normalize_sqlite_url("data/app.sqlite3");
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/app.sqlite3"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(normalize_sqlite_url("sqlite:///tmp/x.db"), "sqlite:///tmp/x.db");
    }

    #[test]
    fn serve_subcommand_reads_flags() {
        let cli = Cli::parse_from([
            "securelearn",
            "serve",
            "--bind",
            "127.0.0.1:8080",
            "--time-limit-minutes",
            "45",
        ]);
        let Some(Command::Serve(args)) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.bind, "127.0.0.1:8080");
        assert_eq!(
            args.services_config().unwrap().attempt_window.limit,
            Duration::minutes(45)
        );
    }

    #[test]
    fn oversized_durations_are_config_errors() {
        let cli = Cli::parse_from([
            "securelearn",
            "serve",
            "--time-limit-minutes",
            i64::MAX.to_string().as_str(),
        ]);
        let Some(Command::Serve(args)) = cli.command else {
            panic!("expected serve");
        };
        let err = args.services_config().unwrap_err();
        assert!(err.to_string().contains("ASSESSMENT_TIME_LIMIT_MINUTES"));

        let cli = Cli::parse_from([
            "securelearn",
            "serve",
            "--session-ttl-hours",
            i64::MAX.to_string().as_str(),
        ]);
        let Some(Command::Serve(args)) = cli.command else {
            panic!("expected serve");
        };
        let err = args.services_config().unwrap_err();
        assert!(err.to_string().contains("SESSION_TTL_HOURS"));
    }

    #[test]
    fn make_admin_takes_an_email() {
        let cli = Cli::parse_from(["securelearn", "make-admin", "boss@corp.test"]);
        assert!(matches!(cli.command, Some(Command::MakeAdmin { email }) if email == "boss@corp.test"));
    }
}
