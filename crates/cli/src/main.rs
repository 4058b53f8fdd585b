//! Skilltrack CLI - sign-in, profile, catalog and lab timer.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (the session is kept for later commands)
//! skilltrack sign-in -e learner@example.com
//!
//! # Show who is signed in
//! skilltrack whoami
//!
//! # Edit the profile
//! skilltrack profile update --company "Acme" --experience intermediate
//!
//! # Browse the catalog
//! skilltrack catalog labs --category devops --difficulty advanced
//!
//! # Run a lab timer
//! skilltrack lab run docker-containerization
//! ```
//!
//! # Commands
//!
//! - `sign-in` / `sign-up` / `sign-out` / `whoami` - Session management
//! - `profile show` / `profile update` - Profile editing
//! - `check` - Route access for the current session
//! - `catalog` - Services, courses and labs
//! - `lab run` - Countdown for a hands-on lab

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use skilltrack_core::ExperienceLevel;
use skilltrack_labs::catalog::{Catalog, LabFilter};
use skilltrack_labs::config::{ConfigError, LabsConfig};
use skilltrack_labs::state::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CommandError;

#[derive(Parser)]
#[command(name = "skilltrack")]
#[command(author, version, about = "Skilltrack Labs command-line tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    SignIn {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "SKILLTRACK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    SignUp {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "SKILLTRACK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Display name stored with the account
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Sign out and forget the stored session
    SignOut,
    /// Show the signed-in user and their profile
    Whoami,
    /// View or edit the signed-in user's profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Show whether the current session may open a page
    Check {
        /// Page path, e.g. `/admin` or `/enroll/cloud/aws-sa`
        path: String,
    },
    /// Browse the course and lab catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Hands-on lab sessions
    Lab {
        #[command(subcommand)]
        action: LabAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Print the stored profile
    Show,
    /// Change profile fields; omitted fields keep their value, empty
    /// strings clear optional ones
    Update(commands::profile::UpdateArgs),
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List service areas
    Services,
    /// List the courses of a service
    Courses { service: String },
    /// Show one course
    Course { service: String, course: String },
    /// List lab categories
    Categories,
    /// List labs, optionally filtered
    Labs {
        /// Match title, description or technology
        #[arg(short, long)]
        search: Option<String>,

        /// Category id
        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        difficulty: Option<ExperienceLevel>,

        /// Only free labs
        #[arg(long)]
        free: bool,

        /// Only popular labs
        #[arg(long)]
        popular: bool,
    },
    /// Show one lab
    Lab { id: String },
}

#[derive(Subcommand)]
enum LabAction {
    /// Start a lab and count down until it ends or Ctrl+C
    Run {
        id: String,

        /// Override the lab's advertised duration
        #[arg(short, long)]
        minutes: Option<u32>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &LabsConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::debug!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Catalog and lab commands work without backend settings, so a config
    // error only surfaces once a command needs the backend.
    let config = LabsConfig::from_env();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "skilltrack_labs=warn,skilltrack_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli, config).await {
        e.capture();
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(
    cli: Cli,
    config: Result<LabsConfig, ConfigError>,
) -> Result<(), CommandError> {
    match cli.command {
        Commands::Catalog { action } => {
            let catalog = Catalog::embedded()?;
            run_catalog(&catalog, action)
        }
        Commands::Lab {
            action: LabAction::Run { id, minutes },
        } => {
            let catalog = Catalog::embedded()?;
            commands::lab::run(&catalog, &id, minutes).await
        }
        command => {
            let state = AppState::connect(config?).await?;
            let result = run_session(&state, command).await;
            state.bootstrapper().shutdown().await;
            result
        }
    }
}

async fn run_session(state: &AppState, command: Commands) -> Result<(), CommandError> {
    match command {
        Commands::SignIn { email, password } => {
            commands::auth::sign_in(state, &email, &SecretString::from(password)).await
        }
        Commands::SignUp {
            email,
            password,
            name,
        } => {
            let password = SecretString::from(password);
            commands::auth::sign_up(state, &email, &password, name.as_deref()).await
        }
        Commands::SignOut => commands::auth::sign_out(state).await,
        Commands::Whoami => commands::auth::whoami(state).await,
        Commands::Profile { action } => match action {
            ProfileAction::Show => commands::profile::show(state).await,
            ProfileAction::Update(args) => commands::profile::update(state, args).await,
        },
        Commands::Check { path } => commands::auth::check(state, &path).await,
        // Handled in `run` without a backend.
        Commands::Catalog { .. } | Commands::Lab { .. } => Ok(()),
    }
}

fn run_catalog(catalog: &Catalog, action: CatalogAction) -> Result<(), CommandError> {
    match action {
        CatalogAction::Services => commands::catalog::services(catalog),
        CatalogAction::Courses { service } => commands::catalog::courses(catalog, &service)?,
        CatalogAction::Course { service, course } => {
            commands::catalog::course(catalog, &service, &course)?;
        }
        CatalogAction::Categories => commands::catalog::categories(catalog),
        CatalogAction::Labs {
            search,
            category,
            difficulty,
            free,
            popular,
        } => commands::catalog::labs(
            catalog,
            &LabFilter {
                search,
                category,
                difficulty,
                free_only: free,
            },
            popular,
        ),
        CatalogAction::Lab { id } => commands::catalog::lab(catalog, &id)?,
    }
    Ok(())
}
