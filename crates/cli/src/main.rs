//! Storecart CLI - drive the cart sync engine from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in and adopt the server cart
//! sc-cli login --token "$TOKEN"
//!
//! # Add a product, then change its quantity
//! sc-cli add 10 --price 19.99 --name "Dried Pineapple"
//! sc-cli set-qty 42 3
//!
//! # Show the cart
//! sc-cli show
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` - Start or end the session
//! - `show` / `reload` - Inspect or refresh the cart
//! - `add`, `set-qty`, `toggle`, `remove`, `clear`, `select-all`, `drop` - Change the cart
//!
//! Lines are addressed by their remote ID (`42`) or, for lines that were
//! never synced, by product (`p:10`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand, ValueEnum};
use sentry::integrations::tracing as sentry_tracing;
use storecart_core::{Price, ProductId, UserRole};
use storecart_sync::{LineKey, SyncConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "sc-cli")]
#[command(author, version, about = "Storecart cart sync CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with a bearer token and adopt the server cart
    Login {
        /// Bearer token issued by the shop
        #[arg(short, long, env = "STORECART_TOKEN", hide_env_values = true)]
        token: String,

        /// Account role
        #[arg(short, long, value_enum)]
        role: Option<RoleArg>,
    },
    /// Sign out and empty the local cart
    Logout,
    /// Print the cart
    Show {
        /// Print the stored JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Refresh the cart from the service (or from disk when signed out)
    Reload,
    /// Add one unit of a product
    Add {
        /// Product ID
        product: ProductId,

        /// Unit price shown until the service confirms it
        #[arg(short, long, default_value = "0")]
        price: Price,

        /// Product name
        #[arg(short, long)]
        name: Option<String>,

        /// Product image URL
        #[arg(long)]
        image: Option<String>,
    },
    /// Set a line's quantity (zero or less removes it)
    SetQty {
        /// Line ID, or p:<product-id> for unsynced lines
        line: LineKey,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Flip a line's selection
    Toggle {
        /// Line ID, or p:<product-id> for unsynced lines
        line: LineKey,
    },
    /// Remove one line
    Remove {
        /// Line ID, or p:<product-id> for unsynced lines
        line: LineKey,
    },
    /// Remove every line
    Clear,
    /// Select or deselect every line
    SelectAll {
        /// Deselect instead of select
        #[arg(long)]
        none: bool,
    },
    /// Drop lines from the local cart without contacting the service
    Drop {
        /// Line IDs, or p:<product-id> for unsynced lines
        #[arg(required = true)]
        lines: Vec<LineKey>,
    },
}

/// Account roles accepted on the command line.
#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Customer,
    Admin,
}

impl From<RoleArg> for UserRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Customer => Self::Customer,
            RoleArg::Admin => Self::Admin,
        }
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SyncConfig) -> Option<sentry::ClientInitGuard> {
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

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storecart_sync=info,storecart_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, &config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = commands::Context::open(config)?;

    match cli.command {
        Commands::Login { token, role } => {
            commands::session::login(&mut ctx, token, role.map(UserRole::from)).await?;
        }
        Commands::Logout => commands::session::logout(&mut ctx),
        Commands::Show { json } => commands::cart::show(&ctx, json)?,
        Commands::Reload => commands::cart::reload(&mut ctx).await?,
        Commands::Add {
            product,
            price,
            name,
            image,
        } => commands::cart::add(&mut ctx, product, price, name, image).await?,
        Commands::SetQty { line, quantity } => {
            commands::cart::set_quantity(&mut ctx, line, quantity).await?;
        }
        Commands::Toggle { line } => commands::cart::toggle(&mut ctx, line).await?,
        Commands::Remove { line } => commands::cart::remove(&mut ctx, line).await?,
        Commands::Clear => commands::cart::clear(&mut ctx).await?,
        Commands::SelectAll { none } => commands::cart::select_all(&mut ctx, !none).await?,
        Commands::Drop { lines } => commands::cart::drop_lines(&mut ctx, &lines),
    }

    Ok(())
}
