//! Storefront cart CLI - inspect and edit a file-backed cart.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! cart-cli show
//!
//! # Add one unit of product 42
//! cart-cli add 42
//!
//! # Set product 42 to three units
//! cart-cli update 42 3
//!
//! # Remove product 42
//! cart-cli remove 42
//!
//! # Discard the stored cart (also recovers from a corrupt cart file)
//! cart-cli reset
//! ```
//!
//! Configuration is read from the environment (see `storefront_cart::config`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use storefront_cart::{CartConfig, ProductId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "cart-cli")]
#[command(author, version, about = "Storefront cart CLI tools")]
struct Cli {
    /// Print the cart as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the cart contents
    Show,
    /// Add one unit of a product
    Add {
        /// Catalog product ID
        product_id: ProductId,
    },
    /// Remove a product from the cart
    Remove {
        /// Catalog product ID
        product_id: ProductId,
    },
    /// Set the quantity of a product already in the cart
    Update {
        /// Catalog product ID
        product_id: ProductId,

        /// New quantity (must be at least 1)
        #[arg(allow_hyphen_values = true)]
        amount: i64,
    },
    /// Replace the stored cart with an empty one
    Reset,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
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

    // Load configuration from environment (needed for Sentry init)
    let config = CartConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Logs go to stderr so stdout stays clean for cart output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storefront_cart=info,cart_cli=info".into());

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

async fn run(cli: Cli, config: &CartConfig) -> Result<(), Box<dyn std::error::Error>> {
    let output = commands::Output { json: cli.json };
    match cli.command {
        Commands::Show => commands::cart::show(config, output).await?,
        Commands::Add { product_id } => commands::cart::add(config, product_id, output).await?,
        Commands::Remove { product_id } => {
            commands::cart::remove(config, product_id, output).await?;
        }
        Commands::Update { product_id, amount } => {
            commands::cart::update(config, product_id, amount, output).await?;
        }
        Commands::Reset => commands::cart::reset(config, output).await?,
    }
    Ok(())
}
