mod cache;
mod config;
mod download;
mod error;
mod fetch;
mod install;
mod launcher;
mod models;
mod signals;
mod utils;
mod version;

use config::{Config, LOG_ENV};
use launcher::{Launcher, Outcome};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utils::print_error;

#[tokio::main]
async fn main() {
    // Initialize logging; quiet by default so the launcher stays transparent
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Every argument after the program name belongs to deno
    let args = std::env::args_os().skip(1).collect();

    let outcome = match Config::load() {
        Ok(config) => Launcher::new(config).run(args).await,
        Err(e) => Outcome::failed(e),
    };

    if let Some(error) = &outcome.error {
        print_error(&error.to_string());
    }

    std::process::exit(outcome.exit_code);
}
