use clap::Parser;
use tracing_subscriber::EnvFilter;

use carbot_steer_runtime::config::Args;

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=debug for per tick output)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init(); // installs the subscriber globally

    // Bad parameters are fatal before anything is opened
    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = carbot_steer_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
