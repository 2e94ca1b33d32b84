// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Byfrost - multi-tenant WhatsApp operations platform.
//!
//! This is the binary entry point for the Byfrost server.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod serve;

/// Byfrost - multi-tenant WhatsApp operations platform.
#[derive(Parser, Debug)]
#[command(name = "byfrost", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Byfrost gateway server.
    Serve,
    /// Print the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match byfrost_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            byfrost_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("byfrost serve failed: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => {
            println!("service.name = {}", config.service.name);
            println!("service.log_level = {}", config.service.log_level);
            println!("server = {}:{}", config.server.host, config.server.port);
            println!("storage.database_path = {}", config.storage.database_path);
            println!(
                "routing.fallback_journey_key = {}",
                config.routing.fallback_journey_key
            );
            println!("presence.enabled = {}", config.presence.enabled);
        }
        None => {
            println!("byfrost: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Verify jemalloc is the global allocator by advancing the epoch.
        // Only jemalloc supports this -- the system allocator would fail.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = byfrost_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.service.name, "byfrost");
    }
}
