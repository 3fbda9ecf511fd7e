// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Zapline operator CLI.
//!
//! Validates configuration and inspects the configured session store.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod sessions;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use zapline_config::ZaplineConfig;

/// Zapline - tenant-aware messaging instance manager.
#[derive(Parser, Debug)]
#[command(name = "zapline", version, about, long_about = None)]
struct Cli {
    /// Load this file instead of the standard configuration hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect Zapline configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
    /// Inspect the configured session store.
    Sessions {
        #[command(subcommand)]
        action: SessionCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validate configuration and report problems.
    Check,
    /// Print the effective configuration as TOML.
    Show,
}

#[derive(Subcommand, Debug)]
enum SessionCommands {
    /// List instances with stored credentials.
    List {
        /// Output JSON instead of plain lines.
        #[arg(long)]
        json: bool,
    },
    /// Remove the stored credentials of one instance.
    Remove {
        /// Instance id.
        instance_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            zapline_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.manager.log_level);

    let result = match cli.command {
        Some(Commands::Config { action }) => run_config(&config, action),
        Some(Commands::Sessions { action }) => match action {
            SessionCommands::List { json } => sessions::run_list(&config, json).await,
            SessionCommands::Remove { instance_id } => {
                sessions::run_remove(&config, &instance_id).await
            }
        },
        None => {
            println!("zapline: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn load(path: Option<&std::path::Path>) -> Result<ZaplineConfig, Vec<zapline_config::ConfigError>> {
    match path {
        Some(path) => zapline_config::load_and_validate_path(path),
        None => zapline_config::load_and_validate(),
    }
}

fn run_config(
    config: &ZaplineConfig,
    action: ConfigCommands,
) -> Result<(), zapline_core::ZaplineError> {
    match action {
        ConfigCommands::Check => {
            println!(
                "config ok (environment={}, session backend={}, media={})",
                config.manager.environment,
                config.session.backend,
                if config.media.enabled { "enabled" } else { "disabled" },
            );
        }
        ConfigCommands::Show => {
            let rendered = toml::to_string_pretty(config).map_err(|e| {
                zapline_core::ZaplineError::Config(format!("failed to render config: {e}"))
            })?;
            print!("{rendered}");
        }
    }
    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("zapline={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sessions_remove() {
        let cli = Cli::try_parse_from(["zapline", "sessions", "remove", "inst-1"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Sessions {
                action: SessionCommands::Remove { ref instance_id }
            }) if instance_id == "inst-1"
        ));
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zapline.toml");
        std::fs::write(&path, "[reconnect]\nmax_attempts = 3\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.reconnect.max_attempts, 3);
    }

    #[test]
    fn rendered_config_is_valid_toml() {
        let config = ZaplineConfig::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed = zapline_config::load_config_from_str(&rendered).unwrap();
        assert_eq!(parsed.reconnect.max_attempts, config.reconnect.max_attempts);
    }
}
