//! LumiHub CLI - Lumi/Aqara gateway discovery and monitoring
//!
//! Usage:
//!   lumihub browse    - Discover gateways on the local network
//!   lumihub listen    - Print device reports as they arrive
//!   lumihub models    - List the supported device models

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// LumiHub - talk to Lumi/Aqara smart-home gateways from your terminal
#[derive(Parser)]
#[command(name = "lumihub")]
#[command(author = "LumiHub Team")]
#[command(version)]
#[command(about = "Discover and monitor Lumi/Aqara gateways over UDP multicast")]
#[command(long_about = r#"
LumiHub speaks the gateway's local-network protocol directly.

Find gateways:
  $ lumihub browse

Watch everything the gateways report:
  $ lumihub listen

To authorize commands, store the shared secret from the companion app:
  $ lumihub config set-key <16-char-secret>
  $ lumihub listen --show-keys
"#)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for reports and heartbeats from all gateways
    Listen {
        /// Port to listen on (protocol default: 9898)
        #[arg(short, long)]
        port: Option<u16>,

        /// Shared secret, overriding the configured one
        #[arg(short, long)]
        key: Option<String>,

        /// Print the derived command key for each discovered device
        #[arg(long)]
        show_keys: bool,
    },

    /// Discover gateways on the local network
    Browse {
        /// How long to browse in seconds
        #[arg(short, long, default_value_t = 5)]
        timeout: u64,

        /// Port to listen on (protocol default: 9898)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List supported device models
    Models,

    /// Manage configuration (shared secrets, port)
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set the default shared secret
    SetKey {
        /// 16-character secret from the companion app
        key: String,
    },
    /// Set a per-gateway shared secret
    AddKey {
        /// Gateway IP address
        ip: String,
        /// 16-character secret for that gateway
        key: String,
    },
    /// Remove a per-gateway shared secret
    RemoveKey {
        /// Gateway IP address
        ip: String,
    },
    /// List current configuration
    List,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();

    match cli.command {
        Commands::Listen { port, key, show_keys } => {
            commands::listen::run(port, key, show_keys).await
        }
        Commands::Browse { timeout, port } => {
            commands::browse::run(timeout, port).await
        }
        Commands::Models => {
            run_models()
        }
        Commands::Config { action } => {
            run_config(action)
        }
    }
}

fn run_models() -> Result<()> {
    use colored::Colorize;

    println!("{}", "Supported device models:".bold());
    for model in lumihub_core::default_catalog().models() {
        println!("  {} {}", "•".cyan(), model);
    }
    Ok(())
}

fn run_config(action: ConfigAction) -> Result<()> {
    use colored::Colorize;

    match action {
        ConfigAction::SetKey { key } => {
            let mut cfg = config::Config::load()?;
            cfg.key = Some(key);
            cfg.save()?;
            println!("{} Default key updated", "✓".green());
        }
        ConfigAction::AddKey { ip, key } => {
            let mut cfg = config::Config::load()?;
            cfg.set_device_key(&ip, &key);
            cfg.save()?;
            println!("{} Key stored for {}", "✓".green(), ip.cyan());
        }
        ConfigAction::RemoveKey { ip } => {
            let mut cfg = config::Config::load()?;
            if cfg.remove_device_key(&ip) {
                cfg.save()?;
                println!("{} Removed key for {}", "✓".green(), ip);
            } else {
                println!("{} No key stored for {}", "✗".red(), ip);
            }
        }
        ConfigAction::List => {
            let cfg = config::Config::load()?;
            println!(
                "Port:        {}",
                cfg.port
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| format!("{} (default)", lumihub_core::DEFAULT_PORT))
            );
            println!(
                "Default key: {}",
                if cfg.key.is_some() { "set" } else { "not set" }
            );
            if cfg.keys.is_empty() {
                println!("{}", "No per-gateway keys configured.".dimmed());
            } else {
                println!("{}", "Per-gateway keys:".bold());
                for entry in &cfg.keys {
                    println!("  {} {}", "•".cyan(), entry.ip);
                }
            }
        }
        ConfigAction::Path => {
            let path = config::Config::path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parsing() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_listen_defaults() {
        let cli = Cli::try_parse_from(["lumihub", "listen"]).unwrap();
        match cli.command {
            Commands::Listen { port, key, show_keys } => {
                assert!(port.is_none());
                assert!(key.is_none());
                assert!(!show_keys);
            }
            _ => panic!("Expected Listen command"),
        }
    }

    #[test]
    fn test_browse_defaults() {
        let cli = Cli::try_parse_from(["lumihub", "browse"]).unwrap();
        match cli.command {
            Commands::Browse { timeout, port } => {
                assert_eq!(timeout, 5);
                assert!(port.is_none());
            }
            _ => panic!("Expected Browse command"),
        }
    }

    #[test]
    fn test_listen_with_overrides() {
        let cli = Cli::try_parse_from([
            "lumihub", "listen",
            "--port", "9899",
            "--key", "0123456789abcdef",
            "--show-keys",
        ])
        .unwrap();
        match cli.command {
            Commands::Listen { port, key, show_keys } => {
                assert_eq!(port, Some(9899));
                assert_eq!(key.as_deref(), Some("0123456789abcdef"));
                assert!(show_keys);
            }
            _ => panic!("Expected Listen command"),
        }
    }

    #[test]
    fn test_config_add_key() {
        let cli = Cli::try_parse_from([
            "lumihub", "config", "add-key", "10.0.0.5", "0123456789abcdef",
        ])
        .unwrap();
        match cli.command {
            Commands::Config {
                action: ConfigAction::AddKey { ip, key },
            } => {
                assert_eq!(ip, "10.0.0.5");
                assert_eq!(key, "0123456789abcdef");
            }
            _ => panic!("Expected Config AddKey command"),
        }
    }

    #[test]
    fn test_verbose_flag() {
        let cli = Cli::try_parse_from(["lumihub", "-v", "models"]).unwrap();
        assert!(cli.verbose);
    }
}
