//! A-JWT CLI - tools for operating the agentic trust protocol.
//!
//! Generates agent keys, computes agent and prompt checksums, decodes
//! tokens for debugging, verifies exported execution logs, shows the
//! resolved configuration, and runs an in-memory demonstration of a full
//! workflow.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod theme;

use commands::{checksum, config, demo, keys, log, token};
use theme::Theme;

/// A-JWT - Agentic JWT trust protocol tools
#[derive(Parser)]
#[command(name = "ajwt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file, merged over system and user files
    #[arg(short, long, global = true, env = "AJWT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage agent signing keys
    Keys {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Compute agent and prompt checksums
    Checksum {
        #[command(subcommand)]
        command: ChecksumCommands,
    },

    /// Work with intent tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Check exported execution logs
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },

    /// View and validate configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Run a workflow end to end against an in-memory authority
    Demo,
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate a key for an agent
    Generate {
        /// Agent id
        agent_id: String,
        /// Key directory (default: ~/.ajwt/keys)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Replace an existing key
        #[arg(long)]
        force: bool,
    },
    /// Show an agent's public key
    Show {
        /// Agent id
        agent_id: String,
        /// Key directory (default: ~/.ajwt/keys)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ChecksumCommands {
    /// Checksum of an agent manifest (JSON)
    Agent {
        /// Manifest file
        manifest: PathBuf,
    },
    /// Checksum of a prompt file
    Prompt {
        /// Prompt file
        file: PathBuf,
        /// Normalize line endings and whitespace first
        #[arg(long)]
        normalize: bool,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Decode a token without verifying it
    Inspect {
        /// The token, `-` for stdin, or `@path`
        token: String,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum LogCommands {
    /// Recompute the hash chain of an exported instance log (JSON)
    Verify {
        /// Entry array, or an object with `entries` and an optional `anchor`
        file: PathBuf,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the resolved configuration
    Show {
        /// Output format: toml (default) or json
        #[arg(long, default_value = "toml")]
        format: String,
        /// Show only one section (e.g. tokens, possession)
        #[arg(long)]
        section: Option<String>,
    },
    /// Validate the configuration
    Validate,
    /// Show checked file paths and environment fallbacks
    Paths,
}

fn init_logging(resolved: Option<&ajwt_config::ResolvedConfig>, verbose: bool) {
    let mut log_config = resolved
        .and_then(|r| ajwt_telemetry::LogConfig::try_from(&r.config.logging).ok())
        .unwrap_or_else(|| ajwt_telemetry::LogConfig::new("warn"));
    if verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = ajwt_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let explicit = cli.config.as_deref();

    let resolved = config::resolve(explicit);
    init_logging(resolved.as_ref().ok(), cli.verbose);

    let outcome = match cli.command {
        Commands::Keys { command } => match command {
            KeyCommands::Generate {
                agent_id,
                dir,
                force,
            } => keys::generate_key(&agent_id, dir, force),
            KeyCommands::Show { agent_id, dir } => keys::show_key(&agent_id, dir),
        },
        Commands::Checksum { command } => match command {
            ChecksumCommands::Agent { manifest } => checksum::run_agent(&manifest),
            ChecksumCommands::Prompt { file, normalize } => checksum::run_prompt(&file, normalize),
        },
        Commands::Token { command } => match command {
            TokenCommands::Inspect { token, json } => token::inspect(&token, json),
        },
        Commands::Log { command } => match command {
            LogCommands::Verify { file, json } => log::verify(&file, json),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show { format, section } => {
                config::show_config(explicit, &format, section.as_deref())
            },
            ConfigCommands::Validate => config::validate_config(explicit),
            ConfigCommands::Paths => config::show_paths(explicit),
        },
        Commands::Demo => match resolved {
            Ok(resolved) => demo::run_demo(&resolved.config).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = &outcome {
        eprintln!("{}", Theme::error(&format!("{e:#}")));
        std::process::exit(1);
    }
    Ok(())
}
