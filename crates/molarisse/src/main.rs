// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Molarisse - clinic messaging from the terminal.
//!
//! Binary entry point: parses the command line, loads configuration,
//! installs logging, and runs one subcommand against the sync engine.

mod commands;
mod render;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use molarisse_core::{PartnerId, PluginAdapter};
use tracing_subscriber::EnvFilter;

use crate::commands::Attachment;

/// Molarisse - clinic messaging from the terminal.
#[derive(Parser, Debug)]
#[command(name = "molarisse", version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List conversations, unread first.
    Inbox {
        /// Case-insensitive match over partner name and last message.
        #[arg(long, value_name = "Q")]
        filter: Option<String>,
    },
    /// Show the thread with one partner.
    Thread {
        /// Partner user id.
        partner: i64,
    },
    /// Send a message, optionally with an image or a voice recording.
    Send {
        partner: i64,
        /// Message text, or the caption of an image.
        #[arg(required_unless_present_any = ["image", "voice"])]
        text: Option<String>,
        #[arg(long, value_name = "PATH", conflicts_with = "voice")]
        image: Option<PathBuf>,
        #[arg(long, value_name = "PATH")]
        voice: Option<PathBuf>,
    },
    /// Check that the server is reachable and accepts the configured token.
    Status,
    /// Poll the inbox (and optionally one thread) until Ctrl+C.
    Watch {
        partner: Option<i64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => molarisse_config::load_and_validate_path(path),
        None => molarisse_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            molarisse_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log.level);

    let transport = match commands::build_transport(&config) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("molarisse: {e}");
            std::process::exit(1);
        }
    };
    let engine = commands::build_engine(&config, transport.clone());

    let mut out = std::io::stdout();
    let result = match cli.command {
        Commands::Status => commands::status(transport.as_ref(), &mut out).await.map(|_| ()),
        Commands::Inbox { filter } => commands::inbox(&engine, filter.as_deref(), &mut out).await,
        Commands::Thread { partner } => {
            commands::thread(&engine, PartnerId(partner), &mut out).await
        }
        Commands::Send {
            partner,
            text,
            image,
            voice,
        } => {
            let attachment = match (image, voice) {
                (Some(path), _) => Attachment::Image(path),
                (None, Some(path)) => Attachment::Voice(path),
                (None, None) => Attachment::None,
            };
            let text = text.unwrap_or_default();
            commands::send(&engine, PartnerId(partner), &text, attachment, &mut out).await
        }
        Commands::Watch { partner } => {
            let cancel = shutdown::install_signal_handler();
            commands::watch(&engine, partner.map(PartnerId), cancel, &mut out).await
        }
    };

    if let Err(e) = transport.shutdown().await {
        tracing::warn!(error = %e, "transport shutdown failed");
    }
    if let Err(e) = result {
        eprintln!("molarisse: {e}");
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("molarisse={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn send_accepts_exactly_one_attachment() {
        let cli = Cli::try_parse_from(["molarisse", "send", "7", "--voice", "note.webm"]).unwrap();
        assert!(matches!(cli.command, Commands::Send { voice: Some(_), .. }));

        assert!(
            Cli::try_parse_from(["molarisse", "send", "7", "--image", "a.png", "--voice", "b.mp3"])
                .is_err()
        );
        assert!(Cli::try_parse_from(["molarisse", "send", "7"]).is_err());
    }

    #[test]
    fn global_config_flag_parses_after_subcommand() {
        let cli =
            Cli::try_parse_from(["molarisse", "inbox", "--filter", "dr", "--config", "m.toml"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("m.toml")));
        assert!(matches!(cli.command, Commands::Inbox { filter: Some(ref q) } if q == "dr"));
    }
}
