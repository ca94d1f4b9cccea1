//! `mailout` - common interface for different e-mail sending methods.
//!
//! Reads a sending-method specification from a configuration file, builds
//! the matching sender, and feeds it the given messages.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use mailout_core::{DEFAULT_CONFIG_SECTION, Message};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments.
#[derive(Parser)]
#[command(
    name = "mailout",
    about = "Common interface for different e-mail sending methods",
    version
)]
struct Args {
    /// Configuration file to read the sending method from.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Load environment variables from the given .env file.
    #[arg(short = 'E', long = "env", value_name = "FILE")]
    env: Option<PathBuf>,

    /// Logging level (overridden by RUST_LOG when set).
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    log_level: String,

    /// Read configuration from the given key of the config file.
    #[arg(
        short = 's',
        long = "section",
        value_name = "KEY",
        conflicts_with = "no_section"
    )]
    section: Option<String>,

    /// Read configuration from the root of the config file.
    #[arg(long = "no-section")]
    no_section: bool,

    /// Message files to send; standard input when none or "-".
    #[arg(value_name = "MESSAGE")]
    messages: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "mailout={level},mailout_core={level},mailout_smtp={level}",
                    level = args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match &args.env {
        Some(path) => {
            dotenv::from_path(path).with_context(|| {
                format!("could not load environment from {}", path.display())
            })?;
        }
        None => {
            // A missing .env file is not an error.
            dotenv::dotenv().ok();
        }
    }

    let section = if args.no_section {
        None
    } else {
        Some(args.section.as_deref().unwrap_or(DEFAULT_CONFIG_SECTION))
    };

    let mut sender = mailout_core::from_config_file(args.config.as_deref(), section, false)
        .context("could not build a sender from the configuration")?;
    debug!(
        configpath = ?sender.configpath(),
        "Sender constructed"
    );

    let sources = if args.messages.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        args.messages.clone()
    };

    sender.open().context("could not open the sender")?;
    let mut outcome = Ok(());
    for source in &sources {
        let result = read_message(source).and_then(|message| {
            sender
                .send(&message)
                .with_context(|| format!("could not send {}", describe(source)))
        });
        if let Err(err) = result {
            outcome = Err(err);
            break;
        }
    }
    let closed = sender.close().context("could not close the sender");
    outcome.and(closed)
}

/// Reads one raw message from a file, or from standard input for `-`.
fn read_message(source: &Path) -> anyhow::Result<Message> {
    let raw = if source.as_os_str() == "-" {
        let mut buffer = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buffer)
            .context("could not read message from standard input")?;
        buffer
    } else {
        fs::read(source)
            .with_context(|| format!("could not read message from {}", source.display()))?
    };
    Ok(Message::from_bytes(raw))
}

fn describe(source: &Path) -> String {
    if source.as_os_str() == "-" {
        "<stdin>".to_string()
    } else {
        source.display().to_string()
    }
}
