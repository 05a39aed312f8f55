//! `mailweave` - build a MIME message from a JSON settings file.
//!
//! The raw message is written to `--output` or standard output; logs go to
//! standard error.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use mailweave_core::{Composer, Settings, WriterTransport};
use tracing::info;

#[derive(Parser)]
#[command(name = "mailweave", version, about)]
struct Cli {
    /// JSON settings describing the message
    #[arg(short, long, value_name = "FILE")]
    settings: PathBuf,

    /// Envelope sender address
    #[arg(long, value_name = "EMAIL", env = "MAILWEAVE_SENDER")]
    sender: String,

    /// Sender display name
    #[arg(long, value_name = "NAME", default_value = "")]
    name: String,

    /// Write the message here instead of standard output
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// End multipart sections with closing boundaries
    #[arg(long)]
    close_delimiters: bool,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    setup_logging(level);

    let settings = Settings::from_file(&cli.settings)
        .with_context(|| format!("failed to load settings from {}", cli.settings.display()))?;

    let mut composer = Composer::new(&cli.sender, &cli.name);
    composer
        .apply_settings(&settings)
        .context("failed to apply settings")?;
    composer.set_close_delimiters(cli.close_delimiters);

    let options = settings.transport();
    match &cli.output {
        Some(path) => {
            let file = create_output(path)?;
            send(composer, WriterTransport::with_options(BufWriter::new(file), options))?;
            info!(path = %path.display(), "message written");
        }
        None => {
            let stdout = io::stdout().lock();
            send(composer, WriterTransport::with_options(BufWriter::new(stdout), options))?;
        }
    }
    Ok(())
}

fn create_output(path: &Path) -> anyhow::Result<File> {
    File::create(path).with_context(|| format!("failed to create {}", path.display()))
}

fn send<W: Write>(composer: Composer, mut transport: WriterTransport<W>) -> anyhow::Result<()> {
    composer
        .send(&mut transport)
        .context("failed to build message")?;
    info!(bytes = transport.bytes_written(), "done");
    Ok(())
}

/// Set up tracing on stderr, so the message on stdout stays clean.
fn setup_logging(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "mailweave={level},mailweave_core={level},mailweave_mime={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_args() {
        let cli = Cli::try_parse_from([
            "mailweave",
            "--settings",
            "message.json",
            "--sender",
            "a@example.com",
            "-o",
            "out.eml",
            "-vv",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(cli.settings, PathBuf::from("message.json"));
        assert_eq!(cli.sender, "a@example.com");
        assert_eq!(cli.name, "");
        assert_eq!(cli.output, Some(PathBuf::from("out.eml")));
        assert!(!cli.close_delimiters);
        assert_eq!(cli.verbose, 2);
    }
}
