//! c2md CLI - Confluence to Markdown converter.
//!
//! Provides commands for:
//! - `convert`: Convert Confluence pages (wiki, file or URL) to Markdown
//! - `uml`: Render `PlantUML` macros on Confluence pages to attached images

mod commands;
mod error;
mod output;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ConvertArgs, UmlArgs};
use output::Output;

/// c2md - Confluence to Markdown converter.
#[derive(Parser)]
#[command(name = "c2md", version, about, disable_help_flag = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print help.
    #[arg(short = 'h', long, short_alias = '?', action = ArgAction::Help)]
    help: Option<bool>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert Confluence pages to Markdown.
    #[command(disable_help_flag = true)]
    Convert(ConvertArgs),
    /// Render `PlantUML` macros and attach the images to their pages.
    #[command(disable_help_flag = true)]
    Uml(UmlArgs),
}

impl Commands {
    fn quiet(&self) -> bool {
        match self {
            Self::Convert(args) => args.quiet,
            Self::Uml(args) => args.quiet,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let quiet = cli.command.quiet();
    let output = Output::new(quiet);

    // Verbose by default; --quiet falls back to RUST_LOG or WARN
    let filter = if quiet {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Convert(args) => args.execute(&output),
        Commands::Uml(args) => args.execute(&output),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            output.error(&format!("  caused by: {cause}"));
            source = cause.source();
        }
        if err.is_auth_failure() {
            output.warning(
                "Check the credentials given with -u/--user or in [confluence] user/password.",
            );
        }
        std::process::exit(1);
    }
}
