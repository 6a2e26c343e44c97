//! Command-line interface.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

pub mod commands;
pub mod output;

pub use commands::Commands;
pub use output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "popgate", version, about = "Prompt display-suppression engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (overrides global and project config)
    #[arg(long, global = true, env = "POPGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit JSON on stdout and JSON logs on stderr
    #[arg(long, global = true)]
    pub json: bool,

    /// Plain output without styling
    #[arg(long, global = true, conflicts_with = "json")]
    pub plain: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable logging
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl Cli {
    #[must_use]
    pub const fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else if self.plain {
            OutputFormat::Plain
        } else {
            OutputFormat::Human
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "popgate", "query", "--reader", "r", "--prompt", "1", "--url", "https://x/", "--json",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.output_format(), OutputFormat::Json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_json_and_plain_conflict() {
        assert!(Cli::try_parse_from(["popgate", "config", "--json", "--plain"]).is_err());
    }
}
