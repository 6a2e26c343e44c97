//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use clap::Subcommand;

pub mod ack;
pub mod config;
pub mod query;
pub mod serve;
pub mod state;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, OutputFormat, emit_human, emit_json};
use crate::error::Result;
use crate::model::Decision;

pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Serve(args) => serve::run(ctx, args),
        Commands::Query(args) => query::run(ctx, args),
        Commands::Ack(args) => ack::run(ctx, args),
        Commands::State(args) => state::run(ctx, args),
        Commands::Config(args) => config::run(ctx, args),
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP decision service
    Serve(serve::ServeArgs),

    /// Ask whether a prompt should display for a reader
    Query(query::QueryArgs),

    /// Record that a prompt was shown, then print the decision
    Ack(ack::AckArgs),

    /// Show the stored state for a reader and prompt
    State(state::StateArgs),

    /// Print the effective configuration
    Config(config::ConfigArgs),
}

/// Print a decision in the selected output format.
pub(crate) fn emit_decision(format: OutputFormat, decision: &Decision) -> Result<()> {
    if format == OutputFormat::Json {
        return emit_json(decision);
    }
    let mut layout = HumanLayout::for_format(format);
    layout
        .title("Decision")
        .kv("displayPopup", &decision.display_popup.to_string())
        .kv("currentViews", &decision.current_views.to_string());
    if let Some(frequency) = decision.frequency {
        layout.kv("frequency", frequency.as_str());
    }
    emit_human(layout);
    Ok(())
}
