//! popgate state - Show stored reader state

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, OutputFormat, emit_human, emit_json};
use crate::engine::ReaderSnapshot;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct StateArgs {
    /// Reader id
    #[arg(long)]
    pub reader: String,

    /// Prompt id
    #[arg(long)]
    pub prompt: String,
}

pub fn run(ctx: &AppContext, args: &StateArgs) -> Result<()> {
    let engine = ctx.build_engine()?;
    let snapshot = engine.inspect(&args.reader, &args.prompt)?;
    match ctx.output_format {
        OutputFormat::Json => emit_json(&snapshot),
        format => {
            emit_human(render(format, &snapshot));
            Ok(())
        }
    }
}

fn render(format: OutputFormat, snapshot: &ReaderSnapshot) -> HumanLayout {
    let record = &snapshot.record;
    let flags = &snapshot.flags;
    let last_viewed = record
        .last_viewed_at
        .map_or_else(|| "never".to_string(), |at| at.to_rfc3339());
    let sources = if flags.utm_sources.is_empty() {
        "-".to_string()
    } else {
        flags.utm_sources.iter().cloned().collect::<Vec<_>>().join(", ")
    };

    let mut layout = HumanLayout::for_format(format);
    layout
        .title(&format!(
            "Reader {} / prompt {}",
            snapshot.reader_id, snapshot.prompt_id
        ))
        .section("Record")
        .kv("view_count", &record.view_count.to_string())
        .kv("last_viewed_at", &last_viewed)
        .kv("suppressed_forever", &record.suppressed_forever.to_string())
        .kv(
            "mailing_list_subscribed",
            &record.mailing_list_subscribed.to_string(),
        )
        .blank()
        .section("Suppression flags")
        .kv("utm_sources", &sources)
        .kv("utm_medium", &flags.utm_medium.to_string())
        .kv("newsletter_campaign", &flags.newsletter_campaign.to_string());
    layout
}
