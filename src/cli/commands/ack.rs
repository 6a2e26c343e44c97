//! popgate ack - Record a prompt view

use clap::Args;

use crate::app::AppContext;
use crate::error::Result;

use super::emit_decision;
use super::query::QueryArgs;

#[derive(Args, Debug)]
pub struct AckArgs {
    #[command(flatten)]
    pub target: QueryArgs,

    /// Reader dismissed the prompt for good
    #[arg(long)]
    pub suppress_forever: bool,

    /// Mailing list status reported by the prompt's form
    #[arg(long, value_name = "STATUS")]
    pub mailing_list_status: Option<String>,
}

pub fn run(ctx: &AppContext, args: &AckArgs) -> Result<()> {
    let engine = ctx.build_engine()?;

    let mut request = args.target.to_request();
    if args.suppress_forever {
        request = request.param("suppress_forever", "1");
    }
    if let Some(status) = &args.mailing_list_status {
        request = request.param("mailing_list_status", status);
    }

    let mut signals = engine.extract(&request);
    if args.target.preview {
        signals.is_preview = true;
    }

    let decision = engine.acknowledge_signals(&signals)?;
    emit_decision(ctx.output_format, &decision)
}
