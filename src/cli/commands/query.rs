//! popgate query - Ask whether a prompt should display

use clap::Args;
use tracing::debug;

use crate::app::AppContext;
use crate::engine::DecisionEngine;
use crate::error::Result;
use crate::model::Decision;
use crate::signals::ReaderRequest;

use super::emit_decision;

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Reader id
    #[arg(long)]
    pub reader: String,

    /// Prompt id
    #[arg(long)]
    pub prompt: String,

    /// Page the prompt would show on
    #[arg(long)]
    pub url: String,

    /// Referring URL (campaign parameters, preview pages)
    #[arg(long)]
    pub referer: Option<String>,

    /// Treat the request as an editor preview
    #[arg(long)]
    pub preview: bool,
}

impl QueryArgs {
    pub(crate) fn to_request(&self) -> ReaderRequest {
        let mut request = ReaderRequest::new()
            .param("rid", &self.reader)
            .param("popup_id", &self.prompt)
            .param("url", &self.url);
        if let Some(referer) = &self.referer {
            request = request.referer(referer);
        }
        request
    }
}

pub fn run(ctx: &AppContext, args: &QueryArgs) -> Result<()> {
    let engine = ctx.build_engine()?;
    let decision = query(&engine, args)?;
    emit_decision(ctx.output_format, &decision)
}

fn query(engine: &DecisionEngine, args: &QueryArgs) -> Result<Decision> {
    let mut signals = engine.extract(&args.to_request());
    if args.preview {
        signals.is_preview = true;
    }
    debug!(?signals, "querying");
    engine.query_signals(&signals)
}
