//! popgate config - Print the effective configuration

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{OutputFormat, emit_json};
use crate::error::{PopgateError, Result};

#[derive(Args, Debug)]
pub struct ConfigArgs {}

pub fn run(ctx: &AppContext, _args: &ConfigArgs) -> Result<()> {
    if ctx.output_format == OutputFormat::Json {
        return emit_json(&ctx.config);
    }
    let rendered = toml::to_string_pretty(&ctx.config)
        .map_err(|err| PopgateError::Serialization(format!("render config: {err}")))?;
    print!("{rendered}");
    Ok(())
}
