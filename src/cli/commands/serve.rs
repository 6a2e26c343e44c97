//! popgate serve - Run the HTTP decision service

use std::sync::Arc;

use clap::Args;

use crate::app::AppContext;
use crate::error::{PopgateError, Result};
use crate::server::{self, ServerState};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host to bind (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(long)]
    pub port: Option<u16>,
}

pub fn run(ctx: &AppContext, args: &ServeArgs) -> Result<()> {
    let mut server_config = ctx.config.server.clone();
    if let Some(host) = &args.host {
        server_config.host.clone_from(host);
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }

    let engine = Arc::new(ctx.build_engine()?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| PopgateError::Server(format!("start runtime: {err}")))?;

    runtime.block_on(server::run(
        &server_config.bind_addr(),
        ServerState::new(engine),
    ))
}
