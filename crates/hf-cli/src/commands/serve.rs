//! `hf serve`: run the demo service with the operator shell on TCP

use crate::config::HotfixConfig;
use crate::demo::DemoHost;
use crate::server;
use crate::shell::Shell;
use crate::Result;
use clap::Args;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Listen address (overrides the config file and LISTEN_ADDR)
    #[arg(long)]
    pub listen: Option<String>,
}

pub async fn serve_command(args: ServeArgs, config: &HotfixConfig) -> Result<()> {
    let mut config = config.clone();
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    let listener = server::bind(&config.server.listen).await?;
    let idle_timeout = config.session_idle_timeout();
    let shell = Shell::new(Arc::new(DemoHost::new()?), Arc::new(config));

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl-C"),
            Err(err) => warn!("cannot listen for Ctrl-C: {err}"),
        }
    };
    server::serve(listener, shell, idle_timeout, shutdown).await
}
