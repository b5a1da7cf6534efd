//! Votifier server binary.
//!
//! Usage: `votifier-server [config.toml]`
//!
//! Without a config path the defaults are used. `VOTIFIER_*` environment
//! variables override either source.

use std::sync::Arc;

use tracing::{error, info, warn};
use votifier_protocol::utils::logging::init_logging;
use votifier_protocol::{channel_sink, Result, VotifierConfig, VotifierServer};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("votifier-server: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => VotifierConfig::from_file(path)?,
        None => VotifierConfig::default(),
    };
    config.apply_env()?;
    config.validate_strict()?;

    init_logging(&config.logging)?;

    let server = VotifierServer::new(&config)?;
    info!(
        token_file = %server.tokens().path().display(),
        platforms = ?server.tokens().platforms().collect::<Vec<_>>(),
        "Token store ready"
    );

    let (sink, mut votes, mut errors) = channel_sink();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(vote) = votes.recv() => {
                    info!(
                        username = %vote.username,
                        service = %vote.service_name,
                        address = %vote.address,
                        timestamp = %vote.timestamp,
                        "Vote"
                    );
                }
                Some(failure) = errors.recv() => {
                    warn!(peer = %failure.peer, error = %failure.error, "Rejected connection");
                }
                else => break,
            }
        }
    });

    if let Err(e) = server.start(Arc::new(sink)).await {
        error!(error = %e, "Server stopped with an error");
        return Err(e);
    }

    info!("Server stopped");
    Ok(())
}
