//! `replay` command implementation.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{error, info, warn};

use dispatcher::create_siddi;

use super::load_blueprint;
use crate::cli::ReplayArgs;
use crate::session::run_script;

/// Execute the `replay` command
pub async fn run_replay(args: &ReplayArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.config)?;
    let siddi = create_siddi(&blueprint).context("Failed to create consumers")?;

    let reader = open_input(&args.input).await?;
    info!(input = %args.input.display(), "Starting replay...");

    let outcome = tokio::select! {
        result = run_script(&siddi, reader) => Some(result),
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping replay...");
            None
        }
    };

    // Drain queued deliveries whichever way the replay ended
    siddi.shutdown().await;

    match outcome {
        Some(Ok(mut stats)) => {
            stats.deliveries = siddi.delivery_stats();
            info!(
                events = stats.dispatch.total_events,
                identifies = stats.dispatch.total_identifies,
                rejected = stats.lines_rejected,
                lost_deliveries = stats.lost_deliveries(),
                duration_secs = stats.duration.as_secs_f64(),
                "Replay completed successfully"
            );
            stats.print_summary();
        }
        Some(Err(e)) => return Err(e).context("Replay failed"),
        None => {}
    }

    info!("Siddi finished");
    Ok(())
}

async fn open_input(path: &Path) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }

    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open script {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
