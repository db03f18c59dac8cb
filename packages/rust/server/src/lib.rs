//! HTTP surface for the enrichment pipeline.
//!
//! `POST /api/enrich` runs one enrichment; `GET /health` is a liveness probe.

mod api;
mod middleware;

use tokio::net::TcpListener;
use tracing::{info, warn};

use vcscout_core::EnrichmentPipeline;
use vcscout_llm::TextModel;

pub use api::{ApiError, AppState, ErrorBody, ErrorMeta, build_app};
pub use middleware::RequestId;

/// Bind `addr` and serve until Ctrl-C or SIGTERM.
pub async fn serve<M: TextModel + 'static>(
    addr: &str,
    pipeline: EnrichmentPipeline<M>,
) -> std::io::Result<()> {
    let app = build_app(AppState::new(pipeline));

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("received shutdown signal, starting graceful shutdown");
}
