//! `fillout record`: a local reverse proxy that writes every answer a human
//! submits through it to a replay file.

mod headers;
mod proxy;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use fillout_logging::{LogEvent, Logger};
use fillout_replay::ReplayWriter;

use proxy::ProxyState;

/// Port the proxy listens on unless configured otherwise
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct RecordSettings {
    pub target: usize,
    pub entry_url: String,
    pub replay_file: PathBuf,
    pub port: u16,
    pub open_browser: bool,
    pub request_timeout: Duration,
}

/// What a record run produced
#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
    pub target: usize,
    pub interviews: usize,
    pub steps: usize,
    pub replay_file: PathBuf,
}

impl RecordSummary {
    pub fn exit_code(&self) -> i32 {
        if self.interviews >= self.target {
            0
        } else {
            130
        }
    }
}

pub fn create_router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .fallback(proxy::forward)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn handle_record_command(
    settings: RecordSettings,
    logger: Arc<Logger>,
) -> Result<RecordSummary> {
    let target = settings.target.max(1);
    let writer = ReplayWriter::create(&settings.replay_file).with_context(|| {
        format!(
            "Failed to create replay file {}",
            settings.replay_file.display()
        )
    })?;
    let replay_file = writer.path().to_path_buf();

    let state = Arc::new(ProxyState::new(
        settings.entry_url.clone(),
        target,
        settings.request_timeout,
        writer,
        logger.clone(),
    )?);
    let router = create_router(state.clone());

    let addr = ("127.0.0.1", settings.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind proxy to 127.0.0.1:{}", settings.port))?;

    let local_url = format!("http://localhost:{}", settings.port);
    logger.log(&LogEvent::ProxyListening {
        url: local_url.clone(),
    });

    if settings.open_browser {
        if let Err(e) = open::that(&local_url) {
            eprintln!("Failed to open browser: {} (open {} manually)", e, local_url);
        }
    }

    // Stops taking connections on shutdown and waits for requests in flight
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await;
    result.context("Proxy server error")?;

    let summary = RecordSummary {
        target,
        interviews: state.interviews_recorded(),
        steps: state.steps_recorded(),
        replay_file,
    };

    logger.log(&LogEvent::RecordingFinished {
        interviews: summary.interviews,
        steps: summary.steps,
        path: summary.replay_file.clone(),
    });

    Ok(summary)
}

async fn shutdown_signal(state: Arc<ProxyState>) {
    tokio::select! {
        _ = state.finished() => {}
        result = tokio::signal::ctrl_c() => {
            if result.is_ok() {
                eprintln!("\nShutting down...");
            } else {
                // No signal handler, wait for the target instead
                state.finished().await;
            }
        }
    }
}
