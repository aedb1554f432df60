use crate::capture::parser::parse_frame_line;
use crate::config::CaptureConfig;
use crate::state::StatsStore;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, warn};

/// Bounded per-line wait so an idle subprocess never pins this task; a
/// timeout is a liveness retry, not an error.
const LINE_READ_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to download capture tool from {url}: {source}")]
    Download { url: String, source: reqwest::Error },
    #[error("failed to write capture tool to {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to spawn capture tool {path}: {source}")]
    Spawn {
        path: String,
        source: std::io::Error,
    },
}

/// Owns the capture subprocess for the life of the service: starts it in
/// stream-to-stdout mode, feeds its output to the frame-log parser and kills
/// it on shutdown. Any failure to get the stream up degrades benchmarking to
/// permanently disabled; the rest of the service is unaffected.
pub async fn run(cfg: CaptureConfig, store: Arc<StatsStore>, mut shutdown: watch::Receiver<bool>) {
    let mut child = match start(&cfg).await {
        Ok(child) => child,
        Err(err) => {
            warn!(error = %err, "frame capture failed to start, benchmarking disabled");
            store.disable_capture().await;
            return;
        }
    };

    let Some(stdout) = child.stdout.take() else {
        warn!("frame capture started without stdout, benchmarking disabled");
        store.disable_capture().await;
        let _ = child.kill().await;
        return;
    };
    let mut lines = BufReader::new(stdout).lines();
    info!(binary = %cfg.binary_path, "frame capture running");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            read = time::timeout(LINE_READ_TIMEOUT, lines.next_line()) => match read {
                // Idle stream; retry so shutdown stays responsive.
                Err(_elapsed) => continue,
                Ok(Ok(Some(line))) => {
                    if let Some(sample) = parse_frame_line(&line) {
                        store
                            .record_frame(&sample.application, sample.frame_time_ms)
                            .await;
                    }
                }
                Ok(Ok(None)) => {
                    warn!("frame capture stream ended, benchmarking disabled");
                    store.disable_capture().await;
                    break;
                }
                Ok(Err(err)) => {
                    warn!(error = %err, "frame capture read failed, benchmarking disabled");
                    store.disable_capture().await;
                    break;
                }
            }
        }
    }

    if let Err(err) = child.kill().await {
        debug!(error = %err, "capture process already gone");
    }
}

async fn start(cfg: &CaptureConfig) -> Result<Child, CaptureError> {
    ensure_binary(cfg).await?;

    Command::new(&cfg.binary_path)
        .args(["-output_stdout", "-no_top", "-stop_existing_session"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CaptureError::Spawn {
            path: cfg.binary_path.clone(),
            source,
        })
}

/// Fetches the capture binary from the distribution URL exactly once; a file
/// already on disk is left alone.
async fn ensure_binary(cfg: &CaptureConfig) -> Result<(), CaptureError> {
    if Path::new(&cfg.binary_path).exists() {
        return Ok(());
    }

    info!(url = %cfg.download_url, path = %cfg.binary_path, "downloading capture tool");
    let bytes = reqwest::get(&cfg.download_url)
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(|source| CaptureError::Download {
            url: cfg.download_url.clone(),
            source,
        })?
        .bytes()
        .await
        .map_err(|source| CaptureError::Download {
            url: cfg.download_url.clone(),
            source,
        })?;

    tokio::fs::write(&cfg.binary_path, &bytes)
        .await
        .map_err(|source| CaptureError::Write {
            path: cfg.binary_path.clone(),
            source,
        })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&cfg.binary_path, std::fs::Permissions::from_mode(0o755))
            .await
            .map_err(|source| CaptureError::Write {
                path: cfg.binary_path.clone(),
                source,
            })?;
    }

    Ok(())
}
