use axum::serve;
use clap::Parser;
use framesightd::capture::supervisor;
use framesightd::collectors::{self, hardware::HardwareSession};
use framesightd::config::Config;
use framesightd::server;
use framesightd::state::StatsStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "framesightd")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "./config.yaml")]
    config: String,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long, conflicts_with = "capture_off")]
    capture_on: bool,
    #[arg(long, conflicts_with = "capture_on")]
    capture_off: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let mut cfg = match Config::load_or_default(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };
    if cli.capture_on {
        cfg.capture.enabled = true;
    } else if cli.capture_off {
        cfg.capture.enabled = false;
    }

    info!(
        listen = %cfg.listen,
        interval_secs = cfg.interval_secs,
        capture = cfg.capture.enabled,
        "starting framesightd"
    );

    let store = Arc::new(StatsStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Validation guarantees the address parses; binding can still fail and
    // that is the one unrecoverable startup fault.
    let addr: SocketAddr = match cfg.listen.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, listen = %cfg.listen, "invalid listen address");
            std::process::exit(1);
        }
    };
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, listen = %cfg.listen, "failed to bind listen address");
            std::process::exit(1);
        }
    };

    let server_task = {
        let app = server::build_router(
            store.clone(),
            Duration::from_secs(cfg.interval_secs),
            shutdown_rx.clone(),
        );
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let server = serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });
            if let Err(err) = server.await {
                error!(error = %err, "websocket server error");
            }
        })
    };

    let capture_task = if cfg.capture.enabled {
        Some(tokio::spawn(supervisor::run(
            cfg.capture.clone(),
            store.clone(),
            shutdown_rx.clone(),
        )))
    } else {
        store.disable_capture().await;
        None
    };

    let sampler_task = {
        let store = store.clone();
        let mut shutdown = shutdown_rx.clone();
        let interval_secs = cfg.interval_secs;
        tokio::spawn(async move {
            let mut session = HardwareSession::open();
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        // Hardware queries block; keep them off the executor
                        // so the publish cadence is never skewed.
                        let sampled = tokio::task::spawn_blocking(move || {
                            let mut session = session;
                            let fragment = collectors::sample(&mut session);
                            (session, fragment)
                        })
                        .await;

                        match sampled {
                            Ok((returned, fragment)) => {
                                session = returned;
                                store.apply_hardware(fragment).await;
                            }
                            Err(err) => {
                                error!(error = %err, "sampling task failed, reopening session");
                                session = HardwareSession::open();
                            }
                        }
                    }
                }
            }
        })
    };

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to wait for Ctrl+C");
    }
    info!("received Ctrl+C, shutting down");

    let _ = shutdown_tx.send(true);

    let _ = sampler_task.await;
    if let Some(task) = capture_task {
        let _ = task.await;
    }
    let _ = server_task.await;
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
