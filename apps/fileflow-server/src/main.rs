//! FileFlow Server - multi-account S3 aggregation gateway.
//!
//! Serves three uniform access planes behind one listener: a native REST
//! admin/tenant API, an AWS SigV4 S3-compatible endpoint (path-style at
//! `/s3`, plus virtual-hosted-style when enabled), and a WebDAV endpoint
//! mounted at `/webdav`. Background tasks keep per-account usage synced
//! with upstream analytics and sweep expired files and abandoned
//! multipart sessions.
//!
//! # Usage
//!
//! ```text
//! LISTEN_ADDR=0.0.0.0:8080 DATABASE_URL=sqlite://./data/fileflow.db fileflow-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LISTEN_ADDR` | `0.0.0.0:8080` | Bind address |
//! | `DATA_DIR` | `./data` | Directory for file-based backends |
//! | `DATABASE_URL` | `sqlite://{DATA_DIR}/fileflow.db` | Persistence backend, selected by scheme |
//! | `ADMIN_USERNAME` | `admin` | Admin login username |
//! | `ADMIN_PASSWORD` | `admin` | Admin login password |
//! | `JWT_SECRET` | `change-me-in-production` | Admin JWT signing secret |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod gateway;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fileflow_aggregator::{S3UpstreamClient, UpstreamClient, spawn_expiration_scheduler, spawn_usage_sync_scheduler};
use fileflow_core::{Account, AppConfig, Store};
use fileflow_s3::{FileFlowS3Handler, MultipartSessions, S3HttpConfig, S3HttpService};
use fileflow_webdav::{LockManager, WebDavConfig, WebDavService};
use fileflow_rest::{RestConfig, RestService};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::gateway::GatewayService;

/// Server version reported in logs.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Interval between abandoned-multipart-session sweeps.
const MULTIPART_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Shared closure handed to the aggregator's background schedulers: build
/// a fresh upstream client for whatever account it's asked to act on.
fn client_for(account: &Account) -> Box<dyn UpstreamClient> {
    Box::new(S3UpstreamClient::for_account(account))
}

/// Initialize the tracing subscriber, using `RUST_LOG` when set, else the
/// configured `LOG_LEVEL`.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level).with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    Ok(())
}

/// Periodically discard multipart upload sessions abandoned for too long.
fn spawn_multipart_sweep(sessions: Arc<MultipartSessions>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(MULTIPART_SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = sessions.sweep_abandoned(chrono::Utc::now());
            if removed > 0 {
                info!(removed, "swept abandoned multipart upload sessions");
            }
        }
    })
}

/// Run the accept loop, serving connections until a shutdown signal arrives.
async fn serve<H: fileflow_s3::dispatch::S3Handler>(listener: TcpListener, service: GatewayService<H>) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env();

    init_tracing(&config.log_level)?;

    info!(
        listen_addr = %config.listen_addr,
        database_url = %config.database_url,
        version = VERSION,
        "starting FileFlow server",
    );

    let backend = fileflow_persistence::open(&config.database_url)
        .await
        .with_context(|| format!("failed to open persistence backend: {}", config.database_url))?;
    backend.init().await.context("failed to initialize persistence backend")?;
    let data = backend.load().await.context("failed to load persisted data")?;

    let store = Arc::new(Store::new(data, backend));

    let usage_sync_handle = spawn_usage_sync_scheduler(Arc::clone(&store), client_for);
    let expiration_handle = spawn_expiration_scheduler(Arc::clone(&store), client_for);

    let multipart_sessions = MultipartSessions::new();
    let multipart_sweep_handle = spawn_multipart_sweep(Arc::clone(&multipart_sessions));

    let settings = store.settings();
    let s3_config = S3HttpConfig {
        domain: settings.s3_base_domain.clone(),
        virtual_hosting: settings.s3_virtual_hosted_style,
    };
    let s3_handler = Arc::new(FileFlowS3Handler::new(Arc::clone(&store), multipart_sessions));
    let s3_service = S3HttpService::new(s3_handler, Arc::clone(&store), s3_config);

    let lock_manager = LockManager::new();
    let webdav_service = WebDavService::new(Arc::clone(&store), lock_manager, WebDavConfig::default());

    let rest_config = RestConfig {
        admin_username: config.admin_username.clone(),
        admin_password: config.admin_password.clone(),
        jwt_secret: config.jwt_secret.clone(),
        ..RestConfig::default()
    };
    let rest_service = RestService::new(Arc::clone(&store), rest_config);

    let gateway = GatewayService::new(store, s3_service, webdav_service, rest_service);

    let addr: SocketAddr = config.listen_addr.parse().with_context(|| format!("invalid bind address: {}", config.listen_addr))?;
    let listener = TcpListener::bind(addr).await.with_context(|| format!("failed to bind to {addr}"))?;
    info!(%addr, "listening for connections");

    let result = serve(listener, gateway).await;

    usage_sync_handle.abort();
    expiration_handle.abort();
    multipart_sweep_handle.abort();

    result
}
