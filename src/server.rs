//! Listener lifecycle. One plaintext listener always, one TLS listener when a
//! keypair is present on disk, both serving the same gateway router. The
//! process stays up until either listener fails.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::{Config, TlsConfig};
use crate::gateway::{self, Gateway};

/// TLS is opt-in by dropping a keypair at the configured paths; there is no
/// separate enable flag.
pub fn tls_keypair_present(tls: &TlsConfig) -> bool {
    Path::new(&tls.cert_path).exists() && Path::new(&tls.key_path).exists()
}

/// Start the listeners and block until the first one fails.
///
/// Each listener runs as its own task and reports its terminal error into a
/// shared channel; whichever arrives first becomes the process's fatal error.
pub async fn run(config: Arc<Config>) -> Result<()> {
    let gateway = Arc::new(Gateway::new(config.clone())?);
    let app = gateway::router(gateway);

    let (tx, mut rx) = mpsc::channel::<anyhow::Error>(2);

    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    {
        let app = app.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(serve_http(http_addr, app).await).await;
        });
    }

    if tls_keypair_present(&config.tls) {
        let https_addr = SocketAddr::from(([0, 0, 0, 0], config.https_port));
        let tls = config.tls.clone();
        let app = app.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(serve_https(https_addr, tls, app).await).await;
        });
    } else {
        info!(
            "No TLS keypair at {} / {}, serving plaintext only",
            config.tls.cert_path, config.tls.key_path
        );
    }

    drop(tx);
    match rx.recv().await {
        Some(err) => Err(err),
        None => Err(anyhow!("Listener tasks exited without reporting an error")),
    }
}

async fn serve_http(addr: SocketAddr, app: Router) -> anyhow::Error {
    info!("Listening for HTTP on port {}", addr.port());

    match TcpListener::bind(addr).await {
        Ok(listener) => match axum::serve(listener, app).await {
            Ok(()) => anyhow!("HTTP listener on {} exited", addr),
            Err(e) => anyhow!("HTTP listener on {} failed: {}", addr, e),
        },
        Err(e) => anyhow!("Failed to bind HTTP listener on {}: {}", addr, e),
    }
}

async fn serve_https(addr: SocketAddr, tls: TlsConfig, app: Router) -> anyhow::Error {
    let rustls = match RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await {
        Ok(rustls) => rustls,
        Err(e) => {
            return anyhow!(
                "Failed to load TLS keypair ({}, {}): {}",
                tls.cert_path,
                tls.key_path,
                e
            )
        }
    };

    info!("Listening for HTTPS on port {}", addr.port());

    match axum_server::bind_rustls(addr, rustls)
        .serve(app.into_make_service())
        .await
    {
        Ok(()) => anyhow!("HTTPS listener on {} exited", addr),
        Err(e) => anyhow!("HTTPS listener on {} failed: {}", addr, e),
    }
}
