//! HTTP server loop.
//!
//! Binds a TCP listener, serves HTTP/1.1 connections via Hyper and
//! drives the [`App`] for each request. Shutdown is graceful: the accept
//! loop stops on SIGTERM/SIGINT and in-flight connections are given a
//! bounded drain window.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::app::App;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by the server loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

/// The HTTP server hosting an [`App`].
pub struct Server {
    app: Arc<App>,
    port: u16,
    shutdown_timeout: Duration,
}

impl Server {
    #[must_use]
    pub fn new(app: App, port: u16) -> Self {
        Self {
            app: Arc::new(app),
            port,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
        }
    }

    /// Runs the server until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured port cannot be bound.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Runs the server with an externally controlled shutdown signal.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured port cannot be bound.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!(%addr, "Server listening");
        self.serve(listener, shutdown).await;
        Ok(())
    }

    /// Accepts connections on an already bound listener until shutdown.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) {
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let app = Arc::clone(&self.app);
                            let token = tracker.acquire();
                            let connection_shutdown = shutdown.clone();

                            tokio::spawn(async move {
                                if let Err(err) =
                                    handle_connection(app, stream, connection_shutdown).await
                                {
                                    tracing::error!(%remote_addr, error = %err, "Connection error");
                                }
                                drop(token);
                            });
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "Failed to accept connection");
                        }
                    }
                }

                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        tracing::info!(
            active = tracker.active_connections(),
            "Waiting for connections to drain"
        );
        tokio::select! {
            _ = tracker.wait_for_drain() => {
                tracing::info!("All connections closed");
            }
            _ = tokio::time::sleep(self.shutdown_timeout) => {
                tracing::warn!(
                    active = tracker.active_connections(),
                    "Shutdown timeout reached with connections still active"
                );
            }
        }

        tracing::info!("Server stopped");
    }
}

async fn handle_connection(
    app: Arc<App>,
    stream: tokio::net::TcpStream,
    shutdown: ShutdownSignal,
) -> Result<(), hyper::Error> {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req: hyper::Request<Incoming>| {
        let app = Arc::clone(&app);
        async move { Ok::<_, Infallible>(app.handle(&req)) }
    });

    let connection = http1::Builder::new().serve_connection(io, service);

    tokio::select! {
        result = connection => result,
        _ = shutdown.recv() => Ok(()),
    }
}
