use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;
use ragbot_core::service::QaService;

/// Default request body cap; a chat message is far smaller.
pub const DEFAULT_MAX_BODY_SIZE: usize = 65_536;

#[derive(Clone)]
pub(crate) struct AppState {
    pub qa: Arc<dyn QaService>,
    pub started_at: Instant,
}

pub struct GatewayServer {
    addr: SocketAddr,
    max_body_size: usize,
    qa: Arc<dyn QaService>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    /// # Errors
    ///
    /// Returns [`GatewayError::Address`] if `bind:port` is not a valid socket address.
    pub fn new(
        bind: &str,
        port: u16,
        qa: Arc<dyn QaService>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self, GatewayError> {
        let addr: SocketAddr = format!("{bind}:{port}")
            .parse()
            .map_err(|e| GatewayError::Address(format!("{bind}:{port}"), e))?;

        Ok(Self {
            addr,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            qa,
            shutdown_rx,
        })
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind and serve until the shutdown signal flips to `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns an error on a fatal I/O error.
    pub async fn serve_on(self, listener: tokio::net::TcpListener) -> Result<(), GatewayError> {
        let router = build_router(self.qa, self.max_body_size);
        let local = listener
            .local_addr()
            .map_or_else(|_| self.addr.to_string(), |a| a.to_string());
        tracing::info!("chat server listening on http://{local}");

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                while !*shutdown_rx.borrow_and_update() {
                    if shutdown_rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                tracing::info!("chat server shutting down");
            })
            .await
            .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}
