//! A TCP accept loop that runs one [`NioConnection`] per socket.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::codec::StreamingCodec;
use crate::config::{ConfigError, ServerConfig};
use crate::connection::{ConnectionId, FrameHandler, NioConnection};
use crate::dispatch::DispatchError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid server config: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("failed to build dispatcher: {source}")]
    Dispatch {
        #[from]
        source: DispatchError,
    },
}

/// Accepts TCP connections and serves each with a fresh codec from `codec_supplier`.
pub struct TcpServer<S, H> {
    config: ServerConfig,
    codec_supplier: S,
    handler: Arc<H>,
    shutdown: CancellationToken,
    next_id: AtomicU64,
    limiter: Arc<Semaphore>,
}

impl<S, C, H> TcpServer<S, H>
where
    S: Fn() -> C,
    C: StreamingCodec,
    H: FrameHandler<C::In, C::Out> + 'static,
{
    pub fn new(config: ServerConfig, codec_supplier: S, handler: Arc<H>) -> Result<Self, ServerError> {
        config.validate()?;
        let limiter = Arc::new(Semaphore::new(config.max_connections));
        Ok(Self {
            config,
            codec_supplier,
            handler,
            shutdown: CancellationToken::new(),
            next_id: AtomicU64::new(1),
            limiter,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Cancelling this token stops the accept loop and every open connection.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn open_connections(&self) -> usize {
        self.config.max_connections - self.limiter.available_permits()
    }

    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        TcpListener::bind(&self.config.address)
            .await
            .map_err(|source| ServerError::Bind { address: self.config.address.clone(), source })
    }

    /// Binds the configured address and serves until shut down.
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        info!(address = %listener.local_addr()?, "start listening");
        self.serve(listener).await;
        Ok(())
    }

    /// Serves connections from `listener` until [`shutdown`](Self::shutdown) is called.
    pub async fn serve(&self, listener: TcpListener) {
        loop {
            let accepted = tokio::select! {
                () = self.shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            let (tcp_stream, remote_addr) = match accepted {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let Ok(permit) = Arc::clone(&self.limiter).try_acquire_owned() else {
                warn!(%remote_addr, max_connections = self.config.max_connections, "too many connections, refusing");
                drop(tcp_stream);
                continue;
            };

            if let Err(e) = tcp_stream.set_nodelay(true) {
                warn!(cause = %e, "failed to set TCP_NODELAY");
            }

            let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
            let (reader, writer) = tcp_stream.into_split();
            let connection = NioConnection::new(id, reader, writer, (self.codec_supplier)(), self.config.connection)
                .with_cancellation(self.shutdown.child_token());
            let handler = Arc::clone(&self.handler);

            tokio::spawn(async move {
                match connection.process(handler).await {
                    Ok(()) => info!(connection = %id, %remote_addr, "finished process, connection shutdown"),
                    Err(e) => error!(connection = %id, cause = %e, "service has error, connection shutdown"),
                }
                drop(permit);
            });
        }
        info!("server stopped accepting connections");
    }
}

impl<S, H> std::fmt::Debug for TcpServer<S, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpServer")
            .field("config", &self.config)
            .field("available_permits", &self.limiter.available_permits())
            .finish_non_exhaustive()
    }
}
