use crate::http::{self, HttpError, Request};
use crate::metrics::RequestCounter;
use crate::payload::Payload;
use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Benchmark server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address, an IP literal
    pub host: String,
    /// Port to listen on; 0 picks an ephemeral port
    pub port: u16,
    /// Read-idle window after which a connection is reclaimed
    pub idle_timeout: Duration,
    /// Ceiling on the size of one aggregated request
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::defaults::PORT,
            idle_timeout: Duration::from_millis(crate::defaults::IDLE_TIMEOUT_MS),
            max_request_bytes: crate::defaults::MAX_REQUEST_BYTES,
        }
    }
}

impl ServerConfig {
    /// Configuration from the two entry-contract parameters
    pub fn new(port: u16, idle_timeout_ms: u64) -> Self {
        Self {
            port,
            idle_timeout: Duration::from_millis(idle_timeout_ms),
            ..Self::default()
        }
    }
}

/// Minimal keep-alive HTTP server returning a fixed payload
///
/// Binds at construction and serves until `shutdown`. Each accepted
/// connection runs in its own task: requests are aggregated under the
/// read-idle timeout, gzip is negotiated per request, and faults on one
/// connection never touch the listener or its siblings.
pub struct BenchmarkServer {
    local_addr: SocketAddr,
    served: Arc<RequestCounter>,
    shutdown_tx: oneshot::Sender<()>,
    accept_handle: JoinHandle<()>,
}

impl BenchmarkServer {
    /// Bind the listening socket and start accepting connections
    pub async fn bind(config: &ServerConfig, payload: Payload) -> Result<Self> {
        let listener = build_listener(config)?;
        let local_addr = listener.local_addr()?;
        info!("Benchmark server listening on {}", local_addr);

        let payload = Arc::new(payload);
        let served = Arc::new(RequestCounter::new());
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let loop_served = served.clone();
        let idle_timeout = config.idle_timeout;
        let max_request_bytes = config.max_request_bytes;
        let accept_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            debug!("Accepted connection from {}", peer);
                            let payload = payload.clone();
                            let served = loop_served.clone();
                            tokio::spawn(async move {
                                handle_connection(
                                    stream,
                                    peer,
                                    payload,
                                    served,
                                    idle_timeout,
                                    max_request_bytes,
                                )
                                .await;
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            break;
                        }
                    },
                    _ = &mut shutdown_rx => {
                        debug!("Accept loop shutting down");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            local_addr,
            served,
            shutdown_tx,
            accept_handle,
        })
    }

    /// Address the server is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Total responses fully written since startup
    pub fn requests_served(&self) -> u64 {
        self.served.current()
    }

    /// Stop accepting new connections
    ///
    /// Connections already being served run on until their peers disconnect
    /// or the idle reaper reclaims them.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        self.accept_handle
            .await
            .context("Server accept task panicked")?;
        info!("Benchmark server shut down");
        Ok(())
    }
}

/// Build the listener with an explicit backlog sized for connection storms
fn build_listener(config: &ServerConfig) -> Result<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .context("Failed to create listener socket")?;
    socket.set_reuse_address(true)?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("Failed to bind {}", addr))?;
    socket.listen(crate::defaults::LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;

    TcpListener::from_std(socket.into()).context("Failed to register listener with the runtime")
}

/// Serve one connection until the peer leaves, the reaper expires it, or a
/// fault occurs
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    payload: Arc<Payload>,
    served: Arc<RequestCounter>,
    idle_timeout: Duration,
    max_request_bytes: usize,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
    }

    let mut buf = Vec::with_capacity(4096);
    loop {
        let request =
            match http::read_request(&mut stream, &mut buf, idle_timeout, max_request_bytes).await
            {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!("Peer {} closed the connection", peer);
                    break;
                }
                Err(HttpError::IdleTimeout(window)) => {
                    info!("Idle => closing {} (no bytes for {:?})", peer, window);
                    break;
                }
                Err(e) if e.is_peer_reset() => {
                    debug!("Connection from {} reset by peer", peer);
                    break;
                }
                Err(e) => {
                    error!("Failed to read request from {}: {}", peer, e);
                    break;
                }
            };

        if let Err(e) = write_response(&mut stream, &request, &payload).await {
            match e.kind() {
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe => {
                    debug!("Connection from {} reset by peer", peer)
                }
                _ => error!("Failed to write response to {}: {}", peer, e),
            }
            break;
        }
        served.increment();
    }

    debug!("Connection from {} finished", peer);
}

/// Pick the payload variant by content negotiation and write one response
async fn write_response(
    stream: &mut TcpStream,
    request: &Request,
    payload: &Payload,
) -> std::io::Result<()> {
    let gzip = request.accepts_gzip();
    let body = if gzip {
        payload.gzipped()
    } else {
        payload.raw()
    };
    let response = http::encode_response(body, payload.content_type(), gzip);
    stream.write_all(&response).await?;
    stream.flush().await
}
