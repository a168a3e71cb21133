//! Backend connection factory.
//!
//! # Responsibilities
//! - Dial the configured backend address over a pluggable [`Transport`]
//! - Complete the HTTP/2 handshake through a tonic [`Endpoint`] before handing
//!   the channel out
//! - Optionally bound the whole establishment by a deadline
//! - Refuse credentials that demand a secure transport on an insecure one
//!
//! # Design Decisions
//! - One connection per dispatched request; no pooling, no sharing
//! - The channel is dropped with [`BackendConnection`], so the socket closes
//!   on every exit path
//! - Deadline expiry is a [`TransportError`], never a silent retry

use futures_util::future::BoxFuture;
use hyper_util::rt::TokioIo;
use std::error::Error as StdError;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

use crate::net::connection::{ConnectionGuard, ConnectionTracker};
use crate::rpc::credentials::{CredentialInterceptor, PerRpcCredentials};

/// Byte stream a transport hands back.
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Io for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

pub type BoxedIo = Box<dyn Io>;

/// Opens raw byte streams to the backend.
pub trait Transport: Send + Sync + 'static {
    fn dial(&self, addr: &str) -> BoxFuture<'static, io::Result<BoxedIo>>;

    /// Whether streams from this transport are encrypted.
    fn is_secure(&self) -> bool {
        false
    }
}

/// Plaintext TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    fn dial(&self, addr: &str) -> BoxFuture<'static, io::Result<BoxedIo>> {
        let addr = addr.to_string();
        Box::pin(async move {
            let stream = TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream) as BoxedIo)
        })
    }
}

/// Failure to establish a backend connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid backend address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("connection to {addr} not established within {}ms", .deadline.as_millis())]
    DeadlineExceeded { addr: String, deadline: Duration },

    #[error("credentials for {addr} require a secure transport")]
    InsecureTransport { addr: String },
}

/// Render an error with its whole source chain.
fn error_chain(err: &dyn StdError) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Produces request-scoped connections to the single configured backend.
pub struct ConnectionFactory {
    address: String,
    transport: Arc<dyn Transport>,
    tracker: ConnectionTracker,
}

impl ConnectionFactory {
    pub fn new(address: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            address: address.into(),
            transport,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Factory dialing plain TCP.
    pub fn tcp(address: impl Into<String>) -> Self {
        Self::new(address, Arc::new(TcpTransport))
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Number of connections handed out and not yet dropped.
    pub fn open_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Dial without a deadline.
    pub async fn connect(
        &self,
        credentials: Arc<dyn PerRpcCredentials>,
    ) -> Result<BackendConnection, TransportError> {
        if credentials.require_transport_security() && !self.transport.is_secure() {
            return Err(TransportError::InsecureTransport {
                addr: self.address.clone(),
            });
        }

        let endpoint = Endpoint::from_shared(format!("http://{}", self.address)).map_err(|e| {
            TransportError::InvalidAddress {
                addr: self.address.clone(),
                reason: error_chain(&e),
            }
        })?;

        let transport = self.transport.clone();
        let addr = self.address.clone();
        let connector = service_fn(move |_: Uri| {
            let dial = transport.dial(&addr);
            async move { dial.await.map(TokioIo::new) }
        });

        let channel = endpoint
            .connect_with_connector(connector)
            .await
            .map_err(|e| TransportError::Connect {
                addr: self.address.clone(),
                reason: error_chain(&e),
            })?;

        let guard = self.tracker.track();
        metrics::counter!("gateway_backend_connections_opened_total").increment(1);
        tracing::debug!(connection_id = %guard.id(), addr = %self.address, "Backend connection established");

        Ok(BackendConnection {
            channel,
            credentials,
            addr: self.address.clone(),
            _guard: guard,
        })
    }

    /// Dial, giving up once `deadline` has elapsed.
    pub async fn connect_within(
        &self,
        credentials: Arc<dyn PerRpcCredentials>,
        deadline: Duration,
    ) -> Result<BackendConnection, TransportError> {
        match tokio::time::timeout(deadline, self.connect(credentials)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(addr = %self.address, deadline_ms = deadline.as_millis() as u64, "Backend connect deadline exceeded");
                Err(TransportError::DeadlineExceeded {
                    addr: self.address.clone(),
                    deadline,
                })
            }
        }
    }
}

impl std::fmt::Debug for ConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionFactory")
            .field("address", &self.address)
            .field("open_connections", &self.open_connections())
            .finish()
    }
}

/// An established channel bound to one caller's credentials.
#[derive(Debug)]
pub struct BackendConnection {
    channel: Channel,
    credentials: Arc<dyn PerRpcCredentials>,
    addr: String,
    // Releases the live-connection count on drop.
    _guard: ConnectionGuard,
}

impl BackendConnection {
    pub fn address(&self) -> &str {
        &self.addr
    }

    /// The channel with the caller's credentials applied to every call.
    pub fn authorized(&self) -> InterceptedService<Channel, CredentialInterceptor> {
        InterceptedService::new(
            self.channel.clone(),
            CredentialInterceptor::new(self.credentials.clone()),
        )
    }
}
