//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatched request
//!     → dialer.rs (transport dial + HTTP/2 handshake, bounded by deadline)
//!     → connection.rs (id assignment, live connection count)
//!     → BackendConnection handed to the RPC client
//!     → dropped when the request finishes (socket closed, count released)
//! ```
//!
//! # Design Decisions
//! - Connections are request-scoped and exclusively owned
//! - Transport is a trait so tests and alternative transports plug in

pub mod connection;
pub mod dialer;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use dialer::{BackendConnection, BoxedIo, ConnectionFactory, TcpTransport, Transport, TransportError};
