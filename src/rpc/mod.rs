//! Backend RPC subsystem.
//!
//! # Data Flow
//! ```text
//! Typed request message
//!     → client.rs (unary gRPC call, deadline + trace context attached)
//!     → credentials.rs (interceptor adds token metadata)
//!     → BackendConnection (tonic channel over the dialed transport)
//!     → client.rs (decoded response message, or tonic::Status on failure)
//! ```

pub mod client;
pub mod credentials;
pub mod messages;

pub use client::{AccountClient, CallOptions, SERVICE};
pub use credentials::{CredentialInterceptor, PerRpcCredentials, TokenCredentials};
pub use tonic::{Code, Status};
