//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tower layers, route table)
//!     → middleware/auth.rs (route check, request span, token gate)
//!     → request.rs (typed request context for the dispatcher)
//!     → [dispatch module runs the operation]
//!     → response.rs (envelope + HTTP status)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, TOKEN_HEADER, X_REQUEST_ID};
pub use response::{build_envelope, Envelope, GatewayError, ResultCode};
pub use server::{AppState, HttpServer};
