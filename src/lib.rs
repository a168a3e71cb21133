//! Account gateway library.
//!
//! Accepts JSON-over-HTTP account requests and forwards each one as a
//! unary gRPC call to the account service.

pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rpc;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
