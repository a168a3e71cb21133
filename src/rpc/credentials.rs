//! Per-call credentials.
//!
//! # Responsibilities
//! - Turn the caller's token into metadata attached to every backend call
//! - Declare whether the credentials need an encrypted transport
//! - Apply the metadata to each call through a tonic interceptor
//!
//! # Design Decisions
//! - Credentials never decide the transport; the connection factory checks
//!   `require_transport_security` against the transport it dials with
//! - The token is opaque here; only the backend judges it

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tonic::metadata::{Ascii, MetadataKey, MetadataValue};
use tonic::service::Interceptor;
use tonic::{Request, Status};

/// Metadata key the backend reads the caller's token from.
pub const TOKEN_METADATA_KEY: &str = "token";

/// Source of authentication metadata for outbound calls.
pub trait PerRpcCredentials: Send + Sync + fmt::Debug {
    /// Metadata entries to attach to the next call.
    fn request_metadata(&self) -> BTreeMap<String, String>;

    /// Whether these credentials may only travel over an encrypted transport.
    fn require_transport_security(&self) -> bool;
}

/// Bearer-style credentials carrying the token from the inbound request.
#[derive(Clone, Default)]
pub struct TokenCredentials {
    token: String,
}

impl TokenCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for TokenCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCredentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl PerRpcCredentials for TokenCredentials {
    fn request_metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(TOKEN_METADATA_KEY.to_string(), self.token.clone())])
    }

    fn require_transport_security(&self) -> bool {
        false
    }
}

/// Interceptor attaching [`PerRpcCredentials`] metadata to every call.
#[derive(Debug, Clone)]
pub struct CredentialInterceptor {
    credentials: Arc<dyn PerRpcCredentials>,
}

impl CredentialInterceptor {
    pub fn new(credentials: Arc<dyn PerRpcCredentials>) -> Self {
        Self { credentials }
    }
}

impl Interceptor for CredentialInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        for (key, value) in self.credentials.request_metadata() {
            let key = MetadataKey::<Ascii>::from_bytes(key.as_bytes())
                .map_err(|_| Status::unauthenticated(format!("invalid metadata key {key}")))?;
            let value = MetadataValue::<Ascii>::try_from(value.as_str())
                .map_err(|_| Status::unauthenticated("credential metadata is not valid ASCII"))?;
            request.metadata_mut().insert(key, value);
        }
        Ok(request)
    }
}
