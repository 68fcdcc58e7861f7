//! The abstract provider client.

use crate::error::ApiError;
use crate::request::ApiRequest;
use crate::response::ModelResponse;
use async_trait::async_trait;

/// Send a request, get a response.
///
/// Implementations own transport, authentication and retry policy. The
/// executor never sees HTTP: a client either yields a [`ModelResponse`]
/// or a classified [`ApiError`].
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: ApiRequest) -> Result<ModelResponse, ApiError>;

    /// Provider family identifier (`"anthropic"`, `"openai"`, ...),
    /// used in diagnostics and run records.
    fn provider(&self) -> &str;
}
