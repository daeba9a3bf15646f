//! The transport seam of the client.

use crate::request::ClientRequest;
use crate::response::ClientResponse;
use async_trait::async_trait;
use trellis_core::ProcessingResult;

/// Sends a fully prepared request and returns the raw response.
///
/// The connector is the terminal step of every client invocation. It runs
/// after the request filters and before the response filters.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use http::StatusCode;
/// use trellis_client::{ClientRequest, ClientResponse, Connector};
/// use trellis_core::ProcessingResult;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Connector for Echo {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     async fn apply(&self, request: ClientRequest) -> ProcessingResult<ClientResponse> {
///         let body = request.uri().to_string();
///         Ok(ClientResponse::new(StatusCode::OK).with_entity(body, &mime::TEXT_PLAIN))
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the connector name used in logs.
    fn name(&self) -> &str;

    /// Sends a request.
    async fn apply(&self, request: ClientRequest) -> ProcessingResult<ClientResponse>;

    /// Releases connector resources. Called once, when the client closes.
    fn close(&self) {}
}
