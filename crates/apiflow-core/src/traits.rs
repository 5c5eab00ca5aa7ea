use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{OutboundRequest, TransportResponse};

/// Transport — performs the outbound network call for HTTP and GraphQL nodes.
///
/// Any completed exchange is `Ok`, whatever its status code. `Err` is reserved
/// for calls that produced no response at all (DNS, refused, timeout).
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<TransportResponse>>;
}
