/**
 * Client Address Extractor
 *
 * Anonymous broadcast viewers have no account, so the peer address is the
 * only identity the hub has for them. The address comes from
 * `ConnectInfo`, which is present when the server is started with
 * `into_make_service_with_connect_info::<SocketAddr>()`.
 *
 * Only the IP is used: a viewer reconnecting from a new source port is the
 * same viewer. Everyone behind one NAT or proxy shares an address and is
 * counted once.
 */

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

/// Peer IP of the request, `None` without connect info
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientAddress(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientAddress
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let address = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientAddress(address))
    }
}

impl ClientAddress {
    /// Key used for an anonymous viewer
    pub fn viewer_key(&self) -> String {
        match self.0 {
            Some(ip) => ip.to_string(),
            None => "unknown".to_string(),
        }
    }
}
