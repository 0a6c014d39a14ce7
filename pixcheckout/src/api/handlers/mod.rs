//! Axum route handlers, one module per resource.
//!
//! Public storefront handlers (`checkout`, `webhooks`, the public half of `products`) take no
//! credentials. Every admin handler guards itself with a
//! [`RequiresPermission`](crate::auth::permissions::RequiresPermission) extractor.

pub mod analytics;
pub mod audit_logs;
pub mod auth;
pub mod automation;
pub mod backups;
pub mod checkout;
pub mod coupons;
pub mod customers;
pub mod files;
pub mod jobs;
pub mod messaging;
pub mod notifications;
pub mod orders;
pub mod payment_links;
pub mod products;
pub mod reports;
pub mod security;
pub mod settings;
pub mod webhooks;

use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::AppState;

/// Address used for rate limiting, IP blocking and login attempt records.
///
/// The socket peer is authoritative. Forwarding headers are only read when that peer is one of
/// `trusted_proxies`, and then the right-most untrusted hop in `X-Forwarded-For` wins, so a
/// client cannot pick its own address by prepending entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip());
        Ok(Self(client_ip(peer, &parts.headers, &state.config.trusted_proxies)))
    }
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Resolve the client address from the socket peer and, behind a trusted proxy, its headers.
/// `"unknown"` only when the server runs without connection info.
pub fn client_ip(peer: Option<IpAddr>, headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> String {
    let Some(peer) = peer else {
        return "unknown".to_string();
    };
    if !trusted_proxies.contains(&peer) {
        return peer.to_string();
    }

    let forwarded = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
        .collect::<Vec<_>>();

    forwarded
        .into_iter()
        .rev()
        .find(|hop| !trusted_proxies.contains(hop))
        .or_else(|| header_ip(headers, "x-real-ip"))
        .unwrap_or(peer)
        .to_string()
}
