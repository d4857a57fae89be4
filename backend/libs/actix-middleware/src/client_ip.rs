//! Client address resolution
//!
//! Precedence: `X-Forwarded-For` (first entry), `Client-IP`, transport peer
//! address, then `0.0.0.0`. Forwarded headers are taken at face value; deployments
//! behind untrusted networks must strip them at the edge.

use actix_web::dev::ServiceRequest;
use actix_web::http::header::HeaderMap;

pub const UNKNOWN_CLIENT_ADDRESS: &str = "0.0.0.0";

const FORWARDED_FOR: &str = "x-forwarded-for";
const CLIENT_IP: &str = "client-ip";

/// Resolve the client address from headers and the peer address.
pub fn resolve_client_address(headers: &HeaderMap, peer: Option<&str>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| {
            value
                .split(',')
                .map(str::trim)
                .find(|part| !part.is_empty())
        });

    let client_ip = || {
        headers
            .get(CLIENT_IP)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(client_ip)
        .or(peer.filter(|p| !p.is_empty()))
        .unwrap_or(UNKNOWN_CLIENT_ADDRESS)
        .to_string()
}

/// Resolve the client address of an in-flight request.
pub fn client_address(req: &ServiceRequest) -> String {
    let peer = req.peer_addr().map(|addr| addr.ip().to_string());
    resolve_client_address(req.headers(), peer.as_deref())
}

/// User agent header, if present and valid UTF-8.
pub fn user_agent(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(actix_web::http::header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}
