//! Source-address filtering for the webhook route.
//!
//! Novac posts webhooks from a small, published set of addresses. The
//! filter rejects everything else before the body is even read, so
//! signature validation and donation lookups never run for strangers.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::task::{Context, Poll};

use axum::extract::connect_info::ConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};

use crate::config::AllowedIps;

#[derive(Clone, Debug)]
pub struct IpFilterLayer {
    allowed_ips: AllowedIps,
    trusted_proxy_depth: usize,
}

impl IpFilterLayer {
    pub fn new(allowed_ips: AllowedIps, trusted_proxy_depth: usize) -> Self {
        Self {
            allowed_ips,
            trusted_proxy_depth,
        }
    }
}

impl<S> Layer<S> for IpFilterLayer {
    type Service = IpFilterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IpFilterService {
            inner,
            allowed_ips: self.allowed_ips.clone(),
            trusted_proxy_depth: self.trusted_proxy_depth,
        }
    }
}

#[derive(Clone, Debug)]
pub struct IpFilterService<S> {
    inner: S,
    allowed_ips: AllowedIps,
    trusted_proxy_depth: usize,
}

impl<S, B> Service<Request<B>> for IpFilterService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = futures_util::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let client_ip =
            extract_client_ip(req.headers(), req.extensions(), self.trusted_proxy_depth);
        let allowed = is_allowed(client_ip, &self.allowed_ips);

        if !allowed {
            tracing::warn!(client_ip = ?client_ip, "rejected webhook from non-allowlisted address");
            let response = StatusCode::UNAUTHORIZED.into_response();
            return Box::pin(async move { Ok(response) });
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

fn is_allowed(client_ip: Option<IpAddr>, allowed_ips: &AllowedIps) -> bool {
    match allowed_ips {
        AllowedIps::Any => true,
        AllowedIps::Cidrs(cidrs) => client_ip
            .map(|ip| cidrs.iter().any(|cidr| cidr.contains(&ip)))
            .unwrap_or(false),
    }
}

fn extract_client_ip(
    headers: &HeaderMap,
    extensions: &axum::http::Extensions,
    trusted_proxy_depth: usize,
) -> Option<IpAddr> {
    if let Some(ip) = extract_from_x_forwarded_for(headers, trusted_proxy_depth) {
        return Some(ip);
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|connect_info| connect_info.0.ip())
}

/// Resolves the client from `X-Forwarded-For`. With no trusted proxies
/// the header is attacker-controlled and must be ignored outright, so the
/// socket address is the only source of truth.
fn extract_from_x_forwarded_for(headers: &HeaderMap, trusted_proxy_depth: usize) -> Option<IpAddr> {
    if trusted_proxy_depth == 0 {
        return None;
    }

    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;

    let chain: Vec<IpAddr> = raw
        .split(',')
        .map(str::trim)
        .filter_map(parse_ip_from_xff_entry)
        .collect();

    if chain.is_empty() || trusted_proxy_depth >= chain.len() {
        return None;
    }

    let index = chain.len().saturating_sub(1 + trusted_proxy_depth);
    chain.get(index).copied()
}

fn parse_ip_from_xff_entry(value: &str) -> Option<IpAddr> {
    if let Ok(ip) = IpAddr::from_str(value) {
        return Some(ip);
    }

    if let Ok(addr) = SocketAddr::from_str(value) {
        return Some(addr.ip());
    }

    None
}
