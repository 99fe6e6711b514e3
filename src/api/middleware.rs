//! Request guards for the trigger API
//!
//! Authentication, per-client rate limiting, body size limits, response
//! hardening headers and request logging. Every layer reads its settings
//! from one shared [`GuardState`].

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::GuardConfig;
use crate::crypto::sha256;

/// Paths reachable without an API key
pub const PUBLIC_PATHS: &[&str] = &["/health"];

#[derive(Debug, Clone)]
pub struct GuardSettings {
    pub enable_auth: bool,
    pub api_keys: Vec<String>,
    pub rate_limit_per_minute: u32,
    pub max_request_size: usize,
    pub log_requests: bool,
    pub sanitize_logs: bool,
}

impl GuardSettings {
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            enable_auth: config.security.enable_auth,
            api_keys: config.security.api_keys.clone(),
            rate_limit_per_minute: config.security.rate_limit_per_minute,
            max_request_size: config.security.max_request_size,
            log_requests: config.logging.log_requests,
            sanitize_logs: config.logging.sanitize_logs,
        }
    }
}

/// Fixed one-minute window counter per client
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, (u32, Instant)>,
    limit: u32,
    window: Duration,
}

/// Result of one rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_after_secs: u64,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            windows: DashMap::new(),
            limit: requests_per_minute,
            window: Duration::from_secs(60),
        }
    }

    pub fn check(&self, client: &str) -> RateDecision {
        let now = Instant::now();
        let mut entry = self.windows.entry(client.to_string()).or_insert((0, now));
        let (count, started) = entry.value_mut();

        if now.duration_since(*started) >= self.window {
            *count = 0;
            *started = now;
        }

        let reset_after_secs = self
            .window
            .saturating_sub(now.duration_since(*started))
            .as_secs();

        if *count >= self.limit {
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_after_secs,
            };
        }

        *count += 1;
        RateDecision {
            allowed: true,
            remaining: self.limit - *count,
            reset_after_secs,
        }
    }

    /// Drop windows idle for more than two periods
    pub fn prune(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, (_, started)| now.duration_since(*started) < self.window * 2);
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

#[derive(Clone)]
pub struct GuardState {
    pub settings: Arc<GuardSettings>,
    pub rate_limiter: Arc<RateLimiter>,
    key_digests: Arc<Vec<[u8; 32]>>,
}

impl GuardState {
    pub fn new(settings: GuardSettings) -> Self {
        let key_digests = settings
            .api_keys
            .iter()
            .map(|key| sha256(key.as_bytes()))
            .collect();
        Self {
            rate_limiter: Arc::new(RateLimiter::new(settings.rate_limit_per_minute)),
            settings: Arc::new(settings),
            key_digests: Arc::new(key_digests),
        }
    }

    /// Compare digests without short-circuiting on the first differing byte
    fn accepts(&self, presented: &str) -> bool {
        let digest = sha256(presented.as_bytes());
        self.key_digests.iter().fold(false, |found, known| {
            let diff = known
                .iter()
                .zip(digest.iter())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b));
            found | (diff == 0)
        })
    }
}

/// Proxy headers first, then the socket peer
fn client_ip(headers: &HeaderMap, request: &Request) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok())
        && let Some(first) = forwarded.split(',').next()
    {
        return first.trim().to_string();
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return real_ip.trim().to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Mask the middle of an identifier for logs
pub fn mask_identifier(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

pub async fn auth_middleware(
    State(state): State<GuardState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = request.uri().path().to_string();

    if !state.settings.enable_auth || is_public(&path) {
        return Ok(next.run(request).await);
    }

    let presented = headers
        .get("x-api-key")
        .or_else(|| headers.get("authorization"))
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start_matches("Bearer ").trim());

    match presented {
        Some(key) if state.accepts(key) => {
            debug!("API key accepted for {}", path);
            Ok(next.run(request).await)
        }
        Some(_) => {
            warn!("Rejected API key for {}", path);
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            warn!("Missing API key for {}", path);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

fn insert_rate_headers(headers: &mut HeaderMap, limit: u32, decision: &RateDecision) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from(decision.reset_after_secs),
    );
}

pub async fn rate_limit_middleware(
    State(state): State<GuardState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let client = client_ip(&headers, &request);
    let decision = state.rate_limiter.check(&client);
    let limit = state.settings.rate_limit_per_minute;

    if !decision.allowed {
        warn!(
            client = %mask_identifier(&client),
            path = %request.uri().path(),
            "Rate limit exceeded"
        );
        let mut response = StatusCode::TOO_MANY_REQUESTS.into_response();
        insert_rate_headers(response.headers_mut(), limit, &decision);
        response.headers_mut().insert(
            "Retry-After",
            HeaderValue::from(decision.reset_after_secs),
        );
        return response;
    }

    let mut response = next.run(request).await;
    insert_rate_headers(response.headers_mut(), limit, &decision);
    response
}

/// Reject declared bodies over the configured size
pub async fn body_size_middleware(
    State(state): State<GuardState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let declared = headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    if let Some(length) = declared
        && length > state.settings.max_request_size
    {
        warn!(
            "Request body too large: {} bytes (max: {})",
            length, state.settings.max_request_size
        );
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    Ok(next.run(request).await)
}

pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Strict-Transport-Security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.remove("Server");

    response
}

pub async fn logging_middleware(
    State(state): State<GuardState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if !state.settings.log_requests {
        return next.run(request).await;
    }

    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = client_ip(&headers, &request);
    let client = if state.settings.sanitize_logs {
        mask_identifier(&client)
    } else {
        client
    };

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let duration_ms = started.elapsed().as_millis() as u64;

    if response.status().is_server_error() {
        error!(%method, %path, status, duration_ms, %client, "Request failed");
    } else if response.status().is_client_error() {
        warn!(%method, %path, status, duration_ms, %client, "Client error");
    } else {
        info!(%method, %path, status, duration_ms, %client, "Request completed");
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(keys: &[&str]) -> GuardSettings {
        GuardSettings {
            enable_auth: true,
            api_keys: keys.iter().map(|k| k.to_string()).collect(),
            rate_limit_per_minute: 2,
            max_request_size: 1024,
            log_requests: false,
            sanitize_logs: true,
        }
    }

    #[test]
    fn test_rate_limiter_window() {
        let limiter = RateLimiter::new(2);

        let first = limiter.check("10.0.0.1");
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert!(limiter.check("10.0.0.1").allowed);

        let third = limiter.check("10.0.0.1");
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);

        // Other clients have their own window
        assert!(limiter.check("10.0.0.2").allowed);
        assert_eq!(limiter.tracked_clients(), 2);

        limiter.prune();
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_key_matching() {
        let state = GuardState::new(settings(&["first-key-0123456789", "second-key-0123456789"]));
        assert!(state.accepts("first-key-0123456789"));
        assert!(state.accepts("second-key-0123456789"));
        assert!(!state.accepts("first-key-012345678"));
        assert!(!state.accepts(""));
    }

    #[test]
    fn test_mask_identifier() {
        assert_eq!(mask_identifier("10.0.0.1"), "********");
        assert_eq!(mask_identifier("192.168.100.200"), "192....200");
        assert_eq!(mask_identifier(""), "");
    }

    #[test]
    fn test_public_paths() {
        assert!(is_public("/health"));
        assert!(!is_public("/health/extra"));
        assert!(!is_public("/attest"));
    }
}
