/// Rate Limiting System
use crate::{context::AppContext, error::ApiError};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorLimiter,
};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests per second per client IP for credential endpoints
    pub credential_rps: u32,
    /// Requests per second for everything else
    pub general_rps: u32,
    /// Burst size
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            credential_rps: 5,
            general_rps: 200,
            burst_size: 50,
        }
    }
}

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    /// One bucket per client address
    credential: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    general: Arc<DirectLimiter>,
}

fn non_zero(value: u32, fallback: NonZeroU32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(fallback)
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let credential_quota = Quota::per_second(non_zero(config.credential_rps, NonZeroU32::MIN))
            .allow_burst(non_zero(config.burst_size / 5, NonZeroU32::MIN));

        let general_quota = Quota::per_second(non_zero(config.general_rps, NonZeroU32::MIN))
            .allow_burst(non_zero(config.burst_size, NonZeroU32::MIN));

        Self {
            enabled: config.enabled,
            credential: Arc::new(GovernorLimiter::keyed(credential_quota)),
            general: Arc::new(GovernorLimiter::direct(general_quota)),
        }
    }

    /// Check rate limit for credential endpoints from `client`
    pub fn check_credential(&self, client: IpAddr) -> Result<(), ApiError> {
        if !self.enabled {
            return Ok(());
        }
        self.credential
            .check_key(&client)
            .map_err(|_| ApiError::RateLimited)
    }

    /// Check rate limit for all other endpoints
    pub fn check_general(&self) -> Result<(), ApiError> {
        if !self.enabled {
            return Ok(());
        }
        self.general.check().map_err(|_| ApiError::RateLimited)
    }
}

fn is_credential_path(path: &str) -> bool {
    matches!(
        path,
        "/api/v1/admin/login" | "/api/v1/admin/refresh-token" | "/api/v1/admin/create"
    )
}

/// Peer address from the connection; requests without one share a bucket
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_credential_path(request.uri().path()) {
        ctx.rate_limiter.check_credential(client_ip(&request))?;
    } else {
        ctx.rate_limiter.check_general()?;
    }

    Ok(next.run(request).await)
}
