use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::config::ApiConfig;
use crate::error::ApiError;

/// Tracked client addresses before idle ones are pruned.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Per client IP request budget, shared by every route.
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimit {
    /// `max_requests` per `window`, refilled evenly. `None` when either is zero.
    pub fn new(max_requests: u32, window: Duration) -> Option<Self> {
        let burst = NonZeroU32::new(max_requests)?;
        let quota = Quota::with_period(window / burst.get())?.allow_burst(burst);

        Some(Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            max_requests,
            window,
        })
    }

    pub fn from_config(api: &ApiConfig) -> Option<Self> {
        Self::new(
            api.rate_limit_max_requests,
            Duration::from_secs(api.rate_limit_window_secs),
        )
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), ApiError> {
        if self.limiter.len() > MAX_TRACKED_CLIENTS {
            self.limiter.retain_recent();
        }

        self.limiter.check_key(&ip).map_err(|_| {
            tracing::warn!(
                "Rate limit of {} requests per {}s exceeded by {}",
                self.max_requests,
                self.window.as_secs(),
                ip
            );
            ApiError::too_many_requests("Too many requests, please try again later.")
        })
    }
}

/// Peer address of the connection; requests without one share a bucket.
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit(
    State(limit): State<RateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    limit.check(client_ip(&request))?;
    Ok(next.run(request).await)
}
