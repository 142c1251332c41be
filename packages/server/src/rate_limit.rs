//! Fixed-window request quotas keyed by client address.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use tracing::debug;

use crate::config::RateLimitTier;
use crate::error::AppError;
use crate::utils::clock::Clock;

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

struct Window {
    started: Instant,
    hits: u32,
}

/// Outcome of counting one request against a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

impl Decision {
    /// Whole seconds until the window resets, never less than one.
    pub fn reset_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        let secs = if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        };
        secs.max(1)
    }

    /// Set the `RateLimit-*` headers unless an inner limiter already did.
    fn apply_headers(&self, headers: &mut HeaderMap) {
        headers
            .entry(RATELIMIT_LIMIT)
            .or_insert(HeaderValue::from(self.limit));
        headers
            .entry(RATELIMIT_REMAINING)
            .or_insert(HeaderValue::from(self.remaining));
        headers
            .entry(RATELIMIT_RESET)
            .or_insert(HeaderValue::from(self.reset_secs()));
    }
}

/// Counts requests per client in fixed windows; the window starts at the
/// client's first request and resets once it has fully elapsed.
pub struct FixedWindowLimiter {
    name: &'static str,
    max: u32,
    window: Duration,
    message: String,
    clock: Arc<dyn Clock>,
    windows: DashMap<IpAddr, Window>,
}

impl FixedWindowLimiter {
    pub fn new(name: &'static str, tier: &RateLimitTier, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            max: tier.max,
            window: Duration::from_secs(tier.window_secs),
            message: tier.message.clone(),
            clock,
            windows: DashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_disabled(&self) -> bool {
        self.max == 0
    }

    /// Count one request from `client` and decide whether it may proceed.
    pub fn check(&self, client: IpAddr) -> Decision {
        let now = self.clock.now();
        let mut window = self.windows.entry(client).or_insert(Window {
            started: now,
            hits: 0,
        });

        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.hits = 0;
        }
        window.hits = window.hits.saturating_add(1);

        Decision {
            allowed: window.hits <= self.max,
            limit: self.max,
            remaining: self.max.saturating_sub(window.hits),
            reset_after: self
                .window
                .saturating_sub(now.duration_since(window.started)),
        }
    }

    /// Forget clients whose window has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Middleware rejecting requests over `limiter`'s quota with 429.
pub async fn enforce(
    State(limiter): State<Arc<FixedWindowLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    if limiter.is_disabled() {
        return next.run(req).await;
    }

    let client = client_ip(&req);
    let decision = limiter.check(client);

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        debug!(tier = limiter.name(), %client, "Rate limit exceeded");
        AppError::RateLimited {
            message: limiter.message().to_string(),
            retry_after: decision.reset_secs(),
        }
        .into_response()
    };

    decision.apply_headers(response.headers_mut());
    response
}
