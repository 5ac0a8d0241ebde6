use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response}
};
use tokio::sync::Mutex;

use crate::state::AppState;

const TOO_MANY_REQUESTS_MESSAGE: &str = "Too many requests from this IP, please try again later.";
const PRUNE_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited { retry_after: Duration }
}

struct Window {
    started: Instant,
    count: u32
}

/// Fixed-window request counter keyed by client address.
pub struct RateLimiter {
    window: Duration,
    max: u32,
    clients: Mutex<HashMap<String, Window>>
}

impl RateLimiter {
    pub fn new(window: Duration, max: u32) -> Self {
        Self {
            window,
            max,
            clients: Mutex::new(HashMap::new())
        }
    }

    pub async fn check(&self, client: &str) -> Decision {
        self.check_at(client, Instant::now()).await
    }

    async fn check_at(&self, client: &str, now: Instant) -> Decision {
        let mut clients = self.clients.lock().await;

        if clients.len() >= PRUNE_THRESHOLD {
            clients.retain(|_, w| now.duration_since(w.started) < self.window);
        }

        let window = clients.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0
        });
        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }

        if window.count >= self.max {
            let elapsed = now.duration_since(window.started);
            return Decision::Limited {
                retry_after: self.window.saturating_sub(elapsed)
            };
        }

        window.count += 1;
        Decision::Allowed
    }
}

/// Middleware for `/api/*`. Requests without connection info share one bucket.
pub async fn limit_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.ip().to_string());

    match state.rate_limiter.check(&client).await {
        Decision::Allowed => next.run(request).await,
        Decision::Limited { retry_after } => {
            tracing::warn!(client = %client, "rate limit exceeded");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({ "error": TOO_MANY_REQUESTS_MESSAGE }))
            )
                .into_response();
            let seconds = retry_after.as_secs().max(1);
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(seconds));
            response
        }
    }
}
