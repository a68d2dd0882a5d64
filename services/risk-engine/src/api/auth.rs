//! API key authentication and per-key rate limiting

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use tracing::debug;

use riskmesh_common::constants::http::headers::API_KEY;
use riskmesh_config::AuthConfig;
use riskmesh_errors::{Result, RiskMeshError};

use super::AppState;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// The client a request authenticated as; attached as a request extension.
#[derive(Debug, Clone)]
pub struct ApiClient {
    pub name: String,
    pub rate_limit_per_minute: u32,
}

struct RegisteredKey {
    client: ApiClient,
    limiter: DirectLimiter,
}

/// In-memory API key registry with one token bucket per key.
pub struct ApiKeyRegistry {
    keys: HashMap<String, RegisteredKey>,
}

impl ApiKeyRegistry {
    pub fn from_config(config: &AuthConfig) -> Self {
        let keys = config
            .api_keys
            .iter()
            .map(|entry| {
                let per_minute =
                    NonZeroU32::new(entry.rate_limit_per_minute).unwrap_or(NonZeroU32::MIN);
                (
                    entry.key.clone(),
                    RegisteredKey {
                        client: ApiClient {
                            name: entry.name.clone(),
                            rate_limit_per_minute: entry.rate_limit_per_minute,
                        },
                        limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
                    },
                )
            })
            .collect();
        Self { keys }
    }

    /// Validate the presented key and charge its rate limit.
    pub fn authorize(&self, presented: Option<&str>) -> Result<&ApiClient> {
        let presented =
            presented.ok_or_else(|| RiskMeshError::authentication("Missing X-API-Key header"))?;

        let registered = self
            .keys
            .get(presented)
            .ok_or_else(|| RiskMeshError::authentication("Invalid API key"))?;

        if registered.limiter.check().is_err() {
            return Err(RiskMeshError::rate_limit(
                registered.client.rate_limit_per_minute,
                Some(60),
            ));
        }

        debug!(client = %registered.client.name, "request authenticated");
        Ok(&registered.client)
    }
}

/// Axum middleware enforcing API key auth on `/api` routes.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, RiskMeshError> {
    let presented = request
        .headers()
        .get(API_KEY)
        .and_then(|value| value.to_str().ok());

    let client = state.auth.authorize(presented)?.clone();
    request.extensions_mut().insert(client);

    Ok(next.run(request).await)
}
