//! Access guards run before route handlers
//!
//! A route names a symbolic access key; the [`MiddlewareResolver`] maps the
//! key to the guards to run, in order. A guard either lets the request
//! continue (optionally contributing response headers) or aborts it with
//! its own response.

use std::collections::HashMap;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use catalog_common::{Error, Result};
use tracing::{error, warn};

use crate::api::response::Envelope;
use crate::error::ApiError;
use crate::rate_limit::{RateLimitDecision, RateLimiter, Tier};
use crate::routing::RequestContext;

/// State the guards need from the application
pub trait GuardState {
    fn rate_limiter(&self) -> &RateLimiter;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Count the request against a quota tier
    RateLimit(Tier),
    /// Only whitelisted (loopback) clients pass
    LoopbackOnly,
}

pub enum Verdict {
    /// Proceed; headers are added to the eventual response
    Continue(HeaderMap),
    /// Stop and send this response instead
    Abort(Response),
}

impl Guard {
    pub async fn run<S: GuardState + Sync>(&self, state: &S, ctx: &RequestContext) -> Verdict {
        let client = ctx.client();

        match self {
            Guard::LoopbackOnly => {
                if client.is_whitelisted() {
                    Verdict::Continue(HeaderMap::new())
                } else {
                    warn!(client = %client.ip, path = %ctx.path, "Rejected non-local client");
                    Verdict::Abort(
                        ApiError::Forbidden("This endpoint is restricted to local clients".to_string())
                            .into_response(),
                    )
                }
            }
            Guard::RateLimit(tier) => match state.rate_limiter().check_limit(&client, *tier).await {
                Ok(decision) if decision.allowed => Verdict::Continue(decision.headers()),
                Ok(decision) => Verdict::Abort(rate_limited(&decision)),
                Err(e) => {
                    error!("Rate limit check failed: {}", e);
                    Verdict::Abort(ApiError::from(e).into_response())
                }
            },
        }
    }
}

/// 429 response carrying the decision in headers and body
pub fn rate_limited(decision: &RateLimitDecision) -> Response {
    let mut response = Envelope::error("Rate limit exceeded")
        .with_rate_limit(decision.body())
        .into_response_with(StatusCode::TOO_MANY_REQUESTS);
    response.headers_mut().extend(decision.headers());
    response
}

/// Static mapping from access key to guards
#[derive(Debug, Clone)]
pub struct MiddlewareResolver {
    registry: HashMap<String, Vec<Guard>>,
}

impl Default for MiddlewareResolver {
    fn default() -> Self {
        Self::empty()
            .register("rate_limit", vec![Guard::RateLimit(Tier::Api)])
            .register("rate_limit_default", vec![Guard::RateLimit(Tier::Default)])
            .register("rate_limit_api", vec![Guard::RateLimit(Tier::Api)])
            .register("rate_limit_strict", vec![Guard::RateLimit(Tier::Strict)])
            .register(
                "admin",
                vec![Guard::LoopbackOnly, Guard::RateLimit(Tier::Strict)],
            )
    }
}

impl MiddlewareResolver {
    pub fn empty() -> Self {
        Self {
            registry: HashMap::new(),
        }
    }

    pub fn register(mut self, key: &str, guards: Vec<Guard>) -> Self {
        self.registry.insert(key.to_string(), guards);
        self
    }

    /// Guards for `key`; no key means no guards, an unknown key is a
    /// configuration error
    pub fn resolve(&self, key: Option<&str>) -> Result<&[Guard]> {
        match key {
            None | Some("") => Ok(&[]),
            Some(key) => self
                .registry
                .get(key)
                .map(Vec::as_slice)
                .ok_or_else(|| Error::Config(format!("Unknown middleware key '{}'", key))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_resolves_to_nothing() {
        let resolver = MiddlewareResolver::default();
        assert!(resolver.resolve(None).unwrap().is_empty());
        assert!(resolver.resolve(Some("")).unwrap().is_empty());
    }

    #[test]
    fn test_tier_keys() {
        let resolver = MiddlewareResolver::default();
        assert_eq!(
            resolver.resolve(Some("rate_limit_strict")).unwrap(),
            &[Guard::RateLimit(Tier::Strict)]
        );
        assert_eq!(
            resolver.resolve(Some("rate_limit")).unwrap(),
            &[Guard::RateLimit(Tier::Api)]
        );
        assert_eq!(
            resolver.resolve(Some("admin")).unwrap(),
            &[Guard::LoopbackOnly, Guard::RateLimit(Tier::Strict)]
        );
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let resolver = MiddlewareResolver::default();
        assert!(matches!(
            resolver.resolve(Some("guest")),
            Err(Error::Config(_))
        ));
    }
}
