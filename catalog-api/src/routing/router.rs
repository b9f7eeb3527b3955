//! Ordered route table and dispatch

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, info_span, Instrument};

use super::path::RoutePattern;
use super::{Params, RequestContext};
use crate::error::ApiError;
use crate::middleware::{GuardState, MiddlewareResolver, Verdict};

/// Largest request body read before dispatch
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub type HandlerFuture = BoxFuture<'static, Response>;

type BoxedHandler<S> = Arc<dyn Fn(S, RequestContext, Params) -> HandlerFuture + Send + Sync>;

struct Route<S> {
    method: Method,
    pattern: RoutePattern,
    handler: BoxedHandler<S>,
    access: Option<String>,
}

/// Route table built once at startup and shared read-only afterwards
pub struct Router<S> {
    routes: Vec<Route<S>>,
    resolver: MiddlewareResolver,
}

impl<S> Router<S>
where
    S: GuardState + Clone + Send + Sync + 'static,
{
    pub fn new(resolver: MiddlewareResolver) -> Self {
        Self {
            routes: Vec::new(),
            resolver,
        }
    }

    /// Append a route. Placeholders are written `:name`.
    pub fn add<H, Fut, R>(&mut self, method: Method, pattern: &str, handler: H) -> &mut Self
    where
        H: Fn(S, RequestContext, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        let handler: BoxedHandler<S> = Arc::new(move |state, ctx, params| {
            let fut = handler(state, ctx, params);
            Box::pin(async move { fut.await.into_response() })
        });

        self.routes.push(Route {
            method,
            pattern: RoutePattern::compile(pattern),
            handler,
            access: None,
        });
        self
    }

    pub fn get<H, Fut, R>(&mut self, pattern: &str, handler: H) -> &mut Self
    where
        H: Fn(S, RequestContext, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.add(Method::GET, pattern, handler)
    }

    pub fn post<H, Fut, R>(&mut self, pattern: &str, handler: H) -> &mut Self
    where
        H: Fn(S, RequestContext, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.add(Method::POST, pattern, handler)
    }

    pub fn put<H, Fut, R>(&mut self, pattern: &str, handler: H) -> &mut Self
    where
        H: Fn(S, RequestContext, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.add(Method::PUT, pattern, handler)
    }

    pub fn patch<H, Fut, R>(&mut self, pattern: &str, handler: H) -> &mut Self
    where
        H: Fn(S, RequestContext, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.add(Method::PATCH, pattern, handler)
    }

    pub fn delete<H, Fut, R>(&mut self, pattern: &str, handler: H) -> &mut Self
    where
        H: Fn(S, RequestContext, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.add(Method::DELETE, pattern, handler)
    }

    /// Set the access key of the most recently added route
    pub fn only(&mut self, key: &str) -> &mut Self {
        if let Some(route) = self.routes.last_mut() {
            route.access = Some(key.to_string());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Fail if any route names an access key the resolver does not know
    pub fn verify_access(&self) -> catalog_common::Result<()> {
        for route in &self.routes {
            if let Some(key) = &route.access {
                self.resolver.resolve(Some(key))?;
            }
        }
        Ok(())
    }

    fn find(&self, method: &Method, path: &str) -> Option<(&Route<S>, Params)> {
        let exact = self
            .routes
            .iter()
            .find(|r| r.method == *method && r.pattern.is_static() && r.pattern.as_str() == path);
        if let Some(route) = exact {
            return Some((route, Params::default()));
        }

        self.routes
            .iter()
            .filter(|r| r.method == *method && !r.pattern.is_static())
            .find_map(|r| r.pattern.captures(path).map(|params| (r, params)))
    }

    /// Pattern and captures the route table selects for `method` + `path`
    pub fn matched(&self, method: &Method, path: &str) -> Option<(&str, Params)> {
        let path = super::normalize_path(path);
        self.find(method, &path)
            .map(|(route, params)| (route.pattern.as_str(), params))
    }

    /// Match, run guards, then run the handler
    pub async fn dispatch(&self, state: S, ctx: RequestContext) -> Response {
        let Some((route, params)) = self.find(&ctx.method, &ctx.path) else {
            debug!("No route for {} {}", ctx.method, ctx.path);
            return (StatusCode::NOT_FOUND, Json(json!({}))).into_response();
        };

        let guards = match self.resolver.resolve(route.access.as_deref()) {
            Ok(guards) => guards,
            Err(e) => return ApiError::from(e).into_response(),
        };

        let mut extra_headers = HeaderMap::new();
        for guard in guards {
            match guard.run(&state, &ctx).await {
                Verdict::Continue(headers) => extra_headers.extend(headers),
                Verdict::Abort(response) => return response,
            }
        }

        let mut response = (route.handler)(state, ctx, params).await;
        response.headers_mut().extend(extra_headers);
        response
    }

    /// Entry point from axum: buffer the body, build the context, dispatch
    pub async fn handle(&self, state: S, request: Request) -> Response {
        let (parts, body) = request.into_parts();

        let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(_) => {
                return ApiError::BadRequest("Request body too large or unreadable".to_string())
                    .into_response()
            }
        };

        let mut ctx = RequestContext::new(parts.method, parts.uri);
        ctx.peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        ctx.headers = parts.headers;
        ctx.body = body;

        let span = info_span!(
            "request",
            id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path
        );
        self.dispatch(state, ctx).instrument(span).await
    }
}
