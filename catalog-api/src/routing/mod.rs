//! Route-dispatch engine
//!
//! Routes are matched on method plus normalised path: exact static routes
//! first, then placeholder patterns in registration order. Guards mapped to
//! a route's access key run before its handler.

pub mod path;
pub mod router;

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::rate_limit::ClientIdentity;

pub use path::{normalize_path, RoutePattern};
pub use router::{HandlerFuture, Router};

/// Captured path parameters, in pattern order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    names: Vec<String>,
    values: Vec<String>,
}

impl Params {
    pub(crate) fn push(&mut self, name: &str, value: &str) {
        self.names.push(name.to_string());
        self.values.push(value.to_string());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Positional access
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    /// Lookup by placeholder name
    pub fn named(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.get(i))
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Everything a guard or handler may inspect about the inbound request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub method: Method,
    pub uri: Uri,
    /// Normalised path, query string removed
    pub path: String,
    pub headers: HeaderMap,
    pub peer: Option<SocketAddr>,
    pub body: Bytes,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri) -> Self {
        let path = normalize_path(uri.path());
        Self {
            request_id: Uuid::new_v4(),
            method,
            uri,
            path,
            headers: HeaderMap::new(),
            peer: None,
            body: Bytes::new(),
        }
    }

    pub fn client(&self) -> ClientIdentity {
        ClientIdentity::from_request(&self.headers, self.peer)
    }

    /// Deserialize the query string
    pub fn query<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Query::<T>::try_from_uri(&self.uri)
            .map(|Query(q)| q)
            .map_err(|e| ApiError::BadRequest(format!("Invalid query string: {}", e)))
    }

    /// Parse the body as a JSON object
    pub fn json_object(&self) -> Result<Map<String, Value>, ApiError> {
        match serde_json::from_slice::<Value>(&self.body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ApiError::BadRequest("Request body must be a JSON object".to_string())),
            Err(_) => Err(ApiError::BadRequest("Invalid JSON data".to_string())),
        }
    }
}
