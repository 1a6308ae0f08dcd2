//! HTTP routing with matchit.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use hyper::Method;
use serde::de::DeserializeOwned;

use crate::Result;
use crate::config::Config;
use crate::response::HttpResponse;

/// Boxed future for async handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Handler context passed to route handlers.
pub struct Context {
    pub method: Method,
    pub uri: hyper::Uri,
    pub headers: hyper::http::HeaderMap,
    /// Route parameters (e.g., {id} from path).
    pub params: HashMap<String, String>,
    /// The request body, pre-read as bytes.
    pub body: Bytes,
    pub config: Arc<Config>,
}

impl Context {
    /// Parse the request body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Err(crate::Error::BadRequest("Missing request body".to_string()));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| crate::Error::BadRequest(format!("Invalid request body: {e}")))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    /// Get a required route parameter, returning BadRequest if missing.
    pub fn require_param(&self, name: &str) -> Result<&str> {
        self.param(name)
            .ok_or_else(|| crate::Error::BadRequest(format!("Missing parameter: {name}")))
    }

    /// Request path without the query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Principal id from the bearer token, or `Unauthorized`.
    pub fn require_principal_id(&self) -> Result<String> {
        crate::auth::extract_principal_id(&self.headers, &self.config.auth)
    }

    /// Principal id from the bearer token or session cookie, or `Unauthorized`.
    pub fn require_session_principal_id(&self) -> Result<String> {
        crate::auth::extract_session_principal_id(&self.headers, &self.config.auth)
    }
}

/// Handler function type.
pub type Handler = Box<dyn Fn(Context) -> BoxFuture<'static, Result<HttpResponse>> + Send + Sync>;

struct RouteEntry {
    handlers: HashMap<Method, Handler>,
}

/// HTTP router for registering and dispatching requests.
pub struct Router {
    routes: matchit::Router<usize>,
    entries: Vec<RouteEntry>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: matchit::Router::new(),
            entries: Vec::new(),
        }
    }

    /// Register a handler for a method and path.
    pub fn route<F, Fut>(&mut self, method: Method, path: &str, handler: F)
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        let entry_idx = match self.routes.at(path) {
            Ok(matched) => *matched.value,
            Err(_) => {
                let idx = self.entries.len();
                self.entries.push(RouteEntry {
                    handlers: HashMap::new(),
                });
                if let Err(e) = self.routes.insert(path, idx) {
                    tracing::error!("Failed to register route {path}: {e}");
                }
                idx
            }
        };

        let boxed: Handler = Box::new(move |ctx: Context| -> BoxFuture<'static, Result<HttpResponse>> {
            Box::pin(handler(ctx))
        });
        self.entries[entry_idx].handlers.insert(method, boxed);
    }

    pub fn get<F, Fut>(&mut self, path: &str, handler: F)
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.route(Method::GET, path, handler);
    }

    pub fn post<F, Fut>(&mut self, path: &str, handler: F)
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.route(Method::POST, path, handler);
    }

    pub fn put<F, Fut>(&mut self, path: &str, handler: F)
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.route(Method::PUT, path, handler);
    }

    pub fn delete<F, Fut>(&mut self, path: &str, handler: F)
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.route(Method::DELETE, path, handler);
    }

    /// Convert to a thread-safe handle for use in request handling.
    pub fn into_handle(self) -> Arc<RouterHandle> {
        Arc::new(RouterHandle {
            routes: self.routes,
            entries: self.entries,
        })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe router handle for use in request handling.
pub struct RouterHandle {
    routes: matchit::Router<usize>,
    entries: Vec<RouteEntry>,
}

/// Result of matching a request to a route.
pub enum RouteMatch<'a> {
    Matched {
        handler: &'a Handler,
        params: HashMap<String, String>,
    },
    /// Path matched but method not allowed.
    MethodNotAllowed,
    NotFound,
}

/// Percent-decode a path segment. Segments that do not decode to UTF-8 are
/// passed through as received.
fn decode_param(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

impl RouterHandle {
    pub fn match_route(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let Ok(matched) = self.routes.at(path) else {
            return RouteMatch::NotFound;
        };
        let entry = &self.entries[*matched.value];
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), decode_param(v)))
            .collect();

        match entry.handlers.get(method) {
            Some(handler) => RouteMatch::Matched { handler, params },
            None => RouteMatch::MethodNotAllowed,
        }
    }
}
