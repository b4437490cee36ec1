//! In-memory network backend.
//!
//! Serves a fixed route table instead of touching the network. Used by the
//! worker's tests and by hosts that resolve resources themselves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode};
use url::Url;

use crate::{NetError, NetworkBackend, Request, Response};

/// What the backend returns for a routed URL.
#[derive(Debug, Clone)]
enum Route {
    Respond {
        status: StatusCode,
        content_type: Option<String>,
        body: Bytes,
    },
    /// Simulated network failure (connection refused, offline, ...).
    Fail,
}

/// A network backend backed by an in-memory route table.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    routes: RwLock<HashMap<Url, Route>>,
    requests: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while a guard is held only poisons the lock; the route table
    // itself stays consistent, so recover the guard instead of panicking.
    fn routes_read(&self) -> RwLockReadGuard<'_, HashMap<Url, Route>> {
        self.routes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn routes_write(&self) -> RwLockWriteGuard<'_, HashMap<Url, Route>> {
        self.routes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route a URL to a 200 response with the given body.
    pub fn route_ok(&self, url: Url, body: impl Into<Bytes>) {
        self.route(url, StatusCode::OK, None, body);
    }

    /// Route a URL to a response.
    pub fn route(
        &self,
        url: Url,
        status: StatusCode,
        content_type: Option<&str>,
        body: impl Into<Bytes>,
    ) {
        self.routes_write().insert(
            url,
            Route::Respond {
                status,
                content_type: content_type.map(|s| s.to_string()),
                body: body.into(),
            },
        );
    }

    /// Route a URL to a simulated network failure.
    pub fn route_failure(&self, url: Url) {
        self.routes_write().insert(url, Route::Fail);
    }

    /// Remove a route. Subsequent fetches of the URL fail.
    pub fn remove_route(&self, url: &Url) {
        self.routes_write().remove(url);
    }

    /// Number of fetches performed against this backend.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl NetworkBackend for InMemoryBackend {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        self.requests.fetch_add(1, Ordering::Relaxed);

        let route = self.routes_read().get(&request.url).cloned();
        match route {
            Some(Route::Respond {
                status,
                content_type,
                body,
            }) => {
                let mut headers = HeaderMap::new();
                if let Some(ct) = content_type {
                    if let Ok(value) = HeaderValue::try_from(ct.as_str()) {
                        headers.insert("content-type", value);
                    }
                }
                Ok(Response {
                    request_id: request.id,
                    url: request.url,
                    status,
                    headers,
                    body,
                })
            }
            Some(Route::Fail) | None => {
                Err(NetError::RequestFailed(format!("no route to {}", request.url)))
            }
        }
    }
}
