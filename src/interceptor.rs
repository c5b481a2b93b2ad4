//! Request interceptor.
//!
//! Owns the stubbing session: the in-memory fixtures and the registration
//! on a [`TransportHook`]. While active, every request routed through the
//! hook is answered from the fixtures, padded to the requested `limit`.

use crate::error::Result;
use crate::fixtures::{empty_payload, FixtureStore};
use crate::query::RequestQuery;
use crate::transport::{InterceptedRequest, InterceptedResponse, RequestHandler, TransportHook};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Pad `payload.items` to `limit` entries by repeating the first item.
///
/// Never truncates. Payloads without a non-empty `items` array are left as
/// they are.
pub fn pad_items(payload: &mut Value, limit: usize) {
    let Some(items) = payload.get_mut("items").and_then(Value::as_array_mut) else {
        return;
    };
    let Some(first) = items.first().cloned() else {
        return;
    };
    while items.len() < limit {
        items.push(first.clone());
    }
}

/// Handler installed on the hook while stubbing.
struct FixtureResponder {
    store: Arc<RwLock<FixtureStore>>,
}

impl RequestHandler for FixtureResponder {
    fn handle(&self, request: &InterceptedRequest) -> InterceptedResponse {
        let query = RequestQuery::from_url(&request.url);
        let mut payload = self
            .store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(query.content_type());
        let limit = query.limit();
        pad_items(&mut payload, limit);

        debug!(
            content_type = query.content_type().unwrap_or(""),
            limit,
            "Serving fixture"
        );

        let body = serde_json::to_string(&payload)
            .unwrap_or_else(|_| empty_payload().to_string());
        InterceptedResponse::json(body)
    }
}

/// The single stubbing session of a process.
///
/// Starts inactive. [`stub`](Self::stub) loads fixtures and installs the
/// responder; [`unstub`](Self::unstub) clears them and removes it.
pub struct Interceptor {
    hook: Arc<dyn TransportHook>,
    store: Arc<RwLock<FixtureStore>>,
    responder: Arc<FixtureResponder>,
}

impl Interceptor {
    pub fn new(hook: Arc<dyn TransportHook>) -> Self {
        let store = Arc::new(RwLock::new(FixtureStore::new()));
        let responder = Arc::new(FixtureResponder {
            store: store.clone(),
        });
        Self {
            hook,
            store,
            responder,
        }
    }

    /// Load fixtures from `fixture_dir` and start intercepting.
    ///
    /// Calling this while already active reloads the fixtures and keeps the
    /// existing registration.
    pub fn stub(&mut self, fixture_dir: &Path) -> Result<()> {
        let loaded = {
            let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
            store.reload(fixture_dir);
            store.len()
        };

        if let Err(e) = self.hook.install(self.responder.clone()) {
            self.store
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            return Err(e);
        }

        info!(
            fixtures = loaded,
            dir = %fixture_dir.display(),
            "Stubbing content API"
        );
        Ok(())
    }

    /// Stop intercepting and drop the loaded fixtures. Safe to call when
    /// already inactive.
    pub fn unstub(&mut self) {
        let was_active = self.is_active();
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.hook.remove();
        if was_active {
            info!("Stopped stubbing content API");
        }
    }

    pub fn is_active(&self) -> bool {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_active()
    }

    /// Number of fixtures currently loaded.
    pub fn fixture_count(&self) -> usize {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Answer `request` the way the installed hook would.
    pub fn handle(&self, request: &InterceptedRequest) -> InterceptedResponse {
        self.responder.handle(request)
    }

    pub fn hook(&self) -> &Arc<dyn TransportHook> {
        &self.hook
    }
}
