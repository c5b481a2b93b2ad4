//! Transport hooks.
//!
//! A [`TransportHook`] is the seam between the interceptor and whatever
//! carries outbound traffic. While a handler is installed the hook routes
//! every request through it; removing the handler restores normal routing.
//!
//! [`ProcessHook`] is the process-wide variant. Every outbound call made by
//! [`HttpSource`](crate::remote::HttpSource) checks it before touching the
//! network.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::error::Result;

/// An outbound request as seen by a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub method: String,
    /// Full URL or request target, query string included.
    pub url: String,
}

impl InterceptedRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }
}

/// The response a handler completes an intercepted request with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl InterceptedResponse {
    /// A 200 response carrying a JSON body.
    pub fn json(body: String) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status: 200,
            headers,
            body,
        }
    }
}

/// Answers intercepted requests. Must not block or suspend.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: &InterceptedRequest) -> InterceptedResponse;
}

impl<F> RequestHandler for F
where
    F: Fn(&InterceptedRequest) -> InterceptedResponse + Send + Sync,
{
    fn handle(&self, request: &InterceptedRequest) -> InterceptedResponse {
        self(request)
    }
}

/// Something the interceptor can register a handler against.
///
/// Both calls complete their side effects before returning. `install`
/// replaces any handler already registered; `remove` is idempotent.
pub trait TransportHook: Send + Sync {
    fn install(&self, handler: Arc<dyn RequestHandler>) -> Result<()>;

    fn remove(&self);

    fn is_installed(&self) -> bool;
}

static PROCESS_HANDLER: RwLock<Option<Arc<dyn RequestHandler>>> = RwLock::new(None);

/// Route `request` through the process-wide handler, if one is installed.
///
/// Returns `None` when no handler is installed and the caller should go to
/// the network.
pub fn dispatch(request: &InterceptedRequest) -> Option<InterceptedResponse> {
    let handler = PROCESS_HANDLER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()?;
    debug!(method = %request.method, url = %request.url, "Intercepted outbound request");
    Some(handler.handle(request))
}

/// Process-wide hook.
///
/// The slot behind it is global, so every `ProcessHook` value refers to the
/// same registration. Only one controller per process should drive it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessHook;

impl TransportHook for ProcessHook {
    fn install(&self, handler: Arc<dyn RequestHandler>) -> Result<()> {
        *PROCESS_HANDLER
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
        Ok(())
    }

    fn remove(&self) {
        PROCESS_HANDLER
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn is_installed(&self) -> bool {
        PROCESS_HANDLER
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
