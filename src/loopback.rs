//! Loopback HTTP hook.
//!
//! Binds a local HTTP/1.1 listener and answers every request that reaches
//! it through the installed handler, whatever the path or method. Point a
//! client's base URL at [`LoopbackHook::local_addr`] to stub it from
//! outside the process.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::error::{FauxError, Result};
use crate::transport::{InterceptedRequest, InterceptedResponse, RequestHandler, TransportHook};

type HandlerSlot = Arc<RwLock<Option<Arc<dyn RequestHandler>>>>;

struct Running {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
}

/// Hook that serves intercepted traffic on a loopback socket.
pub struct LoopbackHook {
    addr: SocketAddr,
    handler: HandlerSlot,
    running: Mutex<Option<Running>>,
}

impl LoopbackHook {
    /// Create a hook that will listen on `addr` once installed. Port 0 picks
    /// a free port.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            handler: Arc::new(RwLock::new(None)),
            running: Mutex::new(None),
        }
    }

    /// Address actually bound, while installed.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|r| r.local_addr)
    }

    fn bind(&self, runtime: &Handle) -> Result<(TcpListener, SocketAddr)> {
        let std_listener = std::net::TcpListener::bind(self.addr)
            .map_err(|e| FauxError::Hook(format!("failed to bind to {}: {}", self.addr, e)))?;
        std_listener
            .set_nonblocking(true)
            .map_err(|e| FauxError::Hook(format!("failed to configure listener: {}", e)))?;
        let local_addr = std_listener
            .local_addr()
            .map_err(|e| FauxError::Hook(format!("failed to read bound address: {}", e)))?;
        let _guard = runtime.enter();
        let listener = TcpListener::from_std(std_listener)
            .map_err(|e| FauxError::Hook(format!("failed to register listener: {}", e)))?;
        Ok((listener, local_addr))
    }
}

impl TransportHook for LoopbackHook {
    fn install(&self, handler: Arc<dyn RequestHandler>) -> Result<()> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
        if running.is_some() {
            return Ok(());
        }

        let bound = Handle::try_current()
            .map_err(|e| FauxError::Hook(format!("loopback hook needs a tokio runtime: {}", e)))
            .and_then(|runtime| self.bind(&runtime).map(|b| (runtime, b)));
        let (runtime, (listener, local_addr)) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                self.handler
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                return Err(e);
            }
        };
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        runtime.spawn(accept_loop(listener, self.handler.clone(), shutdown_rx));

        info!(addr = %local_addr, "Loopback hook listening");
        *running = Some(Running {
            local_addr,
            shutdown_tx,
        });
        Ok(())
    }

    fn remove(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        self.handler
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(r) = running.take() {
            let _ = r.shutdown_tx.send(());
            info!(addr = %r.local_addr, "Loopback hook removed");
        }
    }

    fn is_installed(&self) -> bool {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for LoopbackHook {
    fn drop(&mut self) {
        self.remove();
    }
}

async fn accept_loop(
    listener: TcpListener,
    handler: HandlerSlot,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("Loopback listener shutting down");
                break;
            }
            result = listener.accept() => {
                match result {
                    Ok((stream, remote_addr)) => {
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                                let handler = handler.clone();
                                async move { Ok::<_, Infallible>(respond(&handler, &req)) }
                            });

                            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                error!(error = %e, remote_addr = %remote_addr, "HTTP connection error");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                }
            }
        }
    }
}

fn respond<B>(handler: &HandlerSlot, req: &Request<B>) -> Response<Full<Bytes>> {
    let current = handler
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    let Some(current) = current else {
        let mut response = Response::new(Full::new(Bytes::from_static(b"Stubbing is not active")));
        *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
        return response;
    };

    let intercepted = InterceptedRequest::new(req.method().as_str(), req.uri().to_string());
    debug!(method = %intercepted.method, url = %intercepted.url, "Loopback request");
    into_hyper(current.handle(&intercepted))
}

fn into_hyper(intercepted: InterceptedResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(intercepted.body)));
    *response.status_mut() = StatusCode::from_u16(intercepted.status).unwrap_or(StatusCode::OK);
    for (name, value) in &intercepted.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}
