//! Graceful server module
//!
//! Owns the accept loop and the shutdown protocol. State machine:
//! `Starting → Accepting → Draining → Stopped`. On the shutdown signal
//! the listener is dropped (no new connections), in-flight requests get a
//! bounded drain window, and the ordered shutdown-hook list runs exactly
//! once on entering `Stopped`.

pub mod listener;
pub mod signal;

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, info, trace, warn};

use crate::error::StartupError;
use crate::handler::{self, ServiceState};

pub use listener::create_reusable_listener;
pub use signal::spawn_signal_listener;

/// Lifecycle states of the serving loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Accepting,
    Draining,
    Stopped,
}

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Hook = Box<dyn FnOnce() -> HookFuture + Send>;

/// Ordered shutdown-sequence list, run exactly once.
#[derive(Default)]
pub struct ShutdownHooks {
    hooks: Vec<(&'static str, Hook)>,
    ran: bool,
}

impl ShutdownHooks {
    pub fn add(&mut self, name: &'static str, hook: Hook) {
        self.hooks.push((name, hook));
    }

    /// Run all hooks in registration order. A second call is a no-op.
    pub async fn run(&mut self) {
        if self.ran {
            debug!("shutdown hooks already ran; ignoring");
            return;
        }
        self.ran = true;
        for (name, hook) in self.hooks.drain(..) {
            info!(hook = name, "running shutdown hook");
            hook().await;
        }
    }
}

pub struct GracefulServer {
    addr: SocketAddr,
    drain_timeout: Duration,
    shutdown: Arc<Notify>,
    hooks: ShutdownHooks,
    state: ServerState,
}

impl GracefulServer {
    pub fn new(addr: SocketAddr, drain_timeout: Duration) -> Self {
        Self {
            addr,
            drain_timeout,
            shutdown: Arc::new(Notify::new()),
            hooks: ShutdownHooks::default(),
            state: ServerState::Starting,
        }
    }

    /// Notifier that moves the server from `Accepting` to `Draining`.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    pub fn add_shutdown_hook<F, Fut>(&mut self, name: &'static str, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks.add(name, Box::new(move || Box::pin(hook())));
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn serve(self, service: Arc<ServiceState>) -> Result<(), StartupError> {
        let listener =
            create_reusable_listener(self.addr).map_err(|source| StartupError::Bind {
                addr: self.addr,
                source,
            })?;
        self.serve_on(listener, service).await;
        Ok(())
    }

    /// Serve on an already-bound listener until shutdown.
    pub async fn serve_on(mut self, listener: TcpListener, service: Arc<ServiceState>) {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());

        self.state = ServerState::Accepting;
        match listener.local_addr() {
            Ok(addr) => info!(%addr, "server accepting connections"),
            Err(e) => warn!("listener has no local address: {e}"),
        }

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            trace!(%peer_addr, "connection accepted");
                            spawn_connection(
                                stream,
                                Arc::clone(&service),
                                Arc::clone(&in_flight),
                                Arc::clone(&idle),
                            );
                        }
                        Err(e) => warn!("failed to accept connection: {e}"),
                    }
                }
                () = self.shutdown.notified() => break,
            }
        }

        // No new connections from here on.
        drop(listener);
        self.state = ServerState::Draining;
        info!(
            in_flight = in_flight.load(Ordering::SeqCst),
            "draining in-flight requests"
        );

        let drained = async {
            while in_flight.load(Ordering::SeqCst) > 0 {
                idle.notified().await;
            }
        };
        if tokio::time::timeout(self.drain_timeout, drained).await.is_err() {
            warn!(
                abandoned = in_flight.load(Ordering::SeqCst),
                "drain timeout elapsed; abandoning remaining requests"
            );
        }

        self.state = ServerState::Stopped;
        self.hooks.run().await;
        info!("server stopped");
    }
}

fn spawn_connection(
    stream: TcpStream,
    service: Arc<ServiceState>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);
        // Counted per request, not per connection: an idle keep-alive
        // connection holds no drain permit.
        let svc = service_fn(move |req| {
            let service = Arc::clone(&service);
            let in_flight = Arc::clone(&in_flight);
            let idle = Arc::clone(&idle);
            async move {
                in_flight.fetch_add(1, Ordering::SeqCst);
                let result = handler::handle_request(req, service).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                idle.notify_one();
                result
            }
        });

        if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
            debug!("connection ended with error: {e}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{test_config, Application};
    use crate::context::RequestContext;
    use crate::dispatch::{Dispatcher, HandlerRegistry, HandlerResult};
    use crate::middleware::Pipeline;
    use crate::routing::Router;
    use std::sync::atomic::AtomicUsize;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn empty_service() -> Arc<ServiceState> {
        let registry = HandlerRegistry::new();
        let dispatcher = Dispatcher::bind(Router::new(), &registry).expect("empty table binds");
        Arc::new(ServiceState {
            app: Arc::new(Application::fixture(test_config())),
            pipeline: Pipeline::builder().build(),
            dispatcher,
        })
    }

    async fn slow_handler(_ctx: RequestContext) -> HandlerResult {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(crate::http::build_html_response("done".to_string()))
    }

    fn slow_service() -> Arc<ServiceState> {
        let mut registry = HandlerRegistry::new();
        registry.add("Slow", slow_handler);
        let mut router = Router::new();
        router.get("/slow", "Slow").expect("valid route");
        let dispatcher = Dispatcher::bind(router, &registry).expect("binds");
        Arc::new(ServiceState {
            app: Arc::new(Application::fixture(test_config())),
            pipeline: Pipeline::builder().build(),
            dispatcher,
        })
    }

    #[test]
    fn starts_in_starting_state() {
        let server = GracefulServer::new("127.0.0.1:0".parse().expect("addr"), Duration::from_secs(1));
        assert_eq!(server.state(), ServerState::Starting);
    }

    #[tokio::test]
    async fn hooks_run_exactly_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut hooks = ShutdownHooks::default();
        let captured = Arc::clone(&counter);
        hooks.add(
            "count",
            Box::new(move || {
                Box::pin(async move {
                    captured.fetch_add(1, Ordering::SeqCst);
                })
            }),
        );

        hooks.run().await;
        hooks.run().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hooks_run_in_registration_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut hooks = ShutdownHooks::default();
        for label in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            hooks.add(
                label,
                Box::new(move || {
                    Box::pin(async move {
                        log.lock().expect("log lock").push(label);
                    })
                }),
            );
        }

        hooks.run().await;
        assert_eq!(*log.lock().expect("log lock"), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn serves_then_refuses_after_shutdown() {
        let listener =
            create_reusable_listener("127.0.0.1:0".parse().expect("addr")).expect("binds");
        let addr = listener.local_addr().expect("local addr");

        let hook_runs = Arc::new(AtomicUsize::new(0));
        let mut server = GracefulServer::new(addr, Duration::from_secs(1));
        let shutdown = server.shutdown_handle();
        let captured = Arc::clone(&hook_runs);
        server.add_shutdown_hook("count", move || async move {
            captured.fetch_add(1, Ordering::SeqCst);
        });

        let serve_task = tokio::spawn(server.serve_on(listener, empty_service()));

        // An empty route table still answers: request must get a 404.
        let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connects");
        stream
            .write_all(b"GET /nowhere HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
            .await
            .expect("writes");
        let mut response = String::new();
        stream.read_to_string(&mut response).await.expect("reads");
        assert!(response.starts_with("HTTP/1.1 404"), "got: {response}");

        // notify_one stores a permit, so the accept loop sees the signal
        // even if it is not parked in the select at this instant.
        shutdown.notify_one();
        serve_task.await.expect("serve task finishes");

        // Once stopped, new connections are refused and hooks ran once.
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
        assert_eq!(hook_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn in_flight_request_completes_during_drain() {
        let listener =
            create_reusable_listener("127.0.0.1:0".parse().expect("addr")).expect("binds");
        let addr = listener.local_addr().expect("local addr");

        let hook_runs = Arc::new(AtomicUsize::new(0));
        let mut server = GracefulServer::new(addr, Duration::from_secs(5));
        let shutdown = server.shutdown_handle();
        let captured = Arc::clone(&hook_runs);
        server.add_shutdown_hook("count", move || async move {
            captured.fetch_add(1, Ordering::SeqCst);
        });

        let serve_task = tokio::spawn(server.serve_on(listener, slow_service()));

        let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connects");
        stream
            .write_all(b"GET /slow HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
            .await
            .expect("writes");
        // Give the handler time to start before the signal arrives.
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.notify_one();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.expect("reads");
        assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");

        serve_task.await.expect("serve task finishes");
        assert_eq!(hook_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn idle_keep_alive_connection_does_not_delay_drain() {
        let listener =
            create_reusable_listener("127.0.0.1:0".parse().expect("addr")).expect("binds");
        let addr = listener.local_addr().expect("local addr");

        let server = GracefulServer::new(addr, Duration::from_secs(5));
        let shutdown = server.shutdown_handle();
        let serve_task = tokio::spawn(server.serve_on(listener, empty_service()));

        // Complete one request but keep the connection open and idle.
        let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connects");
        stream
            .write_all(b"GET /nowhere HTTP/1.1\r\nHost: test\r\n\r\n")
            .await
            .expect("writes");
        let mut buf = [0u8; 1024];
        let n = stream.read(&mut buf).await.expect("reads");
        assert!(n > 0);

        // With no request executing, the drain must finish well inside
        // the timeout despite the open connection.
        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(2), serve_task)
            .await
            .expect("drain finished without waiting on the idle connection")
            .expect("serve task finishes");
    }
}
