//! Minimal HTTP endpoint for uptime checks and the latest page.
//!
//! - `GET /`           plain-text liveness line
//! - `GET /status`     JSON metadata of the latest snapshot
//! - `GET /index.html` the latest rendered page (503 before the first pass)

use std::io;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use actix_web::dev::ServerHandle;
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};

use crate::snapshot::SnapshotReader;

pub const LIVENESS_TEXT: &str = "NEPSE Live Data is running...";

/// Open connections per worker; further accepts wait until one closes
pub const MAX_CONNECTIONS: usize = 64;

const WORKERS: usize = 2;

/// Deadline for a client to deliver its whole request head
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.as_bytes().to_vec(),
        }
    }

    fn json(value: &impl serde::Serialize) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status: 200,
                content_type: "application/json",
                body,
            },
            Err(e) => Self::text(500, &format!("cannot encode status: {e}")),
        }
    }
}

/// Map a request line to a response against the current snapshot.
pub fn route(method: &str, target: &str, reader: &SnapshotReader) -> Response {
    if method != "GET" && method != "HEAD" {
        return Response::text(405, "method not allowed");
    }
    let path = target.split(['?', '#']).next().unwrap_or("/");

    match path {
        "/" => Response::text(200, LIVENESS_TEXT),
        "/status" => match reader.latest() {
            Some(snapshot) => Response::json(&snapshot.status()),
            None => Response::json(&serde_json::json!({ "status": "warming_up" })),
        },
        "/index.html" => match reader.latest() {
            Some(snapshot) => Response {
                status: 200,
                content_type: "text/html; charset=utf-8",
                body: snapshot.html.as_bytes().to_vec(),
            },
            None => Response::text(503, "no data yet, first refresh is still running"),
        },
        _ => Response::text(404, "not found"),
    }
}

pub struct HealthServer {
    addr: SocketAddr,
    server: ServerHandle,
    thread: Option<JoinHandle<()>>,
}

type Bound = io::Result<(SocketAddr, ServerHandle)>;

impl HealthServer {
    /// Bind and start serving on a dedicated runtime thread.
    pub fn start(addr: SocketAddr, reader: SnapshotReader) -> io::Result<Self> {
        let (ready, bound) = mpsc::channel::<Bound>();
        let thread = thread::Builder::new()
            .name("health".into())
            .spawn(move || actix_web::rt::System::new().block_on(serve(addr, reader, ready)))?;

        let (addr, server) = bound
            .recv()
            .map_err(|_| io::Error::other("health endpoint exited before binding"))??;

        log::info!("health endpoint listening on http://{addr}");
        Ok(Self {
            addr,
            server,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            // The stop command is queued on call; the thread exits once the server drains
            drop(self.server.stop(true));
            let _ = thread.join();
            log::info!("health endpoint stopped");
        }
    }
}

impl Drop for HealthServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve(addr: SocketAddr, reader: SnapshotReader, ready: mpsc::Sender<Bound>) {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(reader.clone()))
            .default_service(web::to(dispatch))
    })
    .workers(WORKERS)
    .max_connections(MAX_CONNECTIONS)
    .client_request_timeout(REQUEST_TIMEOUT)
    .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
    // SIGINT/SIGTERM belong to the scheduler
    .disable_signals()
    .bind(addr);

    let server = match server {
        Ok(server) => server,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let local = server.addrs().first().copied().unwrap_or(addr);
    let running = server.run();
    if ready.send(Ok((local, running.handle()))).is_err() {
        return;
    }
    if let Err(e) = running.await {
        log::error!("health endpoint error: {e}");
    }
}

async fn dispatch(req: HttpRequest, reader: web::Data<SnapshotReader>) -> HttpResponse {
    log::debug!("health request {} {}", req.method(), req.path());
    let response = route(req.method().as_str(), req.path(), &reader);
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status)
        .content_type(response.content_type)
        .body(response.body)
}
