//! HTTP stats server for forwarding monitoring.
//!
//! Provides a simple `/stats` endpoint that returns VRB statistics as JSON.
//!
//! # Example Response
//!
//! ```json
//! {
//!   "uptime_secs": 3600,
//!   "capacity": 16,
//!   "vrb": {
//!     "created": 150, "merged": 420, "full": 2, "evicted": 148,
//!     "removed": 0, "lookup_hits": 900, "lookup_misses": 12,
//!     "route_failures": 3, "entries": 2
//!   }
//! }
//! ```

use log::{error, info, warn};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tiny_http::{Header, Method, Response, Server};

use crate::stats::StatsReport;
use crate::vrb::Vrb;

/// Default port for the stats server.
pub const DEFAULT_STATS_PORT: u16 = 8080;

/// How often the server thread checks for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn header(name: &str, value: &str) -> io::Result<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .map_err(|()| io::Error::new(io::ErrorKind::InvalidInput, "invalid header"))
}

struct Headers {
    content_type: Header,
    location: Header,
    allow_get: Header,
}

/// HTTP stats server.
///
/// Runs in a background thread. Drop it to stop the server.
pub struct StatsServer {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
}

impl StatsServer {
    /// Start serving the statistics of `vrb`.
    ///
    /// `bind_addr` of `None` binds to all interfaces.
    pub fn start(bind_addr: Option<IpAddr>, port: u16, vrb: Vrb) -> io::Result<Self> {
        let addr = match bind_addr {
            Some(ip) => SocketAddr::new(ip, port),
            None => SocketAddr::from(([0, 0, 0, 0], port)),
        };

        let server = Server::http(addr)
            .map_err(|e| io::Error::new(io::ErrorKind::AddrInUse, format!("{}", e)))?;
        let local_addr = server.server_addr().to_ip();
        let headers = Headers {
            content_type: header("Content-Type", "application/json")?,
            location: header("Location", "/stats")?,
            allow_get: header("Allow", "GET")?,
        };

        info!("Stats server listening on http://{}/stats", addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let handle = thread::spawn(move || {
            Self::run_server(server, vrb, headers, shutdown_clone);
        });

        Ok(Self {
            handle: Some(handle),
            shutdown,
            local_addr,
        })
    }

    /// The address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn run_server(server: Server, vrb: Vrb, headers: Headers, shutdown: Arc<AtomicBool>) {
        let started = Instant::now();
        let capacity = vrb.capacity();

        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("Stats server shutting down");
                break;
            }

            let request = match server.recv_timeout(POLL_INTERVAL) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => {
                    error!("Server error: {}", e);
                    break;
                }
            };

            if request.method() != &Method::Get {
                let response = Response::from_string("Method Not Allowed")
                    .with_status_code(405)
                    .with_header(headers.allow_get.clone());
                if let Err(e) = request.respond(response) {
                    warn!("Failed to send 405: {}", e);
                }
                continue;
            }

            let path = request.url().to_string();
            let result = match path.as_str() {
                "/stats" | "/stats/" => {
                    let report = StatsReport::new(started, capacity, vrb.stats().snapshot());
                    match report.to_json() {
                        Ok(json) => request.respond(
                            Response::from_string(json)
                                .with_header(headers.content_type.clone())
                                .with_status_code(200),
                        ),
                        Err(e) => {
                            error!("Failed to serialize stats: {}", e);
                            request.respond(
                                Response::from_string("Internal Server Error")
                                    .with_status_code(500),
                            )
                        }
                    }
                }
                "/" => request.respond(
                    Response::from_string("See /stats for forwarding statistics")
                        .with_status_code(302)
                        .with_header(headers.location.clone()),
                ),
                _ => request.respond(Response::from_string("Not Found").with_status_code(404)),
            };
            if let Err(e) = result {
                warn!("Failed to send response: {}", e);
            }
        }
    }

    /// Stop the server.
    ///
    /// Note: May take up to 100ms due to polling interval.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatsServer {
    fn drop(&mut self) {
        self.stop();
    }
}
