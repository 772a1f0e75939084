//! HTTP frame server, started once bring-up hands the camera over.
//!
//! Uses `tiny_http`, which works on both host and ESP32 (via std::net).
//!
//! | Path                                  | Response                         |
//! |---------------------------------------|----------------------------------|
//! | `GET /status`                         | JSON status document             |
//! | `GET /capture`                        | one frame                        |
//! | `GET /control?var=framesize&val=<n>`  | change the active tier           |
//! | `GET /`                               | redirect to `/status`            |
//!
//! # Example Response
//!
//! ```json
//! {
//!   "uptime_secs": 42,
//!   "address": "192.168.1.50",
//!   "station": "connected",
//!   "connect_attempts": 3,
//!   "sensor_model": "OV2640 (PID 0x0026)",
//!   "camera": {
//!     "sensor": 38,
//!     "pixel_format": "jpeg",
//!     "allocated_tier": "UXGA",
//!     "active_tier": "QVGA",
//!     "fb_location": "external_ram",
//!     "fb_count": 2,
//!     "grab_mode": "latest",
//!     "jpeg_quality": 10,
//!     "calibrated": false
//!   }
//! }
//! ```

use crate::camera::{ActiveCamera, CameraSummary, FrameSize, FrameSource, SensorControl};
use crate::network::ConnectionState;
use log::{error, info, warn};
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tiny_http::{Header, Method, Response, Server};

/// How often the server loop checks for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors starting the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("cannot listen on {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("cannot spawn server thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Reports the station link state to `/status`.
pub type StationMonitor = Box<dyn Fn() -> (ConnectionState, u32) + Send>;

/// JSON body of `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusDocument {
    pub uptime_secs: u64,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<ConnectionState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_attempts: Option<u32>,
    pub sensor_model: String,
    pub camera: CameraSummary,
}

/// A response before it is put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain",
            headers: Vec::new(),
            body: body.into().into_bytes(),
        }
    }

    fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    fn into_response(self) -> Response<std::io::Cursor<Vec<u8>>> {
        let mut response = Response::from_data(self.body).with_status_code(self.status);
        let headers = std::iter::once(("Content-Type", self.content_type.to_string()))
            .chain(self.headers);
        for (name, value) in headers {
            match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
                Ok(header) => response.add_header(header),
                Err(()) => warn!("Dropping malformed header {}", name),
            }
        }
        response
    }
}

/// Request handling without the socket.
pub struct FrameService<H> {
    camera: ActiveCamera<H>,
    address: Ipv4Addr,
    started: Instant,
    station: Option<StationMonitor>,
}

impl<H: SensorControl + FrameSource> FrameService<H> {
    pub fn new(camera: ActiveCamera<H>, address: Ipv4Addr) -> Self {
        Self {
            camera,
            address,
            started: Instant::now(),
            station: None,
        }
    }

    /// Report the link state alongside the camera.
    pub fn with_station(mut self, monitor: StationMonitor) -> Self {
        self.station = Some(monitor);
        self
    }

    pub fn status(&self) -> StatusDocument {
        let (station, connect_attempts) = match &self.station {
            Some(monitor) => {
                let (state, attempts) = monitor();
                (Some(state), Some(attempts))
            }
            None => (None, None),
        };
        StatusDocument {
            uptime_secs: self.started.elapsed().as_secs(),
            address: self.address.to_string(),
            station,
            connect_attempts,
            sensor_model: self.camera.summary().sensor.to_string(),
            camera: *self.camera.summary(),
        }
    }

    /// Route one request.
    pub fn handle(&mut self, method: &Method, url: &str) -> Reply {
        if method != &Method::Get {
            return Reply::text(405, "Method Not Allowed").with_header("Allow", "GET");
        }

        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (url, None),
        };

        match path {
            "/status" | "/status/" => self.status_reply(),
            "/capture" => self.capture_reply(),
            "/control" => self.control_reply(query.unwrap_or("")),
            "/" => Reply::text(302, "See /status").with_header("Location", "/status"),
            _ => Reply::text(404, "Not Found"),
        }
    }

    fn status_reply(&self) -> Reply {
        match serde_json::to_vec(&self.status()) {
            Ok(body) => Reply {
                status: 200,
                content_type: "application/json",
                headers: Vec::new(),
                body,
            },
            Err(e) => {
                error!("Status serialization failed: {}", e);
                Reply::text(500, "Internal Server Error")
            }
        }
    }

    fn capture_reply(&mut self) -> Reply {
        let format = self.camera.summary().pixel_format;
        match self.camera.capture() {
            Ok(frame) => {
                let reply = Reply {
                    status: 200,
                    content_type: format.content_type(),
                    headers: Vec::new(),
                    body: frame.data,
                };
                let reply = reply
                    .with_header("X-Frame-Width", frame.width.to_string())
                    .with_header("X-Frame-Height", frame.height.to_string());
                if format.is_jpeg() {
                    reply.with_header("Content-Disposition", "inline; filename=capture.jpg")
                } else {
                    reply
                }
            }
            Err(e) => {
                error!("Camera capture failed: {}", e);
                Reply::text(500, e.to_string())
            }
        }
    }

    fn control_reply(&mut self, query: &str) -> Reply {
        let mut var = None;
        let mut val = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("var", v)) => var = Some(v),
                Some(("val", v)) => val = Some(v),
                _ => {}
            }
        }

        let (Some(var), Some(val)) = (var, val) else {
            return Reply::text(400, "expected var and val");
        };
        if var != "framesize" {
            return Reply::text(400, format!("unknown control: {}", var));
        }
        let Some(tier) = val.parse::<usize>().ok().and_then(FrameSize::from_index) else {
            return Reply::text(400, format!("unknown frame size index: {}", val));
        };

        match self.camera.set_active_tier(tier) {
            Ok(()) => Reply::text(200, "OK"),
            Err(e) => {
                warn!("Rejected frame size change: {}", e);
                Reply::text(400, e.to_string())
            }
        }
    }
}

/// HTTP server running a [`FrameService`] on a background thread.
pub struct FrameServer {
    local_addr: Option<SocketAddr>,
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl FrameServer {
    /// Start the server.
    ///
    /// # Arguments
    ///
    /// * `bind_addr` - IP address to bind to (use `None` for 0.0.0.0)
    /// * `port` - Port to listen on, 0 for any free port
    /// * `service` - Request handler; moved to the server thread
    pub fn start<H>(
        bind_addr: Option<IpAddr>,
        port: u16,
        service: FrameService<H>,
    ) -> Result<Self, ServerError>
    where
        H: SensorControl + FrameSource + Send + 'static,
    {
        let addr = match bind_addr {
            Some(ip) => format!("{}:{}", ip, port),
            None => format!("0.0.0.0:{}", port),
        };

        let server = Server::http(&addr).map_err(|e| ServerError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;
        let local_addr = server.server_addr().to_ip();

        info!("Frame server listening on http://{}/", addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let handle = thread::Builder::new()
            .name("frame-server".into())
            .spawn(move || Self::run_server(server, service, shutdown_clone))?;

        Ok(Self {
            local_addr,
            handle: Some(handle),
            shutdown,
        })
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn run_server<H: SensorControl + FrameSource>(
        server: Server,
        mut service: FrameService<H>,
        shutdown: Arc<AtomicBool>,
    ) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("Frame server shutting down");
                break;
            }

            match server.recv_timeout(POLL_INTERVAL) {
                Ok(Some(request)) => {
                    let reply = service.handle(request.method(), request.url());
                    let status = reply.status;
                    if let Err(e) = request.respond(reply.into_response()) {
                        warn!("Failed to send {} response: {}", status, e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Server error: {}", e);
                    break;
                }
            }
        }
    }

    /// Stop the server. May take up to one poll interval.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FrameServer {
    fn drop(&mut self) {
        self.stop();
    }
}
