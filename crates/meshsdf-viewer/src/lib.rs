#![warn(missing_docs)]

//! Browser viewer for meshsdf scenes.
//!
//! [`Viewer::start`] binds a local HTTP server on a background thread and
//! serves a three.js page that draws every object in the scene, polls for
//! transform updates and shows clickable buttons. The handle mutates the
//! shared scene; the page picks changes up on its next poll.
//!
//! | endpoint | |
//! |---|---|
//! | `GET /` | the page |
//! | `GET /scene` | full [`SceneSnapshot`] as JSON |
//! | `GET /state` | [`StateSnapshot`]: time, transforms and buttons |
//! | `POST /buttons/<name>` | count one press, 404 if unknown |

mod config;
mod error;
mod http;
mod scene;

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use meshsdf_mesh::TriangleMesh;
use nalgebra::Isometry3;
use tracing::{debug, info, warn};

pub use config::ViewerConfig;
pub use error::{Result, ViewerError};
pub use scene::{ButtonState, ObjectSnapshot, Rgba, SceneSnapshot, StateSnapshot};

use http::{percent_decode, read_request, write_response, Request, Response};
use scene::SceneState;

const INDEX_HTML: &str = include_str!("../static/index.html");
/// How long the server thread sleeps when no client is waiting.
const ACCEPT_POLL: Duration = Duration::from_millis(20);
/// Per-connection read timeout.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Handle to a running viewer. Dropping it stops the server.
pub struct Viewer {
    addr: SocketAddr,
    scene: Arc<Mutex<SceneState>>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

fn lock(scene: &Mutex<SceneState>) -> MutexGuard<'_, SceneState> {
    scene.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn bind(config: &ViewerConfig) -> Result<TcpListener> {
    if config.port == 0 {
        return TcpListener::bind((config.host.as_str(), 0)).map_err(|source| ViewerError::Bind {
            host: config.host.clone(),
            first_port: 0,
            last_port: 1,
            source,
        });
    }
    let first = u32::from(config.port);
    let last = (first + u32::from(config.port_attempts.max(1))).min(u32::from(u16::MAX) + 1);
    let mut last_error = None;
    for port in first..last {
        // `last` is capped at 65536, so every port fits.
        let port = port as u16;
        match TcpListener::bind((config.host.as_str(), port)) {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                debug!(port, "viewer port unavailable: {e}");
                last_error = Some(e);
            }
        }
    }
    Err(ViewerError::Bind {
        host: config.host.clone(),
        first_port: config.port,
        last_port: last,
        source: last_error.unwrap_or_else(|| ErrorKind::AddrInUse.into()),
    })
}

impl Viewer {
    /// Bind the first free port in the configured range and start serving.
    pub fn start(config: &ViewerConfig) -> Result<Self> {
        let listener = bind(config)?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let scene = Arc::new(Mutex::new(SceneState::default()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread = {
            let scene = Arc::clone(&scene);
            let shutdown = Arc::clone(&shutdown);
            std::thread::Builder::new()
                .name("meshsdf-viewer".into())
                .spawn(move || serve(listener, &scene, &shutdown))?
        };

        info!(%addr, "viewer listening");
        Ok(Self {
            addr,
            scene,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL to open in a browser.
    pub fn web_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Add or replace the object at `path`.
    pub fn set_object(&self, path: &str, mesh: &TriangleMesh, rgba: Rgba) {
        lock(&self.scene).set_object(path, mesh, rgba);
    }

    /// Set the transform of `path` relative to its parent.
    pub fn set_transform(&self, path: &str, transform: &Isometry3<f32>) {
        lock(&self.scene).set_transform(path, transform);
    }

    /// Remove `path` and everything below it.
    pub fn delete(&self, path: &str) {
        lock(&self.scene).delete(path);
    }

    /// Show the simulated time in the page.
    pub fn set_time(&self, time: f64) {
        lock(&self.scene).set_time(time);
    }

    /// Add a button, or reset its count if it already exists.
    pub fn add_button(&self, name: &str) {
        lock(&self.scene).add_button(name);
    }

    /// Presses of `name` since it was added; 0 for unknown buttons.
    pub fn button_clicks(&self, name: &str) -> u32 {
        lock(&self.scene).button_clicks(name)
    }

    /// Remove a button.
    pub fn delete_button(&self, name: &str) {
        lock(&self.scene).delete_button(name);
    }

    /// Current scene, as served at `/scene`.
    pub fn snapshot(&self) -> SceneSnapshot {
        lock(&self.scene).scene()
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("viewer thread panicked");
            }
        }
    }
}

fn serve(listener: TcpListener, scene: &Mutex<SceneState>, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = handle_connection(&stream, scene) {
                    debug!(%peer, "viewer connection error: {e}");
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => std::thread::sleep(ACCEPT_POLL),
            Err(e) => {
                warn!("viewer accept failed: {e}");
                std::thread::sleep(ACCEPT_POLL);
            }
        }
    }
    debug!("viewer stopped");
}

fn handle_connection(stream: &TcpStream, scene: &Mutex<SceneState>) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    let Some(request) = read_request(stream)? else {
        return Ok(());
    };
    let response = route(&request, scene);
    debug!(method = %request.method, path = %request.path, status = response.status, "viewer request");
    write_response(stream, &response)
}

fn route(request: &Request, scene: &Mutex<SceneState>) -> Response {
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/") | ("GET", "/index.html") => {
            Response::ok("text/html; charset=utf-8", INDEX_HTML)
        }
        ("GET", "/scene") => encode(&lock(scene).scene()),
        ("GET", "/state") => encode(&lock(scene).state()),
        ("POST", path) if path.starts_with("/buttons/") => {
            let name = percent_decode(&path["/buttons/".len()..]);
            if lock(scene).click(&name) {
                debug!(button = %name, "button pressed");
                Response::ok("text/plain; charset=utf-8", "OK")
            } else {
                Response::status(404)
            }
        }
        (_, "/") | (_, "/scene") | (_, "/state") => Response::status(405),
        _ => Response::status(404),
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => Response::json(body),
        Err(e) => {
            warn!("failed to encode viewer response: {e}");
            Response::status(500)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn start() -> Viewer {
        Viewer::start(&ViewerConfig {
            port: 0,
            ..Default::default()
        })
        .unwrap()
    }

    fn request(viewer: &Viewer, method: &str, path: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(viewer.local_addr()).unwrap();
        write!(
            stream,
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        )
        .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).unwrap();
        let status = raw[9..12].parse().unwrap();
        let body = raw.split_once("\r\n\r\n").map(|(_, b)| b.to_string()).unwrap_or_default();
        (status, body)
    }

    fn triangle() -> TriangleMesh {
        TriangleMesh {
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 1, 2],
            normals: vec![],
        }
    }

    #[test]
    fn test_serves_page() {
        let viewer = start();
        let (status, body) = request(&viewer, "GET", "/");
        assert_eq!(status, 200);
        assert!(body.contains("<html"));
        assert!(viewer.web_url().starts_with("http://127.0.0.1:"));
    }

    #[test]
    fn test_scene_reflects_objects() {
        let viewer = start();
        viewer.set_object("collision/mug/piece", &triangle(), Rgba::new(0.8, 0.5, 0.2, 0.3));
        let (status, body) = request(&viewer, "GET", "/scene");
        assert_eq!(status, 200);
        let scene: SceneSnapshot = serde_json::from_str(&body).unwrap();
        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.objects[0].path, "collision/mug/piece");
        assert_eq!(scene.objects[0].indices, [0, 1, 2]);
        assert_eq!(scene.objects[0].rgba, [0.8, 0.5, 0.2, 0.3]);
    }

    #[test]
    fn test_button_presses_over_http() {
        let viewer = start();
        viewer.add_button("Stop Simulation");
        assert_eq!(viewer.button_clicks("Stop Simulation"), 0);

        let (status, _) = request(&viewer, "POST", "/buttons/Stop%20Simulation");
        assert_eq!(status, 200);
        assert_eq!(viewer.button_clicks("Stop Simulation"), 1);

        let (status, body) = request(&viewer, "GET", "/state");
        assert_eq!(status, 200);
        let state: StateSnapshot = serde_json::from_str(&body).unwrap();
        assert_eq!(state.buttons[0].clicks, 1);

        let (status, _) = request(&viewer, "POST", "/buttons/Nope");
        assert_eq!(status, 404);

        viewer.delete_button("Stop Simulation");
        let (status, _) = request(&viewer, "POST", "/buttons/Stop%20Simulation");
        assert_eq!(status, 404);
    }

    #[test]
    fn test_unknown_routes() {
        let viewer = start();
        assert_eq!(request(&viewer, "GET", "/missing").0, 404);
        assert_eq!(request(&viewer, "DELETE", "/scene").0, 405);
    }

    #[test]
    fn test_port_range_skips_taken_port() {
        let first = start();
        let taken = first.local_addr().port();
        let second = Viewer::start(&ViewerConfig {
            port: taken,
            port_attempts: 5,
            ..Default::default()
        })
        .unwrap();
        assert_ne!(second.local_addr().port(), taken);
    }

    #[test]
    fn test_stops_on_drop() {
        let viewer = start();
        let addr = viewer.local_addr();
        drop(viewer);
        // Listener is closed once the thread has joined.
        assert!(TcpStream::connect(addr).is_err());
    }
}
