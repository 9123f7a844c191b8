// ABOUTME: Server module for presenting slides over HTTP
// ABOUTME: Renders the deck per request, serves its assets and pushes reloads over WebSocket

use log::{debug, error, info, warn};
use std::fs;
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use tiny_http::{Header, Request, Response, Server};
use tungstenite::Message;

use crate::errors::{RevelationError, Result};
use crate::presentation::Presentation;
use crate::resources::{self, Settings};
use crate::utils;
use crate::watch::{Channel, WatchSession};

/// Idle time after which a viewer socket is pinged to detect hang-ups
const KEEPALIVE: Duration = Duration::from_secs(30);

/// Status, content type and body of a response
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn not_found() -> Self {
        Self {
            status: 404,
            content_type: "text/plain; charset=utf-8",
            body: b"404 Not Found".to_vec(),
        }
    }

    fn error(message: String) -> Self {
        Self {
            status: 500,
            content_type: "text/plain; charset=utf-8",
            body: message.into_bytes(),
        }
    }
}

/// Serves one presentation. In live mode it owns the watch session that
/// drives the viewers' reloads.
pub struct PresentationServer {
    presentation: Presentation,
    settings: Settings,
    port: u16,
    session: Option<Arc<WatchSession>>,
}

impl PresentationServer {
    /// Prepare a server. With `live`, the deck's directory is watched and
    /// viewers reload through a WebSocket on `port + 1`.
    pub fn new(
        presentation: Presentation,
        settings: Settings,
        port: u16,
        live: bool,
    ) -> Result<Self> {
        if live && port == u16::MAX {
            return Err(RevelationError::Server(format!(
                "Port {} leaves no room for the reload socket on the next port",
                port
            )));
        }

        let session = if live {
            Some(Arc::new(WatchSession::watch(presentation.root())?))
        } else {
            None
        };

        Ok(Self {
            presentation,
            settings,
            port,
            session,
        })
    }

    pub fn session(&self) -> Option<&Arc<WatchSession>> {
        self.session.as_ref()
    }

    pub fn reload_port(&self) -> Option<u16> {
        self.session.as_ref().and_then(|_| self.port.checked_add(1))
    }

    /// Serve until the process is stopped
    pub fn run(&self) -> Result<()> {
        let server = Server::http(("127.0.0.1", self.port))
            .map_err(|e| RevelationError::Server(format!("Failed to start HTTP server: {}", e)))?;

        if let (Some(session), Some(port)) = (&self.session, self.reload_port()) {
            start_reload_listener(Arc::clone(session), port)?;
        }

        info!("HTTP server listening on http://localhost:{}", self.port);
        println!("Presentation running on http://localhost:{}", self.port);

        for request in server.incoming_requests() {
            self.respond(request);
        }

        Ok(())
    }

    fn respond(&self, request: Request) {
        let reply = self.reply(request.url());
        debug!("{} {} -> {}", request.method(), request.url(), reply.status);

        let mut response = Response::from_data(reply.body).with_status_code(reply.status);
        if let Ok(header) = Header::from_bytes("Content-Type", reply.content_type) {
            response = response.with_header(header);
        }
        if let Err(e) = request.respond(response) {
            error!("Failed to send response: {}", e);
        }
    }

    /// Build the reply for a request URL
    pub fn reply(&self, url: &str) -> Reply {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let decoded = match percent_decode_str(path).decode_utf8() {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => return Reply::not_found(),
        };
        let trimmed = decoded.trim_matches('/');

        if trimmed.is_empty() || trimmed == "index.html" {
            return match self.presentation.render(&self.settings, self.reload_port()) {
                Ok(page) => Reply {
                    status: 200,
                    content_type: "text/html; charset=utf-8",
                    body: page.into_bytes(),
                },
                Err(e) => {
                    error!("Failed to render presentation: {}", e);
                    Reply::error(format!("Failed to render presentation: {}", e))
                }
            };
        }

        let (head, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));
        let mounted = [&self.presentation.media, &self.presentation.theme]
            .into_iter()
            .filter_map(|dir| dir.as_deref())
            .find(|dir| mount_name(dir) == head);

        let file = if head == "static" {
            resolve_under(&self.settings.static_root, rest)
        } else if let Some(root) = mounted {
            resolve_under(root, rest)
        } else if rest.is_empty() && self.presentation.style_name().as_deref() == Some(head) {
            self.presentation.style.clone()
        } else {
            None
        };

        match file {
            Some(file) => read_file(&file),
            None => Reply::not_found(),
        }
    }
}

/// URL prefix a shared directory is served under: its own name, so decks
/// reference `assets/pic.png` for `-m assets`
fn mount_name(dir: &Path) -> String {
    let name = utils::file_name(dir);
    if !name.is_empty() {
        return name;
    }
    dir.canonicalize()
        .map(|dir| utils::file_name(&dir))
        .unwrap_or_default()
}

/// Map `relative` onto a file inside `root`. Anything that resolves
/// outside `root` is refused.
fn resolve_under(root: &Path, relative: &str) -> Option<PathBuf> {
    if relative.split(['/', '\\']).any(|part| part == "..") {
        return None;
    }

    let canonical = root.join(relative).canonicalize().ok()?;
    let root = root.canonicalize().ok()?;

    if canonical.starts_with(&root) && canonical.is_file() {
        Some(canonical)
    } else {
        None
    }
}

fn read_file(path: &Path) -> Reply {
    match fs::read(path) {
        Ok(body) => Reply {
            status: 200,
            content_type: resources::content_type(path),
            body,
        },
        Err(e) => {
            error!("Failed to read file {:?}: {}", path, e);
            Reply::error(format!("Failed to read file: {}", e))
        }
    }
}

/// Accept viewer sockets on `port`, one thread and one channel per viewer
fn start_reload_listener(session: Arc<WatchSession>, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port)).map_err(|e| {
        RevelationError::Server(format!("Failed to bind reload socket on {}: {}", port, e))
    })?;
    info!("Live reload listening on ws://localhost:{}", port);

    thread::Builder::new()
        .name("revelation-reload-accept".to_string())
        .spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        let channel = session.subscribe();
                        thread::spawn(move || serve_viewer(stream, channel));
                    }
                    Err(e) => warn!("Reload socket accept error: {}", e),
                }
            }
        })?;

    Ok(())
}

/// Forward reloads to one viewer until it or the session goes away.
/// The channel closes when this returns.
fn serve_viewer(stream: TcpStream, channel: Channel) {
    let mut socket = match tungstenite::accept(stream) {
        Ok(socket) => socket,
        Err(e) => {
            warn!("WebSocket handshake failed: {}", e);
            return;
        }
    };
    debug!("Viewer connected on channel {}", channel.id());

    loop {
        let outgoing = match channel.recv_timeout(KEEPALIVE) {
            Ok(message) => Message::Text(message.to_json()),
            Err(RecvTimeoutError::Timeout) => Message::Ping(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if let Err(e) = socket.send(outgoing) {
            debug!("Viewer on channel {} went away: {}", channel.id(), e);
            break;
        }
    }

    if let Err(e) = socket.close(None) {
        debug!("Closing viewer socket on channel {} failed: {}", channel.id(), e);
    }
}
