//! Browser front end for the interactive path.
//!
//! A small blocking HTTP/1.1 server: one background thread accepts
//! connections and handles them one at a time, so uploads are processed
//! strictly sequentially.
//!
//! Routes:
//! - `GET /`: upload page
//! - `GET /health`: `{"status":"ok"}`
//! - `POST /analyze?filename=<name>`: raw image body, returns the results
//!   fragment rendered by [`page::results_fragment`]. The name may also be
//!   given in an `X-Filename` header.

pub mod page;

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::acquire::{decode_image, is_supported_image, resize_to_working};
use crate::config::UiSettings;
use crate::inference::InferenceClient;
use crate::pipeline::RoiPipeline;

const MAX_HEADER_BYTES: usize = 16 * 1024;
const HEADER_TIMEOUT: Duration = Duration::from_secs(5);
const BODY_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on bytes swallowed after a rejected request.
const DRAIN_LIMIT: usize = 64 * 1024 * 1024;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub struct UiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl UiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join().map_err(|_| anyhow!("ui server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct UiServer {
    settings: UiSettings,
    client: Arc<dyn InferenceClient>,
}

impl UiServer {
    pub fn new(settings: UiSettings, client: Arc<dyn InferenceClient>) -> Self {
        Self { settings, client }
    }

    pub fn spawn(self) -> Result<UiHandle> {
        let configured_addr: SocketAddr = self
            .settings
            .addr
            .parse()
            .map_err(|e| anyhow!("invalid ui address '{}': {}", self.settings.addr, e))?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::spawn(move || {
            let client = self.client.as_ref();
            if let Err(err) = run_ui(listener, &self.settings, client, shutdown_thread) {
                log::error!("ui server stopped: {}", err);
            }
        });

        Ok(UiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_ui(
    listener: TcpListener,
    settings: &UiSettings,
    client: &dyn InferenceClient,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(err) = handle_connection(stream, settings, client) {
                    log::warn!("ui request from {} failed: {}", peer, err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(
    mut stream: TcpStream,
    settings: &UiSettings,
    client: &dyn InferenceClient,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    let request = match read_request(&mut stream, settings.max_upload_bytes)? {
        Ok(request) => request,
        Err(rejection) => {
            write_response(
                &mut stream,
                rejection.status,
                "text/plain; charset=utf-8",
                rejection.message.as_bytes(),
            )?;
            discard_unread_body(&mut stream);
            return Ok(());
        }
    };

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/") => {
            let body = page::upload_page(settings);
            write_response(&mut stream, 200, "text/html; charset=utf-8", body.as_bytes())
        }
        ("GET", "/health") => {
            write_response(&mut stream, 200, "application/json", br#"{"status":"ok"}"#)
        }
        ("POST", "/analyze") => {
            let (status, body) = analyze(&request, settings, client);
            write_response(&mut stream, status, "text/html; charset=utf-8", body.as_bytes())
        }
        (_, "/") | (_, "/health") | (_, "/analyze") => {
            write_response(&mut stream, 405, "text/plain; charset=utf-8", b"method not allowed")
        }
        _ => write_response(&mut stream, 404, "text/plain; charset=utf-8", b"not found"),
    }
}

/// Run the full interactive pipeline on one upload.
fn analyze(
    request: &HttpRequest,
    settings: &UiSettings,
    client: &dyn InferenceClient,
) -> (u16, String) {
    let file_name = request
        .query
        .get("filename")
        .or_else(|| request.headers.get("x-filename"))
        .cloned()
        .unwrap_or_default();
    if !is_supported_image(Path::new(&file_name)) {
        return (
            415,
            page::error_fragment("Unsupported file type; upload a .jpg, .jpeg or .png image."),
        );
    }
    if request.body.is_empty() {
        return (400, page::error_fragment("The uploaded file is empty."));
    }

    let original = match decode_image(&request.body) {
        Ok(image) => image,
        Err(err) => {
            log::warn!("upload {} could not be decoded: {:#}", file_name, err);
            return (400, page::error_fragment(&format!("Could not read image: {err:#}")));
        }
    };
    let working = resize_to_working(&original, settings.working_size);
    log::info!(
        "analyzing upload {} ({}x{} -> {}x{})",
        file_name,
        original.width(),
        original.height(),
        working.width(),
        working.height()
    );

    let report = RoiPipeline::new(client).run(&working);
    match page::results_fragment(&file_name, &working, &report) {
        Ok(html) => (200, html),
        Err(err) => {
            log::error!("failed to render results for {}: {:#}", file_name, err);
            (500, page::error_fragment("Failed to render results."))
        }
    }
}

struct Rejection {
    status: u16,
    message: String,
}

impl Rejection {
    fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    query: HashMap<String, String>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

/// Read one request. The outer error is an I/O failure; the inner one is a
/// request we answer with an error status.
fn read_request(
    stream: &mut TcpStream,
    max_body_bytes: usize,
) -> Result<std::result::Result<HttpRequest, Rejection>> {
    stream.set_read_timeout(Some(HEADER_TIMEOUT))?;
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    let header_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        if data.len() > MAX_HEADER_BYTES {
            return Ok(Err(Rejection::new(431, "request headers too large")));
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed before end of headers"));
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Ok(Err(Rejection::new(400, "malformed request line")));
    };
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length = match headers.get("content-length") {
        Some(value) => match value.parse::<usize>() {
            Ok(len) => len,
            Err(_) => return Ok(Err(Rejection::new(400, "invalid content-length"))),
        },
        None => 0,
    };
    if content_length > max_body_bytes {
        return Ok(Err(Rejection::new(
            413,
            format!("upload exceeds {} bytes", max_body_bytes),
        )));
    }

    let mut body = data.split_off(header_end + 4);
    body.truncate(content_length);
    if body.len() < content_length {
        stream.set_read_timeout(Some(BODY_TIMEOUT))?;
        let mut rest = vec![0u8; content_length - body.len()];
        stream.read_exact(&mut rest)?;
        body.extend_from_slice(&rest);
    }

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };
    let query = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    Ok(Ok(HttpRequest {
        method: method.to_string(),
        path: path.to_string(),
        query,
        headers,
        body,
    }))
}

/// Close our side and read whatever the client is still sending, so that an
/// upload in progress completes and the client gets to read the rejection
/// instead of a reset connection.
fn discard_unread_body(stream: &mut TcpStream) {
    if stream.shutdown(Shutdown::Write).is_err() {
        return;
    }
    if stream.set_read_timeout(Some(DRAIN_TIMEOUT)).is_err() {
        return;
    }
    let mut buf = [0u8; 64 * 1024];
    let mut drained = 0;
    while drained < DRAIN_LIMIT {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => drained += n,
        }
    }
    log::debug!("discarded {} bytes after rejected request", drained);
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        413 => "HTTP/1.1 413 Payload Too Large",
        415 => "HTTP/1.1 415 Unsupported Media Type",
        431 => "HTTP/1.1 431 Request Header Fields Too Large",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}
