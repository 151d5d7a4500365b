//! Single-threaded HTTP front end.
//!
//! Endpoints:
//!   GET /                    - 302 to the dump `catalog::newest` picks, with `?index`
//!   GET /STOP                - 200 "Stopping", then shut down
//!   GET /test.date.type?k=v  - rendered page
//!   anything else            - 400 "Invalid URL"
//!
//! One connection is served to completion before the next is accepted.

use std::io::{BufRead, BufReader, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;

use crate::catalog;
use crate::config::Config;
use crate::dump::DumpId;
use crate::logging::{log, log_request, obj, v_str, Domain, Level};
use crate::page::render_page;
use crate::viewer::{Params, ViewerRegistry};

// =============================================================================
// Requests and routing
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Path plus optional query, as sent.
    pub target: String,
    pub host: Option<String>,
}

impl Request {
    pub fn get(target: &str) -> Self {
        Self {
            method: "GET".to_string(),
            target: target.to_string(),
            host: None,
        }
    }

    pub fn path(&self) -> &str {
        split_target(&self.target).0
    }

    pub fn params(&self) -> Params {
        parse_query(split_target(&self.target).1)
    }

    pub fn route(&self) -> Route {
        if self.method != "GET" {
            return Route::Unsupported;
        }
        Route::parse(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Index,
    Stop,
    Dump(DumpId),
    Invalid,
    Unsupported,
}

impl Route {
    pub fn parse(path: &str) -> Self {
        match path {
            "/" => Route::Index,
            "/STOP" => Route::Stop,
            _ => path
                .strip_prefix('/')
                .filter(|name| !name.contains('/'))
                .and_then(|name| DumpId::parse(name).ok())
                .map(Route::Dump)
                .unwrap_or(Route::Invalid),
        }
    }
}

/// `(path, query)`; the query is empty when there is no `?`.
pub fn split_target(target: &str) -> (&str, &str) {
    target.split_once('?').unwrap_or((target, ""))
}

/// `&`-separated `key=value` pairs, split on the first `=`. Pairs without
/// `=` are dropped; a repeated key keeps its last value.
pub fn parse_query(query: &str) -> Params {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Reads the request line and headers. `None` if the peer sent nothing.
fn read_request(reader: &mut impl BufRead) -> Result<Option<Request>> {
    let mut line = String::new();
    if reader.read_line(&mut line).context("cannot read request line")? == 0 {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut host = None;
    loop {
        line.clear();
        if reader.read_line(&mut line).context("cannot read header")? == 0 {
            break;
        }
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("host") {
                host = Some(value.trim().to_string());
            }
        }
    }
    Ok(Some(Request {
        method,
        target,
        host,
    }))
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub location: Option<String>,
    pub body: String,
}

impl Response {
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            location: None,
            body: body.to_string(),
        }
    }

    pub fn html(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            location: None,
            body,
        }
    }

    pub fn redirect(location: String) -> Self {
        Self {
            location: Some(location),
            ..Self::text(302, "")
        }
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            302 => "Found",
            400 => "Bad Request",
            404 => "Not Found",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            _ => "",
        }
    }

    pub fn write_to(&self, w: &mut impl Write) -> std::io::Result<()> {
        write!(w, "HTTP/1.1 {} {}\r\n", self.status, self.reason())?;
        write!(
            w,
            "Date: {}\r\n",
            Utc::now().format("%a, %d %b %Y %H:%M:%S GMT")
        )?;
        write!(w, "Content-Type: {}\r\n", self.content_type)?;
        write!(w, "Content-Length: {}\r\n", self.body.len())?;
        if let Some(location) = &self.location {
            write!(w, "Location: {}\r\n", location)?;
        }
        write!(w, "Connection: close\r\n\r\n")?;
        w.write_all(self.body.as_bytes())?;
        w.flush()
    }
}

// =============================================================================
// Server
// =============================================================================

/// Stops a running [`DumpServer`] from any thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    stopping: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ShutdownHandle {
    /// Flags the accept loop and wakes it with an empty connection.
    pub fn shutdown(&self) {
        if !self.stopping.swap(true, Ordering::SeqCst) {
            let _ = TcpStream::connect(self.addr);
        }
    }
}

pub struct DumpServer {
    config: Config,
    viewers: ViewerRegistry,
    listener: TcpListener,
    local_addr: SocketAddr,
    stopping: Arc<AtomicBool>,
}

impl DumpServer {
    /// Bind and discover viewers from the configured directory.
    pub fn bind(config: Config) -> Result<Self> {
        let viewers = ViewerRegistry::discover(&config.viewers_path())?;
        Self::with_viewers(config, viewers)
    }

    pub fn with_viewers(config: Config, viewers: ViewerRegistry) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr())
            .with_context(|| format!("cannot bind {}", config.bind_addr()))?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            config,
            viewers,
            listener,
            local_addr,
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        let mut addr = self.local_addr;
        if addr.ip().is_unspecified() {
            addr.set_ip(match addr.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            });
        }
        ShutdownHandle {
            stopping: Arc::clone(&self.stopping),
            addr,
        }
    }

    /// Serve until shut down.
    pub fn run(self) -> Result<()> {
        log(
            Level::Info,
            Domain::System,
            "server_started",
            obj(&[
                ("addr", v_str(&self.local_addr.to_string())),
                ("config", serde_json::to_value(&self.config).unwrap_or_default()),
                ("viewers", json!(self.viewers.len())),
            ]),
        );

        for stream in self.listener.incoming() {
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => {
                    if let Err(err) = self.serve_connection(stream) {
                        log(
                            Level::Warn,
                            Domain::Http,
                            "connection_failed",
                            obj(&[("error", v_str(&format!("{:#}", err)))]),
                        );
                    }
                }
                Err(err) => log(
                    Level::Warn,
                    Domain::Http,
                    "accept_failed",
                    obj(&[("error", v_str(&err.to_string()))]),
                ),
            }
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
        }

        log(Level::Info, Domain::System, "server_stopped", obj(&[]));
        Ok(())
    }

    fn serve_connection(&self, stream: TcpStream) -> Result<()> {
        let mut reader = BufReader::new(&stream);
        let Some(request) = read_request(&mut reader)? else {
            return Ok(());
        };

        let route = request.route();
        let response = self.respond(&request, &route);
        log_request(&request.method, &request.target, response.status);
        let mut writer = &stream;
        response.write_to(&mut writer).context("cannot write response")?;

        if route == Route::Stop {
            // Shutdown runs off this thread so the reply above is never held up.
            let handle = self.shutdown_handle();
            std::thread::spawn(move || handle.shutdown());
        }
        Ok(())
    }

    pub fn respond(&self, request: &Request, route: &Route) -> Response {
        match route {
            Route::Index => self.redirect_to_newest(request),
            Route::Stop => Response::text(200, "Stopping"),
            Route::Dump(dump) => {
                let fragments =
                    render_page(&self.config.root_dir, &self.viewers, dump, &request.params());
                Response::html(fragments.concat())
            }
            Route::Invalid => Response::text(400, "Invalid URL"),
            Route::Unsupported => Response::text(501, "Unsupported method"),
        }
    }

    fn redirect_to_newest(&self, request: &Request) -> Response {
        match catalog::newest(&self.config.root_dir) {
            Ok(Some(dump)) => {
                let host = request
                    .host
                    .clone()
                    .unwrap_or_else(|| format!("{}:{}", self.config.host, self.local_addr.port()));
                Response::redirect(format!("http://{}/{}?index", host, dump.file_name()))
            }
            Ok(None) => Response::text(404, "No dumps found"),
            Err(err) => {
                log(
                    Level::Error,
                    Domain::Http,
                    "catalog_failed",
                    obj(&[("error", v_str(&format!("{:#}", err)))]),
                );
                Response::text(500, "Cannot list dumps")
            }
        }
    }
}
