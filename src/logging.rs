//! Structured logging for the dump browser.
//!
//! Every record is a single JSON line printed to the operator console, and
//! optionally appended to the file named by `LOG_FILE`. Filtering:
//! 1. `LOG_LEVEL` sets the minimum level (default `info`)
//! 2. `LOG_DOMAINS` is `all` or a comma-separated list of domains

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Catalog, // Directory scans, malformed names
    Viewer,  // Viewer discovery and invocation
    Page,    // Page assembly, crashes
    Http,    // Requests and responses
    System,  // Startup, shutdown
    Profile, // Timing scopes
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Catalog => "catalog",
            Domain::Viewer => "viewer",
            Domain::Page => "page",
            Domain::Http => "http",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Sequence counter and optional log file
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static LOG_FILE: OnceLock<Option<Mutex<BufWriter<File>>>> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

fn log_file() -> Option<&'static Mutex<BufWriter<File>>> {
    LOG_FILE
        .get_or_init(|| {
            let path = std::env::var("LOG_FILE").ok()?;
            match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => Some(Mutex::new(BufWriter::new(file))),
                Err(err) => {
                    eprintln!("[log] failed to open {}: {}", path, err);
                    None
                }
            }
        })
        .as_ref()
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["dump", "path", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    println!("{}", format_record(level, domain, event, fields));
}

pub(crate) fn format_record(
    level: Level,
    domain: Domain,
    event: &str,
    fields: Map<String, Value>,
) -> String {
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    if let Some(file) = log_file() {
        if let Ok(mut w) = file.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
    line
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub const INVALID_DUMP_NAME: &str = "invalid_dump_name";

pub(crate) fn skipped_dump_fields(name: &str, reason: &str) -> Map<String, Value> {
    obj(&[
        ("dump", v_str(name)),
        ("reason", v_str(reason)),
        ("msg", v_str("expected \"test.date.type\"")),
    ])
}

pub fn log_skipped_dump(name: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Catalog,
        INVALID_DUMP_NAME,
        skipped_dump_fields(name, reason),
    );
}

pub fn log_unreadable_entry(dir: &str, err: &std::io::Error) {
    log(
        Level::Warn,
        Domain::Catalog,
        "unreadable_entry",
        obj(&[("path", v_str(dir)), ("error", v_str(&err.to_string()))]),
    );
}

pub fn log_viewer_skipped(program: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Viewer,
        "viewer_skipped",
        obj(&[("path", v_str(program)), ("reason", v_str(reason))]),
    );
}

pub fn log_viewer_found(kind: &str, program: &str) {
    log(
        Level::Info,
        Domain::Viewer,
        "viewer_registered",
        obj(&[("type", v_str(kind)), ("program", v_str(program))]),
    );
}

/// Full error chain goes to the console; the page only shows the summary.
pub fn log_crash(dump: &str, err: &anyhow::Error) {
    log(
        Level::Error,
        Domain::Page,
        "render_crashed",
        obj(&[
            ("dump", v_str(dump)),
            ("error", v_str(&format!("{:#}", err))),
            ("detail", v_str(&format!("{:?}", err))),
        ]),
    );
}

pub fn log_request(method: &str, path: &str, status: u16) {
    log(
        Level::Debug,
        Domain::Http,
        "request",
        obj(&[
            ("method", v_str(method)),
            ("path", v_str(path)),
            ("status", json!(status)),
        ]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Profiling scope that emits structured timing on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Map<String, Value>,
    started: Instant,
}

impl ProfileScope {
    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        Self {
            label,
            context: obj(fields),
            started: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = std::mem::take(&mut self.context);
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

// =============================================================================
// Tests
// =============================================================================
