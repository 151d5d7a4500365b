use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid port {0:?}")]
    InvalidPort(String),
    #[error("unknown argument {0:?}")]
    UnknownArgument(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Directory holding the dump files.
    pub root_dir: PathBuf,
    /// Directory of viewer programs. Relative paths resolve against `root_dir`.
    pub viewers_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            root_dir: PathBuf::from("."),
            viewers_dir: PathBuf::from("viewers"),
        }
    }
}

/// What `main` should do with the command line.
#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    Serve(Config),
    Help,
}

pub const USAGE: &str = "\
Usage: dumpbrowser [options]

Serves test dumps named test.date.type from a directory.

Options:
  --host=<host>      Address to bind (env DUMP_HOST, default localhost)
  --port=<port>      Port to bind (env DUMP_PORT, default 8000)
  --dir=<path>       Dump directory (env DUMP_DIR, default .)
  --viewers=<path>   Viewer programs (env DUMP_VIEWERS, default viewers)
  --help             Show this message";

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: std::env::var("DUMP_HOST").unwrap_or(defaults.host),
            port: match std::env::var("DUMP_PORT") {
                Ok(v) => parse_port(&v)?,
                Err(_) => defaults.port,
            },
            root_dir: std::env::var("DUMP_DIR").map(PathBuf::from).unwrap_or(defaults.root_dir),
            viewers_dir: std::env::var("DUMP_VIEWERS")
                .map(PathBuf::from)
                .unwrap_or(defaults.viewers_dir),
        })
    }

    /// Apply `--key=value` flags on top of `self`. `args` excludes the program name.
    pub fn with_args<I, S>(mut self, args: I) -> Result<Invocation, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            let arg = arg.as_ref();
            if let Some(v) = arg.strip_prefix("--host=") {
                self.host = v.to_string();
            } else if let Some(v) = arg.strip_prefix("--port=") {
                self.port = parse_port(v)?;
            } else if let Some(v) = arg.strip_prefix("--dir=") {
                self.root_dir = PathBuf::from(v);
            } else if let Some(v) = arg.strip_prefix("--viewers=") {
                self.viewers_dir = PathBuf::from(v);
            } else if arg == "--help" || arg == "-h" {
                return Ok(Invocation::Help);
            } else {
                return Err(ConfigError::UnknownArgument(arg.to_string()));
            }
        }
        Ok(Invocation::Serve(self))
    }

    pub fn viewers_path(&self) -> PathBuf {
        self.root_dir.join(&self.viewers_dir)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidPort(value.to_string()))
}
