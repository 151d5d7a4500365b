//! Viewers turn a dump file into markup, chosen by the dump's type.
//!
//! A [`ViewerRegistry`] maps type names to [`Viewer`]s. At startup it is
//! filled from the viewers directory: every executable there is registered
//! under its file stem, so `viewers/trace.py` handles `*.*.trace` dumps.
//! Files without an execute bit are skipped. Unknown types fall back to
//! [`DefaultViewer`].

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};

use crate::dump::{DumpId, DELIMITER};
use crate::logging::{log_viewer_found, log_viewer_skipped};

/// Query parameters handed to a viewer.
pub type Params = BTreeMap<String, String>;

pub trait Viewer: Send + Sync {
    /// Push markup fragments for `dump` onto `out`. Fragments pushed before
    /// an error are still shown.
    fn render(
        &self,
        file: &mut dyn Read,
        dump: &DumpId,
        params: &Params,
        out: &mut Vec<String>,
    ) -> Result<()>;
}

/// Escapes `&`, `<`, `>`, `"` and `'` for text and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Raw contents in a `<pre>` block, under a "no viewer" notice.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultViewer;

impl Viewer for DefaultViewer {
    fn render(
        &self,
        file: &mut dyn Read,
        dump: &DumpId,
        _params: &Params,
        out: &mut Vec<String>,
    ) -> Result<()> {
        out.push(format!(
            r#"<div style="border: solid 2px black">No viewer for '{}' found.</div>"#,
            escape_html(&dump.kind)
        ));
        out.push(r#"<pre style="background-color: lightgray">"#.to_string());
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)
            .with_context(|| format!("cannot read {}", dump))?;
        out.push(escape_html(&String::from_utf8_lossy(&raw)));
        out.push("</pre>".to_string());
        Ok(())
    }
}

/// An external program. It gets the dump on stdin and
/// `[args..] test date type key=value..` as arguments; every stdout line is
/// one fragment.
#[derive(Debug, Clone)]
pub struct CommandViewer {
    program: PathBuf,
    args: Vec<OsString>,
}

impl CommandViewer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Leading arguments placed before the dump identifier.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl Viewer for CommandViewer {
    fn render(
        &self,
        file: &mut dyn Read,
        dump: &DumpId,
        params: &Params,
        out: &mut Vec<String>,
    ) -> Result<()> {
        let mut input = Vec::new();
        file.read_to_end(&mut input)
            .with_context(|| format!("cannot read {}", dump))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&dump.test)
            .arg(&dump.date)
            .arg(&dump.kind)
            .args(params.iter().map(|(k, v)| format!("{}={}", k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("cannot start viewer {}", self.program.display()))?;
        let mut stdin = child.stdin.take().context("viewer stdin not captured")?;
        // A viewer that ignores stdin makes this fail with a broken pipe.
        let feeder = std::thread::spawn(move || {
            let _ = stdin.write_all(&input);
        });
        let output = child
            .wait_with_output()
            .with_context(|| format!("viewer {} did not finish", self.program.display()))?;
        let _ = feeder.join();

        if !output.status.success() {
            bail!(
                "viewer {} failed ({}): {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        out.extend(
            String::from_utf8_lossy(&output.stdout)
                .split_inclusive('\n')
                .map(str::to_string),
        );
        Ok(())
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

/// Type name to viewer, with [`DefaultViewer`] for everything else.
#[derive(Default)]
pub struct ViewerRegistry {
    viewers: HashMap<String, Box<dyn Viewer>>,
    fallback: DefaultViewer,
}

impl ViewerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of every program in `dir`. A missing directory yields an
    /// empty registry.
    pub fn discover(dir: &Path) -> Result<Self> {
        let mut registry = Self::new();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(registry),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("cannot list viewers in {}", dir.display()))
            }
        };

        let mut programs: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(err) => {
                    log_viewer_skipped(&dir.to_string_lossy(), &err.to_string());
                    None
                }
            })
            .filter(|p| p.is_file())
            .collect();
        programs.sort();

        for program in programs {
            let Some(kind) = program.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if kind.is_empty() || kind.contains(DELIMITER) || registry.contains(kind) {
                continue;
            }
            if !is_executable(&program) {
                log_viewer_skipped(&program.to_string_lossy(), "not executable");
                continue;
            }
            log_viewer_found(kind, &program.to_string_lossy());
            let kind = kind.to_string();
            registry.register(kind, CommandViewer::new(program));
        }
        Ok(registry)
    }

    pub fn register(&mut self, kind: impl Into<String>, viewer: impl Viewer + 'static) {
        self.viewers.insert(kind.into(), Box::new(viewer));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.viewers.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }

    pub fn resolve(&self, kind: &str) -> &dyn Viewer {
        match self.viewers.get(kind) {
            Some(viewer) => viewer.as_ref(),
            None => &self.fallback,
        }
    }
}
