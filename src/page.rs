//! Assembles the full HTML page for one dump: navigation sidebar on the
//! right, viewer output on the left.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};

use crate::catalog;
use crate::dump::DumpId;
use crate::logging::{log_crash, v_str, ProfileScope};
use crate::nav::{render_test_panel, render_type_panel};
use crate::viewer::{escape_html, Params, ViewerRegistry};

const SIDEBAR_OPEN: &str = r#"<div style="position: absolute; top: 0; bottom: 0; right: 0; width: 16em; overflow: auto"><div style="margin: 1em">"#;
const CONTENT_OPEN: &str = r#"<div style="position: absolute; left: 0; top: 0; bottom: 0; right: 16em; overflow: auto"><div style="margin: 1em">"#;
const PANE_CLOSE: &str = "</div></div>";

/// Render the page for `dump`, re-scanning `root` for navigation.
///
/// Never fails. A missing dump file becomes a notice inside the page; any
/// other error keeps what was already rendered, appends a crash notice and
/// logs the details.
pub fn render_page(
    root: &Path,
    viewers: &ViewerRegistry,
    dump: &DumpId,
    params: &Params,
) -> Vec<String> {
    let name = dump.file_name();
    let _profile = ProfileScope::with_context("render_page", &[("dump", v_str(&name))]);

    let mut out = Vec::new();
    if let Err(err) = assemble(root, viewers, dump, params, &mut out) {
        log_crash(&name, &err);
        out.push(format!(
            "<br>... crashed with {}. See console.",
            escape_html(&err.to_string())
        ));
    }
    out
}

fn assemble(
    root: &Path,
    viewers: &ViewerRegistry,
    dump: &DumpId,
    params: &Params,
    out: &mut Vec<String>,
) -> Result<()> {
    let name = dump.file_name();
    out.push(format!(
        r#"<!doctype html><html><head><meta charset="utf8"><title>{}</title></head><body>"#,
        escape_html(&name)
    ));

    let groups = catalog::group(root)?;
    out.push(SIDEBAR_OPEN.to_string());
    out.extend(render_test_panel(&groups.by_test, dump));
    out.push("<hr>".to_string());
    out.extend(render_type_panel(&groups.by_type, dump));
    out.push(PANE_CLOSE.to_string());

    out.push(CONTENT_OPEN.to_string());
    match File::open(root.join(&name)) {
        Ok(mut file) => viewers
            .resolve(&dump.kind)
            .render(&mut file, dump, params, out)?,
        Err(err) if err.kind() == ErrorKind::NotFound => out.push(format!(
            r#"<div style="border: solid 2px black">Dump '{}' not found.</div>"#,
            escape_html(&name)
        )),
        Err(err) => return Err(err).with_context(|| format!("cannot open dump {}", name)),
    }
    out.push(PANE_CLOSE.to_string());

    out.push("</body></html>".to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::Viewer;
    use anyhow::bail;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    fn scenario() -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in ["login.20240101.trace", "login.20240102.trace", "login.20240101.log"] {
            fs::write(dir.path().join(name), format!("contents of {}", name)).unwrap();
        }
        dir
    }

    fn page(dir: &TempDir, viewers: &ViewerRegistry, name: &str) -> String {
        let dump = DumpId::parse(name).unwrap();
        render_page(dir.path(), viewers, &dump, &Params::new()).concat()
    }

    #[test]
    fn renders_navigation_and_contents() {
        let dir = scenario();
        let html = page(&dir, &ViewerRegistry::new(), "login.20240102.trace");

        assert!(html.starts_with("<!doctype html>"));
        assert!(html.contains("<title>login.20240102.trace</title>"));
        assert!(html.contains("<b>login</b><ul>"));
        assert!(html.contains(r#"<li><a href="login.20240101.trace">20240101</a></li>"#));
        assert!(html.contains(r#"<li><a href="login.20240102.trace">20240102</a></li>"#));
        assert!(html.contains(r#"<li><a href="login.20240102.trace">trace</a></li>"#));
        assert!(html.contains(
            r#"<li><a href="login.20240102.log" style="color: darkred">log</a></li>"#
        ));
        assert!(html.contains("contents of login.20240102.trace"));
        assert!(html.ends_with("</body></html>"));
    }

    #[test]
    fn missing_dump_is_a_notice() {
        let dir = scenario();
        let html = page(&dir, &ViewerRegistry::new(), "nonexistent.file.type");
        assert!(html.contains("Dump 'nonexistent.file.type' not found."));
        assert!(html.ends_with("</body></html>"));
        assert!(!html.contains("crashed"));
    }

    struct HalfThenFail;

    impl Viewer for HalfThenFail {
        fn render(
            &self,
            _file: &mut dyn Read,
            _dump: &DumpId,
            _params: &Params,
            out: &mut Vec<String>,
        ) -> Result<()> {
            out.push("<p>first half</p>".to_string());
            bail!("viewer exploded")
        }
    }

    #[test]
    fn crash_keeps_partial_output() {
        let dir = scenario();
        let mut viewers = ViewerRegistry::new();
        viewers.register("trace", HalfThenFail);

        let fragments = render_page(
            dir.path(),
            &viewers,
            &DumpId::parse("login.20240101.trace").unwrap(),
            &Params::new(),
        );
        let last = fragments.last().unwrap();
        assert_eq!(last, "<br>... crashed with viewer exploded. See console.");
        assert_eq!(fragments[fragments.len() - 2], "<p>first half</p>");
        assert!(!fragments.concat().contains("</body></html>"));
    }

    #[test]
    fn unreadable_root_crashes_after_head() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");
        let fragments = render_page(
            &missing,
            &ViewerRegistry::new(),
            &DumpId::parse("a.b.c").unwrap(),
            &Params::new(),
        );
        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].starts_with("<!doctype html>"));
        assert!(fragments[1].contains("crashed with cannot list dump directory"));
    }
}
