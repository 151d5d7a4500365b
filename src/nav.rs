//! Sidebar navigation: links to sibling dumps of the one being viewed.

use crate::catalog::{TestGroup, TypeGroup};
use crate::dump::DumpId;
use crate::viewer::escape_html;

/// Colour for links whose target is not in the candidate set.
pub const MISSING_COLOR: &str = "darkred";

/// One `<li>` link. `known` must be the dumps of the group the link belongs
/// to; membership is the only thing that decides the style.
pub fn render_link(target: &DumpId, label: &str, known: &[DumpId]) -> String {
    let href = escape_html(&target.file_name());
    let label = escape_html(label);
    if known.contains(target) {
        format!(r#"<li><a href="{}">{}</a></li>"#, href, label)
    } else {
        format!(
            r#"<li><a href="{}" style="color: {}">{}</a></li>"#,
            href, MISSING_COLOR, label
        )
    }
}

/// Per test, every known date. Links keep the current type.
pub fn render_test_panel(by_test: &[TestGroup], current: &DumpId) -> Vec<String> {
    let mut out = Vec::new();
    for group in by_test {
        out.push(format!("<b>{}</b><ul>", escape_html(&group.test)));
        for dates in &group.dates {
            let target = DumpId::new(&group.test, &dates.date, &current.kind);
            out.push(render_link(&target, &dates.date, &dates.dumps));
        }
        out.push("</ul>".to_string());
    }
    out
}

/// Every known type. Links keep the current test and date.
pub fn render_type_panel(by_type: &[TypeGroup], current: &DumpId) -> Vec<String> {
    let mut out = vec!["<ul>".to_string()];
    for group in by_type {
        let target = DumpId::new(&current.test, &current.date, &group.kind);
        out.push(render_link(&target, &group.kind, &group.dumps));
    }
    out.push("</ul>".to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DateGroup;

    fn id(name: &str) -> DumpId {
        DumpId::parse(name).unwrap()
    }

    #[test]
    fn link_style_follows_candidate_set() {
        let target = id("login.20240101.trace");
        let present = render_link(&target, "20240101", &[target.clone()]);
        assert_eq!(
            present,
            r#"<li><a href="login.20240101.trace">20240101</a></li>"#
        );

        // The file may well exist; only the set passed in counts.
        let absent = render_link(&target, "20240101", &[id("login.20240101.log")]);
        assert!(absent.contains("color: darkred"));
    }

    #[test]
    fn labels_are_escaped() {
        let link = render_link(&id("a.b.c"), "<x>", &[]);
        assert!(link.contains("&lt;x&gt;"));
    }

    #[test]
    fn test_panel_keeps_current_type() {
        let groups = vec![TestGroup {
            test: "login".into(),
            dates: vec![
                DateGroup {
                    date: "20240102".into(),
                    dumps: vec![id("login.20240102.trace")],
                },
                DateGroup {
                    date: "20240101".into(),
                    dumps: vec![id("login.20240101.log")],
                },
            ],
        }];
        let html = render_test_panel(&groups, &id("login.20240102.trace"));
        assert_eq!(html[0], "<b>login</b><ul>");
        assert_eq!(
            html[1],
            r#"<li><a href="login.20240102.trace">20240102</a></li>"#
        );
        assert_eq!(
            html[2],
            r#"<li><a href="login.20240101.trace" style="color: darkred">20240101</a></li>"#
        );
        assert_eq!(html[3], "</ul>");
    }

    #[test]
    fn type_panel_keeps_current_test_and_date() {
        let groups = vec![
            TypeGroup {
                kind: "trace".into(),
                dumps: vec![id("login.20240102.trace"), id("login.20240101.trace")],
            },
            TypeGroup {
                kind: "log".into(),
                dumps: vec![id("login.20240101.log")],
            },
        ];
        let html = render_type_panel(&groups, &id("login.20240102.trace"));
        assert_eq!(
            html,
            vec![
                "<ul>".to_string(),
                r#"<li><a href="login.20240102.trace">trace</a></li>"#.to_string(),
                r#"<li><a href="login.20240102.log" style="color: darkred">log</a></li>"#
                    .to_string(),
                "</ul>".to_string(),
            ]
        );
    }
}
