//! Dump catalog: scans the root directory and groups what it finds.
//!
//! Nothing is cached. Every call re-reads the directory, which is the only
//! source of truth.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::dump::DumpId;
use crate::logging::{log_skipped_dump, log_unreadable_entry};

/// Dumps sharing one `(test, date)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateGroup {
    pub date: String,
    pub dumps: Vec<DumpId>,
}

/// All dates seen for one test, most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestGroup {
    pub test: String,
    pub dates: Vec<DateGroup>,
}

/// All dumps of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeGroup {
    pub kind: String,
    pub dumps: Vec<DumpId>,
}

/// Both groupings of a single scan. Keys keep first-seen order under a
/// descending date sort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpGroups {
    pub by_test: Vec<TestGroup>,
    pub by_type: Vec<TypeGroup>,
}

impl DumpGroups {
    pub fn test(&self, test: &str) -> Option<&TestGroup> {
        self.by_test.iter().find(|g| g.test == test)
    }

    pub fn kind(&self, kind: &str) -> Option<&TypeGroup> {
        self.by_type.iter().find(|g| g.kind == kind)
    }

    fn insert(&mut self, dump: DumpId) {
        let i = match self.by_test.iter().position(|g| g.test == dump.test) {
            Some(i) => i,
            None => {
                self.by_test.push(TestGroup {
                    test: dump.test.clone(),
                    dates: Vec::new(),
                });
                self.by_test.len() - 1
            }
        };
        match self.by_test[i].dates.iter_mut().find(|g| g.date == dump.date) {
            Some(group) => group.dumps.push(dump.clone()),
            None => self.by_test[i].dates.push(DateGroup {
                date: dump.date.clone(),
                dumps: vec![dump.clone()],
            }),
        }

        match self.by_type.iter_mut().find(|g| g.kind == dump.kind) {
            Some(group) => group.dumps.push(dump),
            None => self.by_type.push(TypeGroup {
                kind: dump.kind.clone(),
                dumps: vec![dump],
            }),
        }
    }
}

/// Lazily yields one identifier per non-directory entry of `dir`.
/// Unparseable names are logged and skipped.
pub fn list_dumps(dir: &Path) -> Result<impl Iterator<Item = DumpId>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("cannot list dump directory {}", dir.display()))?;

    let dir_name = dir.display().to_string();
    Ok(entries.filter_map(move |entry| {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log_unreadable_entry(&dir_name, &err);
                return None;
            }
        };
        if entry.path().is_dir() {
            return None;
        }
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                log_skipped_dump(&raw.to_string_lossy(), "not valid UTF-8");
                return None;
            }
        };
        match DumpId::parse(&name) {
            Ok(id) => Some(id),
            Err(err) => {
                log_skipped_dump(&name, &err.to_string());
                None
            }
        }
    }))
}

/// All dumps in `dir`, ordered by file name so ties resolve the same way on
/// every platform.
pub fn scan(dir: &Path) -> Result<Vec<DumpId>> {
    let mut dumps: Vec<DumpId> = list_dumps(dir)?.collect();
    dumps.sort_by_key(|d| d.file_name());
    Ok(dumps)
}

/// The dump with the smallest date string. Used for the `/` redirect.
///
/// Note this is the lexical minimum, not the latest dump.
pub fn newest(dir: &Path) -> Result<Option<DumpId>> {
    Ok(scan(dir)?.into_iter().min_by(|a, b| a.date.cmp(&b.date)))
}

pub fn group(dir: &Path) -> Result<DumpGroups> {
    let mut dumps = scan(dir)?;
    dumps.sort_by(|a, b| b.date.cmp(&a.date));

    let mut groups = DumpGroups::default();
    for dump in dumps {
        groups.insert(dump);
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{format_record, skipped_dump_fields, Domain, Level, INVALID_DUMP_NAME};
    use tempfile::TempDir;

    fn dir_with(names: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in names {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        dir
    }

    #[test]
    fn skips_directories_and_bad_names() {
        let dir = dir_with(&["login.20240101.trace", "bad.name", "a.b.c.d", "README"]);
        fs::create_dir(dir.path().join("sub.20240101.trace")).unwrap();

        let dumps = scan(dir.path()).unwrap();
        assert_eq!(dumps, vec![DumpId::new("login", "20240101", "trace")]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(scan(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn newest_picks_smallest_date_string() {
        let dir = dir_with(&[
            "login.20240102.trace",
            "login.20240101.log",
            "boot.20240103.trace",
        ]);
        let id = newest(dir.path()).unwrap().unwrap();
        assert_eq!(id, DumpId::new("login", "20240101", "log"));
    }

    #[test]
    fn newest_of_empty_directory_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(newest(dir.path()).unwrap(), None);
    }

    #[test]
    fn groups_order_by_descending_date() {
        let dir = dir_with(&[
            "login.20240101.trace",
            "login.20240102.trace",
            "login.20240101.log",
            "boot.20240103.core",
        ]);
        let groups = group(dir.path()).unwrap();

        let tests: Vec<&str> = groups.by_test.iter().map(|g| g.test.as_str()).collect();
        assert_eq!(tests, ["boot", "login"]);

        let login_dates: Vec<&str> = groups
            .test("login")
            .unwrap()
            .dates
            .iter()
            .map(|g| g.date.as_str())
            .collect();
        assert_eq!(login_dates, ["20240102", "20240101"]);

        let kinds: Vec<&str> = groups.by_type.iter().map(|g| g.kind.as_str()).collect();
        assert_eq!(kinds, ["core", "trace", "log"]);
        assert_eq!(groups.kind("trace").unwrap().dumps.len(), 2);
    }

    #[test]
    fn every_dump_lands_in_exactly_one_bucket_each() {
        let dir = dir_with(&["a.1.x", "a.1.y", "a.2.x", "b.1.x", "b.3.z", "c.2.y"]);
        let all = scan(dir.path()).unwrap();
        let groups = group(dir.path()).unwrap();

        for dump in &all {
            let date_hits: usize = groups
                .by_test
                .iter()
                .flat_map(|t| t.dates.iter())
                .filter(|d| d.dumps.contains(dump))
                .count();
            assert_eq!(date_hits, 1, "{} in date buckets", dump);
            let bucket = groups
                .test(&dump.test)
                .unwrap()
                .dates
                .iter()
                .find(|d| d.date == dump.date)
                .unwrap();
            assert!(bucket.dumps.contains(dump));

            let type_hits = groups
                .by_type
                .iter()
                .filter(|t| t.dumps.contains(dump))
                .count();
            assert_eq!(type_hits, 1, "{} in type buckets", dump);
            assert!(groups.kind(&dump.kind).unwrap().dumps.contains(dump));
        }
    }

    #[test]
    fn malformed_name_warning_names_the_file() {
        let err = DumpId::parse("bad.name").unwrap_err();
        let line = format_record(
            Level::Warn,
            Domain::Catalog,
            INVALID_DUMP_NAME,
            skipped_dump_fields("bad.name", &err.to_string()),
        );
        let record: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(record["lvl"], "WARN");
        assert_eq!(record["component"], "catalog");
        assert_eq!(record["event"], "invalid_dump_name");
        assert_eq!(record["dump"], "bad.name");
        assert_eq!(record["msg"], "expected \"test.date.type\"");
        assert!(record["data"]["reason"]
            .as_str()
            .unwrap()
            .contains("found 2 segment(s)"));
    }
}
