//! Build and tag manifests for incremental rebuilds.
//!
//! Two plain-text records survive between runs, both in the store directory:
//!
//! - **Build manifest** (`build-manifest.tsv`): one `timestamp<TAB>path` line
//!   per artifact that existed at the end of the previous run. The timestamp
//!   is the Unix time (seconds) of the run that last accounted for the path.
//! - **Tag manifest** (`tag-manifest.tsv`): one `tag<TAB>id,id,...` line per
//!   tag, listing the document ids (newest first) the tag held. The reserved
//!   key [`ALL_DOCUMENTS`] holds the id list of the whole corpus.
//!
//! # Lifecycle
//!
//! Each run loads the previous manifests read-only, accumulates fresh ones in
//! a [`BuildManifestBuilder`] / [`TagManifestBuilder`], and finalizes each
//! builder exactly once at the end. Saving writes a temporary file and renames
//! it over the old one, so an interrupted run leaves either the old manifest
//! or the new one on disk, never a partial file.
//!
//! # Degrading to empty
//!
//! A missing, unreadable, or malformed manifest loads as empty. That only
//! costs extra rewrites: with no entries, every artifact looks new.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Seconds since the Unix epoch.
pub type Timestamp = i64;

pub const BUILD_MANIFEST_FILENAME: &str = "build-manifest.tsv";
pub const TAG_MANIFEST_FILENAME: &str = "tag-manifest.tsv";

/// Tag-manifest key for the id list of the whole corpus. `*` is never a
/// valid tag name, so it cannot collide.
pub const ALL_DOCUMENTS: &str = "*";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("cannot store {0:?}: contains a line break or separator")]
    Unencodable(String),
}

fn malformed(line: usize, reason: impl Into<String>) -> ManifestError {
    ManifestError::Malformed {
        line,
        reason: reason.into(),
    }
}

/// Resolve the build manifest path inside a store directory.
pub fn build_manifest_path(store_dir: &Path) -> PathBuf {
    store_dir.join(BUILD_MANIFEST_FILENAME)
}

/// Resolve the tag manifest path inside a store directory.
pub fn tag_manifest_path(store_dir: &Path) -> PathBuf {
    store_dir.join(TAG_MANIFEST_FILENAME)
}

// =============================================================================
// Build manifest
// =============================================================================

/// Artifact path → time it was last accounted for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildManifest {
    entries: BTreeMap<String, Timestamp>,
}

impl BuildManifest {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from disk, falling back to an empty manifest on any failure.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|err| {
                warn!(path = %path.display(), %err, "ignoring malformed build manifest");
                Self::empty()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Self::empty(),
            Err(err) => {
                warn!(path = %path.display(), %err, "ignoring unreadable build manifest");
                Self::empty()
            }
        }
    }

    /// Parse `timestamp<TAB>path` lines. Blank lines are ignored.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let mut entries = BTreeMap::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (stamp, path) = line
                .split_once('\t')
                .ok_or_else(|| malformed(idx + 1, "missing tab separator"))?;
            let stamp: Timestamp = stamp
                .trim()
                .parse()
                .map_err(|_| malformed(idx + 1, format!("bad timestamp '{stamp}'")))?;
            if path.is_empty() {
                return Err(malformed(idx + 1, "empty path"));
            }
            entries.insert(path.to_string(), stamp);
        }
        Ok(Self { entries })
    }

    /// Serialize with entries ordered by timestamp, then path.
    pub fn to_text(&self) -> String {
        let mut rows: Vec<(&String, &Timestamp)> = self.entries.iter().collect();
        rows.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
        rows.iter()
            .map(|(path, stamp)| format!("{stamp}\t{path}\n"))
            .collect()
    }

    /// Write atomically. Refuses paths that would not parse back.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        if let Some(bad) = self.entries.keys().find(|p| p.contains(char::is_control)) {
            return Err(ManifestError::Unencodable(bad.clone()));
        }
        write_atomically(path, &self.to_text())
    }

    pub fn written_at(&self, path: &str) -> Option<Timestamp> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// All recorded paths, in lexical order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Newest timestamp in the manifest: when the previous run happened.
    pub fn last_run(&self) -> Option<Timestamp> {
        self.entries.values().copied().max()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Accumulates the current run's build manifest.
#[derive(Debug, Default)]
pub struct BuildManifestBuilder {
    entries: BTreeMap<String, Timestamp>,
}

impl BuildManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: impl Into<String>, written_at: Timestamp) {
        self.entries.insert(path.into(), written_at);
    }

    pub fn finish(self) -> BuildManifest {
        BuildManifest {
            entries: self.entries,
        }
    }
}

// =============================================================================
// Tag manifest
// =============================================================================

/// Tag name → ordered document ids the tag held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagManifest {
    entries: BTreeMap<String, Vec<String>>,
}

impl TagManifest {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from disk, falling back to an empty manifest on any failure.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|err| {
                warn!(path = %path.display(), %err, "ignoring malformed tag manifest");
                Self::empty()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Self::empty(),
            Err(err) => {
                warn!(path = %path.display(), %err, "ignoring unreadable tag manifest");
                Self::empty()
            }
        }
    }

    /// Parse `tag<TAB>id,id,...` lines. An empty id field is an empty list.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let mut entries = BTreeMap::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (tag, ids) = line
                .split_once('\t')
                .ok_or_else(|| malformed(idx + 1, "missing tab separator"))?;
            if tag.is_empty() {
                return Err(malformed(idx + 1, "empty tag name"));
            }
            let ids = ids
                .split(',')
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
            entries.insert(tag.to_string(), ids);
        }
        Ok(Self { entries })
    }

    /// Serialize with entries ordered by tag name.
    pub fn to_text(&self) -> String {
        self.entries
            .iter()
            .map(|(tag, ids)| format!("{tag}\t{}\n", ids.join(",")))
            .collect()
    }

    /// Write atomically. Refuses tags and ids that would not parse back.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        for (tag, ids) in &self.entries {
            if tag.is_empty() || tag.contains(char::is_control) {
                return Err(ManifestError::Unencodable(tag.clone()));
            }
            if let Some(bad) = ids
                .iter()
                .find(|id| id.is_empty() || id.contains(|c: char| c == ',' || c.is_control()))
            {
                return Err(ManifestError::Unencodable(bad.clone()));
            }
        }
        write_atomically(path, &self.to_text())
    }

    pub fn ids(&self, tag: &str) -> Option<&[String]> {
        self.entries.get(tag).map(Vec::as_slice)
    }

    /// Id list of the whole corpus as of the previous run, newest first.
    pub fn all_documents(&self) -> &[String] {
        self.ids(ALL_DOCUMENTS).unwrap_or_default()
    }

    /// Tag names, excluding the whole-corpus entry.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries
            .keys()
            .map(String::as_str)
            .filter(|tag| *tag != ALL_DOCUMENTS)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Accumulates the current run's tag manifest.
#[derive(Debug, Default)]
pub struct TagManifestBuilder {
    entries: BTreeMap<String, Vec<String>>,
}

impl TagManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tag: impl Into<String>, ids: Vec<String>) {
        self.entries.insert(tag.into(), ids);
    }

    pub fn finish(self) -> TagManifest {
        TagManifest {
            entries: self.entries,
        }
    }
}

/// Replace `path` with `content` via a sibling temp file and a rename.
fn write_atomically(path: &Path, content: &str) -> Result<(), ManifestError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // Build manifest
    // =========================================================================

    #[test]
    fn parse_build_manifest_lines() {
        let m = BuildManifest::parse("100\tindex.html\n\n200\tfeed.xml\n").unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.written_at("index.html"), Some(100));
        assert_eq!(m.written_at("feed.xml"), Some(200));
        assert_eq!(m.last_run(), Some(200));
    }

    #[test]
    fn parse_build_manifest_rejects_missing_tab() {
        let err = BuildManifest::parse("100 index.html").unwrap_err();
        assert!(matches!(err, ManifestError::Malformed { line: 1, .. }));
    }

    #[test]
    fn parse_build_manifest_rejects_bad_timestamp() {
        let err = BuildManifest::parse("100\ta\nsoon\tb\n").unwrap_err();
        assert!(matches!(err, ManifestError::Malformed { line: 2, .. }));
    }

    #[test]
    fn build_manifest_text_sorted_by_timestamp_then_path() {
        let mut b = BuildManifestBuilder::new();
        b.record("b.html", 20);
        b.record("c.html", 10);
        b.record("a.html", 20);
        let text = b.finish().to_text();
        assert_eq!(text, "10\tc.html\n20\ta.html\n20\tb.html\n");
    }

    #[test]
    fn builder_keeps_one_entry_per_path() {
        let mut b = BuildManifestBuilder::new();
        b.record("index.html", 1);
        b.record("index.html", 2);
        let m = b.finish();
        assert_eq!(m.len(), 1);
        assert_eq!(m.written_at("index.html"), Some(2));
    }

    #[test]
    fn build_manifest_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = build_manifest_path(&tmp.path().join("store"));
        let mut b = BuildManifestBuilder::new();
        b.record("page/2/index.html", 1_650_000_000);
        let m = b.finish();
        m.save(&path).unwrap();

        assert_eq!(BuildManifest::load(&path), m);
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        assert!(!PathBuf::from(tmp_name).exists());
    }

    #[test]
    fn build_manifest_save_refuses_line_breaks() {
        let tmp = TempDir::new().unwrap();
        let path = build_manifest_path(tmp.path());
        let mut b = BuildManifestBuilder::new();
        b.record("index.html", 1);
        b.record("tag/a\nb/index.html", 1);
        let err = b.finish().save(&path).unwrap_err();
        assert!(matches!(err, ManifestError::Unencodable(ref p) if p == "tag/a\nb/index.html"));
        assert!(!path.exists());
    }

    #[test]
    fn build_manifest_load_missing_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(BuildManifest::load(&tmp.path().join("nope.tsv")).is_empty());
    }

    #[test]
    fn build_manifest_load_corrupt_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(BUILD_MANIFEST_FILENAME);
        fs::write(&path, "garbage without tabs").unwrap();
        assert!(BuildManifest::load(&path).is_empty());
    }

    // =========================================================================
    // Tag manifest
    // =========================================================================

    #[test]
    fn parse_tag_manifest_lines() {
        let m = TagManifest::parse("ruby\t20220301,20220215\nempty\t\n").unwrap();
        assert_eq!(
            m.ids("ruby").unwrap(),
            &["20220301".to_string(), "20220215".to_string()]
        );
        assert_eq!(m.ids("empty").unwrap().len(), 0);
        assert!(m.ids("rust").is_none());
    }

    #[test]
    fn tag_manifest_text_sorted_by_tag() {
        let mut b = TagManifestBuilder::new();
        b.record("zig", vec!["2".into()]);
        b.record("ada", vec!["3".into(), "1".into()]);
        b.record(ALL_DOCUMENTS, vec!["3".into(), "2".into(), "1".into()]);
        assert_eq!(b.finish().to_text(), "*\t3,2,1\nada\t3,1\nzig\t2\n");
    }

    #[test]
    fn all_documents_entry_is_not_a_tag() {
        let m = TagManifest::parse("*\t2,1\nrust\t2\n").unwrap();
        assert_eq!(m.all_documents(), &["2".to_string(), "1".to_string()]);
        assert_eq!(m.tags().collect::<Vec<_>>(), vec!["rust"]);
    }

    #[test]
    fn all_documents_defaults_to_empty() {
        assert!(TagManifest::empty().all_documents().is_empty());
    }

    #[test]
    fn tag_manifest_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tag_manifest_path(tmp.path());
        let mut b = TagManifestBuilder::new();
        b.record("ruby", vec!["20220301".into()]);
        let m = b.finish();
        m.save(&path).unwrap();
        assert_eq!(TagManifest::load(&path), m);
    }

    #[test]
    fn tag_manifest_save_refuses_unparseable_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tag_manifest_path(tmp.path());

        let mut b = TagManifestBuilder::new();
        b.record("a\rb", vec!["20220301".into()]);
        assert!(matches!(
            b.finish().save(&path),
            Err(ManifestError::Unencodable(_))
        ));

        let mut b = TagManifestBuilder::new();
        b.record("rust", vec!["2022,0301".into()]);
        assert!(matches!(
            b.finish().save(&path),
            Err(ManifestError::Unencodable(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn tag_manifest_load_corrupt_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tag_manifest_path(tmp.path());
        fs::write(&path, "\t1,2\n").unwrap();
        assert!(TagManifest::load(&path).is_empty());
    }
}
