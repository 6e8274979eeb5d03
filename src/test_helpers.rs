//! Shared test utilities for the rambler test suite.
//!
//! Provides document builders and a recording [`ArtifactWriter`] so planner
//! tests can assert on rewrite decisions without rendering HTML.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let docs = vec![doc_tagged("20220301", &["ruby"]), doc("20220215")];
//! let mut writer = RecordingWriter::default();
//! // ... run the planner with &mut writer ...
//! assert_eq!(writer.written(), vec!["index.html"]);
//! ```

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::document::DocumentRecord;
use crate::render::{ArtifactWriter, RenderError};
use crate::types::{Artifact, ArtifactKind};

// =========================================================================
// Document builders
// =========================================================================

/// Fixed modification time used by default: 2022-03-10 00:00:00 UTC.
pub const DEFAULT_MODIFIED: i64 = 1_646_870_400;

pub fn at(timestamp: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(timestamp, 0).unwrap()
}

/// Document whose date is parsed from a `YYYYMMDD` id.
pub fn doc(id: &str) -> DocumentRecord {
    doc_tagged(id, &[])
}

pub fn doc_tagged(id: &str, tags: &[&str]) -> DocumentRecord {
    let date = NaiveDate::parse_from_str(id, "%Y%m%d")
        .unwrap_or_else(|_| panic!("test document id '{id}' is not YYYYMMDD"));
    let mut tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
    tags.sort();
    tags.dedup();
    DocumentRecord {
        id: id.to_string(),
        date,
        modified_at: at(DEFAULT_MODIFIED),
        tags,
        title: format!("Post {id}"),
        body: format!("<p>Body of {id}</p>\n"),
        source: PathBuf::from(format!("{id}.md")),
    }
}

/// Same document, modified at `timestamp`.
pub fn touched(mut doc: DocumentRecord, timestamp: i64) -> DocumentRecord {
    doc.modified_at = at(timestamp);
    doc
}

pub fn ids_of(docs: &[&DocumentRecord]) -> Vec<String> {
    docs.iter().map(|d| d.id.clone()).collect()
}

// =========================================================================
// Recording writer
// =========================================================================

/// One call to [`RecordingWriter::write`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub path: String,
    pub kind: ArtifactKind,
    pub section: String,
    pub document_ids: Vec<String>,
    pub page_numbers: Vec<usize>,
}

/// Records every artifact it is asked to write; fails for configured paths.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    pub calls: Vec<WriteCall>,
    pub fail_paths: HashSet<String>,
}

impl RecordingWriter {
    pub fn failing(paths: &[&str]) -> Self {
        Self {
            calls: Vec::new(),
            fail_paths: paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Paths written, in call order.
    pub fn written(&self) -> Vec<&str> {
        self.calls.iter().map(|c| c.path.as_str()).collect()
    }

    pub fn wrote(&self, path: &str) -> bool {
        self.calls.iter().any(|c| c.path == path)
    }

    pub fn call(&self, path: &str) -> &WriteCall {
        self.calls
            .iter()
            .find(|c| c.path == path)
            .unwrap_or_else(|| {
                let paths = self.written();
                panic!("no write for '{path}'. Written: {paths:?}")
            })
    }
}

impl ArtifactWriter for RecordingWriter {
    fn write(&mut self, artifact: &Artifact<'_>) -> Result<(), RenderError> {
        self.calls.push(WriteCall {
            path: artifact.path.to_string(),
            kind: artifact.kind,
            section: artifact.section.to_string(),
            document_ids: ids_of(artifact.documents),
            page_numbers: artifact.pages.iter().map(|p| p.number).collect(),
        });
        if self.fail_paths.contains(artifact.path) {
            return Err(RenderError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "simulated write failure",
            )));
        }
        Ok(())
    }
}
