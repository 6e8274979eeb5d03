//! Shared types passed between the planner and artifact writers.

use std::fmt;

use crate::document::DocumentRecord;

/// Artifact family. Each family has its own rewrite rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Archive page 1, written at the home path.
    Home,
    /// Archive pages 2 and up.
    Archive,
    /// One permalink page per document.
    Document,
    /// Paginated per-tag listing.
    Tag,
    /// Syndication feed.
    Feed,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ArtifactKind::Home => "home",
            ArtifactKind::Archive => "archive",
            ArtifactKind::Document => "document",
            ArtifactKind::Tag => "tag",
            ArtifactKind::Feed => "feed",
        };
        f.write_str(label)
    }
}

/// Pagination descriptor for one page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub number: usize,
    pub link: String,
    pub is_current: bool,
}

/// Everything a writer needs to produce one output file.
#[derive(Debug, Clone, Copy)]
pub struct Artifact<'a> {
    /// Output path, relative to the output directory.
    pub path: &'a str,
    pub kind: ArtifactKind,
    /// Section label, e.g. "Archive" or the tag name.
    pub section: &'a str,
    /// Page title.
    pub title: &'a str,
    pub documents: &'a [&'a DocumentRecord],
    pub pages: &'a [PageLink],
}
