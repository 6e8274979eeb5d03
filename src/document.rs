//! Source documents and the loader that discovers them.
//!
//! A document is a Markdown file under the posts directory with optional TOML
//! front matter between `+++` lines:
//!
//! ```text
//! +++
//! title = "Shipping the parser"
//! date = "2022-03-05"
//! tags = ["rust", "parsing"]
//! +++
//!
//! Body in **Markdown**.
//! ```
//!
//! `date` is required. The document id is the date as `YYYYMMDD`, so the
//! supported density is one document per calendar day.
//!
//! ## Validation
//!
//! Nothing here is fatal. Each rejected file produces a [`LoadWarning`] and
//! the rest of the corpus loads normally:
//! - unreadable or oversized files
//! - malformed front matter, or a missing/invalid date
//! - a second document on an already-used date (the first in sorted path
//!   order wins)
//! - tag names containing `/ \ , : * |` or a control character, or starting
//!   or ending with `.` (the tag is dropped, the document kept)

use chrono::{DateTime, NaiveDate, Utc};
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd, html as md_html};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::SiteConfig;

/// Characters that make a tag name unusable in output paths and manifests.
pub const FORBIDDEN_TAG_CHARS: &[char] = &['/', '\\', ',', ':', '*', '|', '\t'];

const FRONT_MATTER_FENCE: &str = "+++";

/// One parsed source document. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    /// `YYYYMMDD` derived from `date`.
    pub id: String,
    pub date: NaiveDate,
    pub modified_at: DateTime<Utc>,
    /// Sorted, deduplicated tag names.
    pub tags: Vec<String>,
    pub title: String,
    /// Rendered HTML.
    pub body: String,
    /// Source file, relative to the posts directory.
    pub source: PathBuf,
}

impl DocumentRecord {
    pub fn id_for(date: NaiveDate) -> String {
        date.format("%Y%m%d").to_string()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Newest first; ties broken by id, also descending.
pub fn sort_newest_first(documents: &mut [DocumentRecord]) {
    documents.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("posts directory not found: {0}")]
    MissingPostsDir(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A document (or tag) the loader skipped, and why.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadWarning {
    Unreadable { path: PathBuf, reason: String },
    TooLarge { path: PathBuf, size: u64, limit: u64 },
    BadFrontMatter { path: PathBuf, reason: String },
    MissingDate { path: PathBuf },
    BadDate { path: PathBuf, value: String },
    DuplicateId { path: PathBuf, id: String, kept: PathBuf },
    InvalidTag { path: PathBuf, tag: String },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::Unreadable { path, reason } => {
                write!(f, "{}: unreadable ({})", path.display(), reason)
            }
            LoadWarning::TooLarge { path, size, limit } => write!(
                f,
                "{}: {} bytes exceeds the {} byte limit",
                path.display(),
                size,
                limit
            ),
            LoadWarning::BadFrontMatter { path, reason } => {
                write!(f, "{}: bad front matter ({})", path.display(), reason)
            }
            LoadWarning::MissingDate { path } => write!(f, "{}: no date", path.display()),
            LoadWarning::BadDate { path, value } => {
                write!(f, "{}: invalid date '{}'", path.display(), value)
            }
            LoadWarning::DuplicateId { path, id, kept } => write!(
                f,
                "{}: date {} already used by {}",
                path.display(),
                id,
                kept.display()
            ),
            LoadWarning::InvalidTag { path, tag } => {
                write!(f, "{}: dropped invalid tag '{}'", path.display(), tag)
            }
        }
    }
}

/// Result of loading the posts directory.
#[derive(Debug, Default)]
pub struct LoadedDocuments {
    /// Sorted newest first.
    pub documents: Vec<DocumentRecord>,
    pub warnings: Vec<LoadWarning>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FrontMatter {
    title: Option<String>,
    date: Option<String>,
    tags: Vec<String>,
}

/// Load every `*.md` document under the configured posts directory.
pub fn load_documents(root: &Path, config: &SiteConfig) -> Result<LoadedDocuments, LoadError> {
    let posts_dir = config.posts_path(root);
    if !posts_dir.is_dir() {
        return Err(LoadError::MissingPostsDir(posts_dir));
    }

    let mut loaded = LoadedDocuments::default();
    let mut seen: HashMap<String, PathBuf> = HashMap::new();

    for entry in WalkDir::new(&posts_dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_markdown(path) {
            continue;
        }
        let relative = path.strip_prefix(&posts_dir).unwrap_or(path).to_path_buf();

        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(err) => {
                loaded.warnings.push(LoadWarning::Unreadable {
                    path: relative,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        if size > config.max_document_bytes {
            loaded.warnings.push(LoadWarning::TooLarge {
                path: relative,
                size,
                limit: config.max_document_bytes,
            });
            continue;
        }

        let (content, modified_at) = match read_source(path) {
            Ok(read) => read,
            Err(err) => {
                loaded.warnings.push(LoadWarning::Unreadable {
                    path: relative,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        match parse_document(&content, &relative, modified_at) {
            Ok((doc, tag_warnings)) => {
                if let Some(kept) = seen.get(&doc.id) {
                    loaded.warnings.push(LoadWarning::DuplicateId {
                        path: relative,
                        id: doc.id,
                        kept: kept.clone(),
                    });
                    continue;
                }
                loaded.warnings.extend(tag_warnings);
                seen.insert(doc.id.clone(), relative);
                loaded.documents.push(doc);
            }
            Err(warning) => loaded.warnings.push(warning),
        }
    }

    sort_newest_first(&mut loaded.documents);
    Ok(loaded)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

fn read_source(path: &Path) -> std::io::Result<(String, DateTime<Utc>)> {
    let content = fs::read_to_string(path)?;
    let modified = fs::metadata(path)?.modified()?;
    Ok((content, DateTime::<Utc>::from(modified)))
}

/// Parse one document's text. Returns the record plus warnings for any
/// dropped tags, or a warning explaining why the whole document is rejected.
pub fn parse_document(
    content: &str,
    source: &Path,
    modified_at: DateTime<Utc>,
) -> Result<(DocumentRecord, Vec<LoadWarning>), LoadWarning> {
    let (front, body) = split_front_matter(content);
    let front: FrontMatter = match front {
        Some(raw) => toml::from_str(raw).map_err(|err| LoadWarning::BadFrontMatter {
            path: source.to_path_buf(),
            reason: err.message().to_string(),
        })?,
        None => FrontMatter::default(),
    };

    let raw_date = front.date.ok_or_else(|| LoadWarning::MissingDate {
        path: source.to_path_buf(),
    })?;
    let date = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d").map_err(|_| {
        LoadWarning::BadDate {
            path: source.to_path_buf(),
            value: raw_date.clone(),
        }
    })?;
    let id = DocumentRecord::id_for(date);

    let (tags, invalid) = clean_tags(front.tags);
    let warnings = invalid
        .into_iter()
        .map(|tag| LoadWarning::InvalidTag {
            path: source.to_path_buf(),
            tag,
        })
        .collect();

    let title = front
        .title
        .filter(|t| !t.trim().is_empty())
        .or_else(|| first_heading(body))
        .unwrap_or_else(|| id.clone());

    Ok((
        DocumentRecord {
            id,
            date,
            modified_at,
            tags,
            title,
            body: render_markdown(body),
            source: source.to_path_buf(),
        },
        warnings,
    ))
}

/// Split `+++`-fenced front matter from the body. Text without an opening
/// fence on the first line, or without a closing fence, is all body.
fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let Some(rest) = content
        .strip_prefix(FRONT_MATTER_FENCE)
        .and_then(|r| r.strip_prefix("\r\n").or_else(|| r.strip_prefix('\n')))
    else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_FENCE {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }
    (None, content)
}

/// A tag becomes one path segment and one manifest field, so it may not
/// contain separators or control characters, nor start or end with a dot.
fn is_valid_tag(tag: &str) -> bool {
    !tag.contains(FORBIDDEN_TAG_CHARS)
        && !tag.chars().any(char::is_control)
        && !tag.starts_with('.')
        && !tag.ends_with('.')
}

/// Trim, drop empties, reject invalid names, sort, dedupe.
fn clean_tags(raw: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut tags = Vec::new();
    let mut invalid = Vec::new();
    for tag in raw {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_valid_tag(trimmed) {
            tags.push(trimmed.to_string());
        } else {
            invalid.push(trimmed.to_string());
        }
    }
    tags.sort();
    tags.dedup();
    (tags, invalid)
}

/// Text of the first level-1 heading.
fn first_heading(markdown: &str) -> Option<String> {
    let mut in_heading = false;
    let mut text = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => in_heading = true,
            Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_heading => {
                let title = text.trim().to_string();
                return (!title.is_empty()).then_some(title);
            }
            Event::Text(t) | Event::Code(t) if in_heading => text.push_str(&t),
            _ => {}
        }
    }
    None
}

fn render_markdown(markdown: &str) -> String {
    let mut html = String::new();
    md_html::push_html(&mut html, Parser::new(markdown));
    html
}
