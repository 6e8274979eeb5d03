//! Artifact rendering and writing.
//!
//! The planner decides *whether* an artifact is rewritten; an
//! [`ArtifactWriter`] decides *how*. [`HtmlWriter`] is the production writer:
//! HTML pages via [maud](https://maud.lambda.xyz/) and an RSS 2.0 feed.
//!
//! ## Generated Pages
//!
//! - **Home / archive pages**: newest-first document listing with pagination
//! - **Document pages**: one document in full
//! - **Tag pages**: listing of documents carrying one tag, paginated
//! - **Feed**: the newest documents as RSS items
//!
//! ## Output Structure (default paths)
//!
//! ```text
//! public/
//! ├── index.html                  # Archive page 1
//! ├── page/2/index.html           # Archive page 2
//! ├── 20220305/index.html         # Document permalink
//! ├── tag/rust/index.html         # Tag page 1
//! ├── tag/rust/page/2/index.html  # Tag page 2
//! └── feed.xml
//! ```
//!
//! The user stylesheet, when present, is inlined into every page.

use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::SiteConfig;
use crate::document::DocumentRecord;
use crate::types::{Artifact, ArtifactKind, PageLink};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders an artifact and writes it below the output directory.
pub trait ArtifactWriter {
    fn write(&mut self, artifact: &Artifact<'_>) -> Result<(), RenderError>;
}

impl<W: ArtifactWriter + ?Sized> ArtifactWriter for &mut W {
    fn write(&mut self, artifact: &Artifact<'_>) -> Result<(), RenderError> {
        (**self).write(artifact)
    }
}

/// Writes HTML pages and the RSS feed for a site.
pub struct HtmlWriter {
    output_dir: PathBuf,
    site: SiteLabels,
    css: String,
}

/// Site-wide strings every page needs.
#[derive(Debug, Clone)]
struct SiteLabels {
    title: String,
    description: String,
    base_url: String,
    author: String,
    home: String,
    feed: Option<String>,
    tag_link: String,
    document_link: String,
}

impl HtmlWriter {
    pub fn new(output_dir: impl Into<PathBuf>, config: &SiteConfig, css: String) -> Self {
        Self {
            output_dir: output_dir.into(),
            site: SiteLabels {
                title: config.title.clone(),
                description: config.description.clone(),
                base_url: config.base_url.clone(),
                author: config.author.clone(),
                home: config.paths.home.clone(),
                feed: (config.rss_post_count > 0).then(|| config.paths.feed.clone()),
                tag_link: config.paths.tag.clone(),
                document_link: config.paths.document.clone(),
            },
            css,
        }
    }

    /// Build a writer, inlining the configured stylesheet if it exists.
    pub fn for_site(root: &Path, config: &SiteConfig) -> Self {
        let css = config
            .stylesheet_path(root)
            .and_then(|path| fs::read_to_string(path).ok())
            .unwrap_or_default();
        Self::new(config.output_path(root), config, css)
    }

    fn render(&self, artifact: &Artifact<'_>) -> String {
        match artifact.kind {
            ArtifactKind::Home | ArtifactKind::Archive | ArtifactKind::Tag => {
                self.render_listing(artifact).into_string()
            }
            ArtifactKind::Document => self.render_document(artifact).into_string(),
            ArtifactKind::Feed => self.render_feed(artifact).into_string(),
        }
    }
}

impl ArtifactWriter for HtmlWriter {
    fn write(&mut self, artifact: &Artifact<'_>) -> Result<(), RenderError> {
        let path = self.output_dir.join(artifact.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.render(artifact))?;
        Ok(())
    }
}

/// Join the site base URL and an output path, dropping a trailing
/// `index.html` so links point at directories.
pub(crate) fn site_url(base_url: &str, path: &str) -> String {
    let path = path.strip_suffix("index.html").unwrap_or(path);
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

fn format_date(doc: &DocumentRecord) -> String {
    doc.date.format("%B %-d, %Y").to_string()
}

// ============================================================================
// HTML Components
// ============================================================================

impl HtmlWriter {
    fn document_url(&self, doc: &DocumentRecord) -> String {
        site_url(
            &self.site.base_url,
            &self.site.document_link.replace("{id}", &doc.id),
        )
    }

    fn tag_url(&self, tag: &str) -> String {
        site_url(&self.site.base_url, &self.site.tag_link.replace("{tag}", tag))
    }

    /// Renders the base HTML document structure
    fn base_document(&self, title: &str, content: Markup) -> Markup {
        let full_title = if title.is_empty() || title == self.site.title {
            self.site.title.clone()
        } else {
            format!("{} - {}", title, self.site.title)
        };
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="UTF-8";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                    title { (full_title) }
                    @if let Some(feed) = &self.site.feed {
                        link rel="alternate" type="application/rss+xml" title=(self.site.title)
                            href=(site_url(&self.site.base_url, feed));
                    }
                    @if !self.css.is_empty() {
                        style { (PreEscaped(&self.css)) }
                    }
                }
                body {
                    header.site-header {
                        a.site-title href=(site_url(&self.site.base_url, &self.site.home)) {
                            (self.site.title)
                        }
                    }
                    (content)
                    @if !self.site.author.is_empty() {
                        footer.site-footer { "© " (self.site.author) }
                    }
                }
            }
        }
    }

    fn tag_list(&self, tags: &[String]) -> Markup {
        html! {
            @if !tags.is_empty() {
                ul.tags {
                    @for tag in tags {
                        li { a href=(self.tag_url(tag)) { (tag) } }
                    }
                }
            }
        }
    }

    fn pagination(pages: &[PageLink]) -> Markup {
        html! {
            @if pages.len() > 1 {
                nav.pagination {
                    @for page in pages {
                        @if page.is_current {
                            span.current { (page.number) }
                        } @else {
                            a href=(page.link) { (page.number) }
                        }
                    }
                }
            }
        }
    }

    /// Renders a summary entry for listings
    fn entry(&self, doc: &DocumentRecord) -> Markup {
        html! {
            article.entry {
                h2 { a href=(self.document_url(doc)) { (doc.title) } }
                time datetime=(doc.date.to_string()) { (format_date(doc)) }
                div.entry-body { (PreEscaped(&doc.body)) }
                (self.tag_list(&doc.tags))
            }
        }
    }

    // ========================================================================
    // Page Renderers
    // ========================================================================

    /// Renders home, archive, and tag listings
    fn render_listing(&self, artifact: &Artifact<'_>) -> Markup {
        let content = html! {
            main.listing {
                @if artifact.kind == ArtifactKind::Tag {
                    h1 { "Tagged " (artifact.section) }
                }
                @if artifact.documents.is_empty() {
                    p.empty { "Nothing here yet." }
                }
                @for doc in artifact.documents {
                    (self.entry(doc))
                }
                (Self::pagination(artifact.pages))
            }
        };
        self.base_document(artifact.title, content)
    }

    /// Renders a single document permalink page
    fn render_document(&self, artifact: &Artifact<'_>) -> Markup {
        let content = html! {
            main.document {
                @for doc in artifact.documents {
                    article {
                        h1 { (doc.title) }
                        time datetime=(doc.date.to_string()) { (format_date(doc)) }
                        div.document-body { (PreEscaped(&doc.body)) }
                        (self.tag_list(&doc.tags))
                    }
                }
            }
        };
        self.base_document(artifact.title, content)
    }

    /// Renders the RSS 2.0 feed
    fn render_feed(&self, artifact: &Artifact<'_>) -> Markup {
        let home = site_url(&self.site.base_url, &self.site.home);
        html! {
            (PreEscaped("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"))
            rss version="2.0" {
                channel {
                    title { (self.site.title) }
                    link { (home) }
                    description { (self.site.description) }
                    @for doc in artifact.documents {
                        @let url = self.document_url(doc);
                        item {
                            title { (doc.title) }
                            link { (url) }
                            guid { (url) }
                            pubDate { (doc.date.format("%a, %d %b %Y 00:00:00 +0000").to_string()) }
                            description { (doc.body) }
                        }
                    }
                }
            }
        }
    }
}
