//! Incremental rebuild planning.
//!
//! The planner walks every artifact family (home + archive, document
//! permalinks, tag pages, feed), decides per artifact whether it must be
//! rewritten, delegates writing to an [`ArtifactWriter`], and records every
//! live path in a fresh build manifest. Once all families are processed the
//! manifests are saved and artifacts that the previous run produced but this
//! run did not are deleted.
//!
//! # Rewrite rules
//!
//! An artifact is rewritten when any of these hold (checked in order, the
//! first match is reported as the [`RewriteReason`]):
//!
//! 1. **Forced** by its family:
//!    - archive pages at or after the first page whose membership changed, or
//!      all of them when the page count changed
//!    - tag pages when the tag is new or its id list differs in any way
//!    - document pages and the feed are never forced
//! 2. The config file or stylesheet changed since the previous run.
//! 3. The file is missing from the output directory.
//! 4. The previous manifest has no entry for the path.
//! 5. A document on the page was modified after the entry's timestamp.
//!
//! # Failures
//!
//! A failed write is logged and the run moves on. The path gets no manifest
//! entry, so the next run rewrites it, and it is exempt from this run's
//! orphan sweep so a stale file is never escalated into a deletion. Failed
//! deletions and manifest saves are logged and reported, never fatal.

use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::collection::Collection;
use crate::config::{self, ConfigError, SiteConfig};
use crate::document::{self, DocumentRecord, LoadError, LoadWarning};
use crate::manifest::{
    self, ALL_DOCUMENTS, BuildManifest, BuildManifestBuilder, TagManifest, TagManifestBuilder,
    Timestamp,
};
use crate::render::{ArtifactWriter, HtmlWriter, site_url};
use crate::types::{Artifact, ArtifactKind};

/// Why an artifact was rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteReason {
    Forced,
    ConfigModified,
    Missing,
    Untracked,
    DocumentModified,
}

impl fmt::Display for RewriteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RewriteReason::Forced => "membership changed",
            RewriteReason::ConfigModified => "config changed",
            RewriteReason::Missing => "missing on disk",
            RewriteReason::Untracked => "new",
            RewriteReason::DocumentModified => "document modified",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrittenArtifact {
    pub path: String,
    pub kind: ArtifactKind,
    pub reason: RewriteReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedPath {
    pub path: String,
    pub error: String,
}

/// What a run did, artifact by artifact.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub written: Vec<WrittenArtifact>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedPath>,
    pub deleted: Vec<String>,
    pub delete_failed: Vec<FailedPath>,
    pub manifest_errors: Vec<String>,
}

impl BuildReport {
    pub fn had_failures(&self) -> bool {
        !self.failed.is_empty() || !self.delete_failed.is_empty() || !self.manifest_errors.is_empty()
    }

    pub fn was_written(&self, path: &str) -> bool {
        self.written.iter().any(|w| w.path == path)
    }
}

/// Finalized state of a run.
#[derive(Debug)]
pub struct RunOutcome {
    pub manifest: BuildManifest,
    pub tag_manifest: TagManifest,
    pub report: BuildReport,
}

pub struct RebuildPlanner<'a, W: ArtifactWriter> {
    config: &'a SiteConfig,
    output_dir: PathBuf,
    store_dir: Option<PathBuf>,
    writer: W,
    previous: BuildManifest,
    previous_tags: TagManifest,
    manifest: BuildManifestBuilder,
    tag_manifest: TagManifestBuilder,
    now: Timestamp,
    config_modified: bool,
    failed_paths: HashSet<String>,
    report: BuildReport,
}

impl<'a, W: ArtifactWriter> RebuildPlanner<'a, W> {
    /// A planner with no previous state, stamping entries with the current time.
    pub fn new(config: &'a SiteConfig, output_dir: impl Into<PathBuf>, writer: W) -> Self {
        Self {
            config,
            output_dir: output_dir.into(),
            store_dir: None,
            writer,
            previous: BuildManifest::empty(),
            previous_tags: TagManifest::empty(),
            manifest: BuildManifestBuilder::new(),
            tag_manifest: TagManifestBuilder::new(),
            now: Utc::now().timestamp(),
            config_modified: false,
            failed_paths: HashSet::new(),
            report: BuildReport::default(),
        }
    }

    pub fn with_previous(mut self, manifest: BuildManifest, tags: TagManifest) -> Self {
        self.previous = manifest;
        self.previous_tags = tags;
        self
    }

    /// Persist both manifests into `store_dir` at the end of the run.
    pub fn store_in(mut self, store_dir: impl Into<PathBuf>) -> Self {
        self.store_dir = Some(store_dir.into());
        self
    }

    pub fn config_modified(mut self, modified: bool) -> Self {
        self.config_modified = modified;
        self
    }

    pub fn run_started(mut self, now: Timestamp) -> Self {
        self.now = now;
        self
    }

    /// Process every artifact family, persist manifests, sweep orphans.
    pub fn run(mut self, documents: &[DocumentRecord]) -> RunOutcome {
        let collection = Collection::new(documents, self.config.page_size);

        self.plan_archive(&collection);
        self.plan_documents(&collection);
        self.plan_tags(&collection);
        self.plan_feed(&collection);

        let build_manifest = self.manifest.finish();
        let tag_manifest = self.tag_manifest.finish();

        if let Some(store_dir) = &self.store_dir {
            let build_path = manifest::build_manifest_path(store_dir);
            let tag_path = manifest::tag_manifest_path(store_dir);
            let saves = [
                (&build_path, build_manifest.save(&build_path)),
                (&tag_path, tag_manifest.save(&tag_path)),
            ];
            for (path, result) in saves {
                if let Err(err) = result {
                    error!(path = %path.display(), %err, "failed to save manifest");
                    self.report
                        .manifest_errors
                        .push(format!("{}: {}", path.display(), err));
                }
            }
        }

        let mut report = self.report;
        sweep_orphans(
            &self.previous,
            &build_manifest,
            &self.failed_paths,
            &self.output_dir,
            &mut report,
        );

        RunOutcome {
            manifest: build_manifest,
            tag_manifest,
            report,
        }
    }

    fn link(&self, path: &str) -> String {
        site_url(&self.config.base_url, path)
    }

    /// Home page plus archive pages 2..n.
    fn plan_archive(&mut self, collection: &Collection<'_>) {
        let config = self.config;
        let paths = &config.paths;
        let previous_ids = self.previous_tags.all_documents();

        // With nothing before and nothing now, the "no change" sentinel would
        // land on page 1, which the home page always occupies.
        let first_changed = if collection.is_empty() && previous_ids.is_empty() {
            usize::MAX
        } else {
            collection.first_changed_page(previous_ids)
        };

        let page_count = collection.page_count().max(1);
        let previous_count = self
            .previous
            .paths()
            .filter(|p| paths.archive_page_number(p).is_some())
            .count();
        let count_changed = previous_count != page_count;
        debug!(first_changed, page_count, previous_count, "archive membership");

        for number in 1..=page_count {
            let path = paths.archive_page(number);
            let pages = collection.page_range(number, |n| self.link(&paths.archive_page(n)));
            let title = if number == 1 {
                config.title.clone()
            } else {
                format!("Page {number}")
            };
            let artifact = Artifact {
                path: &path,
                kind: if number == 1 {
                    ArtifactKind::Home
                } else {
                    ArtifactKind::Archive
                },
                section: "Archive",
                title: &title,
                documents: collection.page(number),
                pages: &pages,
            };
            let forced = number >= first_changed || count_changed;
            self.consider(&artifact, forced);
        }

        self.tag_manifest.record(ALL_DOCUMENTS, collection.ids());
    }

    fn plan_documents(&mut self, collection: &Collection<'_>) {
        let config = self.config;
        for doc in collection.documents() {
            let single = collection.only_id(&doc.id);
            let path = config.paths.document_page(&doc.id);
            let pages = single.page_range(1, |_| self.link(&path));
            let artifact = Artifact {
                path: &path,
                kind: ArtifactKind::Document,
                section: "Document",
                title: &doc.title,
                documents: single.page(1),
                pages: &pages,
            };
            self.consider(&artifact, false);
        }
    }

    fn plan_tags(&mut self, collection: &Collection<'_>) {
        let config = self.config;
        let paths = &config.paths;
        for tag in collection.tag_set() {
            let tagged = collection.with_tag(tag);
            let ids = tagged.ids();
            let forced = self.previous_tags.ids(tag) != Some(ids.as_slice());
            if forced {
                debug!(tag, "tag membership changed");
            }

            for number in 1..=tagged.page_count() {
                let path = paths.tag_page(tag, number);
                let pages = tagged.page_range(number, |n| self.link(&paths.tag_page(tag, n)));
                let title = format!("Tagged {tag}");
                let artifact = Artifact {
                    path: &path,
                    kind: ArtifactKind::Tag,
                    section: tag,
                    title: &title,
                    documents: tagged.page(number),
                    pages: &pages,
                };
                self.consider(&artifact, forced);
            }
            self.tag_manifest.record(tag, ids);
        }

        let current: HashSet<&str> = collection.tag_set().into_iter().collect();
        for tag in self.previous_tags.tags() {
            if !current.contains(tag) {
                debug!(tag, "tag no longer used");
            }
        }
    }

    fn plan_feed(&mut self, collection: &Collection<'_>) {
        let config = self.config;
        if config.rss_post_count == 0 {
            return;
        }
        let artifact = Artifact {
            path: &config.paths.feed,
            kind: ArtifactKind::Feed,
            section: "Feed",
            title: &config.title,
            documents: collection.newest(config.rss_post_count),
            pages: &[],
        };
        self.consider(&artifact, false);
    }

    /// Decide, write if needed, and record the outcome.
    fn consider(&mut self, artifact: &Artifact<'_>, forced: bool) {
        let path = artifact.path;
        if !is_plain_relative(path) {
            error!(path, "artifact path leaves its directory");
            self.failed_paths.insert(path.to_string());
            self.report.failed.push(FailedPath {
                path: path.to_string(),
                error: "path leaves its directory".to_string(),
            });
            return;
        }
        let Some(reason) = self.rewrite_reason(artifact, forced) else {
            debug!(path, "up to date");
            self.manifest.record(path, self.now);
            self.report.skipped.push(path.to_string());
            return;
        };

        match self.writer.write(artifact) {
            Ok(()) => {
                info!(path, %reason, "wrote");
                self.manifest.record(path, self.now);
                self.report.written.push(WrittenArtifact {
                    path: path.to_string(),
                    kind: artifact.kind,
                    reason,
                });
            }
            Err(err) => {
                error!(path, %err, "failed to write artifact");
                self.failed_paths.insert(path.to_string());
                self.report.failed.push(FailedPath {
                    path: path.to_string(),
                    error: err.to_string(),
                });
            }
        }
    }

    fn rewrite_reason(&self, artifact: &Artifact<'_>, forced: bool) -> Option<RewriteReason> {
        if forced {
            return Some(RewriteReason::Forced);
        }
        if self.config_modified {
            return Some(RewriteReason::ConfigModified);
        }
        if !self.output_dir.join(artifact.path).exists() {
            return Some(RewriteReason::Missing);
        }
        let Some(written_at) = self.previous.written_at(artifact.path) else {
            return Some(RewriteReason::Untracked);
        };
        artifact
            .documents
            .iter()
            .any(|d| d.modified_at.timestamp() > written_at)
            .then_some(RewriteReason::DocumentModified)
    }
}

/// Delete artifacts the previous run produced that this run did not.
///
/// Paths whose write failed this run are left alone. Only plain relative
/// paths are deleted, so a tampered manifest cannot reach outside the output
/// directory. Emptied parent directories are removed up to `output_dir`.
pub fn sweep_orphans(
    previous: &BuildManifest,
    current: &BuildManifest,
    failed: &HashSet<String>,
    output_dir: &Path,
    report: &mut BuildReport,
) {
    for path in previous.paths() {
        if current.contains(path) || failed.contains(path) {
            continue;
        }
        if !is_plain_relative(path) {
            warn!(path, "refusing to delete path outside the output directory");
            continue;
        }
        let full = output_dir.join(path);
        if !full.exists() {
            debug!(path, "orphan already gone");
            continue;
        }
        match fs::remove_file(&full) {
            Ok(()) => {
                info!(path, "deleted orphan");
                report.deleted.push(path.to_string());
                remove_empty_parents(&full, output_dir);
            }
            Err(err) => {
                error!(path, %err, "failed to delete orphan");
                report.delete_failed.push(FailedPath {
                    path: path.to_string(),
                    error: err.to_string(),
                });
            }
        }
    }
}

fn is_plain_relative(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

fn remove_empty_parents(file: &Path, output_dir: &Path) {
    let mut dir = file.parent();
    while let Some(current) = dir {
        if current == output_dir || !current.starts_with(output_dir) {
            break;
        }
        // remove_dir fails on non-empty directories, which ends the walk.
        if fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}

// =============================================================================
// Site build entry point
// =============================================================================

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}

#[derive(Debug, Default, Clone)]
pub struct BuildOptions {
    /// Rewrite every artifact, as if the config had changed.
    pub force: bool,
}

/// Result of [`build_site`].
#[derive(Debug)]
pub struct SiteBuild {
    pub config: SiteConfig,
    pub document_count: usize,
    pub warnings: Vec<LoadWarning>,
    pub outcome: RunOutcome,
}

/// Load config, documents, and previous manifests for `root`, then run the
/// planner with the HTML writer.
pub fn build_site(root: &Path, options: &BuildOptions) -> Result<SiteBuild, BuildError> {
    let config = config::load_config(root)?;
    let loaded = document::load_documents(root, &config)?;
    for warning in &loaded.warnings {
        warn!(%warning, "skipped while loading");
    }

    let store_dir = config.store_path(root);
    let previous = BuildManifest::load(&manifest::build_manifest_path(&store_dir));
    let previous_tags = TagManifest::load(&manifest::tag_manifest_path(&store_dir));
    let config_modified =
        options.force || config::config_or_template_modified(root, &config, previous.last_run());

    let writer = HtmlWriter::for_site(root, &config);
    let outcome = RebuildPlanner::new(&config, config.output_path(root), writer)
        .with_previous(previous, previous_tags)
        .config_modified(config_modified)
        .store_in(store_dir)
        .run(&loaded.documents);

    Ok(SiteBuild {
        document_count: loaded.documents.len(),
        warnings: loaded.warnings,
        outcome,
        config,
    })
}
