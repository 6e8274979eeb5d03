//! Site configuration module.
//!
//! Handles loading, validating, and merging the site's `config.toml`. Stock
//! defaults are the base layer; the user's file overrides any subset of them.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! title = "Rambler"
//! description = ""
//! base_url = "/"
//! author = ""
//!
//! posts_dir = "posts"        # Source documents, walked recursively
//! output_dir = "public"      # Generated site
//! store_dir = ".rambler"     # Build and tag manifests
//! stylesheet = "style.css"   # Inlined into every page when present
//!
//! page_size = 10             # Documents per archive/tag page
//! rss_post_count = 10        # Feed length (0 disables the feed)
//! max_document_bytes = 1048576
//!
//! [paths]
//! home = "index.html"
//! archive = "page/{page}/index.html"
//! document = "{id}/index.html"
//! tag = "tag/{tag}/index.html"
//! tag_archive = "tag/{tag}/page/{page}/index.html"
//! feed = "feed.xml"
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! ## Change Detection
//!
//! Editing `config.toml` or the stylesheet can change every page, so
//! [`config_or_template_modified`] reports whether either file is newer than
//! the previous run. The planner then rewrites everything.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::manifest::Timestamp;

/// Name of the configuration file in the site root.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Site title, shown in page headers and the feed channel.
    pub title: String,
    /// One-line site description used by the feed channel.
    pub description: String,
    /// Absolute URL prefix for links in pages and the feed.
    pub base_url: String,
    /// Author name, shown in page footers.
    pub author: String,
    /// Directory holding source documents, relative to the site root.
    pub posts_dir: String,
    /// Directory receiving generated artifacts, relative to the site root.
    pub output_dir: String,
    /// Directory holding the build and tag manifests, relative to the site root.
    pub store_dir: String,
    /// Optional stylesheet inlined into every page, relative to the site root.
    pub stylesheet: String,
    /// Documents per archive or tag page.
    pub page_size: usize,
    /// Number of newest documents in the feed. Zero disables the feed.
    pub rss_post_count: usize,
    /// Documents larger than this are skipped by the loader.
    pub max_document_bytes: u64,
    /// Output path templates for every artifact family.
    pub paths: PathsConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Rambler".to_string(),
            description: String::new(),
            base_url: "/".to_string(),
            author: String::new(),
            posts_dir: "posts".to_string(),
            output_dir: "public".to_string(),
            store_dir: ".rambler".to_string(),
            stylesheet: "style.css".to_string(),
            page_size: 10,
            rss_post_count: 10,
            max_document_bytes: 1024 * 1024,
            paths: PathsConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Validation("page_size must be at least 1".into()));
        }
        if self.max_document_bytes == 0 {
            return Err(ConfigError::Validation(
                "max_document_bytes must be at least 1".into(),
            ));
        }
        for (key, dir) in [
            ("posts_dir", &self.posts_dir),
            ("output_dir", &self.output_dir),
            ("store_dir", &self.store_dir),
        ] {
            if dir.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        self.paths.validate()
    }

    pub fn posts_path(&self, root: &Path) -> PathBuf {
        root.join(&self.posts_dir)
    }

    pub fn output_path(&self, root: &Path) -> PathBuf {
        root.join(&self.output_dir)
    }

    pub fn store_path(&self, root: &Path) -> PathBuf {
        root.join(&self.store_dir)
    }

    /// Stylesheet location, or `None` when the option is blank.
    pub fn stylesheet_path(&self, root: &Path) -> Option<PathBuf> {
        if self.stylesheet.trim().is_empty() {
            None
        } else {
            Some(root.join(&self.stylesheet))
        }
    }
}

/// Output path templates.
///
/// Placeholders: `{page}` (1-based page number), `{id}` (document id),
/// `{tag}` (tag name). Page 1 of the archive is the home page; page 1 of a
/// tag uses `tag`, later pages use `tag_archive`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub home: String,
    pub archive: String,
    pub document: String,
    pub tag: String,
    pub tag_archive: String,
    pub feed: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            home: "index.html".to_string(),
            archive: "page/{page}/index.html".to_string(),
            document: "{id}/index.html".to_string(),
            tag: "tag/{tag}/index.html".to_string(),
            tag_archive: "tag/{tag}/page/{page}/index.html".to_string(),
            feed: "feed.xml".to_string(),
        }
    }
}

impl PathsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let templates = [
            ("paths.home", &self.home, &[][..]),
            ("paths.archive", &self.archive, &["{page}"][..]),
            ("paths.document", &self.document, &["{id}"][..]),
            ("paths.tag", &self.tag, &["{tag}"][..]),
            ("paths.tag_archive", &self.tag_archive, &["{tag}", "{page}"][..]),
            ("paths.feed", &self.feed, &[][..]),
        ];
        for (key, template, required) in templates {
            if template.is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
            let is_relative = Path::new(template.as_str())
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
            if !is_relative {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a relative path without '..': {template}"
                )));
            }
            for placeholder in required {
                if !template.contains(placeholder) {
                    return Err(ConfigError::Validation(format!(
                        "{key} must contain {placeholder}"
                    )));
                }
            }
        }

        // Archive pages are counted by matching the previous run's paths
        // against the archive template, so no other family may match it.
        // Ids and page numbers are both digits, so probe with digit values.
        let others = [
            self.document_page("20220301"),
            self.tag_page("1", 1),
            self.tag_page("1", 2),
            self.feed.clone(),
        ];
        if let Some(clash) = others.iter().find(|p| self.archive_page_number(p).is_some()) {
            return Err(ConfigError::Validation(format!(
                "paths.archive ({}) also matches {clash}",
                self.archive
            )));
        }
        Ok(())
    }

    /// Path of archive page `page`; page 1 is the home page.
    pub fn archive_page(&self, page: usize) -> String {
        if page <= 1 {
            self.home.clone()
        } else {
            self.archive.replace("{page}", &page.to_string())
        }
    }

    /// Recover the page number from an archive path, if it matches the
    /// archive template. The home path counts as page 1.
    pub fn archive_page_number(&self, path: &str) -> Option<usize> {
        if path == self.home {
            return Some(1);
        }
        let (prefix, suffix) = self.archive.split_once("{page}")?;
        let number = path.strip_prefix(prefix)?.strip_suffix(suffix)?;
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        number.parse().ok()
    }

    pub fn document_page(&self, id: &str) -> String {
        self.document.replace("{id}", id)
    }

    pub fn tag_page(&self, tag: &str, page: usize) -> String {
        if page <= 1 {
            self.tag.replace("{tag}", tag)
        } else {
            self.tag_archive
                .replace("{tag}", tag)
                .replace("{page}", &page.to_string())
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from the site root as a raw TOML value.
///
/// Returns `Ok(None)` if no config file exists.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config from the site root.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let merged = match load_raw_config(root)? {
        Some(overlay) => merge_toml(stock_defaults_value(), overlay),
        None => stock_defaults_value(),
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Whether the config file or the stylesheet changed since the previous run.
///
/// `last_run` is the newest timestamp in the previous build manifest; `None`
/// means there was no previous run, which counts as modified. Files that do
/// not exist count as unmodified.
pub fn config_or_template_modified(
    root: &Path,
    config: &SiteConfig,
    last_run: Option<Timestamp>,
) -> bool {
    let Some(last_run) = last_run else {
        return true;
    };
    let mut inputs = vec![root.join(CONFIG_FILENAME)];
    inputs.extend(config.stylesheet_path(root));
    inputs
        .iter()
        .filter_map(|path| modified_timestamp(path))
        .any(|modified| modified > last_run)
}

fn modified_timestamp(path: &Path) -> Option<Timestamp> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(chrono::DateTime::<chrono::Utc>::from(modified).timestamp())
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Rambler Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Site title, shown in page headers and the feed.
title = "Rambler"

# Short description used by the feed channel.
description = ""

# URL prefix for links in pages and the feed, e.g. "https://example.com/".
base_url = "/"

# Author name shown in page footers.
author = ""

# ---------------------------------------------------------------------------
# Directories (relative to the site root)
# ---------------------------------------------------------------------------
# Source documents: *.md files with +++ TOML front matter.
posts_dir = "posts"

# Generated site.
output_dir = "public"

# Build and tag manifests used for incremental rebuilds.
store_dir = ".rambler"

# Stylesheet inlined into every page (ignored when the file is missing).
stylesheet = "style.css"

# ---------------------------------------------------------------------------
# Pagination and limits
# ---------------------------------------------------------------------------
# Documents per archive or tag page.
page_size = 10

# Number of newest documents in the feed. 0 disables the feed.
rss_post_count = 10

# Documents larger than this many bytes are skipped.
max_document_bytes = 1048576

# ---------------------------------------------------------------------------
# Output paths
# ---------------------------------------------------------------------------
# Placeholders: {page} page number, {id} document id (YYYYMMDD), {tag} tag.
[paths]
home = "index.html"
archive = "page/{page}/index.html"
document = "{id}/index.html"
tag = "tag/{tag}/index.html"
tag_archive = "tag/{tag}/page/{page}/index.html"
feed = "feed.xml"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = SiteConfig::default();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.rss_post_count, 10);
        assert_eq!(config.posts_dir, "posts");
        assert_eq!(config.paths.home, "index.html");
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(SiteConfig::default().validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let config: SiteConfig = toml::from_str("page_size = 4").unwrap();
        assert_eq!(config.page_size, 4);
        assert_eq!(config.title, "Rambler");
        assert_eq!(config.paths.feed, "feed.xml");
    }

    #[test]
    fn archive_template_overlapping_documents_rejected() {
        let config: SiteConfig = toml::from_str("[paths]\narchive = \"{page}/index.html\"").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("20220301/index.html"));
    }

    #[test]
    fn archive_template_overlapping_tags_or_feed_rejected() {
        let config: SiteConfig =
            toml::from_str("[paths]\narchive = \"tag/{page}/index.html\"").unwrap();
        assert!(config.validate().is_err());

        let config: SiteConfig = toml::from_str(
            "[paths]\narchive = \"feed{page}.xml\"\nfeed = \"feed2.xml\"",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn distinct_archive_prefix_accepted() {
        let config: SiteConfig =
            toml::from_str("[paths]\narchive = \"archive/{page}.html\"\ndocument = \"{id}.html\"")
                .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn load_config_merges_nested_tables() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "title = \"Notes\"\n[paths]\nfeed = \"rss.xml\"\n",
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.title, "Notes");
        assert_eq!(config.paths.feed, "rss.xml");
        assert_eq!(config.paths.home, "index.html");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "page_size = [").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "pagesize = 3").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    #[test]
    fn zero_page_size_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "page_size = 0").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn archive_template_without_placeholder_rejected() {
        let mut config = SiteConfig::default();
        config.paths.archive = "archive.html".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn absolute_or_parent_paths_rejected() {
        let mut config = SiteConfig::default();
        config.paths.feed = "/etc/feed.xml".into();
        assert!(config.validate().is_err());

        let mut config = SiteConfig::default();
        config.paths.document = "../{id}.html".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn archive_page_one_is_home() {
        let paths = PathsConfig::default();
        assert_eq!(paths.archive_page(1), "index.html");
        assert_eq!(paths.archive_page(3), "page/3/index.html");
    }

    #[test]
    fn archive_page_number_recovers_pages() {
        let paths = PathsConfig::default();
        assert_eq!(paths.archive_page_number("index.html"), Some(1));
        assert_eq!(paths.archive_page_number("page/3/index.html"), Some(3));
        assert_eq!(paths.archive_page_number("page/x/index.html"), None);
        assert_eq!(paths.archive_page_number("page//index.html"), None);
        assert_eq!(paths.archive_page_number("tag/rust/index.html"), None);
    }

    #[test]
    fn tag_pages_use_both_templates() {
        let paths = PathsConfig::default();
        assert_eq!(paths.tag_page("rust", 1), "tag/rust/index.html");
        assert_eq!(paths.tag_page("rust", 2), "tag/rust/page/2/index.html");
        assert_eq!(paths.document_page("20220301"), "20220301/index.html");
    }

    #[test]
    fn modified_without_previous_run() {
        let tmp = TempDir::new().unwrap();
        assert!(config_or_template_modified(
            tmp.path(),
            &SiteConfig::default(),
            None
        ));
    }

    #[test]
    fn config_newer_than_last_run_is_modified() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "").unwrap();
        let config = SiteConfig::default();
        assert!(config_or_template_modified(tmp.path(), &config, Some(0)));
        assert!(!config_or_template_modified(
            tmp.path(),
            &config,
            Some(i64::MAX)
        ));
    }

    #[test]
    fn missing_inputs_are_unmodified() {
        let tmp = TempDir::new().unwrap();
        assert!(!config_or_template_modified(
            tmp.path(),
            &SiteConfig::default(),
            Some(0)
        ));
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let parsed: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(parsed.page_size, defaults.page_size);
        assert_eq!(parsed.paths.tag_archive, defaults.paths.tag_archive);
        assert_eq!(parsed.max_document_bytes, defaults.max_document_bytes);
        assert!(parsed.validate().is_ok());
    }
}
