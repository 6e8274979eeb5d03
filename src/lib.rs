//! # Rambler
//!
//! A blog compiler with incremental rebuilds. Markdown posts with TOML front
//! matter go in, a static site comes out: a paginated archive starting at the
//! home page, one permalink page per post, paginated per-tag listings, and an
//! RSS feed.
//!
//! # Architecture: Load, Plan, Write
//!
//! ```text
//! 1. Load    posts/        →  Vec<DocumentRecord>   (front matter + markdown)
//! 2. Plan    documents     →  rewrite decisions     (manifests from the last run)
//! 3. Write   decisions     →  public/               (maud templates, orphan sweep)
//! ```
//!
//! Every run leaves two manifests behind in the store directory: the build
//! manifest (each output path with the time it was last written) and the tag
//! manifest (each tag's document ids, newest first). The next run compares the
//! current corpus against them to decide which pages are stale. A run that
//! follows an unchanged run writes nothing.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`document`] | Walks the posts directory, parses front matter, renders markdown |
//! | [`collection`] | Newest-first paginated views, tag filtering, first-changed-page detection |
//! | [`manifest`] | Build and tag manifests: line-based load, save, lookup |
//! | [`planner`] | Rewrite decisions per artifact family, manifest bookkeeping, orphan sweep |
//! | [`render`] | The [`render::ArtifactWriter`] seam and its Maud-backed HTML implementation |
//! | [`config`] | `config.toml` loading, validation, merging, path templates |
//! | [`types`] | Artifact descriptors shared by the planner and writers |
//! | [`output`] | CLI output formatting for build and check |
//!
//! # Design Decisions
//!
//! ## Page Membership Drives Rewrites
//!
//! A new or deleted post shifts every older post by one slot, so archive and
//! tag pages are compared by membership rather than by file times. For the
//! archive only the pages from the first changed one onwards are rewritten;
//! tag pages are cheap and few, so any change to a tag's id list rewrites all
//! of that tag's pages.
//!
//! ## Writers Behind a Trait
//!
//! The planner never formats HTML. It hands an [`types::Artifact`] to an
//! [`render::ArtifactWriter`], which lets tests record decisions without
//! touching templates and keeps the rewrite rules in one place.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/): malformed markup is
//! a compile error, interpolation is escaped by default, and there is no
//! template directory to ship. The stylesheet is the only external template
//! input, and a change to it rewrites the whole site.
//!
//! ## Plain-Text Manifests
//!
//! Manifests are tab-separated lines, sorted, and saved atomically. They can be
//! read and diffed by hand, and a corrupt or missing manifest only costs a full
//! rebuild.

pub mod collection;
pub mod config;
pub mod document;
pub mod manifest;
pub mod output;
pub mod planner;
pub mod render;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
