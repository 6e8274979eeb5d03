//! CLI output formatting for the `build` and `check` commands.
//!
//! # Information-First Display
//!
//! Each entity (document, artifact) leads with its positional index and
//! identity; file paths and reasons are shown as indented context. Sections
//! are only printed when they have entries, so a no-op rebuild prints just
//! the summary line.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Written
//! 001 index.html (home, membership changed)
//! 002 20220305/index.html (document, new)
//!
//! Deleted
//!     page/3/index.html
//!
//! Failed
//!     tag/rust/index.html: permission denied
//!
//! Wrote 2, skipped 14, deleted 1, failed 1 (5 documents)
//! ```
//!
//! ## Check
//!
//! ```text
//! Documents
//! 001 Hello again (2022-03-05)
//!     Source: posts/hello-again.md
//!     Tags: ruby, rust
//!
//! Tags
//!     ruby (1 post)
//!     rust (2 posts)
//!
//! Warnings
//!     posts/draft.md: no date
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use std::collections::BTreeMap;

use crate::document::{LoadWarning, LoadedDocuments};
use crate::planner::{BuildReport, SiteBuild};

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

/// Append a titled section, preceded by a blank line unless it is first.
fn push_section(lines: &mut Vec<String>, title: &str, body: Vec<String>) {
    if body.is_empty() {
        return;
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(title.to_string());
    lines.extend(body);
}

fn warning_lines(warnings: &[LoadWarning]) -> Vec<String> {
    warnings
        .iter()
        .map(|w| format!("{}{}", indent(1), w))
        .collect()
}

// ============================================================================
// Build output
// ============================================================================

/// Format the per-artifact results of a run followed by a summary line.
pub fn format_report(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();

    let written = report
        .written
        .iter()
        .enumerate()
        .map(|(i, w)| {
            format!(
                "{} {} ({}, {})",
                format_index(i + 1),
                w.path,
                w.kind,
                w.reason
            )
        })
        .collect();
    push_section(&mut lines, "Written", written);

    let deleted = report
        .deleted
        .iter()
        .map(|p| format!("{}{}", indent(1), p))
        .collect();
    push_section(&mut lines, "Deleted", deleted);

    let failed = report
        .failed
        .iter()
        .chain(&report.delete_failed)
        .map(|f| format!("{}{}: {}", indent(1), f.path, f.error))
        .chain(
            report
                .manifest_errors
                .iter()
                .map(|e| format!("{}{}", indent(1), e)),
        )
        .collect();
    push_section(&mut lines, "Failed", failed);

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Wrote {}, skipped {}, deleted {}, failed {}",
        report.written.len(),
        report.skipped.len(),
        report.deleted.len(),
        report.failed.len() + report.delete_failed.len() + report.manifest_errors.len(),
    ));

    lines
}

/// Format a full site build: loader warnings, then the run report.
pub fn format_build_output(build: &SiteBuild) -> Vec<String> {
    let mut lines = Vec::new();
    push_section(&mut lines, "Warnings", warning_lines(&build.warnings));

    let report = format_report(&build.outcome.report);
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.extend(report);
    if let Some(summary) = lines.last_mut() {
        summary.push_str(&format!(" ({})", plural(build.document_count, "document")));
    }
    lines
}

/// Print build output to stdout.
pub fn print_build_output(build: &SiteBuild) {
    for line in format_build_output(build) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format the loaded corpus: documents newest first, tag counts, warnings.
pub fn format_check_output(loaded: &LoadedDocuments) -> Vec<String> {
    let mut lines = Vec::new();

    let mut documents = Vec::new();
    for (i, doc) in loaded.documents.iter().enumerate() {
        documents.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            doc.title,
            doc.date.format("%Y-%m-%d")
        ));
        documents.push(format!("{}Source: {}", indent(1), doc.source.display()));
        if !doc.tags.is_empty() {
            documents.push(format!("{}Tags: {}", indent(1), doc.tags.join(", ")));
        }
    }
    push_section(&mut lines, "Documents", documents);

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for tag in loaded.documents.iter().flat_map(|d| &d.tags) {
        *counts.entry(tag.as_str()).or_default() += 1;
    }
    let tags = counts
        .into_iter()
        .map(|(tag, n)| format!("{}{} ({})", indent(1), tag, plural(n, "post")))
        .collect();
    push_section(&mut lines, "Tags", tags);

    push_section(&mut lines, "Warnings", warning_lines(&loaded.warnings));

    if lines.is_empty() {
        lines.push("No documents found".to_string());
    }
    lines
}

/// Print check output to stdout.
pub fn print_check_output(loaded: &LoadedDocuments) {
    for line in format_check_output(loaded) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{FailedPath, RewriteReason, WrittenArtifact};
    use crate::test_helpers::*;
    use crate::types::ArtifactKind;
    use std::path::PathBuf;

    #[test]
    fn format_index_pads_to_three() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn plural_handles_one() {
        assert_eq!(plural(1, "post"), "1 post");
        assert_eq!(plural(0, "post"), "0 posts");
        assert_eq!(plural(3, "post"), "3 posts");
    }

    #[test]
    fn empty_report_is_just_the_summary() {
        let lines = format_report(&BuildReport::default());
        assert_eq!(lines, vec!["Wrote 0, skipped 0, deleted 0, failed 0"]);
    }

    #[test]
    fn report_lists_written_with_kind_and_reason() {
        let report = BuildReport {
            written: vec![
                WrittenArtifact {
                    path: "index.html".into(),
                    kind: ArtifactKind::Home,
                    reason: RewriteReason::Forced,
                },
                WrittenArtifact {
                    path: "20220305/index.html".into(),
                    kind: ArtifactKind::Document,
                    reason: RewriteReason::Untracked,
                },
            ],
            skipped: vec!["feed.xml".into()],
            ..BuildReport::default()
        };
        let lines = format_report(&report);
        assert_eq!(lines[0], "Written");
        assert_eq!(lines[1], "001 index.html (home, membership changed)");
        assert_eq!(lines[2], "002 20220305/index.html (document, new)");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "Wrote 2, skipped 1, deleted 0, failed 0");
    }

    #[test]
    fn report_groups_all_failures() {
        let report = BuildReport {
            deleted: vec!["page/3/index.html".into()],
            failed: vec![FailedPath {
                path: "tag/rust/index.html".into(),
                error: "permission denied".into(),
            }],
            delete_failed: vec![FailedPath {
                path: "page/4/index.html".into(),
                error: "busy".into(),
            }],
            manifest_errors: vec![".rambler/build-manifest.tsv: read-only".into()],
            ..BuildReport::default()
        };
        let lines = format_report(&report);
        let text = lines.join("\n");
        assert!(text.contains("Deleted\n    page/3/index.html"));
        assert!(text.contains("    tag/rust/index.html: permission denied"));
        assert!(text.contains("    page/4/index.html: busy"));
        assert!(text.contains("    .rambler/build-manifest.tsv: read-only"));
        assert_eq!(
            lines.last().unwrap(),
            "Wrote 0, skipped 0, deleted 1, failed 3"
        );
    }

    #[test]
    fn check_output_lists_documents_and_tag_counts() {
        let mut hello = doc_tagged("20220305", &["ruby", "rust"]);
        hello.title = "Hello again".into();
        hello.source = PathBuf::from("posts/hello-again.md");
        let loaded = LoadedDocuments {
            documents: vec![hello, doc_tagged("20220301", &["rust"])],
            warnings: vec![LoadWarning::MissingDate {
                path: PathBuf::from("posts/draft.md"),
            }],
        };
        let lines = format_check_output(&loaded);
        assert_eq!(lines[0], "Documents");
        assert_eq!(lines[1], "001 Hello again (2022-03-05)");
        assert_eq!(lines[2], "    Source: posts/hello-again.md");
        assert_eq!(lines[3], "    Tags: ruby, rust");
        assert_eq!(lines[4], "002 Post 20220301 (2022-03-01)");

        let text = lines.join("\n");
        assert!(text.contains("Tags\n    ruby (1 post)\n    rust (2 posts)"));
        assert!(text.contains("Warnings\n    posts/draft.md: no date"));
    }

    #[test]
    fn check_output_for_empty_corpus() {
        let lines = format_check_output(&LoadedDocuments::default());
        assert_eq!(lines, vec!["No documents found"]);
    }

    #[test]
    fn untagged_documents_have_no_tags_line() {
        let loaded = LoadedDocuments {
            documents: vec![doc("20220301")],
            warnings: Vec::new(),
        };
        let lines = format_check_output(&loaded);
        assert_eq!(lines.len(), 3);
        assert!(!lines.iter().any(|l| l.starts_with("Tags")));
    }
}
