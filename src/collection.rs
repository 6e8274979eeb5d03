//! Ordered, paginated views over the document corpus.
//!
//! A [`Collection`] borrows documents from the loaded corpus and keeps them
//! newest first. Pages are fixed-size slices of that order, numbered from 1.
//! Filtering (one document, one tag) yields a fresh collection with its own
//! pagination; nothing is mutated in place.
//!
//! ## First changed page
//!
//! Inserting or removing a document at rank `r` moves every document at rank
//! `>= r` into a different page slot, so page membership is stale from the
//! page containing `r` onwards while earlier pages are untouched.
//! [`Collection::first_changed_page`] finds that page by comparing the current
//! id order against the previous run's.

use std::collections::{BTreeSet, HashSet};

use crate::document::DocumentRecord;
use crate::types::PageLink;

#[derive(Debug, Clone)]
pub struct Collection<'a> {
    documents: Vec<&'a DocumentRecord>,
    page_size: usize,
}

impl<'a> Collection<'a> {
    /// Build a collection over `documents`, sorted newest first.
    ///
    /// A `page_size` of zero is treated as one.
    pub fn new(documents: &'a [DocumentRecord], page_size: usize) -> Self {
        let mut refs: Vec<&DocumentRecord> = documents.iter().collect();
        refs.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
        Self::from_sorted(refs, page_size)
    }

    fn from_sorted(documents: Vec<&'a DocumentRecord>, page_size: usize) -> Self {
        Self {
            documents,
            page_size: page_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn documents(&self) -> &[&'a DocumentRecord] {
        &self.documents
    }

    /// `ceil(len / page_size)`; zero for an empty collection.
    pub fn page_count(&self) -> usize {
        self.documents.len().div_ceil(self.page_size)
    }

    /// Documents on 1-based page `number`. Out-of-range pages are empty.
    pub fn page(&self, number: usize) -> &[&'a DocumentRecord] {
        if number == 0 {
            return &[];
        }
        let start = (number - 1).saturating_mul(self.page_size);
        if start >= self.documents.len() {
            return &[];
        }
        let end = (start + self.page_size).min(self.documents.len());
        &self.documents[start..end]
    }

    /// The `limit` newest documents.
    pub fn newest(&self, limit: usize) -> &[&'a DocumentRecord] {
        &self.documents[..limit.min(self.documents.len())]
    }

    /// One descriptor per page. `link` formats the URL for a page number.
    pub fn page_range(&self, current: usize, link: impl Fn(usize) -> String) -> Vec<PageLink> {
        (1..=self.page_count())
            .map(|number| PageLink {
                number,
                link: link(number),
                is_current: number == current,
            })
            .collect()
    }

    /// Document ids in collection order.
    pub fn ids(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.id.clone()).collect()
    }

    /// Distinct tag names across all documents, sorted.
    pub fn tag_set(&self) -> Vec<&'a str> {
        self.documents
            .iter()
            .copied()
            .flat_map(|d| d.tags.iter().map(String::as_str))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sub-collection holding only the document with `id`.
    pub fn only_id(&self, id: &str) -> Collection<'a> {
        self.filtered(|d| d.id == id)
    }

    /// Sub-collection of documents carrying `tag`.
    pub fn with_tag(&self, tag: &str) -> Collection<'a> {
        self.filtered(|d| d.has_tag(tag))
    }

    fn filtered(&self, keep: impl Fn(&DocumentRecord) -> bool) -> Collection<'a> {
        let documents = self.documents.iter().copied().filter(|d| keep(d)).collect();
        Collection::from_sorted(documents, self.page_size)
    }

    /// First page whose membership differs from the previous run.
    ///
    /// `previous_ids` is the previous run's id order, newest first. The
    /// earliest rank at which an id was added (rank in the current order) or
    /// removed (rank in the previous order) determines the page. Returns
    /// `page_count() + 1` when no id was added or removed.
    pub fn first_changed_page(&self, previous_ids: &[String]) -> usize {
        let current: HashSet<&str> = self.documents.iter().map(|d| d.id.as_str()).collect();
        let previous: HashSet<&str> = previous_ids.iter().map(String::as_str).collect();

        let added = self
            .documents
            .iter()
            .position(|d| !previous.contains(d.id.as_str()));
        let removed = previous_ids
            .iter()
            .position(|id| !current.contains(id.as_str()));

        match added.into_iter().chain(removed).min() {
            Some(rank) => rank / self.page_size + 1,
            None => self.page_count() + 1,
        }
    }
}
