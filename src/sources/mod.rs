//! Content source trait and common types for manga sources.
//!
//! This module defines the interface that all sources must implement,
//! along with the shapes they hand back to the host.

pub mod atsumaru;

pub use atsumaru::AtsumaruSource;

use crate::error::SourceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One entry in a listing: search result, home carousel item or placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    /// Namespaced content id (e.g. `atsu|<slug>`).
    pub id: String,
    pub title: String,
    /// Absolute cover URL or a bundled asset path.
    pub cover: String,
    pub subtitle: Option<String>,
}

/// A page of listing results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedResult {
    pub results: Vec<Highlight>,
    pub is_last_page: bool,
}

impl PagedResult {
    /// Single-entry final page, used when there is nothing better to show.
    pub fn placeholder(item: Highlight) -> Self {
        Self {
            results: vec![item],
            is_last_page: true,
        }
    }
}

/// A directory/browse request from the host.
#[derive(Debug, Clone, Default)]
pub struct DirectoryRequest {
    /// Free text; empty means "browse".
    pub query: Option<String>,
    /// 1-based page number.
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl DirectoryRequest {
    /// Creates a search request for page 1.
    pub fn search(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    /// Returns the trimmed query, if there is one.
    pub fn trimmed_query(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// Publication state of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PublicationStatus {
    Ongoing,
    Completed,
    Hiatus,
    Cancelled,
}

/// Series metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub title: String,
    pub cover: String,
    pub summary: String,
    pub creators: Vec<String>,
    pub status: Option<PublicationStatus>,
    pub tags: Vec<String>,
}

/// A chapter entry; lists are ordered newest first.
#[derive(Debug, Clone, Serialize)]
pub struct Chapter {
    pub chapter_id: String,
    pub number: f64,
    pub title: String,
    pub date: DateTime<Utc>,
    pub language: String,
    /// Position in the list, 0 = newest.
    pub index: usize,
    pub page_count: u32,
}

/// One page image of a chapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterPage {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Page images of a chapter in reading order.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterData {
    pub pages: Vec<ChapterPage>,
}

/// Layout hint for a home section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SectionStyle {
    Gallery,
    StandardGrid,
    PaddedList,
}

/// A titled group of highlights shown on the home page.
#[derive(Debug, Clone, Serialize)]
pub struct PageSection {
    pub id: String,
    pub title: String,
    pub style: SectionStyle,
    pub items: Vec<Highlight>,
}

/// Trait for manga content sources.
///
/// Each implementation adapts a specific site and exposes listing,
/// metadata, chapter list and page resolution.
#[async_trait]
pub trait Source: Send + Sync {
    /// Returns the human-readable name of this source.
    fn name(&self) -> &'static str;

    /// Returns the stable key of this source (lowercase, no spaces).
    fn id(&self) -> &'static str;

    /// Checks if a content id was produced by this source.
    fn owns(&self, content_id: &str) -> bool;

    /// Lists content: search results for a query, featured items otherwise.
    async fn directory(&self, request: &DirectoryRequest) -> Result<PagedResult, SourceError>;

    /// Fetches series metadata.
    async fn content(&self, content_id: &str) -> Result<Content, SourceError>;

    /// Fetches every chapter of a series, newest first.
    async fn chapters(&self, content_id: &str) -> Result<Vec<Chapter>, SourceError>;

    /// Resolves the page images of a chapter.
    async fn chapter_data(
        &self,
        content_id: &str,
        chapter_id: &str,
    ) -> Result<ChapterData, SourceError>;

    /// Returns the sections shown on the source's home page.
    async fn home_sections(&self) -> Result<Vec<PageSection>, SourceError>;
}

/// Registry of available sources.
pub struct SourceRegistry {
    sources: Vec<Box<dyn Source>>,
}

impl SourceRegistry {
    /// Creates a registry from already constructed sources.
    pub fn new(sources: Vec<Box<dyn Source>>) -> Self {
        Self { sources }
    }

    /// Finds the source that produced the given content id.
    pub fn find_for_id(&self, content_id: &str) -> Option<&dyn Source> {
        self.sources
            .iter()
            .find(|s| s.owns(content_id))
            .map(|s| s.as_ref())
    }

    /// Finds a source by its key.
    pub fn find_by_key(&self, key: &str) -> Option<&dyn Source> {
        self.sources
            .iter()
            .find(|s| s.id().eq_ignore_ascii_case(key))
            .map(|s| s.as_ref())
    }

    /// Returns all registered sources.
    pub fn all(&self) -> &[Box<dyn Source>] {
        &self.sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimmed_query() {
        assert_eq!(DirectoryRequest::search("  naruto ").trimmed_query(), Some("naruto"));
        assert_eq!(DirectoryRequest::search("   ").trimmed_query(), None);
        assert_eq!(DirectoryRequest::default().trimmed_query(), None);
    }

    #[test]
    fn test_placeholder_is_last_page() {
        let page = PagedResult::placeholder(Highlight {
            id: "x".to_string(),
            title: "Nothing".to_string(),
            cover: String::new(),
            subtitle: None,
        });
        assert!(page.is_last_page);
        assert_eq!(page.results.len(), 1);
    }
}
