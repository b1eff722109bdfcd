//! Atsumaru (atsu.moe) source implementation.
//!
//! Metadata, chapters and pages come from the site's JSON API; search goes
//! through [`SearchEngine`].

pub mod models;
pub mod parser;
pub mod search;

pub use search::{QueryCache, SearchEngine};

use self::models::{ChapterListPage, MangaInfo, MangaPageEnvelope, ReadChapterResponse};
use self::parser::{PLACEHOLDER_COVER, asset_url, parse_series_id};
use super::{
    Chapter, ChapterData, ChapterPage, Content, DirectoryRequest, Highlight, PageSection,
    PagedResult, SectionStyle, Source,
};
use crate::config::Config;
use crate::error::SourceError;
use crate::fetch::{HttpFetcher, TextFetcher};
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

/// Section titles preferred when browsing without a query.
static FEATURED_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)popular|featured").unwrap());

/// Atsumaru source for atsu.moe.
pub struct AtsumaruSource {
    fetcher: Arc<dyn TextFetcher>,
    engine: SearchEngine,
    base_url: String,
    search_config: crate::config::SearchConfig,
}

impl AtsumaruSource {
    /// Creates a source that talks to the network through `reqwest`.
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        let fetcher: Arc<dyn TextFetcher> = Arc::new(HttpFetcher::new(&config.source)?);
        Self::with_fetcher(config, fetcher)
    }

    /// Creates a source over any fetcher.
    pub fn with_fetcher(config: &Config, fetcher: Arc<dyn TextFetcher>) -> Result<Self, SourceError> {
        let base_url = config.source.base_url.trim_end_matches('/').to_string();
        let mut engine = SearchEngine::new(fetcher.clone(), &base_url, config.search.clone())?;
        if config.search.cache_enabled {
            engine = engine.with_cache(Arc::new(QueryCache::new()));
        }

        Ok(Self {
            fetcher,
            engine,
            base_url,
            search_config: config.search.clone(),
        })
    }

    /// The search engine behind `directory`.
    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    fn api(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let body = self.fetcher.fetch_text(url).await?;
        if body.trim().is_empty() {
            return Err(SourceError::ParseError(format!("empty response from {url}")));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_home(&self) -> Result<Vec<PageSection>, SourceError> {
        let body = self.fetcher.fetch_text(&self.api("/api/home/page")).await?;
        Ok(parser::extract_home_sections(&body))
    }

    /// Featured items for an empty query, or `None` when nothing suitable exists.
    async fn browse(&self) -> Option<PagedResult> {
        let sections = match self.fetch_home().await {
            Ok(sections) => sections,
            Err(e) => {
                debug!(error = %e, "home page unavailable");
                return None;
            }
        };

        let chosen = sections
            .iter()
            .find(|s| FEATURED_TITLE.is_match(&s.title) || s.style == SectionStyle::Gallery)
            .or_else(|| sections.iter().find(|s| !s.items.is_empty()))?;

        Some(PagedResult {
            results: chosen.items.clone(),
            is_last_page: true,
        })
    }

    fn top_searched() -> Highlight {
        Highlight {
            id: "top_searched".to_string(),
            title: "Top searched".to_string(),
            cover: PLACEHOLDER_COVER.to_string(),
            subtitle: Some("Browse popular titles from the homepage".to_string()),
        }
    }

    fn no_results(query: &str) -> Highlight {
        Highlight {
            id: "atsu_no_results".to_string(),
            title: "No results found".to_string(),
            cover: PLACEHOLDER_COVER.to_string(),
            subtitle: Some(format!("No manga found for \"{query}\"")),
        }
    }

    /// Chapters from the info endpoint, which sometimes lists more than the
    /// detailed page does.
    async fn info_chapters(&self, slug: &str) -> Vec<models::RawChapter> {
        let url = self.api(&format!("/api/manga/info?mangaId={}", urlencode(slug)));
        match self.fetch_json::<MangaInfo>(&url).await {
            Ok(info) => info.chapters,
            Err(e) => {
                debug!(slug, error = %e, "info endpoint unavailable");
                Vec::new()
            }
        }
    }

    async fn content_from_home(&self, slug: &str) -> Option<Content> {
        let body = self.fetcher.fetch_text(&self.api("/api/home/page")).await.ok()?;
        parser::find_home_item(&body, slug).and_then(|item| parser::content_from_home_item(&item))
    }
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[async_trait]
impl Source for AtsumaruSource {
    fn name(&self) -> &'static str {
        "Atsumaru"
    }

    fn id(&self) -> &'static str {
        "atsumaru"
    }

    fn owns(&self, content_id: &str) -> bool {
        parse_series_id(content_id).is_ok()
    }

    async fn directory(&self, request: &DirectoryRequest) -> Result<PagedResult, SourceError> {
        let Some(query) = request.trimmed_query() else {
            return Ok(self
                .browse()
                .await
                .unwrap_or_else(|| PagedResult::placeholder(Self::top_searched())));
        };

        let page = request.page.unwrap_or(1);
        let per_page = self.search_config.clamp_per_page(request.per_page);

        match self.engine.search(query, page, per_page).await {
            Some(result) => Ok(result),
            None => {
                warn!(query, "no search results, returning placeholder");
                Ok(PagedResult::placeholder(Self::no_results(query)))
            }
        }
    }

    async fn content(&self, content_id: &str) -> Result<Content, SourceError> {
        let slug = parse_series_id(content_id)?;
        let url = self.api(&format!("/api/manga/page?id={}", urlencode(slug)));

        match self.fetch_json::<MangaPageEnvelope>(&url).await {
            Ok(envelope) => {
                if let Some(content) = parser::content_from_page(&envelope.into_page()) {
                    return Ok(content);
                }
                debug!(slug, "detailed page has no title");
            }
            Err(e) => debug!(slug, error = %e, "detailed page unavailable"),
        }

        self.content_from_home(slug)
            .await
            .ok_or_else(|| SourceError::NotFound(format!("content unavailable: {content_id}")))
    }

    async fn chapters(&self, content_id: &str) -> Result<Vec<Chapter>, SourceError> {
        let slug = parse_series_id(content_id)?;
        let page_url = |page: u32| {
            self.api(&format!(
                "/api/manga/chapters?id={}&filter=all&sort=desc&page={page}",
                urlencode(slug)
            ))
        };

        let first: ChapterListPage = self.fetch_json(&page_url(0)).await?;
        let mut collected = first.chapters;

        // Pages are zero-based; `pages` is the count.
        for page in 1..first.pages {
            match self.fetch_json::<ChapterListPage>(&page_url(page)).await {
                Ok(next) => collected.extend(next.chapters),
                Err(e) => debug!(slug, page, error = %e, "skipping chapter page"),
            }
        }

        if collected.is_empty() {
            collected = self.info_chapters(slug).await;
        } else {
            let info = self.info_chapters(slug).await;
            if !info.is_empty() {
                collected = parser::merge_chapter_lists(collected, info);
            }
        }

        Ok(parser::convert_chapters(collected))
    }

    async fn chapter_data(
        &self,
        content_id: &str,
        chapter_id: &str,
    ) -> Result<ChapterData, SourceError> {
        let slug = parse_series_id(content_id)?;
        let url = self.api(&format!(
            "/api/read/chapter?mangaId={}&chapterId={}",
            urlencode(slug),
            urlencode(chapter_id)
        ));

        let response: ReadChapterResponse = self.fetch_json(&url).await?;
        let chapter = response
            .read_chapter
            .ok_or_else(|| SourceError::NotFound(format!("chapter {chapter_id}")))?;

        Ok(ChapterData {
            pages: chapter
                .pages
                .into_iter()
                .map(|page| ChapterPage {
                    url: asset_url(Some(&page.image)),
                    width: page.width,
                    height: page.height,
                })
                .collect(),
        })
    }

    async fn home_sections(&self) -> Result<Vec<PageSection>, SourceError> {
        match self.fetch_home().await {
            Ok(sections) if !sections.is_empty() => Ok(sections),
            other => {
                if let Err(e) = other {
                    debug!(error = %e, "home page unavailable");
                }
                Ok(vec![PageSection {
                    id: "top_searched".to_string(),
                    title: "Top searched".to_string(),
                    style: SectionStyle::PaddedList,
                    items: vec![Self::top_searched()],
                }])
            }
        }
    }
}
