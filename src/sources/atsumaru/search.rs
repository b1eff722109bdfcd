//! Search resolution for Atsumaru.
//!
//! Every search runs two strategies against the site's full-text endpoint at
//! once: a strict prefix query and a looser infix query. Exact title matches
//! win outright; otherwise the more useful strategy is ranked and paginated.
//! Transport and parse failures are absorbed here and never reach the caller.

use super::models::{Hit, SearchResponse, TitleField};
use super::parser::{asset_url, build_series_id};
use crate::config::SearchConfig;
use crate::error::SourceError;
use crate::fetch::TextFetcher;
use crate::normalize::{is_exact, is_prefix, normalize};
use crate::sources::{Highlight, PagedResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use url::Url;

/// Path of the search endpoint below the site root.
const SEARCH_PATH: &str = "/collections/manga/documents/search";

/// Upper bound on results kept by the query cache.
const CACHE_LIMIT: usize = 50;

/// Parameters shared by both strategies.
const BASE_PARAMS: [(&str, &str); 5] = [
    ("query_by", "title,englishTitle,otherNames"),
    ("query_by_weights", "3,2,1"),
    ("include_fields", "id,title,englishTitle,poster"),
    ("prioritize_exact_match", "true"),
    ("prefix", "true"),
];

/// A normalized search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Trimmed query exactly as it will be sent upstream.
    pub query: String,
    /// 1-based page.
    pub page: u32,
    pub per_page: u32,
}

impl SearchRequest {
    /// Builds a request, clamping page to at least 1 and page size into the
    /// configured range.
    pub fn new(query: &str, page: u32, per_page: u32, config: &SearchConfig) -> Self {
        Self {
            query: query.trim().to_string(),
            page: page.max(1),
            per_page: config.clamp_per_page(Some(per_page)),
        }
    }

    fn with_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }
}

/// Query variant sent to the search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Prefix matching with exact-match prioritization.
    Primary,
    /// Infix matching that never drops tokens.
    Fallback,
}

impl Strategy {
    pub fn label(self) -> &'static str {
        match self {
            Strategy::Primary => "primary",
            Strategy::Fallback => "fallback",
        }
    }

    fn extra_params(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Strategy::Primary => &[],
            Strategy::Fallback => &[("infix", "always"), ("drop_tokens_threshold", "0")],
        }
    }
}

/// Result of one fetch attempt.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Response with at least one hit.
    Hits(SearchResponse),
    /// Valid response without hits.
    Empty,
    /// Transport error, bad status or unreadable body.
    Failed(String),
}

impl FetchOutcome {
    fn from_body(result: Result<String, SourceError>) -> Self {
        let body = match result {
            Ok(body) => body,
            Err(e) => return FetchOutcome::Failed(e.to_string()),
        };

        if body.trim().is_empty() {
            return FetchOutcome::Failed("empty body".to_string());
        }

        match serde_json::from_str::<SearchResponse>(&body) {
            Ok(response) if !response.hits.is_empty() => FetchOutcome::Hits(response),
            Ok(_) => FetchOutcome::Empty,
            Err(e) => FetchOutcome::Failed(format!("malformed JSON: {e}")),
        }
    }

    pub fn hits(&self) -> &[Hit] {
        match self {
            FetchOutcome::Hits(response) => &response.hits,
            _ => &[],
        }
    }

    pub fn has_hits(&self) -> bool {
        !self.hits().is_empty()
    }

    fn into_response(self) -> Option<SearchResponse> {
        match self {
            FetchOutcome::Hits(response) => Some(response),
            _ => None,
        }
    }
}

/// Last query and its results.
#[derive(Debug, Clone)]
pub struct CachedQuery {
    pub normalized_query: String,
    pub results: Vec<Highlight>,
}

/// Best-effort memory of the most recent search.
///
/// Writes simply overwrite; concurrent searches may lose updates. Nothing
/// reads it to decide what a search returns.
#[derive(Debug, Default)]
pub struct QueryCache {
    last: Mutex<Option<CachedQuery>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self, normalized_query: &str, results: &[Highlight]) {
        if let Ok(mut slot) = self.last.lock() {
            *slot = Some(CachedQuery {
                normalized_query: normalized_query.to_string(),
                results: results.iter().take(CACHE_LIMIT).cloned().collect(),
            });
        }
    }

    /// Returns a copy of the last stored query, if any.
    pub fn last(&self) -> Option<CachedQuery> {
        self.last.lock().ok().and_then(|slot| slot.clone())
    }
}

/// States of the pagination and retry ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ladder {
    Requested,
    RetryTransient { attempt: u32 },
    FirstPageFallback,
    Done,
}

/// Dual-strategy search engine over an injected fetcher.
pub struct SearchEngine {
    fetcher: Arc<dyn TextFetcher>,
    endpoint: Url,
    config: SearchConfig,
    cache: Option<Arc<QueryCache>>,
}

impl SearchEngine {
    /// Creates an engine for the site rooted at `base_url`.
    pub fn new(
        fetcher: Arc<dyn TextFetcher>,
        base_url: &str,
        config: SearchConfig,
    ) -> Result<Self, SourceError> {
        let endpoint = Url::parse(base_url)?.join(SEARCH_PATH)?;
        Ok(Self {
            fetcher,
            endpoint,
            config,
            cache: None,
        })
    }

    /// Attaches a query cache.
    pub fn with_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&QueryCache> {
        self.cache.as_deref()
    }

    /// Builds the request URL of one strategy.
    ///
    /// `_` and `cb` differ between strategies and calls so no intermediate
    /// cache can answer both with the same response.
    pub fn strategy_url(&self, strategy: Strategy, request: &SearchRequest) -> Url {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
            + u128::from(strategy == Strategy::Fallback);

        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", &request.query)
                .append_pair("per_page", &request.per_page.to_string())
                .append_pair("page", &request.page.to_string());
            for (key, value) in BASE_PARAMS.iter().chain(strategy.extra_params()) {
                pairs.append_pair(key, value);
            }
            pairs
                .append_pair("_", &stamp.to_string())
                .append_pair("cb", &nanoid::nanoid!(11));
        }
        url
    }

    async fn fetch_strategy(
        &self,
        strategy: Strategy,
        request: &SearchRequest,
    ) -> (FetchOutcome, Duration) {
        let url = self.strategy_url(strategy, request);
        let started = Instant::now();
        let outcome = FetchOutcome::from_body(self.fetcher.fetch_text(url.as_str()).await);
        (outcome, started.elapsed())
    }

    /// Runs both strategies concurrently and picks the most useful answer.
    ///
    /// Exact title matches from either strategy are returned on their own,
    /// one per title. Otherwise a strategy with an exact or prefix match is
    /// preferred (primary first), then whichever found more.
    pub async fn fetch_best(&self, request: &SearchRequest) -> FetchOutcome {
        let ((primary, primary_elapsed), (fallback, fallback_elapsed)) = futures::join!(
            self.fetch_strategy(Strategy::Primary, request),
            self.fetch_strategy(Strategy::Fallback, request)
        );

        for (strategy, outcome, elapsed) in [
            (Strategy::Primary, &primary, primary_elapsed),
            (Strategy::Fallback, &fallback, fallback_elapsed),
        ] {
            match outcome {
                FetchOutcome::Failed(reason) => debug!(
                    strategy = strategy.label(),
                    page = request.page,
                    elapsed_ms = elapsed.as_millis() as u64,
                    %reason,
                    "search strategy failed"
                ),
                _ => debug!(
                    strategy = strategy.label(),
                    page = request.page,
                    elapsed_ms = elapsed.as_millis() as u64,
                    hits = outcome.hits().len(),
                    "search strategy finished"
                ),
            }
        }

        let nq = normalize(&request.query);

        let union_exact: Vec<Hit> = primary
            .hits()
            .iter()
            .chain(fallback.hits())
            .filter(|hit| is_exact_hit(hit, &nq))
            .cloned()
            .collect();
        if !union_exact.is_empty() {
            return FetchOutcome::Hits(SearchResponse::synthetic(best_pick(union_exact)));
        }

        if primary.has_hits() && is_good(primary.hits(), &nq) {
            return primary;
        }
        if fallback.has_hits() && is_good(fallback.hits(), &nq) {
            return fallback;
        }

        match (primary, fallback) {
            (p, f) if p.has_hits() || f.has_hits() => {
                if p.hits().len() >= f.hits().len() {
                    p
                } else {
                    f
                }
            }
            (FetchOutcome::Failed(p), FetchOutcome::Failed(f)) => {
                FetchOutcome::Failed(format!("primary: {p}; fallback: {f}"))
            }
            _ => FetchOutcome::Empty,
        }
    }

    /// Searches for `query` and returns one page of ranked results.
    ///
    /// Returns `None` when nothing could be found after every fallback; the
    /// caller decides what to show instead.
    pub async fn search(&self, query: &str, page: u32, per_page: u32) -> Option<PagedResult> {
        let request = SearchRequest::new(query, page, per_page, &self.config);
        if request.query.is_empty() {
            return None;
        }

        let nq = normalize(&request.query);
        let mut effective_page = request.page;
        let mut outcome = FetchOutcome::Empty;
        let mut state = Ladder::Requested;

        while state != Ladder::Done {
            state = match state {
                Ladder::Requested if request.page > 1 => {
                    // Clients may keep a stale page number across a new search,
                    // so page 1 is probed for an exact title alongside.
                    let first_page = request.with_page(1);
                    let (requested, top) = futures::join!(
                        self.fetch_best(&request),
                        self.fetch_best(&first_page)
                    );

                    let top_exact = exact_hits(top.hits(), &nq);
                    if !top_exact.is_empty() {
                        debug!(page = request.page, "exact match on page 1, ignoring requested page");
                        return Some(self.exact_page(top_exact, &nq));
                    }

                    outcome = requested;
                    if outcome.has_hits() {
                        Ladder::Done
                    } else {
                        Ladder::FirstPageFallback
                    }
                }
                Ladder::Requested => {
                    outcome = self.fetch_best(&request).await;
                    if outcome.has_hits() {
                        Ladder::Done
                    } else {
                        Ladder::RetryTransient { attempt: 1 }
                    }
                }
                Ladder::RetryTransient { attempt } if attempt > self.config.transient_retries => {
                    Ladder::Done
                }
                Ladder::RetryTransient { attempt } => {
                    debug!(attempt, query = %request.query, "retrying empty first page");
                    outcome = self.fetch_best(&request).await;
                    if outcome.has_hits() {
                        Ladder::Done
                    } else {
                        Ladder::RetryTransient {
                            attempt: attempt + 1,
                        }
                    }
                }
                Ladder::FirstPageFallback => {
                    debug!(page = request.page, "requested page empty, falling back to page 1");
                    let retry = self.fetch_best(&request.with_page(1)).await;
                    if retry.has_hits() {
                        effective_page = 1;
                        outcome = retry;
                    }
                    Ladder::Done
                }
                Ladder::Done => Ladder::Done,
            };
        }

        let Some(response) = outcome.into_response() else {
            warn!(query = %request.query, "search found nothing");
            return None;
        };

        Some(self.finalize(response, &nq, effective_page, request.per_page))
    }

    fn finalize(
        &self,
        response: SearchResponse,
        nq: &str,
        page: u32,
        per_page: u32,
    ) -> PagedResult {
        let exact = exact_hits(&response.hits, nq);
        if !exact.is_empty() {
            return self.exact_page(exact, nq);
        }

        let found = response.found;
        let results = dedup_by_id(rank(response.hits, nq).iter().filter_map(to_highlight));
        self.remember(nq, &results);

        let total = found.unwrap_or(results.len() as u64);
        let is_last_page = results.len() < per_page as usize
            || u64::from(page) * u64::from(per_page) >= total;

        PagedResult {
            results,
            is_last_page,
        }
    }

    fn exact_page(&self, exact: Vec<Hit>, nq: &str) -> PagedResult {
        let results = dedup_by_id(best_pick(exact).iter().filter_map(to_highlight));
        self.remember(nq, &results);
        PagedResult {
            results,
            is_last_page: true,
        }
    }

    fn remember(&self, nq: &str, results: &[Highlight]) {
        if let Some(cache) = &self.cache {
            cache.store(nq, results);
        }
    }
}

/// True when either title of the hit normalizes to the query.
fn is_exact_hit(hit: &Hit, nq: &str) -> bool {
    [TitleField::English, TitleField::Primary]
        .iter()
        .filter_map(|&field| hit.document.title_field(field))
        .any(|title| is_exact(title, nq))
}

/// A hit list is good when some title equals or starts with the query.
fn is_good(hits: &[Hit], nq: &str) -> bool {
    hits.iter().any(|hit| {
        is_exact_hit(hit, nq)
            || [TitleField::English, TitleField::Primary]
                .iter()
                .filter_map(|&field| hit.document.title_field(field))
                .any(|title| is_prefix(title, nq))
    })
}

fn exact_hits(hits: &[Hit], nq: &str) -> Vec<Hit> {
    hits.iter()
        .filter(|hit| is_exact_hit(hit, nq))
        .cloned()
        .collect()
}

/// Keeps one hit per normalized display title.
///
/// Within a group the higher score wins; on equal scores a hit with a poster
/// beats one without. Groups keep the order in which they were first seen.
pub fn best_pick(hits: Vec<Hit>) -> Vec<Hit> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut best: Vec<Hit> = Vec::new();

    for hit in hits {
        let key = normalize(hit.document.display_title().unwrap_or_default());
        match slots.get(&key).copied() {
            None => {
                slots.insert(key, best.len());
                best.push(hit);
            }
            Some(slot) => {
                let current = &best[slot];
                let replace = hit.text_match > current.text_match
                    || (hit.text_match == current.text_match
                        && hit.document.has_poster()
                        && !current.document.has_poster());
                if replace {
                    best[slot] = hit;
                }
            }
        }
    }

    best
}

/// Orders hits by exactness tier, then server score, then original position.
pub fn rank(hits: Vec<Hit>, nq: &str) -> Vec<Hit> {
    let tier = |hit: &Hit| -> u8 {
        let matches = |field| {
            hit.document
                .title_field(field)
                .is_some_and(|title| is_exact(title, nq))
        };
        if matches(TitleField::English) {
            2
        } else if matches(TitleField::Primary) {
            1
        } else {
            0
        }
    };

    let mut scored: Vec<(u8, u64, usize, Hit)> = hits
        .into_iter()
        .enumerate()
        .map(|(idx, hit)| (tier(&hit), hit.text_match, idx, hit))
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
    scored.into_iter().map(|(_, _, _, hit)| hit).collect()
}

/// Maps a hit onto a listing entry; hits without a document id are dropped.
fn to_highlight(hit: &Hit) -> Option<Highlight> {
    let doc = &hit.document;
    if doc.id.trim().is_empty() {
        return None;
    }

    Some(Highlight {
        id: build_series_id(&doc.id),
        title: doc.display_title().unwrap_or(&doc.id).to_string(),
        cover: asset_url(doc.poster.as_deref()),
        subtitle: hit.snippet(),
    })
}

/// Drops repeated ids, keeping the first occurrence.
fn dedup_by_id(results: impl IntoIterator<Item = Highlight>) -> Vec<Highlight> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect()
}
