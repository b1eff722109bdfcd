//! Id encoding and mapping of Atsumaru payloads onto source types.

use super::models::{DateLike, HomeEnvelope, HomeItem, MangaPage, RawChapter};
use crate::error::SourceError;
use crate::sources::{Chapter, Content, Highlight, PageSection, PublicationStatus, SectionStyle};
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Namespace prefix of every content id this source hands out.
pub const ID_PREFIX: &str = "atsu";

/// Site root used to absolutize relative asset paths.
pub const SITE_ROOT: &str = "https://atsu.moe";

/// Bundled cover used when a series has no poster.
pub const PLACEHOLDER_COVER: &str = "/assets/atsu_logo.png";

/// Assignment of the home payload in the server-rendered page.
static HOME_PREFETCH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"window\.homePage\s*=\s*(\{[\s\S]*?\});").unwrap());

static SCRIPT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());

/// Builds the namespaced content id for a series slug.
pub fn build_series_id(slug: &str) -> String {
    format!("{ID_PREFIX}|{slug}")
}

/// Extracts the series slug from a content id.
pub fn parse_series_id(content_id: &str) -> Result<&str, SourceError> {
    match content_id.split_once('|') {
        Some((ID_PREFIX, slug)) if !slug.is_empty() && !slug.contains('|') => Ok(slug),
        _ => Err(SourceError::InvalidId(format!(
            "{content_id} (expected {ID_PREFIX}|<slug>)"
        ))),
    }
}

/// Makes a site path absolute; `None` or blank yields the placeholder cover.
pub fn asset_url(path: Option<&str>) -> String {
    let Some(path) = path.map(str::trim).filter(|p| !p.is_empty()) else {
        return PLACEHOLDER_COVER.to_string();
    };

    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }

    format!("{}/{}", SITE_ROOT, path.trim_start_matches('/'))
}

/// Maps free-form status text onto a publication status.
///
/// Unknown text is treated as ongoing.
pub fn publication_status(status: &str) -> PublicationStatus {
    let status = status.trim().to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| status.contains(w));

    if has(&["ongoing", "publishing"]) {
        PublicationStatus::Ongoing
    } else if has(&["completed", "finished"]) {
        PublicationStatus::Completed
    } else if has(&["hiatus", "paused"]) {
        PublicationStatus::Hiatus
    } else if has(&["cancelled", "canceled", "dropped"]) {
        PublicationStatus::Cancelled
    } else {
        PublicationStatus::Ongoing
    }
}

/// Builds series metadata from the detailed page payload.
///
/// Returns `None` when the payload carries no title at all.
pub fn content_from_page(page: &MangaPage) -> Option<Content> {
    let non_blank = |t: &&str| !t.trim().is_empty();
    let title = page
        .english_title
        .as_deref()
        .filter(non_blank)
        .or(page.title.as_deref().filter(non_blank))?
        .to_string();

    let cover = match &page.poster {
        Some(poster) if poster.image.is_some() => asset_url(poster.image.as_deref()),
        Some(poster) => match poster.id.as_deref() {
            Some(id) => asset_url(Some(&format!("static/{id}"))),
            None => PLACEHOLDER_COVER.to_string(),
        },
        None => PLACEHOLDER_COVER.to_string(),
    };

    let summary = page
        .synopsis
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("No description available for \"{title}\""));

    let tags = if page.tags.is_empty() {
        &page.genres
    } else {
        &page.tags
    };

    Some(Content {
        title,
        cover,
        summary,
        creators: page.authors.iter().map(|a| a.name.clone()).collect(),
        status: page.status.as_deref().map(publication_status),
        tags: tags.iter().map(|t| t.name.clone()).collect(),
    })
}

/// Builds minimal metadata from a home page item.
pub fn content_from_home_item(item: &HomeItem) -> Option<Content> {
    let title = item.title.clone().filter(|t| !t.trim().is_empty())?;
    let summary = item
        .synopsis
        .clone()
        .or_else(|| item.description.clone())
        .unwrap_or_else(|| format!("No description available for \"{title}\""));

    Some(Content {
        cover: asset_url(item.banner.as_deref().or(item.image.as_deref())),
        title,
        summary,
        creators: Vec::new(),
        status: None,
        tags: Vec::new(),
    })
}

/// Merges chapter lists, letting `detailed` entries replace `info` entries
/// with the same id, then orders newest first.
pub fn merge_chapter_lists(detailed: Vec<RawChapter>, info: Vec<RawChapter>) -> Vec<RawChapter> {
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, RawChapter> = HashMap::new();

    for (position, chapter) in info.into_iter().chain(detailed).enumerate() {
        let id = chapter.any_id().unwrap_or_else(|| {
            chapter
                .number
                .or(chapter.index)
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("#{position}"))
        });
        if by_id.insert(id.clone(), chapter).is_none() {
            order.push(id);
        }
    }

    let mut merged: Vec<(String, RawChapter)> = order
        .into_iter()
        .filter_map(|id| by_id.remove(&id).map(|c| (id, c)))
        .collect();

    merged.sort_by(|(a_id, a), (b_id, b)| {
        b.order_key()
            .total_cmp(&a.order_key())
            .then_with(|| b_id.cmp(a_id))
    });

    merged.into_iter().map(|(_, c)| c).collect()
}

/// Converts raw chapters into host chapters, newest first.
pub fn convert_chapters(mut raw: Vec<RawChapter>) -> Vec<Chapter> {
    let has_index = raw.iter().any(|c| c.index.is_some());
    let has_number = raw.iter().any(|c| c.number.is_some());

    if has_index {
        raw.sort_by(|a, b| b.index.unwrap_or(0.0).total_cmp(&a.index.unwrap_or(0.0)));
    } else if has_number {
        raw.sort_by(|a, b| b.number.unwrap_or(0.0).total_cmp(&a.number.unwrap_or(0.0)));
    } else {
        raw.reverse();
    }

    raw.into_iter()
        .enumerate()
        .map(|(idx, chapter)| {
            let chapter_id = chapter
                .any_id()
                .or_else(|| chapter.slug.clone())
                .or_else(|| chapter.title.clone())
                .unwrap_or_else(|| idx.to_string());

            let number = chapter
                .number
                .or(if has_index { chapter.index } else { None })
                .unwrap_or((idx + 1) as f64);

            let date = [&chapter.created_at, &chapter.published_at]
                .into_iter()
                .flatten()
                .find_map(parse_date)
                .or_else(|| chapter.timestamp.as_ref().and_then(parse_timestamp))
                .unwrap_or_else(|| fallback_date(idx));

            let title = chapter
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("Chapter {number}"));

            Chapter {
                chapter_id,
                number,
                title,
                date,
                language: "en".to_string(),
                index: idx,
                page_count: chapter.page_count.or(chapter.pages).unwrap_or(0),
            }
        })
        .collect()
}

/// Dates are RFC 3339 text, plain `YYYY-MM-DD`, or epoch milliseconds.
fn parse_date(value: &DateLike) -> Option<DateTime<Utc>> {
    match value {
        DateLike::Epoch(ms) => Utc.timestamp_millis_opt(*ms as i64).single(),
        DateLike::Text(text) => {
            let text = text.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(date) = chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
            }
            text.parse::<f64>()
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single())
        }
    }
}

/// Timestamps may be seconds or milliseconds.
fn parse_timestamp(value: &DateLike) -> Option<DateTime<Utc>> {
    let n = match value {
        DateLike::Epoch(n) => *n,
        DateLike::Text(text) => text.trim().parse::<f64>().ok()?,
    };
    let millis = if n > 1e10 { n } else { n * 1000.0 };
    Utc.timestamp_millis_opt(millis as i64).single()
}

/// Keeps undated chapters in list order.
fn fallback_date(idx: usize) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1000 * idx as i64)
        .single()
        .unwrap_or_default()
}

/// Parses the home payload from the API body or a server-rendered page.
pub fn parse_home(body: &str) -> Option<HomeEnvelope> {
    if let Ok(envelope) = serde_json::from_str::<HomeEnvelope>(body) {
        return Some(envelope);
    }

    let doc = Html::parse_document(body);
    doc.select(&SCRIPT_SELECTOR).find_map(|script| {
        let text = script.text().collect::<String>();
        let captured = HOME_PREFETCH_REGEX.captures(&text)?.get(1)?.as_str().to_string();
        serde_json::from_str::<HomeEnvelope>(&captured).ok()
    })
}

/// Extracts carousel and slideshow sections from the home payload.
pub fn extract_home_sections(body: &str) -> Vec<PageSection> {
    let Some(envelope) = parse_home(body) else {
        return Vec::new();
    };

    envelope
        .into_page()
        .sections
        .into_iter()
        .filter_map(|section| {
            let kind = section.kind.as_deref()?;
            if kind != "carousel" && kind != "slideshow" {
                return None;
            }

            let items: Vec<Highlight> = section
                .items
                .iter()
                .filter_map(|item| {
                    let raw_id = item.raw_id()?;
                    Some(Highlight {
                        id: build_series_id(raw_id),
                        title: item.title.clone().unwrap_or_else(|| "Series".to_string()),
                        cover: asset_url(item.image.as_deref().or(item.banner.as_deref())),
                        subtitle: item.chapter.as_ref().and_then(|c| c.title.clone()),
                    })
                })
                .collect();

            if items.is_empty() {
                return None;
            }

            let is_slideshow = kind == "slideshow";
            let title = section.title.clone().unwrap_or_else(|| {
                if is_slideshow { "Featured" } else { "Browse" }.to_string()
            });
            let id = section
                .key
                .clone()
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| title.to_lowercase().split_whitespace().collect::<Vec<_>>().join("_"));

            Some(PageSection {
                id,
                title,
                style: if is_slideshow {
                    SectionStyle::Gallery
                } else {
                    SectionStyle::StandardGrid
                },
                items,
            })
        })
        .collect()
}

/// Finds a home item by slug, used when the detail API is unavailable.
pub fn find_home_item(body: &str, slug: &str) -> Option<HomeItem> {
    parse_home(body)?
        .into_page()
        .sections
        .into_iter()
        .flat_map(|s| s.items)
        .find(|item| item.raw_id() == Some(slug) && item.title.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::atsumaru::models::MangaPageEnvelope;

    fn raw(id: &str, index: Option<f64>, number: Option<f64>) -> RawChapter {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "index": index,
            "number": number,
        }))
        .unwrap()
    }

    #[test]
    fn test_series_id_round_trip() {
        let id = build_series_id("abc123");
        assert_eq!(id, "atsu|abc123");
        assert_eq!(parse_series_id(&id).unwrap(), "abc123");
    }

    #[test]
    fn test_series_id_rejects_foreign_ids() {
        assert!(parse_series_id("cubari|abc").is_err());
        assert!(parse_series_id("atsu|").is_err());
        assert!(parse_series_id("abc").is_err());
    }

    #[test]
    fn test_asset_url() {
        assert_eq!(asset_url(None), PLACEHOLDER_COVER);
        assert_eq!(asset_url(Some("  ")), PLACEHOLDER_COVER);
        assert_eq!(
            asset_url(Some("/static/posters/a.webp")),
            "https://atsu.moe/static/posters/a.webp"
        );
        assert_eq!(
            asset_url(Some("https://cdn.example/a.png")),
            "https://cdn.example/a.png"
        );
    }

    #[test]
    fn test_publication_status() {
        assert_eq!(publication_status("Ongoing"), PublicationStatus::Ongoing);
        assert_eq!(publication_status("Finished"), PublicationStatus::Completed);
        assert_eq!(publication_status("On Hiatus"), PublicationStatus::Hiatus);
        assert_eq!(publication_status("dropped"), PublicationStatus::Cancelled);
        assert_eq!(publication_status("???"), PublicationStatus::Ongoing);
    }

    #[test]
    fn test_content_from_page() {
        let body = r#"{"mangaPage":{
            "title":"Wan Pisu","englishTitle":"One Piece",
            "poster":{"id":"posters/op.webp"},
            "authors":[{"name":"Oda"}],"status":"Ongoing",
            "genres":[{"id":"1","name":"Action"}]
        }}"#;
        let page = serde_json::from_str::<MangaPageEnvelope>(body)
            .unwrap()
            .into_page();
        let content = content_from_page(&page).unwrap();

        assert_eq!(content.title, "One Piece");
        assert_eq!(content.cover, "https://atsu.moe/static/posters/op.webp");
        assert_eq!(content.creators, vec!["Oda"]);
        assert_eq!(content.status, Some(PublicationStatus::Ongoing));
        assert_eq!(content.tags, vec!["Action"]);
        assert!(content.summary.contains("No description"));

        assert!(content_from_page(&MangaPage::default()).is_none());
    }

    #[test]
    fn test_merge_chapter_lists_prefers_detailed() {
        let mut detailed = raw("b", Some(2.0), None);
        detailed.title = Some("detailed".to_string());
        let mut stale = raw("b", Some(2.0), None);
        stale.title = Some("info".to_string());

        let merged = merge_chapter_lists(vec![detailed], vec![raw("a", Some(1.0), None), stale, raw("c", Some(3.0), None)]);

        let ids: Vec<String> = merged.iter().filter_map(RawChapter::any_id).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(merged[1].title.as_deref(), Some("detailed"));
    }

    #[test]
    fn test_convert_chapters_order_and_fallbacks() {
        let chapters = convert_chapters(vec![
            raw("one", None, Some(1.0)),
            raw("three", None, Some(3.0)),
            raw("two", None, Some(2.0)),
        ]);

        let ids: Vec<&str> = chapters.iter().map(|c| c.chapter_id.as_str()).collect();
        assert_eq!(ids, vec!["three", "two", "one"]);
        assert_eq!(chapters[0].title, "Chapter 3");
        assert_eq!(chapters[0].index, 0);
        assert_eq!(chapters[2].number, 1.0);
    }

    #[test]
    fn test_chapter_dates() {
        let chapters = convert_chapters(vec![
            serde_json::from_value(serde_json::json!({
                "id": "a", "index": 2, "createdAt": "2024-03-01T10:00:00Z"
            }))
            .unwrap(),
            serde_json::from_value(serde_json::json!({
                "id": "b", "index": 1, "timestamp": 1700000000
            }))
            .unwrap(),
        ]);

        assert_eq!(chapters[0].date.to_rfc3339(), "2024-03-01T10:00:00+00:00");
        assert_eq!(chapters[1].date.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_extract_home_sections_from_json() {
        let body = r#"{"homePage":{"sections":[
            {"type":"slideshow","key":"featured","items":[{"id":"op","title":"One Piece","image":"/static/posters/op.webp"}]},
            {"type":"article","items":[{"id":"x","title":"ignored"}]},
            {"type":"carousel","title":"Popular Today","items":[{"slug":"nar","title":"Naruto","chapter":{"title":"Ch. 700"}}]},
            {"type":"carousel","title":"Empty","items":[]}
        ]}}"#;

        let sections = extract_home_sections(body);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].id, "featured");
        assert_eq!(sections[0].title, "Featured");
        assert_eq!(sections[0].style, SectionStyle::Gallery);
        assert_eq!(sections[0].items[0].id, "atsu|op");
        assert_eq!(sections[1].id, "popular_today");
        assert_eq!(sections[1].items[0].subtitle.as_deref(), Some("Ch. 700"));
        assert_eq!(sections[1].items[0].cover, PLACEHOLDER_COVER);
    }

    #[test]
    fn test_extract_home_sections_from_html_prefetch() {
        let body = r#"<html><head><script>
            window.homePage = {"sections":[{"type":"carousel","title":"Trending","items":[{"id":"k","title":"Kagurabachi"}]}]};
        </script></head><body></body></html>"#;

        let sections = extract_home_sections(body);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].items[0].title, "Kagurabachi");

        assert!(extract_home_sections("not json, no script").is_empty());
    }

    #[test]
    fn test_find_home_item() {
        let body = r#"{"sections":[{"type":"carousel","items":[{"id":"op","title":"One Piece","synopsis":"Pirates"}]}]}"#;
        let item = find_home_item(body, "op").unwrap();
        let content = content_from_home_item(&item).unwrap();
        assert_eq!(content.title, "One Piece");
        assert_eq!(content.summary, "Pirates");
        assert!(find_home_item(body, "missing").is_none());
    }
}
