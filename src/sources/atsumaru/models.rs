//! Wire shapes of the Atsumaru API.
//!
//! Every field the site has been seen to omit is optional or defaulted, so
//! a partial payload still deserializes instead of failing the whole body.

use serde::{Deserialize, Deserializer};
use std::sync::LazyLock;

use regex::Regex;

/// Matches any HTML tag inside highlight snippets.
static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Body of `/collections/manga/documents/search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    /// Total number of matching documents, when reported.
    #[serde(default)]
    pub found: Option<u64>,
    #[serde(default, deserialize_with = "lenient_hits")]
    pub hits: Vec<Hit>,
}

/// Decodes hits one by one, dropping any that do not fit the `Hit` shape.
fn lenient_hits<'de, D>(deserializer: D) -> Result<Vec<Hit>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl SearchResponse {
    /// Wraps a hit list that did not come straight from the server.
    pub fn synthetic(hits: Vec<Hit>) -> Self {
        Self {
            found: Some(hits.len() as u64),
            hits,
        }
    }
}

/// One search result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hit {
    #[serde(default, deserialize_with = "null_as_default")]
    pub document: Document,
    #[serde(default)]
    pub highlight: Option<HighlightMap>,
    #[serde(default)]
    pub highlights: Vec<HighlightEntry>,
    /// Relevance assigned by the search server.
    #[serde(default, deserialize_with = "null_as_default")]
    pub text_match: u64,
}

/// Title fields a document may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleField {
    English,
    Primary,
}

impl TitleField {
    /// Field name as used by the search server.
    pub fn key(self) -> &'static str {
        match self {
            TitleField::English => "englishTitle",
            TitleField::Primary => "title",
        }
    }
}

/// Order in which title fields are tried when a title is shown.
pub const DISPLAY_TITLE_FIELDS: [TitleField; 2] = [TitleField::English, TitleField::Primary];

/// Order in which highlight snippets are tried for a subtitle.
const SNIPPET_FIELDS: [TitleField; 2] = [TitleField::Primary, TitleField::English];

/// Searchable manga document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub english_title: Option<String>,
    /// Site-relative poster path.
    #[serde(default)]
    pub poster: Option<String>,
}

impl Document {
    /// Returns the given title field when it holds text.
    pub fn title_field(&self, field: TitleField) -> Option<&str> {
        let value = match field {
            TitleField::English => self.english_title.as_deref(),
            TitleField::Primary => self.title.as_deref(),
        };
        value.filter(|s| !s.trim().is_empty())
    }

    /// First non-empty title following `DISPLAY_TITLE_FIELDS`.
    pub fn display_title(&self) -> Option<&str> {
        DISPLAY_TITLE_FIELDS
            .iter()
            .find_map(|&field| self.title_field(field))
    }

    pub fn has_poster(&self) -> bool {
        self.poster.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

/// Per-field highlight object (`highlight.title`, `highlight.englishTitle`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightMap {
    #[serde(default)]
    pub title: Option<Snippet>,
    #[serde(default)]
    pub english_title: Option<Snippet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snippet {
    #[serde(default)]
    pub snippet: Option<String>,
}

/// Entry of the legacy `highlights` list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HighlightEntry {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub snippet: Option<String>,
}

impl Hit {
    /// Best available highlight snippet with markup removed.
    pub fn snippet(&self) -> Option<String> {
        let from_map = self.highlight.as_ref().and_then(|map| {
            SNIPPET_FIELDS.iter().find_map(|field| {
                let entry = match field {
                    TitleField::Primary => map.title.as_ref(),
                    TitleField::English => map.english_title.as_ref(),
                };
                entry.and_then(|s| s.snippet.as_deref())
            })
        });

        let raw = from_map.or_else(|| {
            SNIPPET_FIELDS.iter().find_map(|field| {
                self.highlights
                    .iter()
                    .find(|h| h.field == field.key())
                    .and_then(|h| h.snippet.as_deref())
            })
        })?;

        let clean = TAG_REGEX.replace_all(raw, "").trim().to_string();
        (!clean.is_empty()).then_some(clean)
    }
}

/// String or numeric identifier, as the chapter APIs mix both.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdLike {
    Text(String),
    Number(serde_json::Number),
}

impl IdLike {
    pub fn as_string(&self) -> String {
        match self {
            IdLike::Text(s) => s.clone(),
            IdLike::Number(n) => n.to_string(),
        }
    }
}

/// Date given either as text or as an epoch number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DateLike {
    Epoch(f64),
    Text(String),
}

/// Envelope of `/api/manga/page`; the site has served both shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MangaPageEnvelope {
    Wrapped {
        #[serde(rename = "mangaPage")]
        manga_page: MangaPage,
    },
    Bare(MangaPage),
}

impl MangaPageEnvelope {
    pub fn into_page(self) -> MangaPage {
        match self {
            MangaPageEnvelope::Wrapped { manga_page } => manga_page,
            MangaPageEnvelope::Bare(page) => page,
        }
    }
}

/// Detailed series payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaPage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub english_title: Option<String>,
    #[serde(default)]
    pub poster: Option<Poster>,
    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub genres: Vec<Tag>,
    #[serde(default)]
    pub chapters: Vec<RawChapter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Poster {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// Body of `/api/manga/info`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MangaInfo {
    #[serde(default)]
    pub chapters: Vec<RawChapter>,
}

/// Body of one page of `/api/manga/chapters`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChapterListPage {
    /// Number of pages, zero-based indices.
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub chapters: Vec<RawChapter>,
}

/// Chapter as the various endpoints return it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChapter {
    #[serde(default)]
    pub id: Option<IdLike>,
    #[serde(default, rename = "_id")]
    pub alt_id: Option<IdLike>,
    #[serde(default)]
    pub chapter_id: Option<IdLike>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub number: Option<f64>,
    #[serde(default)]
    pub index: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateLike>,
    #[serde(default)]
    pub published_at: Option<DateLike>,
    #[serde(default)]
    pub timestamp: Option<DateLike>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub pages: Option<u32>,
}

impl RawChapter {
    /// First identifier the record carries.
    pub fn any_id(&self) -> Option<String> {
        [&self.id, &self.alt_id, &self.chapter_id]
            .into_iter()
            .flatten()
            .map(IdLike::as_string)
            .find(|s| !s.is_empty())
    }

    /// Sort key: index, else number.
    pub fn order_key(&self) -> f64 {
        self.index.or(self.number).unwrap_or(0.0)
    }
}

/// Body of `/api/read/chapter`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadChapterResponse {
    pub read_chapter: Option<ReadChapter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadChapter {
    #[serde(default)]
    pub pages: Vec<ReadPage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadPage {
    pub image: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Body of `/api/home/page`, or the object assigned to `window.homePage`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HomeEnvelope {
    Wrapped {
        #[serde(rename = "homePage")]
        home_page: HomePage,
    },
    Bare(HomePage),
}

impl HomeEnvelope {
    pub fn into_page(self) -> HomePage {
        match self {
            HomeEnvelope::Wrapped { home_page } => home_page,
            HomeEnvelope::Bare(page) => page,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HomePage {
    #[serde(default)]
    pub sections: Vec<HomeSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HomeSection {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub items: Vec<HomeItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub chapter: Option<HomeChapterRef>,
}

impl HomeItem {
    /// Series slug, from `id` or `slug`.
    pub fn raw_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .or(self.slug.as_deref())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HomeChapterRef {
    #[serde(default)]
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_tolerates_missing_fields() {
        let body = r#"{"hits":[{"document":{"id":"abc","title":"Foo"}}]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.found, None);
        assert_eq!(parsed.hits.len(), 1);
        assert_eq!(parsed.hits[0].text_match, 0);
        assert_eq!(parsed.hits[0].document.display_title(), Some("Foo"));
    }

    #[test]
    fn test_search_response_keeps_good_hits_beside_odd_ones() {
        let body = r#"{"found":4,"hits":[
            {"document":{"id":"bsk","title":"Berserk"},"text_match":5},
            {"document":{"id":"x","title":"Berserk of Gluttony"},"text_match":null},
            {"document":null,"text_match":3},
            {"document":{"id":"y"},"text_match":"high"}
        ]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();

        assert_eq!(parsed.found, Some(4));
        assert_eq!(parsed.hits.len(), 3);
        assert_eq!(parsed.hits[0].text_match, 5);
        assert_eq!(parsed.hits[1].text_match, 0);
        assert_eq!(parsed.hits[2].document.id, "");

        let parsed: SearchResponse = serde_json::from_str(r#"{"hits":null}"#).unwrap();
        assert!(parsed.hits.is_empty());
    }

    #[test]
    fn test_display_title_prefers_english() {
        let doc = Document {
            id: "x".to_string(),
            title: Some("Shingeki no Kyojin".to_string()),
            english_title: Some("Attack on Titan".to_string()),
            poster: None,
        };
        assert_eq!(doc.display_title(), Some("Attack on Titan"));

        let doc = Document {
            english_title: Some("  ".to_string()),
            ..doc
        };
        assert_eq!(doc.display_title(), Some("Shingeki no Kyojin"));
    }

    #[test]
    fn test_snippet_preference_and_cleanup() {
        let body = r#"{
            "document": {"id": "1"},
            "highlight": {"englishTitle": {"snippet": "<mark>One</mark> Piece"}},
            "highlights": [{"field": "title", "snippet": "list <b>title</b>"}]
        }"#;
        let hit: Hit = serde_json::from_str(body).unwrap();
        assert_eq!(hit.snippet().as_deref(), Some("One Piece"));

        let body = r#"{
            "document": {"id": "1"},
            "highlights": [
                {"field": "englishTitle", "snippet": "english"},
                {"field": "title", "snippet": "<mark>primary</mark>"}
            ]
        }"#;
        let hit: Hit = serde_json::from_str(body).unwrap();
        assert_eq!(hit.snippet().as_deref(), Some("primary"));

        let hit = Hit::default();
        assert_eq!(hit.snippet(), None);
    }

    #[test]
    fn test_manga_page_envelopes() {
        let wrapped = r#"{"mangaPage":{"title":"A","poster":{"image":"/static/posters/a.webp"}}}"#;
        let page = serde_json::from_str::<MangaPageEnvelope>(wrapped)
            .unwrap()
            .into_page();
        assert_eq!(page.title.as_deref(), Some("A"));

        let bare = r#"{"title":"B","authors":[{"name":"Oda"}]}"#;
        let page = serde_json::from_str::<MangaPageEnvelope>(bare)
            .unwrap()
            .into_page();
        assert_eq!(page.title.as_deref(), Some("B"));
        assert_eq!(page.authors[0].name, "Oda");
    }

    #[test]
    fn test_raw_chapter_ids() {
        let chapter: RawChapter = serde_json::from_str(r#"{"_id": 42, "number": 3}"#).unwrap();
        assert_eq!(chapter.any_id().as_deref(), Some("42"));
        assert_eq!(chapter.order_key(), 3.0);
    }
}
