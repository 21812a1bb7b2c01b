use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::fetch::Fetcher;
use crate::fragment::Fragment;
use crate::sanitize::sanitize_social_fragment;
use crate::source::{non_blank_or, ExtractError, SourceAdapter};
use crate::types::{dedupe_preserving_order, ArticleRecord, SourceKind, UNTITLED};
use crate::FetchError;

pub const ARTICLE_BASE_URL: &str = "https://mp.weixin.qq.com/s/";

const ALBUM_DIRECTORY_MARKER: &str = "· 目录";

static CREATE_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"createTime\s*=\s*'([\d\-: ]+)'").expect("static regex"));
static SCRIPT_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\s*(.*?)\s*\}").expect("static regex"));
static QUOTED_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+):\s*'([^']*)'").expect("static regex"));

/// A fetched article page and the URL it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialPage {
    pub url: String,
    pub html: String,
}

#[derive(Debug, Clone)]
pub struct SocialPageAdapter {
    default_author: String,
}

impl SocialPageAdapter {
    pub fn new(default_author: impl Into<String>) -> Self {
        Self {
            default_author: default_author.into(),
        }
    }

    /// Bare article ids become full article URLs; URLs pass through.
    pub fn article_url(id_or_url: &str) -> String {
        let trimmed = id_or_url.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("{ARTICLE_BASE_URL}{trimmed}")
        }
    }

    pub async fn fetch(&self, fetcher: &dyn Fetcher, url: &str) -> Result<SocialPage, FetchError> {
        let html = fetcher.fetch_text(url).await?;
        Ok(SocialPage {
            url: url.to_string(),
            html,
        })
    }
}

impl SourceAdapter for SocialPageAdapter {
    type Raw = SocialPage;

    fn kind(&self) -> SourceKind {
        SourceKind::SocialPage
    }

    fn extract_fragment(&self, page: &SocialPage) -> Result<Fragment, ExtractError> {
        content_fragment(&Html::parse_document(&page.html), &page.url)
    }

    fn extract_article(&self, page: &SocialPage, today: NaiveDate) -> Result<ArticleRecord, ExtractError> {
        let doc = Html::parse_document(&page.html);
        let fragment = content_fragment(&doc, &page.url)?;

        let title = select_first(&doc, "h1.rich_media_title").map(|el| element_text(&el));
        let author = select_first(&doc, r#"meta[name="author"]"#)
            .and_then(|el| el.value().attr("content"));
        let thumbnail_url = select_first(&doc, r#"meta[property="og:image"]"#)
            .and_then(|el| el.value().attr("content"))
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        Ok(ArticleRecord {
            title: non_blank_or(title.as_deref(), UNTITLED),
            author: non_blank_or(author, &self.default_author),
            publish_date: create_time(&doc).unwrap_or(today),
            canonical_url: page.url.clone(),
            thumbnail_url,
            categories: categories(&doc),
            fragment,
        })
    }

    fn sanitize(&self, fragment: &mut Fragment) {
        sanitize_social_fragment(fragment);
    }
}

fn select_first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector).next()
}

fn select_texts(doc: &Html, css: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };
    doc.select(&selector)
        .map(|el| element_text(&el))
        .filter(|text| !text.is_empty())
        .collect()
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn script_texts(doc: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("script") else {
        return Vec::new();
    };
    doc.select(&selector)
        .map(|el| el.text().collect::<String>())
        .collect()
}

fn content_fragment(doc: &Html, url: &str) -> Result<Fragment, ExtractError> {
    select_first(doc, "div#js_content")
        .map(Fragment::from_element)
        .ok_or_else(|| ExtractError::MissingContent {
            url: url.to_string(),
        })
}

/// Date part of the first parseable `createTime = '...'` script assignment.
fn create_time(doc: &Html) -> Option<NaiveDate> {
    script_texts(doc).iter().find_map(|script| {
        let captures = CREATE_TIME.captures(script)?;
        let day = captures.get(1)?.as_str().split_whitespace().next()?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    })
}

/// Album directory names, then article tags, then the albums declared in
/// the page's `album_info_list` script.
fn categories(doc: &Html) -> Vec<String> {
    let mut tags: Vec<String> = select_texts(doc, "span.wx_tap_link.js_album_directory__name")
        .into_iter()
        .map(|text| text.replace(ALBUM_DIRECTORY_MARKER, "").trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();
    if tags.is_empty() {
        tags = select_texts(doc, "span.article-tag__item");
    }
    if tags.is_empty() {
        tags = script_texts(doc)
            .iter()
            .filter(|script| script.contains("album_info_list"))
            .flat_map(|script| album_titles(script))
            .collect();
    }
    dedupe_preserving_order(tags)
}

fn album_titles(script: &str) -> Vec<String> {
    SCRIPT_OBJECT
        .captures_iter(script)
        .filter_map(|object| {
            let body = object.get(1)?.as_str();
            let fields: HashMap<&str, &str> = QUOTED_FIELD
                .captures_iter(body)
                .filter_map(|field| Some((field.get(1)?.as_str(), field.get(2)?.as_str())))
                .collect();
            fields.get("albumId")?;
            let title = fields.get("title")?.replace("&amp;", "&").trim().to_string();
            (!title.is_empty()).then_some(title)
        })
        .collect()
}
