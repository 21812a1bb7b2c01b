use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use quick_xml::encoding::Decoder;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use thiserror::Error;

use crate::categories::CategoryLookup;
use crate::fragment::Fragment;
use crate::source::{non_blank_or, ExtractError, SourceAdapter};
use crate::types::{dedupe_preserving_order, ArticleRecord, SourceKind, UNTITLED};

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed feed: {0}")]
    Xml(String),
}

/// Raw fields of one `<entry>`, before any defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomEntry {
    pub title: String,
    /// `href` of the first `link rel="alternate"`.
    pub link: Option<String>,
    pub published: String,
    pub author: Option<String>,
    /// Escaped or CDATA HTML, unescaped.
    pub content: String,
}

pub struct AtomFeedAdapter {
    categories: Arc<dyn CategoryLookup>,
    default_author: String,
}

impl AtomFeedAdapter {
    pub fn new(categories: Arc<dyn CategoryLookup>, default_author: impl Into<String>) -> Self {
        Self {
            categories,
            default_author: default_author.into(),
        }
    }
}

impl SourceAdapter for AtomFeedAdapter {
    type Raw = AtomEntry;

    fn kind(&self) -> SourceKind {
        SourceKind::AtomFeed
    }

    fn extract_fragment(&self, entry: &AtomEntry) -> Result<Fragment, ExtractError> {
        Ok(Fragment::parse(&entry.content))
    }

    fn extract_article(&self, entry: &AtomEntry, today: NaiveDate) -> Result<ArticleRecord, ExtractError> {
        let canonical_url = entry.link.as_deref().map(str::trim).unwrap_or_default().to_string();
        let categories = self
            .categories
            .tags_for(&canonical_url)
            .map(dedupe_preserving_order)
            .unwrap_or_default();
        Ok(ArticleRecord {
            title: non_blank_or(Some(&entry.title), UNTITLED),
            author: non_blank_or(entry.author.as_deref(), &self.default_author),
            publish_date: parse_published(&entry.published).unwrap_or(today),
            thumbnail_url: None,
            categories,
            fragment: self.extract_fragment(entry)?,
            canonical_url,
        })
    }
}

/// Removes the C0 control characters XML 1.0 forbids (tab, LF and CR stay).
pub fn strip_control_chars(xml: &str) -> String {
    xml.chars()
        .filter(|ch| !matches!(ch, '\u{00}'..='\u{08}' | '\u{0B}'..='\u{0C}' | '\u{0E}'..='\u{1F}'))
        .collect()
}

/// Calendar date of an ISO-8601 timestamp, in the timestamp's own offset.
pub fn parse_published(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let normalized = match raw.strip_suffix(['Z', 'z']) {
        Some(base) => format!("{base}+00:00"),
        None => raw.to_string(),
    };
    if let Ok(stamp) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(stamp.date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(stamp) = DateTime::parse_from_str(&normalized, format) {
            return Some(stamp.date_naive());
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Some(stamp.date());
        }
    }
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").ok()
}

pub async fn read_feed(path: &Path) -> Result<Vec<AtomEntry>, FeedError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| FeedError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    parse_entries(text.trim_start_matches('\u{feff}'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AtomElement {
    Entry,
    Title,
    Link,
    Published,
    Author,
    Name,
    Content,
    Other,
}

fn classify(in_atom: bool, local_name: &[u8], parent: Option<AtomElement>, in_entry: bool) -> AtomElement {
    if !in_atom {
        return AtomElement::Other;
    }
    match (parent, local_name) {
        (_, b"entry") if !in_entry => AtomElement::Entry,
        (Some(AtomElement::Entry), b"title") => AtomElement::Title,
        (Some(AtomElement::Entry), b"link") => AtomElement::Link,
        (Some(AtomElement::Entry), b"published") => AtomElement::Published,
        (Some(AtomElement::Entry), b"author") => AtomElement::Author,
        (Some(AtomElement::Entry), b"content") => AtomElement::Content,
        (Some(AtomElement::Author), b"name") => AtomElement::Name,
        _ => AtomElement::Other,
    }
}

/// Every Atom-namespaced `<entry>` in the document, at any depth.
pub fn parse_entries(xml: &str) -> Result<Vec<AtomEntry>, FeedError> {
    let cleaned = strip_control_chars(xml);
    let mut reader = NsReader::from_str(&cleaned);
    let decoder = reader.decoder();

    let mut entries = Vec::new();
    let mut current: Option<AtomEntry> = None;
    let mut path: Vec<AtomElement> = Vec::new();

    loop {
        let (ns, event) = reader
            .read_resolved_event()
            .map_err(|err| FeedError::Xml(err.to_string()))?;
        let in_atom = matches!(ns, ResolveResult::Bound(Namespace(uri)) if uri == ATOM_NS.as_bytes());

        match event {
            Event::Start(start) => {
                let element = classify(in_atom, start.local_name().as_ref(), path.last().copied(), current.is_some());
                match element {
                    AtomElement::Entry => current = Some(AtomEntry::default()),
                    AtomElement::Link => record_link(&start, decoder, current.as_mut())?,
                    _ => {}
                }
                path.push(element);
            }
            Event::Empty(start) => {
                let element = classify(in_atom, start.local_name().as_ref(), path.last().copied(), current.is_some());
                match element {
                    AtomElement::Entry => entries.push(AtomEntry::default()),
                    AtomElement::Link => record_link(&start, decoder, current.as_mut())?,
                    _ => {}
                }
            }
            Event::End(_) => {
                if path.pop() == Some(AtomElement::Entry) {
                    entries.extend(current.take());
                }
            }
            Event::Text(text) => {
                let text = decode(decoder, &text)?;
                append_text(current.as_mut(), path.last().copied(), &text);
            }
            Event::CData(data) => {
                let text = decode(decoder, &data)?;
                append_text(current.as_mut(), path.last().copied(), &text);
            }
            Event::GeneralRef(reference) => {
                let text = resolve_reference(&reference, decoder)?;
                append_text(current.as_mut(), path.last().copied(), &text);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(entries)
}

fn decode(decoder: Decoder, bytes: &[u8]) -> Result<String, FeedError> {
    decoder
        .decode(bytes)
        .map(|text| text.into_owned())
        .map_err(|err| FeedError::Xml(err.to_string()))
}

fn append_text(entry: Option<&mut AtomEntry>, element: Option<AtomElement>, text: &str) {
    let (Some(entry), Some(element)) = (entry, element) else {
        return;
    };
    match element {
        AtomElement::Title => entry.title.push_str(text),
        AtomElement::Published => entry.published.push_str(text),
        AtomElement::Name => entry.author.get_or_insert_with(String::new).push_str(text),
        AtomElement::Content => entry.content.push_str(text),
        _ => {}
    }
}

fn record_link(start: &BytesStart<'_>, decoder: Decoder, entry: Option<&mut AtomEntry>) -> Result<(), FeedError> {
    let Some(entry) = entry else {
        return Ok(());
    };
    if entry.link.is_some() {
        return Ok(());
    }
    let mut rel = None;
    let mut href = None;
    for attr in start.attributes() {
        let attr = attr.map_err(|err| FeedError::Xml(err.to_string()))?;
        let value = match attr.decode_and_unescape_value(decoder) {
            Ok(value) => value.into_owned(),
            Err(_) => decode(decoder, &attr.value)?,
        };
        match attr.key.as_ref() {
            b"rel" => rel = Some(value),
            b"href" => href = Some(value),
            _ => {}
        }
    }
    if rel.as_deref() == Some("alternate") {
        entry.link = href;
    }
    Ok(())
}

/// Character references and the predefined entities resolve; any other
/// entity is kept as written.
fn resolve_reference(reference: &BytesRef<'_>, decoder: Decoder) -> Result<String, FeedError> {
    if let Ok(Some(ch)) = reference.resolve_char_ref() {
        return Ok(ch.to_string());
    }
    let name = decode(decoder, reference)?;
    Ok(resolve_predefined_entity(&name).map_or_else(|| format!("&{name};"), str::to_string))
}
