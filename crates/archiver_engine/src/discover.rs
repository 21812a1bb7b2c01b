//! Builds a [`CategoryTable`] by crawling the blog's category listing pages.

use std::fs;
use std::path::Path;

use engine_logging::{engine_info, engine_warn};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::categories::CategoryTable;
use crate::config::ConfigError;
use crate::fetch::Fetcher;

/// A category name and the page listing its posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryListing {
    pub name: String,
    pub url: String,
}

pub fn load_listings(path: &Path) -> Result<Vec<CategoryListing>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&text).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Post links (`a.entrylistItemTitle`) on a listing page, absolute when `base` parses.
pub fn listing_links(html: &str, base: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a.entrylistItemTitle") else {
        return Vec::new();
    };
    let base = Url::parse(base).ok();
    let doc = Html::parse_document(html);
    doc.select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(|href| match &base {
            Some(base) => base
                .join(href)
                .map(String::from)
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        })
        .collect()
}

/// Listings are visited in order; one that cannot be fetched is skipped.
pub async fn discover_categories(fetcher: &dyn Fetcher, listings: &[CategoryListing]) -> CategoryTable {
    let mut table = CategoryTable::new();
    for listing in listings {
        let html = match fetcher.fetch_text(&listing.url).await {
            Ok(html) => html,
            Err(err) => {
                engine_warn!("Skipping category {} ({}): {}", listing.name, listing.url, err);
                continue;
            }
        };
        let links = listing_links(&html, &listing.url);
        engine_info!("Category {}: {} posts", listing.name, links.len());
        for link in links {
            table.insert(link, listing.name.clone());
        }
    }
    table
}
