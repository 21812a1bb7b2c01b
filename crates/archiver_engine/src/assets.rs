use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_warn};
use url::Url;

use crate::fetch::Fetcher;
use crate::fragment::{ElementNode, Fragment};
use crate::identity::ArticleId;

pub const DEFAULT_THUMBNAIL: &str = "/images/default-post-thumbnail.png";
const THUMBNAIL_NAME: &str = "thumbnail.png";

/// One image of an article and where its local copy lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub remote_url: String,
    /// `{n}.png`, numbered by encounter order.
    pub local_name: String,
    pub local_path: PathBuf,
    /// Site-absolute path written into the post.
    pub public_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizationReport {
    pub assets: Vec<AssetReference>,
    pub downloaded: usize,
    pub failed: usize,
    /// `img` elements without a usable `data-src` or `src`.
    pub skipped: usize,
}

impl LocalizationReport {
    pub fn located(&self) -> usize {
        self.assets.len()
    }
}

pub fn public_asset_path(id: &ArticleId, local_name: &str) -> String {
    format!("/images/{}/{}", id, local_name)
}

/// Rewrites image references of one article to local copies.
pub struct AssetLocalizer<'a> {
    fetcher: &'a dyn Fetcher,
    download_enabled: bool,
    base_url: Option<Url>,
}

impl<'a> AssetLocalizer<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, download_enabled: bool) -> Self {
        Self {
            fetcher,
            download_enabled,
            base_url: None,
        }
    }

    /// Page URL that relative and protocol-relative image URLs resolve against.
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.base_url = Url::parse(base).ok();
        self
    }

    /// Assigns `1.png..k.png` in document order and rewrites every located
    /// image to its local path, whether or not its download succeeded.
    pub async fn localize(
        &self,
        fragment: &mut Fragment,
        article_dir: &Path,
        id: &ArticleId,
    ) -> LocalizationReport {
        let mut report = LocalizationReport::default();
        for img in fragment.images_mut() {
            let Some(raw) = image_reference(img) else {
                report.skipped += 1;
                continue;
            };
            let local_name = format!("{}.png", report.assets.len() + 1);
            let asset = AssetReference {
                remote_url: self.resolve(&raw),
                local_path: article_dir.join(&local_name),
                public_path: public_asset_path(id, &local_name),
                local_name,
            };

            if self.download_enabled {
                if self.fetcher.download(&asset.remote_url, &asset.local_path).await {
                    report.downloaded += 1;
                } else {
                    report.failed += 1;
                    engine_warn!(
                        "Image {} of {} left dangling at {}",
                        asset.local_name,
                        id,
                        asset.public_path
                    );
                }
            }

            img.set_attr("src", asset.public_path.clone());
            img.remove_attr("data-src");
            report.assets.push(asset);
        }
        engine_debug!(
            "Localized {} images for {} ({} downloaded, {} failed, {} skipped)",
            report.located(),
            id,
            report.downloaded,
            report.failed,
            report.skipped
        );
        report
    }

    /// Thumbnail path for the front matter.
    ///
    /// A remote thumbnail whose download fails falls back to the default
    /// image so the post never points at a missing file. With downloads
    /// disabled the local path is used as-is.
    pub async fn localize_thumbnail(
        &self,
        remote: Option<&str>,
        article_dir: &Path,
        id: &ArticleId,
    ) -> String {
        let Some(remote) = remote.map(str::trim).filter(|url| !url.is_empty()) else {
            return DEFAULT_THUMBNAIL.to_string();
        };
        let public_path = public_asset_path(id, THUMBNAIL_NAME);
        if !self.download_enabled {
            return public_path;
        }
        let remote = self.resolve(remote);
        if self
            .fetcher
            .download(&remote, &article_dir.join(THUMBNAIL_NAME))
            .await
        {
            public_path
        } else {
            engine_warn!("Thumbnail {} for {} unavailable, using default", remote, id);
            DEFAULT_THUMBNAIL.to_string()
        }
    }

    fn resolve(&self, raw: &str) -> String {
        match &self.base_url {
            Some(base) => base
                .join(raw)
                .map(String::from)
                .unwrap_or_else(|_| raw.to_string()),
            None => raw.to_string(),
        }
    }
}

/// `data-src` wins over `src`; blank values count as missing.
fn image_reference(img: &ElementNode) -> Option<String> {
    ["data-src", "src"]
        .into_iter()
        .filter_map(|name| img.attr(name))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}
