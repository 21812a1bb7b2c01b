//! Archiver engine: turns social-platform pages and Atom exports into a
//! Jekyll post archive with locally cached images.
mod assets;
mod categories;
mod config;
mod convert;
mod decode;
mod discover;
mod fetch;
mod fragment;
mod frontmatter;
mod identity;
mod persist;
mod pipeline;
mod retry;
mod sanitize;
mod source;
mod types;

pub use assets::{AssetLocalizer, AssetReference, LocalizationReport, DEFAULT_THUMBNAIL};
pub use categories::{CategoryLookup, CategoryTable};
pub use config::{ArchiveConfig, ConfigError, ConfigFile, Today};
pub use convert::{Converter, Html2MdConverter};
pub use decode::{decode_body, DecodedText};
pub use discover::{discover_categories, listing_links, load_listings, CategoryListing};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_USER_AGENT};
pub use fragment::{ElementNode, Fragment, FragmentNode};
pub use frontmatter::{build_front_matter, build_post_document};
pub use identity::{article_id, post_filename, ArticleId};
pub use persist::{ensure_output_dir, write_asset, AtomicFileWriter, PersistError, PostWriter};
pub use pipeline::{ArchiveError, Archiver};
pub use retry::{retry_with_policy, Backoff, RetryPolicy};
pub use sanitize::{sanitize_social_fragment, strip_list_markers};
pub use source::atom::{parse_entries, parse_published, read_feed, strip_control_chars, AtomEntry, AtomFeedAdapter, FeedError, ATOM_NS};
pub use source::social::{SocialPage, SocialPageAdapter, ARTICLE_BASE_URL};
pub use source::{ExtractError, SourceAdapter};
pub use types::{
    dedupe_preserving_order, ArticleRecord, BatchReport, FailureKind, FailureRecord, FetchError,
    FetchMetadata, FetchOutput, PostOutcome, SourceKind, Stage, DEFAULT_AUTHOR, UNTITLED,
};
