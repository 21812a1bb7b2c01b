//! Command-line interface of the archiver.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use engine_logging::LogDestination;

/// Archives social-platform articles and Atom blog exports as Jekyll posts.
///
/// ```sh
/// archiver --root ../blog social 9ah9AKqPMfHtAqVlZbsG5w PaPEJj2RnQ6IFFl5ngSrTg
/// archiver --root ../blog --proxy http://127.0.0.1:7890 atom export.xml --categories categories.ron
/// archiver discover --listings listings.ron --out categories.ron
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Blog root holding `_posts/` and `images/`
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Optional RON settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Forward proxy for every request
    #[arg(long, global = true, conflicts_with = "no_proxy")]
    pub proxy: Option<String>,

    /// Connect directly, ignoring configured and environment proxies
    #[arg(long, global = true)]
    pub no_proxy: bool,

    /// Rewrite image references without downloading the files
    #[arg(long, global = true)]
    pub no_images: bool,

    /// Attempts per request before giving up
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Also write the log to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// More output; repeat for trace level
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn log_destination(&self) -> LogDestination {
        match &self.log_file {
            Some(path) => LogDestination::Both(path.clone()),
            None => LogDestination::Terminal,
        }
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Archive social-platform articles by id or URL
    Social {
        /// Article ids or full article URLs
        ids: Vec<String>,

        /// File with one id or URL per line
        #[arg(long)]
        list: Option<PathBuf>,
    },
    /// Archive every entry of one or more Atom export files
    Atom {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// RON table mapping post URLs to tags
        #[arg(long)]
        categories: Option<PathBuf>,
    },
    /// Crawl category listing pages into a category table
    Discover {
        /// RON list of `(name: ..., url: ...)` listings
        #[arg(long)]
        listings: PathBuf,

        /// Where to write the category table
        #[arg(long)]
        out: PathBuf,
    },
}
