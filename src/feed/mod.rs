//! Feed pipeline: parse, normalize, fetch, aggregate.
//!
//! - [`parser`] - thin adapter over `feed-rs`, produces [`RawEntry`] values
//! - [`normalize`] - turns one raw entry into an [`Article`] or an [`EntryRejected`]
//! - [`fetcher`] - retrieves one [`FeedSource`], never fails outward
//! - [`aggregate`] - runs every source in order, dedups by url, sorts newest first
//!
//! # Example
//!
//! ```ignore
//! use digest::feed::{Aggregator, FeedSource, HttpFeedReader, NormalizePolicy};
//!
//! let reader = HttpFeedReader::new(reqwest::Client::new());
//! let sources = vec![FeedSource::parse("https://www.theverge.com/rss/index.xml")?];
//! let aggregated = Aggregator::new(reader, sources, NormalizePolicy::default())
//!     .aggregate()
//!     .await;
//! ```

mod aggregate;
mod fetcher;
mod normalize;
mod parser;

pub use aggregate::{
    merge_articles, AggregateReport, Aggregated, Aggregator, SourceReport,
    DEFAULT_COURTESY_DELAY,
};
pub use fetcher::{fetch_one, FeedOutcome, FeedReader, FeedSource, FetchError, HttpFeedReader};
pub use normalize::{
    default_cutoff, normalize, Article, EntryRejected, NormalizePolicy, DEFAULT_MIN_TITLE_LEN,
};
pub use parser::{parse_feed, RawEntry};

#[cfg(test)]
pub(crate) use normalize::article;
