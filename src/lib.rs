//! Feed digest: several RSS feeds of one publication folded into a single,
//! deduplicated, newest-first article list behind a time-bounded cache.
//!
//! - [`feed`] - parse, normalize, fetch and aggregate
//! - [`cache`] - the shared [`cache::FreshnessCache`]
//! - [`config`] - `feeds.toml` loading and validation
//! - [`web`] - axum routes that render the cached list

pub mod cache;
pub mod config;
pub mod feed;
pub mod util;
pub mod web;
