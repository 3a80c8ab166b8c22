//! Turns one [`RawEntry`] into an [`Article`], or says why it can't.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;

use super::parser::RawEntry;
use crate::util::validate_url;

/// Default minimum publication date: 2022-01-01T00:00:00Z.
pub fn default_cutoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Titles must be strictly longer than this many characters.
pub const DEFAULT_MIN_TITLE_LEN: usize = 10;

/// A deduplicated, date-checked article ready for display.
///
/// Only [`normalize`] builds these, so every `Article` in the process has a
/// trimmed title above the length floor, an absolute link and a resolved
/// timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    title: String,
    url: String,
    published_at: DateTime<Utc>,
}

impl Article {
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The entry's link with surrounding whitespace trimmed; otherwise as
    /// published. This is the deduplication key.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}

/// Knobs that decide which entries survive normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizePolicy {
    /// Entries dated before this are dropped. The bound is inclusive.
    pub cutoff: DateTime<Utc>,
    /// Trimmed titles of this many characters or fewer are dropped.
    pub min_title_len: usize,
}

impl Default for NormalizePolicy {
    fn default() -> Self {
        Self {
            cutoff: default_cutoff(),
            min_title_len: DEFAULT_MIN_TITLE_LEN,
        }
    }
}

/// Why a raw entry did not become an article.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryRejected {
    #[error("entry has neither a published nor an updated date")]
    MissingDate,
    #[error("entry dated {0} is before the cutoff")]
    TooOld(DateTime<Utc>),
    #[error("entry has no title")]
    MissingTitle,
    #[error("entry title is blank")]
    EmptyTitle,
    #[error("entry title has {0} characters, too short")]
    TitleTooShort(usize),
    #[error("entry has no link")]
    MissingLink,
    #[error("entry link is not an absolute http(s) URL: {0}")]
    InvalidLink(String),
}

/// Normalize a single feed entry.
///
/// The date is taken from `published`, falling back to `updated`. Checks run
/// in order: date, cutoff, title, link; the first failure is returned.
pub fn normalize(entry: &RawEntry, policy: &NormalizePolicy) -> Result<Article, EntryRejected> {
    let published_at = entry
        .published
        .or(entry.updated)
        .ok_or(EntryRejected::MissingDate)?;

    if published_at < policy.cutoff {
        return Err(EntryRejected::TooOld(published_at));
    }

    let title = entry
        .title
        .as_deref()
        .ok_or(EntryRejected::MissingTitle)?
        .trim();
    if title.is_empty() {
        return Err(EntryRejected::EmptyTitle);
    }
    let title_len = title.chars().count();
    if title_len <= policy.min_title_len {
        return Err(EntryRejected::TitleTooShort(title_len));
    }

    let link = entry
        .link
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or(EntryRejected::MissingLink)?;
    if validate_url(link).is_err() {
        return Err(EntryRejected::InvalidLink(link.to_string()));
    }

    Ok(Article {
        title: title.to_string(),
        url: link.to_string(),
        published_at,
    })
}

/// Builds an article directly, bypassing validation. Test fixtures only.
#[cfg(test)]
pub(crate) fn article(title: &str, url: &str, published_at: DateTime<Utc>) -> Article {
    Article {
        title: title.to_string(),
        url: url.to_string(),
        published_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn entry(title: &str, link: &str, published: DateTime<Utc>) -> RawEntry {
        RawEntry {
            title: Some(title.to_string()),
            link: Some(link.to_string()),
            published: Some(published),
            updated: None,
        }
    }

    #[test]
    fn test_valid_entry() {
        let raw = entry("  Valid Nine Char!  ", "https://example.com/1", at(2023, 1, 1));
        let article = normalize(&raw, &NormalizePolicy::default()).unwrap();
        assert_eq!(article.title(), "Valid Nine Char!");
        assert_eq!(article.url(), "https://example.com/1");
        assert_eq!(article.published_at(), at(2023, 1, 1));
    }

    #[test]
    fn test_updated_used_when_published_missing() {
        let raw = RawEntry {
            published: None,
            updated: Some(at(2024, 5, 6)),
            ..entry("A perfectly fine title", "https://example.com/2", at(2000, 1, 1))
        };
        let article = normalize(&raw, &NormalizePolicy::default()).unwrap();
        assert_eq!(article.published_at(), at(2024, 5, 6));
    }

    #[test]
    fn test_published_preferred_over_updated() {
        let raw = RawEntry {
            updated: Some(at(2024, 5, 6)),
            ..entry("A perfectly fine title", "https://example.com/2", at(2023, 2, 2))
        };
        let article = normalize(&raw, &NormalizePolicy::default()).unwrap();
        assert_eq!(article.published_at(), at(2023, 2, 2));
    }

    #[test]
    fn test_missing_date_rejected() {
        let raw = RawEntry {
            published: None,
            ..entry("A perfectly fine title", "https://example.com/3", at(2023, 1, 1))
        };
        assert_eq!(
            normalize(&raw, &NormalizePolicy::default()),
            Err(EntryRejected::MissingDate)
        );
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let policy = NormalizePolicy::default();
        let on_cutoff = entry("Exactly at the cutoff", "https://example.com/4", policy.cutoff);
        assert!(normalize(&on_cutoff, &policy).is_ok());

        let before = entry(
            "One second too early",
            "https://example.com/5",
            policy.cutoff - chrono::Duration::seconds(1),
        );
        assert!(matches!(
            normalize(&before, &policy),
            Err(EntryRejected::TooOld(_))
        ));
    }

    #[test]
    fn test_title_length_boundary() {
        let policy = NormalizePolicy::default();
        let ten = entry("  abcdefghij ", "https://example.com/6", at(2023, 1, 1));
        assert_eq!(
            normalize(&ten, &policy),
            Err(EntryRejected::TitleTooShort(10))
        );

        let eleven = entry("abcdefghijk", "https://example.com/7", at(2023, 1, 1));
        assert_eq!(normalize(&eleven, &policy).unwrap().title(), "abcdefghijk");
    }

    #[test]
    fn test_title_length_counts_characters() {
        // 11 characters, 22 bytes
        let raw = entry("ÄÖÜäöüßéèêë", "https://example.com/8", at(2023, 1, 1));
        assert!(normalize(&raw, &NormalizePolicy::default()).is_ok());
    }

    #[test]
    fn test_title_problems_rejected() {
        let policy = NormalizePolicy::default();

        let missing = RawEntry {
            title: None,
            ..entry("x", "https://example.com/9", at(2023, 1, 1))
        };
        assert_eq!(normalize(&missing, &policy), Err(EntryRejected::MissingTitle));

        let blank = entry("   \n\t ", "https://example.com/9", at(2023, 1, 1));
        assert_eq!(normalize(&blank, &policy), Err(EntryRejected::EmptyTitle));
    }

    #[test]
    fn test_link_problems_rejected() {
        let policy = NormalizePolicy::default();

        let missing = RawEntry {
            link: None,
            ..entry("A perfectly fine title", "x", at(2023, 1, 1))
        };
        assert_eq!(normalize(&missing, &policy), Err(EntryRejected::MissingLink));

        let blank = entry("A perfectly fine title", "   ", at(2023, 1, 1));
        assert_eq!(normalize(&blank, &policy), Err(EntryRejected::MissingLink));

        let relative = entry("A perfectly fine title", "/2023/story", at(2023, 1, 1));
        assert!(matches!(
            normalize(&relative, &policy),
            Err(EntryRejected::InvalidLink(_))
        ));
    }

    #[test]
    fn test_link_whitespace_trimmed() {
        let raw = entry(
            "A perfectly fine title",
            "  https://example.com/x?a=1 \n",
            at(2023, 1, 1),
        );
        let article = normalize(&raw, &NormalizePolicy::default()).unwrap();
        assert_eq!(article.url(), "https://example.com/x?a=1");
    }

    #[test]
    fn test_custom_policy() {
        let policy = NormalizePolicy {
            cutoff: at(2024, 1, 1),
            min_title_len: 3,
        };
        let raw = entry("Tiny", "https://example.com/10", at(2023, 6, 1));
        assert!(matches!(
            normalize(&raw, &policy),
            Err(EntryRejected::TooOld(_))
        ));

        let raw = entry("Tiny", "https://example.com/10", at(2024, 6, 1));
        assert!(normalize(&raw, &policy).is_ok());
    }
}
