use chrono::{DateTime, Utc};
use feed_rs::parser;

/// One entry as it comes out of an RSS/Atom document.
///
/// Every field is optional; feeds in the wild omit any of them. Deciding
/// what is usable is the normalizer's job, not the parser's.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

pub fn parse_feed(bytes: &[u8]) -> Result<Vec<RawEntry>, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| RawEntry {
            title: entry.title.map(|t| t.content),
            link: article_link(entry.links),
            published: entry.published,
            updated: entry.updated,
        })
        .collect();

    Ok(entries)
}

/// The entry's page link: the first `alternate` (or rel-less) link, falling
/// back to whatever link comes first. Atom entries often list enclosures or
/// images ahead of the article itself.
fn article_link(links: Vec<feed_rs::model::Link>) -> Option<String> {
    let alternate = links
        .iter()
        .position(|l| matches!(l.rel.as_deref(), None | Some("alternate")));
    let index = alternate.unwrap_or(0);
    links.into_iter().nth(index).map(|l| l.href)
}
