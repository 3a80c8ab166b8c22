//! HTTP surface: one HTML page, a JSON mirror of it, and a health check.
//!
//! Handlers only ever read through [`FreshnessCache`]; they never see a
//! fetch error, at worst an empty list.

use std::fmt::Write;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{CacheSnapshot, FreshnessCache};
use crate::feed::{Article, FeedReader};

pub fn router<R>(cache: Arc<FreshnessCache<R>>) -> Router
where
    R: FeedReader + 'static,
{
    Router::new()
        .route("/", get(index::<R>))
        .route("/api/articles", get(articles_json::<R>))
        .route("/health", get(health))
        .with_state(cache)
}

async fn index<R: FeedReader + 'static>(
    State(cache): State<Arc<FreshnessCache<R>>>,
) -> Html<String> {
    let html = match cache.get_snapshot().await {
        Some(snapshot) => render_page(&snapshot.articles, Some(snapshot.fetched_at)),
        None => render_page(&[], None),
    };
    Html(html)
}

#[derive(Debug, Serialize)]
struct ArticlesResponse {
    total: usize,
    fetched_at: Option<DateTime<Utc>>,
    articles: Vec<Article>,
}

impl From<Option<Arc<CacheSnapshot>>> for ArticlesResponse {
    fn from(snapshot: Option<Arc<CacheSnapshot>>) -> Self {
        let (articles, fetched_at) = match snapshot {
            Some(s) => (s.articles.to_vec(), Some(s.fetched_at)),
            None => (Vec::new(), None),
        };
        Self {
            total: articles.len(),
            fetched_at,
            articles,
        }
    }
}

async fn articles_json<R: FeedReader + 'static>(
    State(cache): State<Arc<FreshnessCache<R>>>,
) -> Json<ArticlesResponse> {
    Json(ArticlesResponse::from(cache.get_snapshot().await))
}

async fn health() -> &'static str {
    "ok"
}

/// Render the article list as a standalone HTML document.
pub fn render_page(articles: &[Article], fetched_at: Option<DateTime<Utc>>) -> String {
    let mut html = String::with_capacity(1024 + articles.len() * 256);
    html.push_str(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>Latest articles</title>\n</head>\n<body>\n<main>\n",
    );

    // Writing into a String cannot fail
    let _ = writeln!(html, "<h1>Latest articles</h1>");
    let _ = writeln!(html, "<p class=\"total\">{} articles</p>", articles.len());
    if let Some(at) = fetched_at {
        let _ = writeln!(
            html,
            "<p class=\"updated\">Updated {}</p>",
            at.format("%Y-%m-%d %H:%M UTC")
        );
    }

    if articles.is_empty() {
        html.push_str("<p class=\"empty\">No articles available right now.</p>\n");
    } else {
        html.push_str("<ol class=\"articles\">\n");
        for article in articles {
            let _ = writeln!(
                html,
                "<li><a href=\"{}\" rel=\"noopener\">{}</a> <time datetime=\"{}\">{}</time></li>",
                escape_html(article.url()),
                escape_html(article.title()),
                article.published_at().to_rfc3339(),
                article.published_at().format("%b %-d, %Y"),
            );
        }
        html.push_str("</ol>\n");
    }

    html.push_str("</main>\n</body>\n</html>\n");
    html
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
