//! App Store providers: the public product page, the customer-review feed
//! and the iTunes Search API.

use async_trait::async_trait;
use chrono::DateTime;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::models::{IosSearchResult, Review, StorefrontPage};
use crate::scraper::{
    collapse_whitespace, fetch_html, fetch_json, find_ld_json, json_f64, json_string, meta_content,
    select_text,
};

const SEARCH_URL: &str = "https://itunes.apple.com/search";

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1.product-header__title").expect("Failed to parse title selector"));
static DEVELOPER_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h2.product-header__identity").expect("Failed to parse developer selector")
});
static DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.section__description p").expect("Failed to parse description selector")
});
static RATING_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("span.we-customer-ratings__averages__display").expect("Failed to parse rating selector")
});
static PRICE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("li.app-header__list__item--price").expect("Failed to parse price selector")
});
static OG_IMAGE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).expect("Failed to parse og:image selector"));

/// iOS storefront, reviews and search.
#[async_trait]
pub trait AppStore: Send + Sync {
    /// Scrapes the product page for `app_id`.
    async fn storefront(&self, app_id: &str) -> Result<StorefrontPage>;

    /// Most recent customer reviews, newest first, at most `limit`.
    async fn reviews(&self, app_id: &str, limit: usize) -> Result<Vec<Review>>;

    /// Software search, optionally restricted to one genre id.
    async fn search(&self, term: &str, genre_id: Option<u32>, limit: usize) -> Result<Vec<IosSearchResult>>;
}

pub struct AppleClient {
    client: Client,
    country: String,
}

impl AppleClient {
    pub fn new(client: Client, country: impl Into<String>) -> Self {
        Self {
            client,
            country: country.into(),
        }
    }
}

#[async_trait]
impl AppStore for AppleClient {
    async fn storefront(&self, app_id: &str) -> Result<StorefrontPage> {
        let url = format!("https://apps.apple.com/{}/app/id{}", self.country, app_id);
        let html = fetch_html(&self.client, &url, &[]).await?;
        Ok(parse_storefront(&html))
    }

    async fn reviews(&self, app_id: &str, limit: usize) -> Result<Vec<Review>> {
        let url = format!(
            "https://itunes.apple.com/{}/rss/customerreviews/page=1/id={}/sortby=mostrecent/json",
            self.country, app_id
        );
        let body = fetch_html(&self.client, &url, &[]).await?;
        parse_reviews(&body, limit)
    }

    async fn search(&self, term: &str, genre_id: Option<u32>, limit: usize) -> Result<Vec<IosSearchResult>> {
        let limit = limit.to_string();
        let genre = genre_id.map(|id| id.to_string());
        let mut query = vec![
            ("term", term),
            ("country", self.country.as_str()),
            ("entity", "software"),
            ("limit", limit.as_str()),
        ];
        if let Some(genre) = genre.as_deref() {
            query.push(("genreId", genre));
        }
        let response: SearchResponse = fetch_json(&self.client, SEARCH_URL, &query).await?;
        Ok(parse_search_results(response.results))
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Value>,
}

/// Decodes search results one by one; an entry that does not fit the
/// expected shape is logged and dropped without losing its siblings.
pub fn parse_search_results(results: Vec<Value>) -> Vec<IosSearchResult> {
    results
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<IosSearchResult>(value) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed search result");
                None
            }
        })
        .collect()
}

/// Text nodes directly under `element`, skipping nested badges.
fn own_text(element: ElementRef<'_>) -> Option<String> {
    let text: String = element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| String::from(&**t)))
        .collect();
    let text = collapse_whitespace(&text);
    (!text.is_empty()).then_some(text)
}

fn format_offer_price(offer: &Value) -> Option<String> {
    let price = json_f64(&offer["price"])?;
    if price == 0.0 {
        return Some("Free".to_string());
    }
    Some(match json_string(&offer["priceCurrency"]) {
        Some(currency) => format!("{:.2} {}", price, currency),
        None => format!("{:.2}", price),
    })
}

/// Reads the product page. Structured data wins; the fixed header and
/// description markup fills whatever it leaves out.
pub fn parse_storefront(html: &str) -> StorefrontPage {
    let document = Html::parse_document(html);
    let ld = find_ld_json(&document, "SoftwareApplication").unwrap_or(Value::Null);

    let title = json_string(&ld["name"])
        .or_else(|| document.select(&TITLE_SELECTOR).find_map(own_text));
    let developer = json_string(&ld["author"]["name"])
        .or_else(|| select_text(&document, &DEVELOPER_SELECTOR));
    let description = json_string(&ld["description"])
        .or_else(|| select_text(&document, &DESCRIPTION_SELECTOR));
    let rating = json_f64(&ld["aggregateRating"]["ratingValue"])
        .or_else(|| select_text(&document, &RATING_SELECTOR).and_then(|t| t.parse().ok()));
    let rating_count = json_f64(&ld["aggregateRating"]["reviewCount"])
        .or_else(|| json_f64(&ld["aggregateRating"]["ratingCount"]))
        .map(|n| n as u64);
    let price = format_offer_price(&ld["offers"])
        .or_else(|| select_text(&document, &PRICE_SELECTOR));

    StorefrontPage {
        title,
        developer,
        description,
        rating,
        rating_count,
        price,
        category: json_string(&ld["applicationCategory"]),
        icon: json_string(&ld["image"]).or_else(|| meta_content(&document, &OG_IMAGE_SELECTOR)),
    }
}

#[derive(Deserialize)]
struct ReviewFeed {
    feed: FeedBody,
}

#[derive(Deserialize)]
struct FeedBody {
    entry: Option<OneOrMany<FeedEntry>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

#[derive(Deserialize)]
struct Label {
    label: String,
}

#[derive(Deserialize)]
struct FeedAuthor {
    name: Option<Label>,
}

#[derive(Deserialize)]
struct FeedEntry {
    id: Option<Label>,
    author: Option<FeedAuthor>,
    title: Option<Label>,
    content: Option<Label>,
    #[serde(rename = "im:rating")]
    rating: Option<Label>,
    #[serde(rename = "im:version")]
    version: Option<Label>,
    updated: Option<Label>,
}

impl FeedEntry {
    /// Entries without a star rating (the feed's own app entry) are not reviews.
    fn into_review(self) -> Option<Review> {
        let rating = self.rating?.label.trim().parse::<u8>().ok()?;
        Some(Review {
            id: self.id.map(|l| l.label),
            user_name: self.author.and_then(|a| a.name).map(|l| l.label),
            title: self.title.map(|l| l.label),
            review: self.content.map(|l| l.label),
            rating,
            app_version: self.version.map(|l| l.label),
            date: self
                .updated
                .and_then(|l| DateTime::parse_from_rfc3339(&l.label).ok()),
        })
    }
}

/// Parses the JSON customer-review feed, keeping at most `limit` reviews.
pub fn parse_reviews(body: &str, limit: usize) -> Result<Vec<Review>> {
    let feed: ReviewFeed = serde_json::from_str(body)?;
    let entries = match feed.feed.entry {
        Some(OneOrMany::Many(entries)) => entries,
        Some(OneOrMany::One(entry)) => vec![entry],
        None => Vec::new(),
    };

    Ok(entries
        .into_iter()
        .filter_map(FeedEntry::into_review)
        .take(limit)
        .collect())
}
