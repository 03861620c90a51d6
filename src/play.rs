//! Google Play provider: app details and search, scraped from the public
//! store pages.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{PlayApp, PlaySearchHit};
use crate::scraper::{
    element_text, fetch_html, find_ld_json, json_f64, json_string, meta_content, select_text,
};
use crate::store_url::extract_package_id;

const DETAILS_URL: &str = "https://play.google.com/store/apps/details";
const SEARCH_URL: &str = "https://play.google.com/store/search";
const TITLE_SUFFIX: &str = " - Apps on Google Play";

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"h1[itemprop="name"], h1"#).expect("Failed to parse title selector"));
static DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"div[data-g-id="description"]"#).expect("Failed to parse description selector")
});
static DEVELOPER_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"a[href*="/store/apps/dev"]"#).expect("Failed to parse developer selector")
});
static OG_TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).expect("Failed to parse og:title selector"));
static OG_IMAGE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).expect("Failed to parse og:image selector"));
static META_DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[name="description"]"#).expect("Failed to parse meta description selector")
});
static DETAILS_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"a[href*="/store/apps/details?id="]"#).expect("Failed to parse details link selector")
});

/// Android store metadata and search.
#[async_trait]
pub trait PlayStore: Send + Sync {
    /// Full metadata for one package. Missing listings are `NotFound`.
    async fn app(&self, app_id: &str) -> Result<PlayApp>;

    /// Up to `n_hits` search results in store ranking order.
    async fn search(&self, term: &str, n_hits: usize) -> Result<Vec<PlaySearchHit>>;
}

pub struct GooglePlayClient {
    client: Client,
    lang: String,
    country: String,
}

impl GooglePlayClient {
    pub fn new(client: Client, lang: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            client,
            lang: lang.into(),
            country: country.into(),
        }
    }
}

#[async_trait]
impl PlayStore for GooglePlayClient {
    async fn app(&self, app_id: &str) -> Result<PlayApp> {
        let query = [("id", app_id), ("hl", self.lang.as_str()), ("gl", self.country.as_str())];
        let html = fetch_html(&self.client, DETAILS_URL, &query)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound(app_id.to_string()),
                other => other,
            })?;
        let url = format!("{}?id={}&hl={}&gl={}", DETAILS_URL, app_id, self.lang, self.country);
        parse_details(app_id, &url, &html)
    }

    async fn search(&self, term: &str, n_hits: usize) -> Result<Vec<PlaySearchHit>> {
        let query = [
            ("q", term),
            ("c", "apps"),
            ("hl", self.lang.as_str()),
            ("gl", self.country.as_str()),
        ];
        let html = fetch_html(&self.client, SEARCH_URL, &query).await?;
        Ok(parse_search(&html, n_hits))
    }
}

/// Reads a details page. Structured data is preferred; page markup fills gaps.
pub fn parse_details(app_id: &str, url: &str, html: &str) -> Result<PlayApp> {
    let document = Html::parse_document(html);
    let ld = find_ld_json(&document, "SoftwareApplication").unwrap_or(Value::Null);

    let title = json_string(&ld["name"])
        .or_else(|| select_text(&document, &TITLE_SELECTOR))
        .or_else(|| {
            meta_content(&document, &OG_TITLE_SELECTOR)
                .map(|t| t.trim_end_matches(TITLE_SUFFIX).to_string())
        })
        .ok_or_else(|| AppError::Parse(format!("No app title found on details page for {}", app_id)))?;

    let description = select_text(&document, &DESCRIPTION_SELECTOR)
        .or_else(|| json_string(&ld["description"]))
        .or_else(|| meta_content(&document, &META_DESCRIPTION_SELECTOR));

    let developer = json_string(&ld["author"]["name"])
        .or_else(|| document.select(&DEVELOPER_SELECTOR).find_map(element_text));

    let offer = match &ld["offers"] {
        Value::Array(offers) => offers.first().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    };
    let price = json_f64(&offer["price"]).unwrap_or(0.0);

    Ok(PlayApp {
        app_id: app_id.to_string(),
        title,
        developer,
        developer_url: json_string(&ld["author"]["url"]),
        description,
        icon: json_string(&ld["image"]).or_else(|| meta_content(&document, &OG_IMAGE_SELECTOR)),
        genre: json_string(&ld["applicationCategory"]),
        content_rating: json_string(&ld["contentRating"]),
        score: json_f64(&ld["aggregateRating"]["ratingValue"]),
        ratings: json_f64(&ld["aggregateRating"]["ratingCount"]).map(|n| n as u64),
        price,
        currency: json_string(&offer["priceCurrency"]),
        free: price == 0.0,
        url: url.to_string(),
    })
}

/// Unique package ids linked from a search page, in page order.
pub fn parse_search(html: &str, n_hits: usize) -> Vec<PlaySearchHit> {
    let document = Html::parse_document(html);
    let mut hits: Vec<PlaySearchHit> = Vec::new();

    for link in document.select(&DETAILS_LINK_SELECTOR) {
        if hits.len() >= n_hits {
            break;
        }
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(app_id) = extract_package_id(href) else {
            continue;
        };
        match hits.iter().position(|hit| hit.app_id == app_id) {
            Some(index) => {
                if hits[index].title.is_none() {
                    hits[index].title = element_text(link);
                }
            }
            None => hits.push(PlaySearchHit {
                app_id,
                title: element_text(link),
            }),
        }
    }

    hits
}
