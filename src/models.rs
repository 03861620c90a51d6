use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One Google Play listing as scraped from its details page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayApp {
    pub app_id: String,
    pub title: String,
    pub developer: Option<String>,
    pub developer_url: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub genre: Option<String>,
    pub content_rating: Option<String>,
    pub score: Option<f64>,
    pub ratings: Option<u64>,
    pub price: f64,
    pub currency: Option<String>,
    pub free: bool,
    pub url: String,
}

/// A Play search result before its details are looked up.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaySearchHit {
    pub app_id: String,
    pub title: Option<String>,
}

impl fmt::Display for PlaySearchHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.title {
            Some(title) => write!(f, "{} ({})", self.app_id, title),
            None => f.write_str(&self.app_id),
        }
    }
}

/// Fields read off an App Store product page. Every field is optional
/// because the page is parsed best-effort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorefrontPage {
    pub title: Option<String>,
    pub developer: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub icon: Option<String>,
}

/// A customer review from the App Store review feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Option<String>,
    pub user_name: Option<String>,
    pub title: Option<String>,
    pub review: Option<String>,
    pub rating: u8,
    pub app_version: Option<String>,
    pub date: Option<DateTime<FixedOffset>>,
}

/// An App Store listing. `reviews` is only populated for the target app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IosApp {
    pub app_id: String,
    pub title: String,
    pub developer: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub icon: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,
}

/// One entry of an iTunes Search API response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IosSearchResult {
    pub track_id: u64,
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub seller_name: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub formatted_price: Option<String>,
    #[serde(default)]
    pub average_user_rating: Option<f64>,
    #[serde(default)]
    pub user_rating_count: Option<u64>,
    #[serde(default)]
    pub primary_genre_name: Option<String>,
    #[serde(default)]
    pub track_view_url: Option<String>,
    #[serde(default)]
    pub artwork_url100: Option<String>,
}

impl IosSearchResult {
    pub fn app_id(&self) -> String {
        self.track_id.to_string()
    }
}

impl From<IosSearchResult> for IosApp {
    fn from(result: IosSearchResult) -> Self {
        let app_id = result.app_id();
        IosApp {
            url: result
                .track_view_url
                .unwrap_or_else(|| format!("https://apps.apple.com/app/id{}", app_id)),
            title: result.track_name.unwrap_or_default(),
            developer: result.artist_name.or(result.seller_name),
            description: result.description,
            rating: result.average_user_rating,
            rating_count: result.user_rating_count,
            price: result.formatted_price,
            category: result.primary_genre_name,
            icon: result.artwork_url100,
            reviews: None,
            app_id,
        }
    }
}

/// Result of one analysis: the requested app plus at most ten similar apps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse<T> {
    pub target_app: T,
    pub similar_apps: Vec<T>,
}
