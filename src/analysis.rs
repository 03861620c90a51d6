//! The two analysis pipelines. Each request runs strictly in sequence:
//! parse the URL, fetch the target app, find similar apps, assemble.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;

use tracing::{debug, info, warn};

use crate::app_store::AppStore;
use crate::error::Result;
use crate::models::{AnalysisResponse, IosApp, IosSearchResult, PlayApp, StorefrontPage};
use crate::play::PlayStore;
use crate::store_url::{extract_itunes_id, extract_package_id};

pub const SIMILAR_APPS_LIMIT: usize = 10;
pub const REVIEW_LIMIT: usize = 10;
/// iTunes genre id for Finance.
pub const FINANCE_GENRE_ID: u32 = 6015;
pub const IOS_SEARCH_LIMIT: usize = 20;
pub const RELEVANCE_KEYWORDS: [&str; 6] = ["wallet", "payment", "bank", "money", "transfer", "financial"];

const NAME_QUERY_SUFFIXES: [&str; 3] = ["mobile wallet", "payment", "financial"];
const GENERIC_QUERIES: [&str; 2] = ["mobile wallet", "digital banking"];

/// Runs `op` over `items` in order and keeps up to `limit` successes.
/// Failures are logged and dropped; they never abort the collection.
pub async fn collect_best_effort<I, T, F, Fut>(items: I, limit: usize, mut op: F) -> Vec<T>
where
    I: IntoIterator,
    I::Item: Display,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut collected = Vec::new();
    for item in items {
        if collected.len() >= limit {
            break;
        }
        let label = item.to_string();
        match op(item).await {
            Ok(value) => collected.push(value),
            Err(e) => warn!(item = %label, error = %e, "Skipping item"),
        }
    }
    collected
}

pub async fn analyze_android(
    play: &dyn PlayStore,
    app_name: &str,
    url: &str,
) -> Result<AnalysisResponse<PlayApp>> {
    let package_id = extract_package_id(url)?;
    info!(%package_id, "Fetching target Android app");
    let target_app = play.app(&package_id).await?;

    let hits = play.search(app_name, SIMILAR_APPS_LIMIT).await?;
    info!(hits = hits.len(), "Fetching details for search hits");
    let similar_apps = collect_best_effort(
        hits,
        SIMILAR_APPS_LIMIT,
        |hit| async move { play.app(&hit.app_id).await },
    )
    .await;

    Ok(AnalysisResponse {
        target_app,
        similar_apps,
    })
}

pub async fn analyze_ios(
    store: &dyn AppStore,
    app_name: &str,
    url: &str,
) -> Result<AnalysisResponse<IosApp>> {
    let app_id = extract_itunes_id(url)?;
    info!(%app_id, "Fetching target iOS app");
    let target_app = fetch_ios_target(store, &app_id, app_name, url).await?;

    let similar_apps = match find_similar_ios(store, app_name, &app_id).await {
        Ok(apps) => apps,
        Err(e) => {
            warn!(error = %e, "Similar app search failed");
            Vec::new()
        }
    };

    Ok(AnalysisResponse {
        target_app,
        similar_apps,
    })
}

/// Storefront fields and reviews degrade to defaults on upstream failure.
/// Anything else coming out of the storefront step fails the request.
async fn fetch_ios_target(
    store: &dyn AppStore,
    app_id: &str,
    app_name: &str,
    url: &str,
) -> Result<IosApp> {
    let page = match store.storefront(app_id).await {
        Ok(page) => page,
        Err(e) if e.is_upstream() => {
            warn!(%app_id, error = %e, "Storefront unavailable, using request data");
            StorefrontPage::default()
        }
        Err(e) => return Err(e),
    };

    let reviews = match store.reviews(app_id, REVIEW_LIMIT).await {
        Ok(mut reviews) => {
            reviews.truncate(REVIEW_LIMIT);
            reviews
        }
        Err(e) => {
            warn!(%app_id, error = %e, "Review fetch failed");
            Vec::new()
        }
    };

    Ok(IosApp {
        app_id: app_id.to_string(),
        title: page.title.unwrap_or_else(|| app_name.to_string()),
        developer: page.developer,
        description: page.description,
        rating: page.rating,
        rating_count: page.rating_count,
        price: page.price,
        category: page.category,
        icon: page.icon,
        url: url.to_string(),
        reviews: Some(reviews),
    })
}

/// Broadened search terms, name-based first.
pub fn ios_queries(app_name: &str) -> Vec<String> {
    NAME_QUERY_SUFFIXES
        .iter()
        .map(|suffix| format!("{} {}", app_name, suffix))
        .chain(GENERIC_QUERIES.iter().map(|q| q.to_string()))
        .collect()
}

/// Case-insensitive keyword hit in the title or description.
pub fn is_relevant(result: &IosSearchResult) -> bool {
    [result.track_name.as_deref(), result.description.as_deref()]
        .into_iter()
        .flatten()
        .map(str::to_lowercase)
        .any(|text| RELEVANCE_KEYWORDS.iter().any(|keyword| text.contains(keyword)))
}

/// Finance-category candidates for `app_name`, in insertion order, never
/// containing `exclude_id` or a duplicate id.
pub async fn find_similar_ios(
    store: &dyn AppStore,
    app_name: &str,
    exclude_id: &str,
) -> Result<Vec<IosApp>> {
    let mut seen: HashSet<String> = HashSet::from([exclude_id.to_string()]);
    let mut accepted: Vec<IosApp> = Vec::new();

    for term in ios_queries(app_name) {
        if accepted.len() >= SIMILAR_APPS_LIMIT {
            break;
        }
        let results = match store.search(&term, Some(FINANCE_GENRE_ID), IOS_SEARCH_LIMIT).await {
            Ok(results) => results,
            Err(e) if e.is_upstream() => {
                warn!(%term, error = %e, "Search query failed");
                continue;
            }
            Err(e) => return Err(e),
        };

        for result in results {
            if accepted.len() >= SIMILAR_APPS_LIMIT {
                break;
            }
            if !seen.insert(result.app_id()) {
                continue;
            }
            if !is_relevant(&result) {
                debug!(app_id = result.track_id, "Candidate has no finance keyword");
                continue;
            }
            accepted.push(IosApp::from(result));
        }
    }

    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{PlaySearchHit, Review};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn play_app(app_id: &str) -> PlayApp {
        PlayApp {
            app_id: app_id.to_string(),
            title: app_id.to_uppercase(),
            developer: None,
            developer_url: None,
            description: None,
            icon: None,
            genre: Some("FINANCE".to_string()),
            content_rating: None,
            score: Some(4.0),
            ratings: None,
            price: 0.0,
            currency: None,
            free: true,
            url: format!("https://play.google.com/store/apps/details?id={}", app_id),
        }
    }

    struct FakePlay {
        apps: HashMap<String, PlayApp>,
        hits: Vec<&'static str>,
    }

    #[async_trait]
    impl PlayStore for FakePlay {
        async fn app(&self, app_id: &str) -> Result<PlayApp> {
            self.apps
                .get(app_id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(app_id.to_string()))
        }

        async fn search(&self, _term: &str, n_hits: usize) -> Result<Vec<PlaySearchHit>> {
            Ok(self
                .hits
                .iter()
                .take(n_hits)
                .map(|id| PlaySearchHit { app_id: id.to_string(), title: None })
                .collect())
        }
    }

    fn search_result(track_id: u64, name: &str, description: &str) -> IosSearchResult {
        IosSearchResult {
            track_id,
            track_name: Some(name.to_string()),
            seller_name: None,
            artist_name: Some("Dev".to_string()),
            description: Some(description.to_string()),
            formatted_price: Some("Free".to_string()),
            average_user_rating: Some(4.5),
            user_rating_count: Some(10),
            primary_genre_name: Some("Finance".to_string()),
            track_view_url: None,
            artwork_url100: None,
        }
    }

    #[derive(Default)]
    struct FakeAppStore {
        page: Option<StorefrontPage>,
        reviews: Option<Vec<Review>>,
        results: HashMap<String, Vec<IosSearchResult>>,
        terms: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AppStore for FakeAppStore {
        async fn storefront(&self, _app_id: &str) -> Result<StorefrontPage> {
            self.page.clone().ok_or_else(|| AppError::Fetch("connection refused".to_string()))
        }

        async fn reviews(&self, _app_id: &str, _limit: usize) -> Result<Vec<Review>> {
            self.reviews.clone().ok_or_else(|| AppError::Parse("bad feed".to_string()))
        }

        async fn search(&self, term: &str, genre_id: Option<u32>, _limit: usize) -> Result<Vec<IosSearchResult>> {
            assert_eq!(genre_id, Some(FINANCE_GENRE_ID));
            self.terms.lock().unwrap().push(term.to_string());
            self.results
                .get(term)
                .cloned()
                .ok_or_else(|| AppError::Fetch(format!("no results for {}", term)))
        }
    }

    fn review(i: usize) -> Review {
        Review {
            id: Some(i.to_string()),
            user_name: None,
            title: None,
            review: Some("fine".to_string()),
            rating: 4,
            app_version: None,
            date: None,
        }
    }

    #[tokio::test]
    async fn best_effort_skips_failures_and_respects_limit() {
        let collected = collect_best_effort(1..=8, 3, |n| async move {
            if n % 2 == 0 { Ok(n) } else { Err(AppError::Fetch(n.to_string())) }
        })
        .await;
        assert_eq!(collected, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn android_drops_failed_detail_lookups() {
        let mut apps = HashMap::new();
        for id in ["com.chase.sig.android", "com.a", "com.c"] {
            apps.insert(id.to_string(), play_app(id));
        }
        let play = FakePlay { apps, hits: vec!["com.a", "com.missing", "com.c"] };

        let response = analyze_android(
            &play,
            "Chase Mobile",
            "https://play.google.com/store/apps/details?id=com.chase.sig.android",
        )
        .await
        .unwrap();

        assert_eq!(response.target_app.app_id, "com.chase.sig.android");
        let ids: Vec<_> = response.similar_apps.iter().map(|a| a.app_id.as_str()).collect();
        assert_eq!(ids, ["com.a", "com.c"]);
    }

    #[test]
    fn search_hit_label_includes_title_when_known() {
        let titled = PlaySearchHit { app_id: "com.venmo".to_string(), title: Some("Venmo".to_string()) };
        let bare = PlaySearchHit { app_id: "com.zelle".to_string(), title: None };
        assert_eq!(titled.to_string(), "com.venmo (Venmo)");
        assert_eq!(bare.to_string(), "com.zelle");
    }

    #[tokio::test]
    async fn android_target_failure_propagates() {
        let play = FakePlay { apps: HashMap::new(), hits: vec![] };
        let err = analyze_android(&play, "x", "details?id=com.gone").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn android_invalid_url() {
        let play = FakePlay { apps: HashMap::new(), hits: vec![] };
        let err = analyze_android(&play, "x", "https://play.google.com/store").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidUrl(_)));
    }

    #[test]
    fn relevance_is_case_insensitive_over_title_and_description() {
        assert!(is_relevant(&search_result(1, "PayPal", "Send MONEY to friends")));
        assert!(is_relevant(&search_result(2, "Digital Wallet", "")));
        assert!(!is_relevant(&search_result(3, "Photo Editor", "Filters and stickers")));
    }

    #[test]
    fn queries_follow_fixed_templates() {
        assert_eq!(
            ios_queries("Chase"),
            ["Chase mobile wallet", "Chase payment", "Chase financial", "mobile wallet", "digital banking"]
        );
    }

    #[tokio::test]
    async fn ios_search_excludes_target_dedupes_and_filters() {
        let mut results = HashMap::new();
        results.insert(
            "Chase mobile wallet".to_string(),
            vec![
                search_result(298867247, "Chase Mobile", "Banking"),
                search_result(1, "Venmo", "Send money"),
                search_result(2, "Calculator", "Adds numbers"),
            ],
        );
        results.insert(
            "Chase payment".to_string(),
            vec![search_result(1, "Venmo", "Send money"), search_result(3, "Zelle", "Bank transfers")],
        );
        let store = FakeAppStore { results, ..Default::default() };

        let apps = find_similar_ios(&store, "Chase", "298867247").await.unwrap();
        let ids: Vec<_> = apps.iter().map(|a| a.app_id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
        assert!(apps.iter().all(|a| a.reviews.is_none()));
        // failing queries are skipped, the rest still run
        assert_eq!(store.terms.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn ios_search_stops_at_limit() {
        let many: Vec<_> = (1..=30).map(|i| search_result(i, "Wallet", "")).collect();
        let mut results = HashMap::new();
        results.insert("Chase mobile wallet".to_string(), many);
        let store = FakeAppStore { results, ..Default::default() };

        let apps = find_similar_ios(&store, "Chase", "0").await.unwrap();
        assert_eq!(apps.len(), SIMILAR_APPS_LIMIT);
        assert_eq!(store.terms.lock().unwrap().as_slice(), ["Chase mobile wallet"]);
    }

    #[tokio::test]
    async fn ios_target_degrades_without_storefront_or_reviews() {
        let store = FakeAppStore::default();
        let response = analyze_ios(&store, "Chase Mobile", "https://apps.apple.com/us/app/chase-mobile/id298867247")
            .await
            .unwrap();

        assert_eq!(response.target_app.app_id, "298867247");
        assert_eq!(response.target_app.title, "Chase Mobile");
        assert_eq!(response.target_app.reviews, Some(Vec::new()));
        assert!(response.similar_apps.is_empty());
    }

    #[tokio::test]
    async fn ios_target_uses_storefront_and_caps_reviews() {
        let store = FakeAppStore {
            page: Some(StorefrontPage {
                title: Some("Chase Mobile®".to_string()),
                developer: Some("JPMorgan Chase & Co.".to_string()),
                icon: Some("https://is1-ssl.mzstatic.com/chase.png".to_string()),
                ..Default::default()
            }),
            reviews: Some((0..25).map(review).collect()),
            ..Default::default()
        };
        let response = analyze_ios(&store, "Chase", "https://apps.apple.com/us/app/id298867247")
            .await
            .unwrap();

        assert_eq!(response.target_app.title, "Chase Mobile®");
        assert_eq!(response.target_app.developer.as_deref(), Some("JPMorgan Chase & Co."));
        assert_eq!(response.target_app.icon.as_deref(), Some("https://is1-ssl.mzstatic.com/chase.png"));
        assert_eq!(response.target_app.reviews.as_ref().map(Vec::len), Some(REVIEW_LIMIT));
    }

    /// Store whose client layer itself is broken, not the remote side.
    struct BrokenStore {
        storefront_ok: bool,
    }

    #[async_trait]
    impl AppStore for BrokenStore {
        async fn storefront(&self, _app_id: &str) -> Result<StorefrontPage> {
            if self.storefront_ok {
                Ok(StorefrontPage::default())
            } else {
                Err(AppError::Config("client unavailable".to_string()))
            }
        }

        async fn reviews(&self, _app_id: &str, _limit: usize) -> Result<Vec<Review>> {
            Ok(Vec::new())
        }

        async fn search(&self, _term: &str, _genre_id: Option<u32>, _limit: usize) -> Result<Vec<IosSearchResult>> {
            Err(AppError::Internal("search client unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn ios_non_upstream_storefront_error_fails_request() {
        let store = BrokenStore { storefront_ok: false };
        let err = analyze_ios(&store, "Chase", "https://apps.apple.com/us/app/id1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn ios_search_client_error_aborts_search_but_not_request() {
        let store = BrokenStore { storefront_ok: true };
        let err = find_similar_ios(&store, "Chase", "1").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));

        let response = analyze_ios(&store, "Chase", "https://apps.apple.com/us/app/id1")
            .await
            .unwrap();
        assert!(response.similar_apps.is_empty());
        assert_eq!(response.target_app.title, "Chase");
    }
}
