use reqwest::{Client, ClientBuilder, StatusCode};
use scraper::{ElementRef, Html, Selector};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use once_cell::sync::Lazy;
use crate::config::Config;
use crate::error::{AppError, Result};

static LD_JSON_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("Failed to parse ld+json selector")
});

/// Builds the HTTP client shared by every store provider.
pub fn build_client(config: &Config) -> Result<Client> {
    ClientBuilder::new()
        .user_agent(config.user_agent.as_str())
        .timeout(config.http_timeout)
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// GETs `url` and returns the body as text. A 404 maps to `NotFound`,
/// any other non-success status to `Fetch`.
pub async fn fetch_html(client: &Client, url: &str, query: &[(&str, &str)]) -> Result<String> {
    let response = client.get(url).query(query).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Err(AppError::NotFound(url.to_string()));
    }
    let html = response.error_for_status()?.text().await?;
    Ok(html)
}

pub async fn fetch_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T> {
    let body = fetch_html(client, url, query).await?;
    Ok(serde_json::from_str(&body)?)
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(word);
    }
    result
}

/// Visible text of an element, whitespace collapsed. `None` when empty.
pub fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
    (!text.is_empty()).then_some(text)
}

pub fn select_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).find_map(element_text)
}

pub fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|element| element.value().attr("content"))
        .map(collapse_whitespace)
        .find(|content| !content.is_empty())
}

/// Returns the first JSON-LD block whose `@type` equals `kind`.
pub fn find_ld_json(document: &Html, kind: &str) -> Option<Value> {
    document
        .select(&LD_JSON_SELECTOR)
        .filter_map(|script| serde_json::from_str::<Value>(&script.inner_html()).ok())
        .flat_map(|value| match value {
            Value::Array(items) => items,
            other => vec![other],
        })
        .find(|value| value["@type"].as_str() == Some(kind))
}

/// Reads a JSON value that stores may encode either as a number or as a string.
pub fn json_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

pub fn json_string(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
}
