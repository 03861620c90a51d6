use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    /// Language passed to every store lookup.
    pub lang: String,
    /// Storefront country passed to every store lookup.
    pub country: String,
    pub http_timeout: Duration,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            lang: "en".to_string(),
            country: "us".to_string(),
            http_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        let defaults = Config::default();

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT").unwrap_or_else(|_| "8000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::Config(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::Config(format!("Invalid host address: {}", e)))?;

        let http_timeout = match env::var("HTTP_TIMEOUT_SECS") {
            Ok(secs) => {
                let secs = secs
                    .parse::<u64>()
                    .map_err(|e| AppError::Config(format!("Invalid HTTP_TIMEOUT_SECS: {}", e)))?;
                Duration::from_secs(secs)
            }
            Err(_) => defaults.http_timeout,
        };

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            lang: env::var("STORE_LANG").unwrap_or(defaults.lang),
            country: env::var("STORE_COUNTRY").unwrap_or(defaults.country),
            http_timeout,
            user_agent: env::var("HTTP_USER_AGENT").unwrap_or(defaults.user_agent),
        })
    }
}
