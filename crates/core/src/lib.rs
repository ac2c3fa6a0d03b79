pub mod domain;
pub mod ingest;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;

    const DEFAULT_SEARCH_BASE_URL: &str = "https://query1.finance.yahoo.com";
    const DEFAULT_QUOTE_MAX_AGE_SECS: i64 = 3600;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub quote_provider_base_url: Option<String>,
        pub quote_provider_api_key: Option<String>,
        pub search_base_url: String,
        pub quote_max_age_secs: i64,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let quote_max_age_secs = match std::env::var("QUOTE_MAX_AGE_SECS") {
                Ok(s) => s
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("QUOTE_MAX_AGE_SECS is not an integer: {s}"))?,
                Err(_) => DEFAULT_QUOTE_MAX_AGE_SECS,
            };
            anyhow::ensure!(
                quote_max_age_secs >= 0,
                "QUOTE_MAX_AGE_SECS must be >= 0 (got {quote_max_age_secs})"
            );

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                quote_provider_base_url: std::env::var("QUOTE_PROVIDER_BASE_URL").ok(),
                quote_provider_api_key: std::env::var("QUOTE_PROVIDER_API_KEY").ok(),
                search_base_url: std::env::var("SEARCH_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SEARCH_BASE_URL.to_string()),
                quote_max_age_secs,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_quote_provider_base_url(&self) -> anyhow::Result<&str> {
            self.quote_provider_base_url
                .as_deref()
                .context("QUOTE_PROVIDER_BASE_URL is required")
        }

        pub fn quote_max_age(&self) -> chrono::Duration {
            chrono::Duration::seconds(self.quote_max_age_secs)
        }
    }
}
