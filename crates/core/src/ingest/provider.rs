use crate::config::Settings;
use crate::domain::quote::QuoteSummary;
use crate::ingest::types::StockSearch;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SUMMARY_PATH: &str = "/v1/quote_summaries";
const SEARCH_PATH: &str = "/v1/finance/search";
const DEFAULT_RETRIES: u32 = 3;

#[async_trait::async_trait]
pub trait QuoteProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_summary(&self, code: &str) -> Result<QuoteSummary>;

    async fn search(&self, q: &str) -> Result<StockSearch>;
}

/// Fetches every code concurrently and waits for all of them. Any failure fails the batch;
/// on success the output order matches `codes`.
pub async fn fetch_summaries(
    provider: Arc<dyn QuoteProvider>,
    codes: &[String],
) -> Result<Vec<QuoteSummary>> {
    let mut set = JoinSet::new();
    for (idx, code) in codes.iter().enumerate() {
        let provider = Arc::clone(&provider);
        let code = code.clone();
        set.spawn(async move {
            let res = provider
                .fetch_summary(&code)
                .await
                .with_context(|| format!("fetch quote summary failed (code={code})"));
            (idx, res)
        });
    }

    let mut out: Vec<Option<QuoteSummary>> = vec![None; codes.len()];
    while let Some(joined) = set.join_next().await {
        let (idx, res) = joined.context("quote fetch task panicked")?;
        match res {
            Ok(summary) => out[idx] = Some(summary),
            Err(err) => {
                set.abort_all();
                return Err(err);
            }
        }
    }

    out.into_iter()
        .zip(codes)
        .map(|(summary, code)| summary.with_context(|| format!("missing quote summary for {code}")))
        .collect()
}

#[derive(Debug, Clone)]
pub struct HttpJsonQuoteProvider {
    http: reqwest::Client,
    base_url: String,
    search_base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpJsonQuoteProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_quote_provider_base_url()?.to_string();
        let api_key = settings.quote_provider_api_key.clone();

        let timeout_secs = std::env::var("QUOTE_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("QUOTE_PROVIDER_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let path = std::env::var("QUOTE_PROVIDER_SUMMARY_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUMMARY_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build quote provider http client")?;

        Ok(Self {
            http,
            base_url,
            search_base_url: settings.search_base_url.clone(),
            api_key,
            path,
            retries,
        })
    }

    fn summary_url(&self, code: &str) -> String {
        join_url(&self.base_url, &format!("{}/{}", self.path.trim_end_matches('/'), code))
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn get_json_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let res = self
            .http
            .get(url)
            .headers(self.headers()?)
            .query(query)
            .send()
            .await
            .context("quote provider request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read quote provider response")?;

        if !status.is_success() {
            anyhow::bail!("quote provider HTTP {status}: {text}");
        }

        serde_json::from_str::<T>(&text)
            .with_context(|| format!("quote provider response has unexpected shape: {text}"))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.get_json_once(url, query).await {
                Ok(parsed) => return Ok(parsed),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, %url, error = %err, "quote provider fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl QuoteProvider for HttpJsonQuoteProvider {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_summary(&self, code: &str) -> Result<QuoteSummary> {
        let url = self.summary_url(code);
        let summary: QuoteSummary = self.get_json(&url, &[]).await?;
        validate_summary(&summary, code)?;
        Ok(summary)
    }

    async fn search(&self, q: &str) -> Result<StockSearch> {
        let url = join_url(&self.search_base_url, SEARCH_PATH);
        let res: StockSearch = self.get_json(&url, &[("q", q)]).await?;
        Ok(only_equities(res))
    }
}

fn join_url(base: &str, path: &str) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    format!("{}{}", base.trim_end_matches('/'), path)
}

fn validate_summary(summary: &QuoteSummary, expected_code: &str) -> Result<()> {
    anyhow::ensure!(
        summary.code == expected_code,
        "provider code mismatch: expected {expected_code}, got {}",
        summary.code
    );
    Ok(())
}

pub fn only_equities(mut search: StockSearch) -> StockSearch {
    search.quotes.retain(|q| q.is_equity());
    search
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    struct FakeProvider {
        failing: Option<&'static str>,
    }

    #[async_trait::async_trait]
    impl QuoteProvider for FakeProvider {
        fn provider_name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_summary(&self, code: &str) -> Result<QuoteSummary> {
            if self.failing == Some(code) {
                anyhow::bail!("upstream 503");
            }
            let fetched_at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
            Ok(QuoteSummary::new(code, "100", "20", "1.5", "N/A", fetched_at))
        }

        async fn search(&self, _q: &str) -> Result<StockSearch> {
            Ok(StockSearch::default())
        }
    }

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn fetch_summaries_keeps_input_order() {
        let provider: Arc<dyn QuoteProvider> = Arc::new(FakeProvider { failing: None });
        let out = fetch_summaries(provider, &codes(&["MSFT", "AAPL", "TSLA"]))
            .await
            .unwrap();
        let got: Vec<_> = out.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(got, ["MSFT", "AAPL", "TSLA"]);
    }

    #[tokio::test]
    async fn fetch_summaries_fails_whole_batch() {
        let provider: Arc<dyn QuoteProvider> = Arc::new(FakeProvider {
            failing: Some("AAPL"),
        });
        let err = fetch_summaries(provider, &codes(&["MSFT", "AAPL", "TSLA"]))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("code=AAPL"));
    }

    #[tokio::test]
    async fn fetch_summaries_of_nothing_is_empty() {
        let provider: Arc<dyn QuoteProvider> = Arc::new(FakeProvider { failing: None });
        assert!(fetch_summaries(provider, &[]).await.unwrap().is_empty());
    }

    #[test]
    fn search_keeps_only_equities() {
        let v = json!({
            "quotes": [
                {"symbol": "AAPL", "typeDisp": "Equity", "shortname": "Apple Inc.", "score": 2.0},
                {"symbol": "AAPL240621C00100000", "typeDisp": "Option"},
                {"symbol": "SPY", "typeDisp": "ETF"}
            ],
            "news": [
                {"uuid": "n-1", "type": "STORY", "title": "Apple earnings"}
            ]
        });
        let parsed: StockSearch = serde_json::from_value(v).unwrap();
        let res = only_equities(parsed);
        assert_eq!(res.quotes.len(), 1);
        assert_eq!(res.quotes[0].symbol, "AAPL");
        assert_eq!(res.news[0].kind.as_deref(), Some("STORY"));
    }

    #[test]
    fn summary_code_must_match_request() {
        let fetched_at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
        let s = QuoteSummary::new("MSFT", "1", "1", "1", "", fetched_at);
        assert!(validate_summary(&s, "MSFT").is_ok());
        assert!(validate_summary(&s, "AAPL").is_err());
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("https://x.test/", "/a/b"), "https://x.test/a/b");
        assert_eq!(join_url("https://x.test", "a"), "https://x.test/a");
    }
}
