//! HTTP fetcher with per-host rate limiting, bounded retries with
//! exponential backoff, `Retry-After` handling, optional proxy, and an
//! optional headless fallback for challenge-protected pages.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use url::Url;

use rw_domain::config::ScraperConfig;
use rw_domain::{Error, Result};

use crate::health::FetchOutcome;
use crate::limiter::SlidingWindowLimiter;
use crate::snapshots::SnapshotWriter;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
    /// Metric label; "unknown" when absent.
    pub source_kind: Option<String>,
    /// Allow the headless fallback even without a 403 challenge.
    pub force_headless: bool,
}

#[derive(Clone, Debug)]
pub struct FetchResponse {
    pub status: u16,
    pub final_url: String,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
    /// Set when raw snapshot persistence is enabled.
    pub snapshot_path: Option<PathBuf>,
}

impl FetchResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Pluggable JS-rendering capability. The core never ships one; tests
/// and deployments may.
#[async_trait::async_trait]
pub trait HeadlessFetcher: Send + Sync {
    async fn render(&self, url: &str) -> Result<String>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Disposition {
    Success,
    Retry,
    Permanent,
    Challenge,
}

fn classify_status(status: u16) -> Disposition {
    match status {
        200..=399 => Disposition::Success,
        403 => Disposition::Challenge,
        404 | 410 => Disposition::Permanent,
        429 => Disposition::Retry,
        500..=599 => Disposition::Retry,
        _ => Disposition::Permanent,
    }
}

fn backoff_delay(multiplier: f64, attempt: u32) -> Duration {
    Duration::from_secs_f64(multiplier.max(1.0).powi(attempt as i32))
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Map a fetch result onto the health ledger vocabulary.
pub fn outcome_of(result: &Result<FetchResponse>) -> FetchOutcome {
    match result {
        Ok(_) => FetchOutcome::Success,
        Err(Error::Permanent(_)) => FetchOutcome::HardFailure,
        Err(_) => FetchOutcome::TransientFailure,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fetcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Fetcher {
    client: reqwest::Client,
    limiter: Arc<SlidingWindowLimiter>,
    config: ScraperConfig,
    snapshots: Option<SnapshotWriter>,
    headless: Option<Arc<dyn HeadlessFetcher>>,
}

impl Fetcher {
    pub fn new(config: ScraperConfig, snapshots: Option<SnapshotWriter>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5));
        if let Some(proxy_url) = &config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| Error::Config(format!("invalid proxy url: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("build http client: {e}")))?;
        let limiter = Arc::new(SlidingWindowLimiter::new(
            config.rate_limit_requests,
            Duration::from_secs_f64(config.rate_limit_window_secs),
        ));
        Ok(Self { client, limiter, config, snapshots, headless: None })
    }

    pub fn with_headless(mut self, headless: Arc<dyn HeadlessFetcher>) -> Self {
        self.headless = Some(headless);
        self
    }

    /// Fetch a URL under the per-host rate limit. Transient failures
    /// are retried with exponential backoff up to `max_retries`,
    /// honoring `Retry-After` on 429. The whole call is bounded by an
    /// absolute deadline.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchResponse> {
        let deadline =
            Duration::from_secs(self.config.timeout_secs * (self.config.max_retries as u64 + 1));
        let source_kind = options.source_kind.clone().unwrap_or_else(|| "unknown".into());

        let result = tokio::time::timeout(deadline, self.fetch_inner(url, options))
            .await
            .map_err(|_| Error::DeadlineExceeded(format!("fetch {url}")))
            .and_then(|r| r);

        let status_label = match &result {
            Ok(_) => "success",
            Err(Error::Permanent(_)) => "permanent",
            _ => "transient",
        };
        metrics::counter!(
            "scraper_requests_total",
            "status" => status_label,
            "source_kind" => source_kind
        )
        .increment(1);
        result
    }

    async fn fetch_inner(&self, url: &str, options: &FetchOptions) -> Result<FetchResponse> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| Error::Permanent(format!("invalid url: {url}")))?;

        if options.force_headless && self.headless.is_some() {
            return self.fetch_headless(url).await;
        }

        let mut attempt = 0u32;
        loop {
            self.limiter.acquire(&host).await;

            let send_result = self.client.get(url).send().await;
            let retry_delay = match send_result {
                Ok(response) => {
                    let status = response.status();
                    match classify_status(status.as_u16()) {
                        Disposition::Success => return self.finish(url, response).await,
                        Disposition::Challenge => {
                            if self.config.headless_enabled && self.headless.is_some() {
                                tracing::info!(url, "403 challenge, falling back to headless fetch");
                                return self.fetch_headless(url).await;
                            }
                            return Err(Error::Permanent(format!("{} for {url}", status)));
                        }
                        Disposition::Permanent => {
                            return Err(Error::Permanent(format!("{} for {url}", status)));
                        }
                        Disposition::Retry => {
                            let delay = if status == StatusCode::TOO_MANY_REQUESTS {
                                parse_retry_after(response.headers())
                            } else {
                                None
                            };
                            if attempt >= self.config.max_retries {
                                return Err(Error::Transient(format!("{} for {url}", status)));
                            }
                            delay.unwrap_or_else(|| backoff_delay(self.config.retry_backoff, attempt))
                        }
                    }
                }
                Err(e) => {
                    if attempt >= self.config.max_retries {
                        return Err(Error::Transient(format!("request to {url} failed: {e}")));
                    }
                    backoff_delay(self.config.retry_backoff, attempt)
                }
            };

            attempt += 1;
            tracing::debug!(url, attempt, delay_ms = retry_delay.as_millis() as u64, "retrying fetch");
            tokio::time::sleep(retry_delay).await;
        }
    }

    async fn finish(&self, url: &str, response: reqwest::Response) -> Result<FetchResponse> {
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let mut body = response
            .bytes()
            .await
            .map_err(|e| Error::Transient(format!("read body of {url}: {e}")))?
            .to_vec();
        if self.config.max_body_bytes > 0 && body.len() as u64 > self.config.max_body_bytes {
            body.truncate(self.config.max_body_bytes as usize);
        }
        let fetched_at = Utc::now();

        let snapshot_path = match &self.snapshots {
            Some(writer) if self.config.snapshots_enabled => {
                match writer.write(url, &final_url, status, &body, fetched_at).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        tracing::warn!(url, error = %e, "raw snapshot persistence failed");
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(FetchResponse { status, final_url, body, fetched_at, snapshot_path })
    }

    async fn fetch_headless(&self, url: &str) -> Result<FetchResponse> {
        let headless = self
            .headless
            .as_ref()
            .ok_or_else(|| Error::Config("headless fallback not configured".into()))?;
        let html = headless.render(url).await?;
        Ok(FetchResponse {
            status: 200,
            final_url: url.to_string(),
            body: html.into_bytes(),
            fetched_at: Utc::now(),
            snapshot_path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(200), Disposition::Success);
        assert_eq!(classify_status(301), Disposition::Success);
        assert_eq!(classify_status(403), Disposition::Challenge);
        assert_eq!(classify_status(404), Disposition::Permanent);
        assert_eq!(classify_status(410), Disposition::Permanent);
        assert_eq!(classify_status(418), Disposition::Permanent);
        assert_eq!(classify_status(429), Disposition::Retry);
        assert_eq!(classify_status(503), Disposition::Retry);
    }

    #[test]
    fn backoff_grows_exponentially() {
        assert_eq!(backoff_delay(1.5, 0), Duration::from_secs_f64(1.0));
        assert_eq!(backoff_delay(1.5, 1), Duration::from_secs_f64(1.5));
        assert_eq!(backoff_delay(1.5, 2), Duration::from_secs_f64(2.25));
        // Sub-1.0 multipliers would shrink; clamp keeps delays sane.
        assert_eq!(backoff_delay(0.5, 3), Duration::from_secs_f64(1.0));
    }

    #[test]
    fn retry_after_parses_integer_seconds() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "17".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(17)));

        headers.insert(
            reqwest::header::RETRY_AFTER,
            "Wed, 21 Oct 2026 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(parse_retry_after(&headers), None, "http-date form is ignored");
    }

    #[test]
    fn outcome_mapping() {
        let ok: Result<FetchResponse> = Ok(FetchResponse {
            status: 200,
            final_url: "https://ex.com".into(),
            body: vec![],
            fetched_at: Utc::now(),
            snapshot_path: None,
        });
        assert_eq!(outcome_of(&ok), FetchOutcome::Success);
        assert_eq!(
            outcome_of(&Err(Error::Permanent("404".into()))),
            FetchOutcome::HardFailure
        );
        assert_eq!(
            outcome_of(&Err(Error::Transient("503".into()))),
            FetchOutcome::TransientFailure
        );
        assert_eq!(
            outcome_of(&Err(Error::DeadlineExceeded("slow".into()))),
            FetchOutcome::TransientFailure
        );
    }
}
