use core::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use std::time::SystemTime;

use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER},
};
use serde_json::Value;

use crate::config::constants::{
    ACCEPT_HTML, ACCEPT_LANGUAGE as LANGS, CONNECT_TIMEOUT, DEFAULT_RETRY_AFTER, USER_AGENT,
};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("401 Unauthorized at {url}: refresh the bearer token and rerun with --resume")]
    Unauthorized { url: String },
    #[error("HTTP {status} at {url}")]
    Status { status: StatusCode, url: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    /// Whether the whole run must stop rather than skip the current item.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

#[derive(Debug)]
pub enum Fetched<T> {
    Found(T),
    NotFound,
}

/// Naive retry for page fetches: network errors, 429 and 5xx are retried up
/// to `retries` more times, sleeping `backoff * 2^n` (or `Retry-After`).
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            backoff: Duration::from_millis(1500),
        }
    }
}

impl RetryPolicy {
    pub const NONE: Self = Self {
        retries: 0,
        backoff: Duration::ZERO,
    };

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1 << attempt.min(16))
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(LANGS));
    headers
}

/// Client with browser-like default headers.
pub fn basic() -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .default_headers(browser_headers())
        .user_agent(USER_AGENT)
        .build()
}

/// Client that sends `Authorization: Bearer <token>` with every request.
pub fn bearer(token: &str) -> anyhow::Result<Client> {
    let mut headers = browser_headers();
    let mut value = HeaderValue::try_from(format!("Bearer {}", token.trim()))?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .default_headers(headers)
        .user_agent(USER_AGENT)
        .build()?)
}

/// `Retry-After` as a delay: either delta-seconds or an HTTP-date.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = httpdate::parse_http_date(raw).ok()?;
    Some(at.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO))
}

/// A client plus a counter of requests actually put on the wire.
pub struct Session {
    client: Client,
    sent: AtomicU64,
}

impl Session {
    pub const fn new(client: Client) -> Self {
        Self {
            client,
            sent: AtomicU64::new(0),
        }
    }

    pub fn requests_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    async fn send(&self, url: &str, timeout: Duration) -> reqwest::Result<Response> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.client.get(url).timeout(timeout).send().await
    }

    /// Page body, with `policy` applied to transient failures.
    pub async fn html(
        &self,
        url: &str,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            let (wait, err) = match self.send(url, timeout).await {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(text) => return Ok(text),
                    Err(e) => (policy.delay(attempt), FetchError::from(e)),
                },
                Ok(resp) => {
                    let status = resp.status();
                    let err = FetchError::Status { status, url: url.to_owned() };
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        (retry_after(resp.headers()).unwrap_or_else(|| policy.delay(attempt)), err)
                    } else if status.is_server_error() {
                        (policy.delay(attempt), err)
                    } else {
                        return Err(err);
                    }
                }
                Err(e) => (policy.delay(attempt), FetchError::from(e)),
            };

            if attempt >= policy.retries {
                return Err(err);
            }
            attempt += 1;
            tracing::debug!(target: "http", "{url}: {err}, retry #{attempt} in {wait:?}");
            tokio::time::sleep(wait).await;
        }
    }

    /// JSON document with the chart API status policy:
    /// 401 is fatal, 404 is reported as [`Fetched::NotFound`], 429 is retried
    /// exactly once after `Retry-After`.
    pub async fn chart_json(&self, url: &str, timeout: Duration) -> Result<Fetched<Value>, FetchError> {
        let mut resp = self.send(url, timeout).await?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            let wait = retry_after(resp.headers()).unwrap_or(DEFAULT_RETRY_AFTER);
            tracing::warn!(target: "http", "429 {url}, waiting {}s", wait.as_secs_f32());
            tokio::time::sleep(wait).await;
            resp = self.send(url, timeout).await?;
        }

        match resp.status() {
            StatusCode::UNAUTHORIZED => Err(FetchError::Unauthorized { url: url.to_owned() }),
            StatusCode::NOT_FOUND => {
                tracing::warn!(target: "http", "404 {url}");
                Ok(Fetched::NotFound)
            }
            s if s.is_success() => Ok(Fetched::Found(resp.json().await?)),
            status => Err(FetchError::Status { status, url: url.to_owned() }),
        }
    }
}
