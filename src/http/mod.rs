use crate::config::Config;
use crate::types::RateMeta;
use log::{debug, error, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Network failures are retried this many times before giving up.
pub const MAX_NETWORK_RETRIES: u32 = 3;
/// Wait used after a 429 that carried no usable reset header.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub retriable: bool,
    /// Rate limit state of the response that produced this error, if any.
    pub rate: Option<RateMeta>,
}

impl ErrorInfo {
    fn new(code: &str, message: impl Into<String>, retriable: bool) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            retriable,
            rate: None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.code == "rate_limited"
    }

    pub fn is_unauthorized(&self) -> bool {
        self.code == "unauthorized"
    }
}

#[derive(Debug, Clone)]
pub struct RestResponse<T> {
    pub value: Option<T>,
    pub rate: Option<RateMeta>,
    pub error: Option<ErrorInfo>,
    pub status: StatusCode,
    pub headers: Option<HeaderMap>,
}

impl<T> RestResponse<T> {
    fn failed(
        status: StatusCode,
        rate: Option<RateMeta>,
        headers: Option<HeaderMap>,
        mut err: ErrorInfo,
    ) -> Self {
        err.rate = rate.clone();
        Self {
            value: None,
            rate,
            error: Some(err),
            status,
            headers,
        }
    }
}

pub fn build_client(cfg: &Config) -> reqwest::Result<Client> {
    let mut default_headers = HeaderMap::new();
    if let Ok(ua) = HeaderValue::from_str(&cfg.user_agent) {
        default_headers.insert(USER_AGENT, ua);
    }
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    // Authorization header is injected per request so the token never sits in shared defaults.
    Client::builder()
        .default_headers(default_headers)
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .use_rustls_tls()
        .build()
}

fn auth_header(token: &str) -> Result<HeaderValue, ErrorInfo> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| ErrorInfo::new("bad_request", "access token contains invalid characters", false))?;
    value.set_sensitive(true);
    Ok(value)
}

pub fn map_status_to_error(status: StatusCode, message: String) -> ErrorInfo {
    let (code, retriable) = match status {
        StatusCode::BAD_REQUEST => ("bad_request", false),
        StatusCode::UNAUTHORIZED => ("unauthorized", false),
        StatusCode::FORBIDDEN => ("forbidden", false),
        StatusCode::NOT_FOUND => ("not_found", false),
        StatusCode::TOO_MANY_REQUESTS => ("rate_limited", true),
        s if s.is_server_error() => ("upstream_error", true),
        _ => ("server_error", false),
    };
    ErrorInfo::new(code, message, retriable)
}

fn header_num<N: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<N> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<N>().ok())
}

pub fn extract_rate(headers: &HeaderMap) -> RateMeta {
    RateMeta {
        limit: header_num(headers, "x-rate-limit-limit"),
        remaining: header_num(headers, "x-rate-limit-remaining"),
        reset_at: header_num(headers, "x-rate-limit-reset"),
    }
}

/// How long to wait after a 429 before the next request may succeed.
pub fn rate_limit_wait(rate: &RateMeta, now_epoch: i64) -> Duration {
    match rate.reset_at {
        Some(reset) => Duration::from_secs(reset.saturating_sub(now_epoch).max(0) as u64),
        None => DEFAULT_RATE_LIMIT_WAIT,
    }
}

pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn compute_backoff(attempt: u32) -> Duration {
    // Exponential backoff with jitter: base 200ms * 2^attempt, max 5s.
    let base = 200u64.saturating_mul(1u64 << attempt.min(5));
    let max = 5_000u64.min(base);
    let jitter = fastrand::u64(0..=max / 2);
    Duration::from_millis(max / 2 + jitter)
}

fn rate_summary(rate: &RateMeta) -> Option<String> {
    if *rate == RateMeta::default() {
        return None;
    }
    let reset = rate
        .reset_at
        .and_then(|epoch| chrono::DateTime::<chrono::Utc>::from_timestamp(epoch, 0))
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "unknown".into());
    Some(format!(
        "Rate limit: {}/{}, resets at {}",
        rate.remaining.map(|r| r.to_string()).unwrap_or_else(|| "?".into()),
        rate.limit.map(|l| l.to_string()).unwrap_or_else(|| "?".into()),
        reset
    ))
}

fn log_rate(rate: &RateMeta) {
    if let Some(summary) = rate_summary(rate) {
        debug!("{}", summary);
    }
}

pub async fn rest_get_json<T: for<'de> Deserialize<'de>>(
    client: &Client,
    cfg: &Config,
    path: &str,
) -> RestResponse<T> {
    let url = format!("{}{}", cfg.api_url, path);
    let auth = match auth_header(&cfg.token) {
        Ok(h) => h,
        Err(e) => return RestResponse::failed(StatusCode::BAD_REQUEST, None, None, e),
    };
    let mut attempt: u32 = 0;
    let mut waited_for_reset = false;
    loop {
        let res = client.get(&url).header(AUTHORIZATION, auth.clone()).send().await;

        let res = match res {
            Ok(r) => r,
            Err(e) => {
                warn!("GET {} failed to send: {}", url, e);
                if attempt < MAX_NETWORK_RETRIES {
                    tokio::time::sleep(compute_backoff(attempt)).await;
                    attempt += 1;
                    continue;
                }
                return RestResponse::failed(
                    StatusCode::SERVICE_UNAVAILABLE,
                    None,
                    None,
                    ErrorInfo::new("network_error", e.to_string(), true),
                );
            }
        };

        let status = res.status();
        let headers = res.headers().clone();
        let rate = extract_rate(&headers);
        log_rate(&rate);

        if status.is_success() {
            let text = match res.text().await {
                Ok(t) => t,
                Err(e) => {
                    return RestResponse::failed(
                        status,
                        Some(rate),
                        Some(headers),
                        ErrorInfo::new("network_error", e.to_string(), true),
                    );
                }
            };
            return match serde_json::from_str::<T>(&text) {
                Ok(val) => RestResponse {
                    value: Some(val),
                    rate: Some(rate),
                    error: None,
                    status,
                    headers: Some(headers),
                },
                Err(e) => RestResponse::failed(
                    status,
                    Some(rate),
                    Some(headers),
                    ErrorInfo::new("decode_error", e.to_string(), false),
                ),
            };
        }

        if status == StatusCode::TOO_MANY_REQUESTS && !waited_for_reset {
            let wait = rate_limit_wait(&rate, now_epoch());
            warn!("Rate limit exceeded on GET {}; waiting {:?} before retry", url, wait);
            tokio::time::sleep(wait).await;
            waited_for_reset = true;
            continue;
        }

        if status.is_server_error() && attempt < MAX_NETWORK_RETRIES {
            let backoff = compute_backoff(attempt);
            warn!("GET {} retrying (status {}), backoff {:?}", url, status, backoff);
            tokio::time::sleep(backoff).await;
            attempt += 1;
            continue;
        }

        match status {
            StatusCode::UNAUTHORIZED => error!("Authentication failed; check NATURE_API_TOKEN"),
            StatusCode::TOO_MANY_REQUESTS => error!("Rate limit exceeded even after waiting for reset"),
            _ => error!("GET {} returned HTTP {}", url, status),
        }
        let text = res.text().await.unwrap_or_default();
        let err = map_status_to_error(status, text);
        return RestResponse::failed(status, Some(rate), Some(headers), err);
    }
}
