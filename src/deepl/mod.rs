//! DeepL v2 translation client.
//! Connection pooling via reqwest, form-encoded requests, retry on 429/5xx
//! and a single retry on timeout. Every wait honors the caller's context.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::context::Context;
use crate::lang::{to_params, Language, TranslateError, TranslateOption, Translation, Translator};

/// API version path segment.
pub const API_VERSION: &str = "v2";

/// Free-tier endpoint; Pro accounts point `base_url` at `https://api.deepl.com`.
pub const DEFAULT_BASE_URL: &str = "https://api-free.deepl.com";

const USER_AGENT: &str = concat!("linguist/", env!("CARGO_PKG_VERSION"));

/// Upper bound for a computed backoff step.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct DeeplConfig {
    pub auth_key: String,
    pub base_url: String,
    pub timeout: Duration,
    /// Retries for 429 / 529 before giving up.
    pub max_rate_limit_retries: u32,
    /// Retries for other 5xx responses.
    pub max_server_error_retries: u32,
}

impl DeeplConfig {
    pub fn new(auth_key: impl Into<String>) -> Self {
        Self {
            auth_key: auth_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_rate_limit_retries: 3,
            max_server_error_retries: 2,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disable all transport-level retries.
    pub fn no_retries(mut self) -> Self {
        self.max_rate_limit_retries = 0;
        self.max_server_error_retries = 0;
        self
    }
}

pub struct DeeplClient {
    http: reqwest::Client,
    config: DeeplConfig,
    authorization: String,
}

impl DeeplClient {
    pub fn new(config: DeeplConfig) -> Result<Self, TranslateError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TranslateError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            authorization: format!("DeepL-Auth-Key {}", config.auth_key),
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/translate",
            self.config.base_url.trim_end_matches('/'),
            API_VERSION
        )
    }

    /// Send the form with retry logic.
    /// 429/529: Retry-After or 1s/2s/4s, then `RateLimited` once retries run out.
    /// 5xx: 500ms exponential backoff. Timeout: immediate retry once.
    async fn send_with_retry(
        &self,
        ctx: &Context,
        form: &[(&str, String)],
    ) -> Result<reqwest::Response, TranslateError> {
        let mut rate_limit_attempt: u32 = 0;
        let mut server_error_attempt: u32 = 0;
        let mut timeout_retried = false;

        loop {
            let request = self
                .http
                .post(self.endpoint())
                .header("Authorization", &self.authorization)
                .header("Accept", "application/json")
                .form(form)
                .send();

            match ctx.run(request).await? {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if is_rate_limited(resp.status().as_u16()) => {
                    let retry_after = retry_after(&resp);
                    if rate_limit_attempt >= self.config.max_rate_limit_retries {
                        let retry_after_ms = retry_after
                            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
                        return Err(TranslateError::RateLimited { retry_after_ms });
                    }
                    let wait = retry_after
                        .unwrap_or_else(|| backoff(Duration::from_secs(1), rate_limit_attempt));
                    warn!(
                        attempt = rate_limit_attempt,
                        status = resp.status().as_u16(),
                        wait_ms = wait.as_millis() as u64,
                        "rate limited, retrying"
                    );
                    ctx.sleep(wait).await?;
                    rate_limit_attempt += 1;
                }
                Ok(resp) if resp.status().is_server_error() => {
                    if server_error_attempt >= self.config.max_server_error_retries {
                        return Err(status_error(ctx, resp).await);
                    }
                    let wait = backoff(Duration::from_millis(500), server_error_attempt);
                    warn!(
                        attempt = server_error_attempt,
                        status = resp.status().as_u16(),
                        wait_ms = wait.as_millis() as u64,
                        "5xx error, retrying"
                    );
                    ctx.sleep(wait).await?;
                    server_error_attempt += 1;
                }
                Ok(resp) => return Err(status_error(ctx, resp).await),
                Err(e) if e.is_timeout() => {
                    if timeout_retried {
                        return Err(TranslateError::Timeout);
                    }
                    warn!("request timeout, retrying once");
                    timeout_retried = true;
                }
                Err(e) => return Err(TranslateError::Transport(e.to_string())),
            }
        }
    }
}

#[async_trait]
impl Translator for DeeplClient {
    async fn translate(
        &self,
        ctx: &Context,
        text: &str,
        target: &Language,
        options: &[TranslateOption],
    ) -> Result<Translation, TranslateError> {
        let mut params = to_params(options);
        params.insert("target_lang", target.to_string());
        params.insert("text", text.to_string());
        let form: Vec<(&str, String)> = params.into_iter().collect();

        let response = self.send_with_retry(ctx, &form).await?;
        let body = ctx
            .run(response.bytes())
            .await?
            .map_err(|e| TranslateError::Transport(e.to_string()))?;

        let parsed: TranslationResponse =
            serde_json::from_slice(&body).map_err(|e| TranslateError::Decode(e.to_string()))?;
        let first = parsed
            .translations
            .into_iter()
            .next()
            .ok_or(TranslateError::NoTranslations)?;

        debug!(
            target_lang = %target,
            detected = %first.detected_source_language,
            chars = text.chars().count(),
            "deepl translation received"
        );

        Ok(Translation {
            source_language: Language::new(first.detected_source_language),
            translated_text: first.text,
        })
    }

    fn name(&self) -> &'static str {
        "deepl"
    }
}

// --- Response types ---

#[derive(Deserialize)]
struct TranslationResponse {
    #[serde(default)]
    translations: Vec<TranslationItem>,
}

#[derive(Deserialize)]
struct TranslationItem {
    #[serde(default)]
    detected_source_language: String,
    text: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn is_rate_limited(status: u16) -> bool {
    status == 429 || status == 529
}

/// Retry-After in delay-seconds form; HTTP dates are ignored.
fn retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// `base * 2^attempt`, capped at `MAX_BACKOFF`.
fn backoff(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Build a status error, preferring the server's own `message` field.
async fn status_error(ctx: &Context, resp: reqwest::Response) -> TranslateError {
    let status = resp.status().as_u16();
    let body = match ctx.run(resp.bytes()).await {
        Ok(Ok(body)) => body,
        Ok(Err(_)) => Default::default(),
        Err(interrupted) => return TranslateError::Interrupted(interrupted),
    };
    let message = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status_message(status).to_string());
    TranslateError::Status { status, message }
}

/// Fixed message for each status DeepL documents.
pub fn status_message(status: u16) -> &'static str {
    match status {
        400 => "Bad request. Please check error message and your parameters.",
        403 => "Authorization failed. Please supply a valid auth_key parameter.",
        404 => "The requested resource could not be found.",
        413 => "The request size exceeds the limit.",
        429 | 529 => "Too many requests. Please wait and resend your request.",
        456 => "Quota exceeded. The character limit has been reached.",
        503 => "Resource currently unavailable. Try again later.",
        other => reqwest::StatusCode::from_u16(other)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown error"),
    }
}
