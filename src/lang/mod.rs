//! Translation vocabulary shared by the cache core and its translator backends.

mod language;
mod options;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{Context, Interrupted};

pub use language::{Language, SUPPORTED};
pub use options::{to_params, Params, TranslateOption};

/// A translated text plus the source language the engine detected.
/// This is the value the cache stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub source_language: Language,
    pub translated_text: String,
}

/// Translator trait (adapter for different backends).
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        ctx: &Context,
        text: &str,
        target: &Language,
        options: &[TranslateOption],
    ) -> Result<Translation, TranslateError>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("translation timeout")]
    Timeout,
    #[error("no translations in response")]
    NoTranslations,
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl TranslateError {
    /// Whether the same request might succeed later. The cache never retries;
    /// this is for callers deciding on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            TranslateError::Transport(_)
            | TranslateError::RateLimited { .. }
            | TranslateError::Timeout => true,
            TranslateError::Status { status, .. } => {
                matches!(status, 429 | 456 | 529) || (500..600).contains(status)
            }
            TranslateError::NoTranslations
            | TranslateError::Decode(_)
            | TranslateError::InvalidInput(_)
            | TranslateError::Interrupted(_) => false,
        }
    }
}
