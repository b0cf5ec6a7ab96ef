//! Read-through translation cache.
//!
//! `Linguist::translate` checks the store, and on a miss calls the remote
//! translator and writes the result back with a TTL. The lookup, the remote
//! call and the write share one store transaction; any error drops the
//! transaction before commit, so a failed fetch never leaves an entry behind.
//!
//! There is no single-flight: two concurrent misses for the same key both
//! call the translator and the later commit overwrites the earlier one.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::context::{Context, Interrupted};
use crate::deepl::{DeeplClient, DeeplConfig};
use crate::lang::{to_params, Language, TranslateError, TranslateOption, Translation, Translator};
use crate::store::{MemoryStore, Store, StoreError, Transaction};

/// Cache TTL for translations.
pub const TRANSLATE_TTL: Duration = Duration::from_secs(24 * 3600);

/// Store namespace for translation entries.
pub const DEFAULT_NAMESPACE: &str = "translations";

/// Which request fields address a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyScope {
    /// Text only. Requests for the same text in different languages share
    /// one entry, so the first language cached wins.
    Text,
    /// Target language and text.
    #[default]
    TextAndLanguage,
    /// Target language, text and the parameters produced by the options.
    Request,
}

impl KeyScope {
    /// blake3 digest of the scoped request fields.
    pub fn derive(
        self,
        text: &str,
        target: &Language,
        options: &[TranslateOption],
    ) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        match self {
            KeyScope::Text => {
                hasher.update(b"t|");
            }
            KeyScope::TextAndLanguage => {
                hasher.update(b"tl|");
                hasher.update(target.as_str().as_bytes());
                hasher.update(b"|");
            }
            KeyScope::Request => {
                hasher.update(b"tlo|");
                hasher.update(target.as_str().as_bytes());
                hasher.update(b"|");
                for (name, value) in to_params(options) {
                    update_field(&mut hasher, name);
                    update_field(&mut hasher, &value);
                }
                hasher.update(b"|");
            }
        }
        hasher.update(text.as_bytes());
        *hasher.finalize().as_bytes()
    }
}

/// Length-prefixed so that adjacent fields cannot run together.
fn update_field(hasher: &mut blake3::Hasher, field: &str) {
    hasher.update(&(field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

/// What to do when the write-back fails after a successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Fail the call; the caller never sees a result that was not committed.
    #[default]
    Strict,
    /// Log the failure and return the fetched result uncached.
    BestEffort,
}

#[derive(Debug, thiserror::Error)]
pub enum LinguistError {
    #[error("text to translate is empty")]
    EmptyText,
    #[error("translator setup failed: {0}")]
    Setup(#[source] TranslateError),
    #[error("cache lookup failed: {0}")]
    Lookup(#[source] StoreError),
    #[error("remote translation failed: {0}")]
    Fetch(#[source] TranslateError),
    #[error("encoding cache entry failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("cache write failed: {0}")]
    Store(#[source] StoreError),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl LinguistError {
    /// The stage of the get-or-fetch sequence that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            LinguistError::EmptyText | LinguistError::Setup(_) => "input",
            LinguistError::Lookup(_) => "lookup",
            LinguistError::Fetch(_) => "fetch",
            LinguistError::Encode(_) | LinguistError::Store(_) => "store",
            LinguistError::Interrupted(_) => "interrupted",
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, LinguistError::Interrupted(_))
    }

    fn fetch(err: TranslateError) -> Self {
        match err {
            TranslateError::Interrupted(reason) => LinguistError::Interrupted(reason),
            other => LinguistError::Fetch(other),
        }
    }
}

/// Translates text, memoizing results in a key-value store.
pub struct Linguist {
    translator: Arc<dyn Translator>,
    store: Arc<dyn Store>,
    ttl: Duration,
    namespace: String,
    key_scope: KeyScope,
    write_policy: WritePolicy,
}

impl std::fmt::Debug for Linguist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linguist")
            .field("translator", &self.translator.name())
            .field("store", &self.store.backend_name())
            .field("ttl", &self.ttl)
            .field("namespace", &self.namespace)
            .field("key_scope", &self.key_scope)
            .field("write_policy", &self.write_policy)
            .finish()
    }
}

impl Linguist {
    /// DeepL with the given key, backed by an in-memory store.
    pub fn new(auth_key: impl Into<String>) -> Result<Self, LinguistError> {
        Self::builder(auth_key).build()
    }

    pub fn builder(auth_key: impl Into<String>) -> LinguistBuilder {
        LinguistBuilder {
            auth_key: auth_key.into(),
            translator: None,
            store: None,
            ttl: TRANSLATE_TTL,
            namespace: DEFAULT_NAMESPACE.to_string(),
            key_scope: KeyScope::default(),
            write_policy: WritePolicy::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn key_scope(&self) -> KeyScope {
        self.key_scope
    }

    /// Translate `text`, serving from the cache when a live entry exists.
    pub async fn translate(
        &self,
        ctx: &Context,
        text: &str,
        target: &Language,
        options: &[TranslateOption],
    ) -> Result<Translation, LinguistError> {
        if text.is_empty() {
            return Err(LinguistError::EmptyText);
        }

        let key = self.key_scope.derive(text, target, options);
        let mut tx = ctx.run(self.store.begin()).await?.map_err(LinguistError::Lookup)?;

        if let Some(hit) = self.lookup(ctx, &mut *tx, &key).await? {
            debug!(target_lang = %target, store = self.store.backend_name(), "translation cache hit");
            return Ok(hit);
        }

        debug!(target_lang = %target, translator = self.translator.name(), "translation cache miss");
        let translation = ctx
            .run(self.translator.translate(ctx, text, target, options))
            .await?
            .map_err(LinguistError::fetch)?;
        if translation.translated_text.is_empty() {
            return Err(LinguistError::Fetch(TranslateError::NoTranslations));
        }

        let value = rmp_serde::to_vec_named(&translation)?;
        match self.write_back(ctx, tx, &key, value).await {
            Ok(()) => Ok(translation),
            Err(LinguistError::Store(e)) if self.write_policy == WritePolicy::BestEffort => {
                warn!(error = %e, "translation cache write failed, returning uncached result");
                Ok(translation)
            }
            Err(e) => Err(e),
        }
    }

    /// Read and decode the entry for `key`. An undecodable entry reads as a
    /// miss and is overwritten by the fresh result.
    async fn lookup(
        &self,
        ctx: &Context,
        tx: &mut dyn Transaction,
        key: &[u8; 32],
    ) -> Result<Option<Translation>, LinguistError> {
        let raw = ctx
            .run(tx.get(&self.namespace, key))
            .await?
            .map_err(LinguistError::Lookup)?;

        Ok(raw.and_then(|bytes| match rmp_serde::from_slice(&bytes) {
            Ok(translation) => Some(translation),
            Err(e) => {
                warn!(error = %e, "discarding undecodable cache entry");
                None
            }
        }))
    }

    async fn write_back(
        &self,
        ctx: &Context,
        mut tx: Box<dyn Transaction>,
        key: &[u8; 32],
        value: Vec<u8>,
    ) -> Result<(), LinguistError> {
        ctx.run(tx.insert_with_ttl(&self.namespace, key, value, self.ttl))
            .await?
            .map_err(LinguistError::Store)?;
        ctx.run(tx.commit()).await?.map_err(LinguistError::Store)
    }
}

/// Construction-time overrides. Collaborators left unset fall back to the
/// DeepL client and an in-memory store.
pub struct LinguistBuilder {
    auth_key: String,
    translator: Option<Arc<dyn Translator>>,
    store: Option<Arc<dyn Store>>,
    ttl: Duration,
    namespace: String,
    key_scope: KeyScope,
    write_policy: WritePolicy,
}

impl LinguistBuilder {
    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn key_scope(mut self, key_scope: KeyScope) -> Self {
        self.key_scope = key_scope;
        self
    }

    pub fn write_policy(mut self, write_policy: WritePolicy) -> Self {
        self.write_policy = write_policy;
        self
    }

    pub fn build(self) -> Result<Linguist, LinguistError> {
        let translator = match self.translator {
            Some(translator) => translator,
            None => Arc::new(
                DeeplClient::new(DeeplConfig::new(self.auth_key)).map_err(LinguistError::Setup)?,
            ),
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn Store>);

        Ok(Linguist {
            translator,
            store,
            ttl: self.ttl,
            namespace: self.namespace,
            key_scope: self.key_scope,
            write_policy: self.write_policy,
        })
    }
}
