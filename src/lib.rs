//! Linguist: a read-through cache in front of a metered translation API.
//! Library: cache core, translator and store abstractions, DeepL backend.

pub mod context;
pub mod deepl;
pub mod lang;
pub mod linguist;
pub mod store;

pub use context::{Context, Interrupted};
pub use lang::{Language, TranslateError, TranslateOption, Translation, Translator};
pub use linguist::{
    KeyScope, Linguist, LinguistBuilder, LinguistError, WritePolicy, DEFAULT_NAMESPACE,
    TRANSLATE_TTL,
};
pub use store::{MemoryStore, SqliteStore, Store, StoreError, Transaction};
