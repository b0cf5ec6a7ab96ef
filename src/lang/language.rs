//! Language codes accepted by the remote translator.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A language code such as `DE` or `EN-US`.
/// Not validated: the remote capability decides what it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(Cow<'static, str>);

impl Language {
    pub const BULGARIAN: Language = Language::from_static("BG");
    pub const CZECH: Language = Language::from_static("CS");
    pub const DANISH: Language = Language::from_static("DA");
    pub const GERMAN: Language = Language::from_static("DE");
    pub const GREEK: Language = Language::from_static("EL");
    /// Unspecified variant, kept for backward compatibility. Prefer `EN-GB` or `EN-US`.
    pub const ENGLISH: Language = Language::from_static("EN");
    pub const BRITISH_ENGLISH: Language = Language::from_static("EN-GB");
    pub const AMERICAN_ENGLISH: Language = Language::from_static("EN-US");
    pub const SPANISH: Language = Language::from_static("ES");
    pub const ESTONIAN: Language = Language::from_static("ET");
    pub const FINNISH: Language = Language::from_static("FI");
    pub const FRENCH: Language = Language::from_static("FR");
    pub const HUNGARIAN: Language = Language::from_static("HU");
    pub const ITALIAN: Language = Language::from_static("IT");
    pub const JAPANESE: Language = Language::from_static("JA");
    pub const LITHUANIAN: Language = Language::from_static("LT");
    pub const LATVIAN: Language = Language::from_static("LV");
    pub const DUTCH: Language = Language::from_static("NL");
    pub const POLISH: Language = Language::from_static("PL");
    /// Unspecified variant, kept for backward compatibility. Prefer `PT-PT` or `PT-BR`.
    pub const PORTUGUESE: Language = Language::from_static("PT");
    pub const EUROPEAN_PORTUGUESE: Language = Language::from_static("PT-PT");
    pub const BRAZILIAN_PORTUGUESE: Language = Language::from_static("PT-BR");
    pub const ROMANIAN: Language = Language::from_static("RO");
    pub const RUSSIAN: Language = Language::from_static("RU");
    pub const SLOVAK: Language = Language::from_static("SK");
    pub const SLOVENIAN: Language = Language::from_static("SL");
    pub const SWEDISH: Language = Language::from_static("SV");
    pub const CHINESE: Language = Language::from_static("ZH");

    pub const fn from_static(code: &'static str) -> Self {
        Language(Cow::Borrowed(code))
    }

    /// Any code, verbatim. Use [`Language::lookup`] to restrict to known codes.
    pub fn new(code: impl Into<String>) -> Self {
        Language(Cow::Owned(code.into()))
    }

    /// Resolve a case-insensitive code against the supported table.
    pub fn lookup(code: &str) -> Option<Language> {
        SUPPORTED
            .iter()
            .find(|(known, _)| known.as_str().eq_ignore_ascii_case(code.trim()))
            .map(|(known, _)| known.clone())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty for an undetected source language.
    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }

    /// English display name, if the code is in the supported table.
    pub fn name(&self) -> Option<&'static str> {
        SUPPORTED
            .iter()
            .find(|(known, _)| known == self)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Language {
    fn from(code: &str) -> Self {
        Language::new(code)
    }
}

impl From<String> for Language {
    fn from(code: String) -> Self {
        Language::new(code)
    }
}

/// Every code the DeepL v2 API documents, with its English name.
pub static SUPPORTED: &[(Language, &str)] = &[
    (Language::BULGARIAN, "Bulgarian"),
    (Language::CZECH, "Czech"),
    (Language::DANISH, "Danish"),
    (Language::GERMAN, "German"),
    (Language::GREEK, "Greek"),
    (Language::ENGLISH, "English"),
    (Language::BRITISH_ENGLISH, "British English"),
    (Language::AMERICAN_ENGLISH, "American English"),
    (Language::SPANISH, "Spanish"),
    (Language::ESTONIAN, "Estonian"),
    (Language::FINNISH, "Finnish"),
    (Language::FRENCH, "French"),
    (Language::HUNGARIAN, "Hungarian"),
    (Language::ITALIAN, "Italian"),
    (Language::JAPANESE, "Japanese"),
    (Language::LITHUANIAN, "Lithuanian"),
    (Language::LATVIAN, "Latvian"),
    (Language::DUTCH, "Dutch"),
    (Language::POLISH, "Polish"),
    (Language::PORTUGUESE, "Portuguese"),
    (Language::EUROPEAN_PORTUGUESE, "European Portuguese"),
    (Language::BRAZILIAN_PORTUGUESE, "Brazilian Portuguese"),
    (Language::ROMANIAN, "Romanian"),
    (Language::RUSSIAN, "Russian"),
    (Language::SLOVAK, "Slovak"),
    (Language::SLOVENIAN, "Slovenian"),
    (Language::SWEDISH, "Swedish"),
    (Language::CHINESE, "Chinese"),
];
