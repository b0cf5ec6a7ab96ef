//! Request modifiers forwarded untouched to the remote translator.
//! Each option sets one outgoing parameter; options compose in any order,
//! and a later option for the same parameter replaces the earlier one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Language;

/// Outgoing parameter set, keyed by DeepL parameter name.
pub type Params = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranslateOption {
    /// Declare the source language instead of letting the engine detect it.
    SourceLanguage(Language),
    /// `"0"` no splitting, `"1"` split on punctuation and newlines, `"nonewlines"` punctuation only.
    SplitSentences(String),
    /// Respect the original formatting even where the engine would correct it.
    PreserveFormatting,
    Formal,
    Informal,
    /// Requires a source language; the glossary's language pair must match the request.
    GlossaryId(String),
    /// Treat the text as XML.
    TagHandling,
    NonSplittingTags(Vec<String>),
    SplittingTags(Vec<String>),
    IgnoreTags(Vec<String>),
    /// Turn off automatic XML structure detection; splits then follow `SplittingTags`.
    DisableOutlineDetection,
}

impl TranslateOption {
    pub fn apply(&self, params: &mut Params) {
        let (name, value) = match self {
            TranslateOption::SourceLanguage(lang) => ("source_lang", lang.to_string()),
            TranslateOption::SplitSentences(mode) => ("split_sentences", mode.clone()),
            TranslateOption::PreserveFormatting => ("preserve_formatting", "1".to_string()),
            TranslateOption::Formal => ("formality", "more".to_string()),
            TranslateOption::Informal => ("formality", "less".to_string()),
            TranslateOption::GlossaryId(id) => ("glossary_id", id.clone()),
            TranslateOption::TagHandling => ("tag_handling", "xml".to_string()),
            TranslateOption::NonSplittingTags(tags) => ("non_splitting_tags", tags.join(",")),
            TranslateOption::SplittingTags(tags) => ("splitting_tags", tags.join(",")),
            TranslateOption::IgnoreTags(tags) => ("ignore_tags", tags.join(",")),
            TranslateOption::DisableOutlineDetection => ("outline_detection", "0".to_string()),
        };
        params.insert(name, value);
    }
}

/// Fold a list of options into the parameter set they produce.
pub fn to_params(options: &[TranslateOption]) -> Params {
    let mut params = Params::new();
    for opt in options {
        opt.apply(&mut params);
    }
    params
}
