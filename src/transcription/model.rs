//! # Model Selection
//!
//! Maps a `(language, quality-tier)` request to a concrete pre-provisioned
//! model resource. The supported languages are a fixed enumerated set; each
//! maps to exactly one model directory, except English which carries a
//! second dimension choosing between a fast/small and a slow/large variant.
//!
//! This module only resolves the logical handle. Materializing the model
//! into memory (and any remote fetch into local storage) belongs to the
//! backend and registry.

use crate::config::ModelsConfig;
use crate::error::{AppError, AppResult};
use std::fmt;
use std::path::PathBuf;

/// Languages with a pre-provisioned recognition model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Spanish,
    French,
    Russian,
    German,
}

impl Language {
    /// Parse an ISO 639-1 language code. Unknown codes are a client error,
    /// reported distinctly from model-load failures.
    pub fn from_code(code: &str) -> Option<Language> {
        match code {
            "en" => Some(Language::English),
            "es" => Some(Language::Spanish),
            "fr" => Some(Language::French),
            "ru" => Some(Language::Russian),
            "de" => Some(Language::German),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::Russian => "ru",
            Language::German => "de",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Cache/registry key for a loaded model: language plus accuracy tier.
///
/// Only English has a quality axis, so the flag is normalized away for every
/// other language: `("es", true)` and `("es", false)` are the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub language: Language,
    pub high_accuracy: bool,
}

impl ModelKey {
    pub fn new(language: Language, high_accuracy: bool) -> Self {
        ModelKey {
            language,
            high_accuracy: high_accuracy && language == Language::English,
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.high_accuracy {
            write!(f, "{}+hi", self.language)
        } else {
            f.write_str(self.language.code())
        }
    }
}

/// Resolved handle for one model resource: the registry key plus the local
/// directory the engine loads from.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub key: ModelKey,
    /// Model directory name, e.g. "vosk-model-small-en-us-0.15"
    pub name: String,
    /// Full local path to the model directory
    pub path: PathBuf,
}

/// Pure resolver from `(language code, accuracy flag)` to a model spec,
/// constructed from explicit configuration rather than global paths.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    models: ModelsConfig,
}

impl ModelSelector {
    pub fn new(models: ModelsConfig) -> Self {
        ModelSelector { models }
    }

    /// Resolve a language code and accuracy flag to a concrete model spec.
    ///
    /// ## Failures:
    /// - Unknown language code → `UnsupportedLanguage`. This is deliberately
    ///   a different error than `ModelLoad` so a missing language cannot be
    ///   mistaken for corrupt model data.
    pub fn select(&self, language_code: &str, use_high_accuracy: bool) -> AppResult<ModelSpec> {
        let language = Language::from_code(language_code)
            .ok_or_else(|| AppError::UnsupportedLanguage(language_code.to_string()))?;

        let key = ModelKey::new(language, use_high_accuracy);
        let name = match (key.language, key.high_accuracy) {
            (Language::English, true) => &self.models.en_high_accuracy,
            (Language::English, false) => &self.models.en,
            (Language::Spanish, _) => &self.models.es,
            (Language::French, _) => &self.models.fr,
            (Language::Russian, _) => &self.models.ru,
            (Language::German, _) => &self.models.de,
        };

        Ok(ModelSpec {
            key,
            name: name.clone(),
            path: self.models.dir.join(name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn selector() -> ModelSelector {
        ModelSelector::new(AppConfig::default().models)
    }

    #[test]
    fn test_unknown_language_is_unsupported() {
        let err = selector().select("xx", false).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedLanguage(code) if code == "xx"));
    }

    #[test]
    fn test_english_has_two_distinct_variants() {
        let fast = selector().select("en", false).unwrap();
        let accurate = selector().select("en", true).unwrap();

        assert_ne!(fast, accurate);
        assert_ne!(fast.path, accurate.path);
        assert!(fast.key != accurate.key);
    }

    #[test]
    fn test_accuracy_flag_is_ignored_outside_english() {
        for code in ["es", "fr", "ru", "de"] {
            let plain = selector().select(code, false).unwrap();
            let flagged = selector().select(code, true).unwrap();
            assert_eq!(plain, flagged, "language {} must have one variant", code);
        }
    }

    #[test]
    fn test_spec_path_is_under_models_dir() {
        let spec = selector().select("fr", false).unwrap();
        assert!(spec.path.starts_with(&AppConfig::default().models.dir));
        assert!(spec.path.ends_with(&spec.name));
    }

    #[test]
    fn test_language_codes_round_trip() {
        for code in ["en", "es", "fr", "ru", "de"] {
            assert_eq!(Language::from_code(code).unwrap().code(), code);
        }
        assert!(Language::from_code("EN").is_none());
        assert!(Language::from_code("").is_none());
    }
}
