//! Rule-based language detection.
//!
//! Rules are tried in order and the first match wins: Devanagari script or a
//! romanized Hindi marker word means Hindi, a Spanish stop-word or inverted
//! punctuation means Spanish, anything else is English.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Languages the service answers in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Language {
    #[default]
    English,
    Hindi,
    Spanish,
}

impl Language {
    /// Human-readable name used in oracle instructions.
    pub fn display_name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi (written in English script, i.e. romanized Hindi)",
            Language::Spanish => "Spanish",
        }
    }
}

static DEVANAGARI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{0900}-\u{097F}]").expect("valid devanagari pattern"));

static HINDI_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(kya|hai|hain|aap|tum|hum|mera|meri|tumhara|humara|acha|accha|theek|haan|nahi|nahin|kaise|kyun|kab|kaun|mujhe|bhagwan)\b",
    )
    .expect("valid hindi marker pattern")
});

static SPANISH_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(el|la|los|las|un|una|unos|unas|y|o|pero|porque|por qué|como|cómo|que|qué|quién|cuándo|dónde|estás|está|hola|gracias|adiós|mi|tu|es|soy|debo|puedo)\b",
    )
    .expect("valid spanish marker pattern")
});

/// Classify `text`; empty or unrecognised input is [`Language::English`].
pub fn detect(text: &str) -> Language {
    if DEVANAGARI.is_match(text) || HINDI_MARKERS.is_match(text) {
        return Language::Hindi;
    }
    if text.contains(['¿', '¡']) || SPANISH_MARKERS.is_match(text) {
        return Language::Spanish;
    }
    Language::English
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn devanagari_is_hindi() {
        assert_eq!(detect("मुझे क्या करना चाहिए"), Language::Hindi);
    }

    #[test]
    fn romanized_marker_is_hindi() {
        assert_eq!(detect("Mera career kya hai?"), Language::Hindi);
        assert_eq!(detect("KYA HAI"), Language::Hindi);
    }

    #[test]
    fn spanish_question() {
        assert_eq!(detect("¿Cómo estás?"), Language::Spanish);
        assert_eq!(detect("Hola, necesito ayuda con mi trabajo"), Language::Spanish);
    }

    #[test]
    fn plain_english_defaults() {
        assert_eq!(detect("Should I change my job this year?"), Language::English);
        assert_eq!(detect(""), Language::English);
    }

    #[test]
    fn hindi_rule_wins_over_spanish() {
        // "la" is a Spanish stop-word, "hai" a Hindi marker.
        assert_eq!(detect("la hai"), Language::Hindi);
    }

    #[test]
    fn markers_match_whole_words_only() {
        // "Hainan" contains "hai"; "elephant" contains "el".
        assert_eq!(detect("Hainan elephant"), Language::English);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Spanish".parse::<Language>().ok(), Some(Language::Spanish));
        assert_eq!(Language::Hindi.to_string(), "hindi");
    }
}
