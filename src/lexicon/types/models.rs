//! The verbose, human-readable entry model.
//!
//! This is the shape source records are authored in and the shape the codec
//! reconstructs. JSON field names are camelCase; the legacy names used by the
//! Korean corpus (`korean`, `romanization`, `ipa`, `hasDialogue`) are accepted
//! as aliases when reading.

use serde::{Deserialize, Serialize};

use super::tables::{Difficulty, Frequency, PartOfSpeech};

/// One dictionary item in its canonical, verbose form.
///
/// `id` is the join key between the verbose and the compact representation
/// and never changes once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalEntry {
    pub id: String,
    #[serde(alias = "korean")]
    pub primary_word: String,
    #[serde(alias = "romanization")]
    pub transliteration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<Pronunciation>,
    pub part_of_speech: PartOfSpeech,
    /// Foreign key into the external category table.
    pub category_id: String,
    pub difficulty: Difficulty,
    /// `None` means the record did not state a frequency, which reads as `Common`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "hasDialogue", skip_serializing_if = "is_false")]
    pub has_dialogue_example: bool,
    pub translation: Translation,
}

impl OriginalEntry {
    /// The effective frequency, with an absent value read as `Common`.
    pub fn frequency(&self) -> Frequency {
        self.frequency.unwrap_or_default()
    }
}

/// Native-script pronunciation with an optional phonetic-alphabet form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pronunciation {
    #[serde(alias = "korean")]
    pub native: String,
    #[serde(default, alias = "ipa", skip_serializing_if = "Option::is_none")]
    pub phonetic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub word: String,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<LeveledExamples>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variations: Option<Variations>,
}

/// Example sentences keyed by difficulty level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeveledExamples {
    #[serde(default)]
    pub beginner: String,
    #[serde(default)]
    pub intermediate: String,
    #[serde(default)]
    pub advanced: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
}

/// Alternative phrasings by register.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formal: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casual: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<Vec<String>>,
}

impl Variations {
    /// True when none of the three registers is present.
    pub fn is_empty(&self) -> bool {
        self.formal.is_none() && self.casual.is_none() && self.short.is_none()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_field_names_are_accepted() {
        let json = r#"{
            "id": "hello-1",
            "korean": "안녕",
            "romanization": "annyeong",
            "pronunciation": { "korean": "[안녕]", "ipa": "[an.njʌŋ]" },
            "partOfSpeech": "interjection",
            "categoryId": "greetings",
            "difficulty": "beginner",
            "tags": ["greeting"],
            "hasDialogue": true,
            "translation": { "word": "hi", "explanation": "casual greeting" }
        }"#;
        let entry: OriginalEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.primary_word, "안녕");
        assert_eq!(entry.transliteration, "annyeong");
        assert_eq!(entry.pronunciation.as_ref().unwrap().phonetic.as_deref(), Some("[an.njʌŋ]"));
        assert!(entry.has_dialogue_example);
        assert_eq!(entry.frequency, None);
        assert_eq!(entry.frequency(), Frequency::Common);
    }

    #[test]
    fn defaults_are_not_serialized() {
        let entry = OriginalEntry {
            id: "x".into(),
            primary_word: "엑스".into(),
            transliteration: "ekseu".into(),
            pronunciation: None,
            part_of_speech: PartOfSpeech::Noun,
            category_id: "letters".into(),
            difficulty: Difficulty::Beginner,
            frequency: None,
            tags: Vec::new(),
            has_dialogue_example: false,
            translation: Translation {
                word: "x".into(),
                explanation: "the letter x".into(),
                examples: None,
                variations: None,
            },
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("frequency").is_none());
        assert!(value.get("hasDialogueExample").is_none());
        assert!(value.get("pronunciation").is_none());
    }
}
