//! Conversion between [`OriginalEntry`] and [`CompactEntry`].
//!
//! `encode` never writes a field whose value equals what `decode` would
//! reconstruct for its absence. Together with the normalization in
//! [`verify::normalize`](crate::lexicon::verify::normalize) this makes
//! `normalize(decode(encode(e))) == normalize(e)` hold for every entry.

use log::trace;

use super::compact::{CompactEntry, CompactTranslation, EXAMPLE_SLOTS, VARIATION_SLOTS};
use crate::lexicon::types::error::DecodeError;
use crate::lexicon::types::models::{
    LeveledExamples, OriginalEntry, Pronunciation, Translation, Variations,
};
use crate::lexicon::types::tables::{Difficulty, EnumTable, Frequency, PartOfSpeech};

/// Encodes one entry for a chunk whose default category is `chunk_category`.
///
/// The category is written per entry only when it differs from the chunk
/// default.
pub fn encode(entry: &OriginalEntry, chunk_category: &str) -> CompactEntry {
    CompactEntry {
        id: entry.id.clone(),
        primary_word: entry.primary_word.clone(),
        transliteration: entry.transliteration.clone(),
        pronunciation: entry.pronunciation.as_ref().map(encode_pronunciation),
        part_of_speech: entry.part_of_speech.encode_index().map(u64::from),
        category_id: (entry.category_id != chunk_category).then(|| entry.category_id.clone()),
        difficulty: entry.difficulty.encode_index().map(u64::from),
        frequency: entry.frequency().encode_index().map(u64::from),
        tags: (!entry.tags.is_empty()).then(|| entry.tags.clone()),
        dialogue: entry.has_dialogue_example.then_some(1),
        translation: encode_translation(&entry.translation),
    }
}

fn encode_pronunciation(pronunciation: &Pronunciation) -> Vec<String> {
    let mut forms = vec![pronunciation.native.clone()];
    if let Some(phonetic) = pronunciation.phonetic.as_ref().filter(|p| !p.is_empty()) {
        forms.push(phonetic.clone());
    }
    forms
}

fn encode_translation(translation: &Translation) -> CompactTranslation {
    let examples = translation.examples.as_ref().map(|examples| {
        vec![
            Some(examples.beginner.clone()),
            Some(examples.intermediate.clone()),
            Some(examples.advanced.clone()),
            examples.master.clone(),
        ]
    });

    let variations = translation
        .variations
        .as_ref()
        .filter(|variations| !variations.is_empty())
        .map(|variations| {
            vec![
                variations.formal.clone(),
                variations.casual.clone(),
                variations.short.clone(),
            ]
        });

    CompactTranslation {
        word: translation.word.clone(),
        explanation: translation.explanation.clone(),
        examples,
        variations,
    }
}

/// Decodes one compact entry. `category_id` is the chunk-level category,
/// used unless the entry carries its own.
///
/// # Errors
///
/// Returns a [`DecodeError`] when a slot array is longer than its fixed
/// width. Unknown enumeration indices are not errors; they fall back to the
/// table's index-0 value.
pub fn decode(compact: &CompactEntry, category_id: &str) -> Result<OriginalEntry, DecodeError> {
    trace!("Decoding entry '{}'", compact.id);

    let pronunciation = match compact.pronunciation.as_deref() {
        None => None,
        Some([native]) => Some(Pronunciation {
            native: native.clone(),
            phonetic: None,
        }),
        Some([native, phonetic]) => Some(Pronunciation {
            native: native.clone(),
            phonetic: Some(phonetic.clone()),
        }),
        Some(other) => {
            return Err(DecodeError::new(
                &compact.id,
                "p",
                format!("expected 1 or 2 forms, found {}", other.len()),
            ))
        }
    };

    Ok(OriginalEntry {
        id: compact.id.clone(),
        primary_word: compact.primary_word.clone(),
        transliteration: compact.transliteration.clone(),
        pronunciation,
        part_of_speech: compact
            .part_of_speech
            .map(PartOfSpeech::decode_index)
            .unwrap_or_default(),
        category_id: compact
            .category_id
            .clone()
            .unwrap_or_else(|| category_id.to_string()),
        difficulty: compact
            .difficulty
            .map(Difficulty::decode_index)
            .unwrap_or_default(),
        frequency: Some(
            compact
                .frequency
                .map(Frequency::decode_index)
                .unwrap_or_default(),
        ),
        tags: compact.tags.clone().unwrap_or_default(),
        has_dialogue_example: compact.dialogue == Some(1),
        translation: decode_translation(&compact.id, &compact.translation)?,
    })
}

fn decode_translation(id: &str, compact: &CompactTranslation) -> Result<Translation, DecodeError> {
    let examples = match compact.examples.as_deref() {
        None | Some([]) => None,
        Some(slots) if slots.len() > EXAMPLE_SLOTS => {
            return Err(DecodeError::new(
                id,
                "t.e",
                format!("expected at most {} slots, found {}", EXAMPLE_SLOTS, slots.len()),
            ))
        }
        Some(slots) => {
            let required = |slot: usize| slots.get(slot).cloned().flatten().unwrap_or_default();
            Some(LeveledExamples {
                beginner: required(0),
                intermediate: required(1),
                advanced: required(2),
                master: slots.get(3).cloned().flatten(),
            })
        }
    };

    let variations = match compact.variations.as_deref() {
        None => None,
        Some(slots) if slots.len() > VARIATION_SLOTS => {
            return Err(DecodeError::new(
                id,
                "t.v",
                format!("expected at most {} slots, found {}", VARIATION_SLOTS, slots.len()),
            ))
        }
        Some(slots) => {
            let slot = |position: usize| slots.get(position).cloned().flatten();
            Some(Variations {
                formal: slot(0),
                casual: slot(1),
                short: slot(2),
            })
            .filter(|variations| !variations.is_empty())
        }
    };

    Ok(Translation {
        word: compact.word.clone(),
        explanation: compact.explanation.clone(),
        examples,
        variations,
    })
}
