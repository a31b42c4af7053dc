//! The compact wire representation of an entry.
//!
//! ```text
//! {
//!   "i": id            "k": primary word      "r": transliteration
//!   "p": [native, phonetic?]                  (omitted without pronunciation)
//!   "s": part-of-speech index                 (omitted when 0)
//!   "c": category id                          (omitted when equal to the chunk default)
//!   "d": difficulty index                     (omitted when 0)
//!   "f": frequency index                      (omitted when 0)
//!   "g": [tags]                               (omitted when empty)
//!   "h": 1                                    (omitted unless a dialogue example exists)
//!   "t": { "w": word, "x": explanation,
//!          "e": [beginner, intermediate, advanced, master|null],
//!          "v": [formal|null, casual|null, short|null] }
//! }
//! ```
//!
//! Writing goes through `serde`. Reading goes through [`parse_entry`], which
//! validates the shape field by field so that a malformed entry produces a
//! [`DecodeError`] naming the exact wire path instead of failing the chunk.

use log::trace;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::lexicon::types::error::DecodeError;

/// Number of example slots: beginner, intermediate, advanced, master.
pub const EXAMPLE_SLOTS: usize = 4;

/// Number of variation slots: formal, casual, short.
pub const VARIATION_SLOTS: usize = 3;

const ENTRY_KEYS: &[&str] = &["i", "k", "r", "p", "s", "c", "d", "f", "g", "h", "t"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactEntry {
    #[serde(rename = "i")]
    pub id: String,
    #[serde(rename = "k")]
    pub primary_word: String,
    #[serde(rename = "r")]
    pub transliteration: String,
    #[serde(rename = "p", skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<Vec<String>>,
    #[serde(rename = "s", skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<u64>,
    #[serde(rename = "c", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(rename = "d", skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u64>,
    #[serde(rename = "f", skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u64>,
    #[serde(rename = "g", skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Always `Some(1)` when present.
    #[serde(rename = "h", skip_serializing_if = "Option::is_none")]
    pub dialogue: Option<u8>,
    #[serde(rename = "t")]
    pub translation: CompactTranslation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactTranslation {
    #[serde(rename = "w")]
    pub word: String,
    #[serde(rename = "x")]
    pub explanation: String,
    #[serde(rename = "e", skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<Option<String>>>,
    #[serde(rename = "v", skip_serializing_if = "Option::is_none")]
    pub variations: Option<Vec<Option<Vec<String>>>>,
}

/// Parses and shape-checks one raw compact entry.
///
/// `position` is the entry's index in its chunk, used to name the entry when
/// it has no readable id.
pub fn parse_entry(value: &Value, position: usize) -> Result<CompactEntry, DecodeError> {
    let anonymous = format!("#{}", position);
    let obj = value
        .as_object()
        .ok_or_else(|| DecodeError::new(&anonymous, "entry", format!("expected an object, found {}", kind(value))))?;

    let id = match obj.get("i") {
        Some(Value::String(id)) => id.clone(),
        Some(other) => {
            return Err(DecodeError::new(&anonymous, "i", format!("expected a string, found {}", kind(other))))
        }
        None => return Err(DecodeError::new(&anonymous, "i", "missing required field")),
    };

    for key in obj.keys().filter(|key| !ENTRY_KEYS.contains(&key.as_str())) {
        trace!("Ignoring unknown field '{}' in entry '{}'", key, id);
    }

    let fields = Fields { obj, id: &id, prefix: "" };
    let translation = match obj.get("t") {
        Some(Value::Object(t)) => parse_translation(&Fields { obj: t, id: &id, prefix: "t." })?,
        Some(other) => return Err(fields.error("t", format!("expected an object, found {}", kind(other)))),
        None => return Err(fields.error("t", "missing required field")),
    };

    Ok(CompactEntry {
        primary_word: fields.required_str("k")?,
        transliteration: fields.required_str("r")?,
        pronunciation: fields.pronunciation("p")?,
        part_of_speech: fields.index("s")?,
        category_id: fields.optional_str("c")?,
        difficulty: fields.index("d")?,
        frequency: fields.index("f")?,
        tags: fields.string_list("g")?,
        dialogue: fields.dialogue_flag("h")?,
        translation,
        id,
    })
}

fn parse_translation(fields: &Fields<'_>) -> Result<CompactTranslation, DecodeError> {
    let examples = match fields.array("e", EXAMPLE_SLOTS)? {
        Some(slots) => Some(
            slots
                .iter()
                .enumerate()
                .map(|(slot, value)| match value {
                    Value::Null => Ok(None),
                    Value::String(text) => Ok(Some(text.clone())),
                    other => Err(fields.error(
                        &format!("e[{}]", slot),
                        format!("expected a string or null, found {}", kind(other)),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => None,
    };

    let variations = match fields.array("v", VARIATION_SLOTS)? {
        Some(slots) => Some(
            slots
                .iter()
                .enumerate()
                .map(|(slot, value)| match value {
                    Value::Null => Ok(None),
                    Value::Array(items) => fields.strings(&format!("v[{}]", slot), items).map(Some),
                    other => Err(fields.error(
                        &format!("v[{}]", slot),
                        format!("expected a list of strings or null, found {}", kind(other)),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => None,
    };

    Ok(CompactTranslation {
        word: fields.required_str("w")?,
        explanation: fields.required_str("x")?,
        examples,
        variations,
    })
}

/// Field accessors over one JSON object, producing errors with full wire paths.
struct Fields<'a> {
    obj: &'a Map<String, Value>,
    id: &'a str,
    prefix: &'static str,
}

impl Fields<'_> {
    fn error(&self, key: &str, reason: impl Into<String>) -> DecodeError {
        DecodeError::new(self.id, format!("{}{}", self.prefix, key), reason)
    }

    fn required_str(&self, key: &str) -> Result<String, DecodeError> {
        self.optional_str(key)?
            .ok_or_else(|| self.error(key, "missing required field"))
    }

    fn optional_str(&self, key: &str) -> Result<Option<String>, DecodeError> {
        match self.obj.get(key) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(other) => Err(self.error(key, format!("expected a string, found {}", kind(other)))),
        }
    }

    /// A categorical index. Any non-negative integer is accepted here; range
    /// checking and the index-0 fallback happen in the codec.
    fn index(&self, key: &str) -> Result<Option<u64>, DecodeError> {
        match self.obj.get(key) {
            None => Ok(None),
            Some(Value::Number(number)) => number
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.error(key, format!("expected a non-negative integer index, found {}", number))),
            Some(other) => Err(self.error(key, format!("expected an integer index, found {}", kind(other)))),
        }
    }

    fn string_list(&self, key: &str) -> Result<Option<Vec<String>>, DecodeError> {
        match self.obj.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) => self.strings(key, items).map(Some),
            Some(other) => Err(self.error(key, format!("expected a list of strings, found {}", kind(other)))),
        }
    }

    fn strings(&self, key: &str, items: &[Value]) -> Result<Vec<String>, DecodeError> {
        items
            .iter()
            .enumerate()
            .map(|(position, item)| match item {
                Value::String(text) => Ok(text.clone()),
                other => Err(self.error(
                    &format!("{}[{}]", key, position),
                    format!("expected a string, found {}", kind(other)),
                )),
            })
            .collect()
    }

    /// An array of at most `max_len` elements.
    fn array(&self, key: &str, max_len: usize) -> Result<Option<&Vec<Value>>, DecodeError> {
        match self.obj.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) if items.len() <= max_len => Ok(Some(items)),
            Some(Value::Array(items)) => Err(self.error(
                key,
                format!("expected at most {} slots, found {}", max_len, items.len()),
            )),
            Some(other) => Err(self.error(key, format!("expected an array, found {}", kind(other)))),
        }
    }

    fn pronunciation(&self, key: &str) -> Result<Option<Vec<String>>, DecodeError> {
        let Some(items) = self.array(key, 2)? else {
            return Ok(None);
        };
        let mut forms = Vec::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            match (position, item) {
                (1, Value::Null) => {}
                (_, Value::String(text)) => forms.push(text.clone()),
                (_, other) => {
                    return Err(self.error(
                        &format!("{}[{}]", key, position),
                        format!("expected a string, found {}", kind(other)),
                    ))
                }
            }
        }
        if forms.is_empty() {
            return Err(self.error(key, "expected a native form in the first slot"));
        }
        Ok(Some(forms))
    }

    fn dialogue_flag(&self, key: &str) -> Result<Option<u8>, DecodeError> {
        match self.obj.get(key) {
            None => Ok(None),
            Some(Value::Number(number)) if number.as_u64() == Some(1) => Ok(Some(1)),
            Some(other) => Err(self.error(key, format!("expected the literal 1, found {}", other))),
        }
    }
}

/// Short description of a JSON value's type for error messages.
fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_minimal_entry() {
        let value = json!({ "i": "a-1", "k": "가", "r": "ga", "t": { "w": "go", "x": "to go" } });
        let entry = parse_entry(&value, 0).unwrap();
        assert_eq!(entry.id, "a-1");
        assert_eq!(entry.part_of_speech, None);
        assert_eq!(entry.translation.examples, None);
    }

    #[test]
    fn missing_id_is_named_by_position() {
        let value = json!({ "k": "가", "r": "ga", "t": { "w": "go", "x": "to go" } });
        let err = parse_entry(&value, 7).unwrap_err();
        assert_eq!(err.entry_id, "#7");
        assert_eq!(err.field, "i");
    }

    #[test]
    fn negative_index_is_a_decode_error() {
        let value = json!({ "i": "a-1", "k": "가", "r": "ga", "s": -1, "t": { "w": "go", "x": "to go" } });
        let err = parse_entry(&value, 0).unwrap_err();
        assert_eq!(err.entry_id, "a-1");
        assert_eq!(err.field, "s");
    }

    #[test]
    fn out_of_table_index_is_accepted_by_the_parser() {
        let value = json!({ "i": "a-1", "k": "가", "r": "ga", "s": 99, "t": { "w": "go", "x": "to go" } });
        assert_eq!(parse_entry(&value, 0).unwrap().part_of_speech, Some(99));
    }

    #[test]
    fn nested_errors_carry_the_full_path() {
        let value = json!({ "i": "a-1", "k": "가", "r": "ga",
            "t": { "w": "go", "x": "to go", "v": [null, ["ok", 3]] } });
        let err = parse_entry(&value, 0).unwrap_err();
        assert_eq!(err.field, "t.v[1][1]");

        let value = json!({ "i": "a-1", "k": "가", "r": "ga",
            "t": { "w": "go", "x": "to go", "e": ["a", "b", "c", "d", "e"] } });
        assert_eq!(parse_entry(&value, 0).unwrap_err().field, "t.e");
    }

    #[test]
    fn dialogue_flag_must_be_literal_one() {
        let value = json!({ "i": "a-1", "k": "가", "r": "ga", "h": true, "t": { "w": "go", "x": "to go" } });
        assert_eq!(parse_entry(&value, 0).unwrap_err().field, "h");
    }

    #[test]
    fn empty_pronunciation_tuple_is_rejected() {
        let value = json!({ "i": "a-1", "k": "가", "r": "ga", "p": [], "t": { "w": "go", "x": "to go" } });
        assert_eq!(parse_entry(&value, 0).unwrap_err().field, "p");
    }
}
