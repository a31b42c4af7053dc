//! Canonical comparable form of an entry, and structural comparison.
//!
//! Both sides of a verification go through [`normalize`], which spells out
//! every documented default the same way:
//!
//! - `frequency` is always present (`common` when unstated)
//! - `hasDialogueExample` appears only when true
//! - `tags` is always present, possibly empty
//! - an empty phonetic form is dropped
//! - `examples.master` is `""` when absent
//! - `variations` with no register is dropped
//!
//! Objects come out with sorted keys (`serde_json::Map` without
//! `preserve_order`). Array order is kept: tags and variation lists are
//! ordered data.

use serde_json::{json, Map, Value};

use crate::lexicon::types::models::{OriginalEntry, Translation};
use crate::lexicon::types::tables::EnumTable;

pub fn normalize(entry: &OriginalEntry) -> Value {
    let mut obj = Map::new();
    obj.insert("id".into(), json!(entry.id));
    obj.insert("primaryWord".into(), json!(entry.primary_word));
    obj.insert("transliteration".into(), json!(entry.transliteration));
    if let Some(pronunciation) = &entry.pronunciation {
        let mut p = Map::new();
        p.insert("native".into(), json!(pronunciation.native));
        if let Some(phonetic) = pronunciation.phonetic.as_ref().filter(|text| !text.is_empty()) {
            p.insert("phonetic".into(), json!(phonetic));
        }
        obj.insert("pronunciation".into(), Value::Object(p));
    }
    obj.insert("partOfSpeech".into(), json!(entry.part_of_speech.as_str()));
    obj.insert("categoryId".into(), json!(entry.category_id));
    obj.insert("difficulty".into(), json!(entry.difficulty.as_str()));
    obj.insert("frequency".into(), json!(entry.frequency().as_str()));
    obj.insert("tags".into(), json!(entry.tags));
    if entry.has_dialogue_example {
        obj.insert("hasDialogueExample".into(), Value::Bool(true));
    }
    obj.insert("translation".into(), normalize_translation(&entry.translation));
    Value::Object(obj)
}

fn normalize_translation(translation: &Translation) -> Value {
    let mut obj = Map::new();
    obj.insert("word".into(), json!(translation.word));
    obj.insert("explanation".into(), json!(translation.explanation));
    if let Some(examples) = &translation.examples {
        obj.insert(
            "examples".into(),
            json!({
                "beginner": examples.beginner,
                "intermediate": examples.intermediate,
                "advanced": examples.advanced,
                "master": examples.master.as_deref().unwrap_or(""),
            }),
        );
    }
    if let Some(variations) = translation.variations.as_ref().filter(|v| !v.is_empty()) {
        let mut v = Map::new();
        for (name, list) in [
            ("formal", &variations.formal),
            ("casual", &variations.casual),
            ("short", &variations.short),
        ] {
            if let Some(list) = list {
                v.insert(name.into(), json!(list));
            }
        }
        obj.insert("variations".into(), Value::Object(v));
    }
    Value::Object(obj)
}

/// Compares two JSON values structurally.
///
/// Returns `None` when equal, otherwise the path of the first difference,
/// e.g. `$.translation.examples.master` or `$.tags[2]`. Arrays compare
/// pairwise in order; objects compare key sets, then values in key order.
pub fn deep_equal(a: &Value, b: &Value) -> Option<String> {
    let mut path = String::from("$");
    if diff(a, b, &mut path) {
        Some(path)
    } else {
        None
    }
}

/// Extends `path` to the first difference and returns true, or leaves it
/// untouched and returns false.
fn diff(a: &Value, b: &Value, path: &mut String) -> bool {
    match (a, b) {
        (Value::Array(xs), Value::Array(ys)) => {
            if xs.len() != ys.len() {
                path.push_str(&format!("[{}]", xs.len().min(ys.len())));
                return true;
            }
            for (position, (x, y)) in xs.iter().zip(ys).enumerate() {
                let restore = path.len();
                path.push_str(&format!("[{}]", position));
                if diff(x, y, path) {
                    return true;
                }
                path.truncate(restore);
            }
            false
        }
        (Value::Object(xs), Value::Object(ys)) => {
            if let Some(key) = xs
                .keys()
                .find(|key| !ys.contains_key(*key))
                .or_else(|| ys.keys().find(|key| !xs.contains_key(*key)))
            {
                path.push('.');
                path.push_str(key);
                return true;
            }
            for (key, x) in xs {
                let restore = path.len();
                path.push('.');
                path.push_str(key);
                if ys.get(key).map_or(true, |y| diff(x, y, path)) {
                    return true;
                }
                path.truncate(restore);
            }
            false
        }
        // Scalars, and any type mismatch
        _ => a != b,
    }
}
