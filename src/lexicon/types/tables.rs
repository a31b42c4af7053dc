//! Enumeration tables for the categorical fields of an entry.
//!
//! Each table is an explicit bidirectional map between an enum variant, its
//! wire index and its human-readable name. Indices are pinned next to each
//! variant, so reordering a declaration never changes the wire format.
//!
//! # Forward compatibility
//! Decoding an index that the table does not know falls back to the table's
//! index-0 value instead of failing. A newer encoder may write categories an
//! older decoder has never seen; the entry still decodes, and the fallback is
//! logged at `warn` so a silent miscategorization stays visible in the logs.

use log::warn;
use serde::{Deserialize, Serialize};

/// Behaviour shared by every enumeration table.
pub trait EnumTable: Sized + Copy + Default + PartialEq + 'static {
    /// Field name used in errors and log messages.
    const FIELD: &'static str;

    /// All variants in index order.
    fn all() -> &'static [Self];

    /// The pinned wire index of this variant.
    fn index(self) -> u8;

    /// The human-readable name of this variant.
    fn as_str(self) -> &'static str;

    fn from_index(index: u64) -> Option<Self>;

    fn from_name(name: &str) -> Option<Self>;

    /// Decodes a wire index, falling back to the index-0 value when unknown.
    fn decode_index(index: u64) -> Self {
        Self::from_index(index).unwrap_or_else(|| {
            let fallback = Self::default();
            warn!(
                "Unknown {} index {}; falling back to '{}'",
                Self::FIELD,
                index,
                fallback.as_str()
            );
            fallback
        })
    }

    /// The wire index to write, or `None` when the value is the decode-time default.
    fn encode_index(self) -> Option<u8> {
        match self.index() {
            0 => None,
            index => Some(index),
        }
    }
}

macro_rules! enum_table {
    (
        $(#[$meta:meta])*
        pub enum $name:ident as $field:literal {
            $( $variant:ident = $idx:literal => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( #[serde(rename = $text)] $variant ),+
        }

        impl EnumTable for $name {
            const FIELD: &'static str = $field;

            fn all() -> &'static [Self] {
                &[$( $name::$variant ),+]
            }

            fn index(self) -> u8 {
                match self {
                    $( $name::$variant => $idx ),+
                }
            }

            fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }

            fn from_index(index: u64) -> Option<Self> {
                match index {
                    $( $idx => Some($name::$variant), )+
                    _ => None,
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $text => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

enum_table! {
    /// Grammatical category of the primary word.
    pub enum PartOfSpeech as "partOfSpeech" {
        Noun = 0 => "noun",
        Verb = 1 => "verb",
        Adjective = 2 => "adjective",
        Adverb = 3 => "adverb",
        Pronoun = 4 => "pronoun",
        Particle = 5 => "particle",
        Interjection = 6 => "interjection",
        Conjunction = 7 => "conjunction",
        Determiner = 8 => "determiner",
        Numeral = 9 => "numeral",
        Suffix = 10 => "suffix",
        Prefix = 11 => "prefix",
        Phrase = 12 => "phrase",
        Expression = 13 => "expression",
    }
}

enum_table! {
    /// Learning difficulty. Also names the four example slots.
    pub enum Difficulty as "difficulty" {
        Beginner = 0 => "beginner",
        Intermediate = 1 => "intermediate",
        Advanced = 2 => "advanced",
        Master = 3 => "master",
    }
}

enum_table! {
    /// Usage frequency. An absent frequency means `Common`.
    pub enum Frequency as "frequency" {
        Common = 0 => "common",
        Frequent = 1 => "frequent",
        Occasional = 2 => "occasional",
        Uncommon = 3 => "uncommon",
        Rare = 4 => "rare",
    }
}

impl Default for PartOfSpeech {
    fn default() -> Self {
        Self::Noun
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Beginner
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self::Common
    }
}
