//! Codec layer between the verbose and the compact entry representation.
//!
//! # Submodules
//!
//! - [`compact`][]: The compact wire model and its validating parser
//! - [`entry`][]: `encode` / `decode` with the field-elision rules

pub mod compact;
pub mod entry;

pub use entry::{decode, encode};
