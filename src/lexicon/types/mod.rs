//! Foundational data structures, enumeration tables and error types.

pub mod error;
pub mod models;
pub mod tables;
