//! # Configuration Module
//!
//! Centralizes the configuration constants for slotstore. Values that depend
//! on each other live together so they cannot drift apart, and relationships
//! are enforced with compile-time assertions where possible.

pub mod constants;
pub use constants::*;
