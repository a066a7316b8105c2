//! # Configuration Module
//!
//! Centralized configuration constants for tickstore. All tuning knobs live
//! in [`constants`]; import them from there rather than redefining locally.

pub mod constants;

pub use constants::*;
