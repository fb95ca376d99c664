//! Shared utilities for social-forge.

pub mod json_extraction;

pub use json_extraction::{extract_json_object, JsonExtraction, JsonExtractionError};
