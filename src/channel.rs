//! Channel specification for a simulated social network.
//!
//! A [`ChannelSpec`] describes the channel to synthesize: what it is about,
//! how many personas populate it and how many posts the script should
//! contain. It is supplied by the caller (directly, from a YAML/JSON file,
//! or drafted by the profile synthesizer from a seed description) and is
//! immutable for the lifetime of a generation run.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or validating a channel spec.
#[derive(Debug, Error)]
pub enum ChannelSpecError {
    #[error("Invalid channel spec: {0}")]
    Invalid(String),

    #[error("Unsupported spec file extension: {0} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Description of the simulated channel being generated.
///
/// All fields are required; the core infers no defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Name of the channel.
    pub title: String,
    /// Bio of the channel.
    pub description: String,
    /// Number of personas to synthesize.
    pub user_count: u32,
    /// Overall tone and atmosphere of the channel.
    pub vibe: String,
    /// Central narrative the script is built around.
    pub agenda: String,
    /// Number of posts in the script.
    pub post_count: u32,
}

impl ChannelSpec {
    /// Creates a new channel spec and validates it.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        user_count: u32,
        vibe: impl Into<String>,
        agenda: impl Into<String>,
        post_count: u32,
    ) -> Result<Self, ChannelSpecError> {
        let spec = Self {
            title: title.into(),
            description: description.into(),
            user_count,
            vibe: vibe.into(),
            agenda: agenda.into(),
            post_count,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Loads a channel spec from a YAML or JSON file, selected by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ChannelSpecError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let spec: ChannelSpec = match extension.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            other => return Err(ChannelSpecError::UnsupportedFormat(other.to_string())),
        };

        spec.validate()?;
        Ok(spec)
    }

    /// Checks structural validity: non-empty text fields, non-zero counts.
    ///
    /// Validation never mutates the spec and is safe to repeat.
    pub fn validate(&self) -> Result<(), ChannelSpecError> {
        if self.title.trim().is_empty() {
            return Err(ChannelSpecError::Invalid("title must not be empty".into()));
        }
        if self.description.trim().is_empty() {
            return Err(ChannelSpecError::Invalid(
                "description must not be empty".into(),
            ));
        }
        if self.vibe.trim().is_empty() {
            return Err(ChannelSpecError::Invalid("vibe must not be empty".into()));
        }
        if self.agenda.trim().is_empty() {
            return Err(ChannelSpecError::Invalid("agenda must not be empty".into()));
        }
        if self.user_count == 0 {
            return Err(ChannelSpecError::Invalid(
                "user_count must be at least 1".into(),
            ));
        }
        if self.post_count == 0 {
            return Err(ChannelSpecError::Invalid(
                "post_count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
