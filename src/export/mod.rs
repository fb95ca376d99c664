//! Dataset export: write a finished channel run to disk.
//!
//! The post history serializes to `{username, timestamp, text}` records,
//! either as one JSON array or as newline-delimited JSON. The full
//! [`ChannelDataset`] (spec + cast + script + posts) can also be written as
//! a single JSON document for downstream tooling that wants the provenance.

use std::path::Path;

use thiserror::Error;

use crate::agents::types::Post;
use crate::pipeline::ChannelDataset;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No posts to export")]
    NoPosts,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes the post history as a pretty-printed JSON array.
pub fn write_posts_json(posts: &[Post], path: impl AsRef<Path>) -> Result<(), ExportError> {
    if posts.is_empty() {
        return Err(ExportError::NoPosts);
    }

    let json = serde_json::to_string_pretty(posts)?;
    std::fs::write(path.as_ref(), json)?;

    tracing::info!(count = posts.len(), path = %path.as_ref().display(), "Wrote posts as JSON");
    Ok(())
}

/// Writes the post history as newline-delimited JSON, one record per line.
pub fn write_posts_ndjson(posts: &[Post], path: impl AsRef<Path>) -> Result<(), ExportError> {
    if posts.is_empty() {
        return Err(ExportError::NoPosts);
    }

    let mut out = String::new();
    for post in posts {
        out.push_str(&serde_json::to_string(post)?);
        out.push('\n');
    }
    std::fs::write(path.as_ref(), out)?;

    tracing::info!(count = posts.len(), path = %path.as_ref().display(), "Wrote posts as NDJSON");
    Ok(())
}

/// Writes the complete dataset (spec, cast, script, posts) as one JSON file.
pub fn write_dataset_json(
    dataset: &ChannelDataset,
    path: impl AsRef<Path>,
) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(dataset)?;
    std::fs::write(path.as_ref(), json)?;

    tracing::info!(
        posts = dataset.posts.len(),
        path = %path.as_ref().display(),
        "Wrote full dataset"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::types::parse_event_time;

    fn posts() -> Vec<Post> {
        let timestamp = parse_event_time("05/11/24 09:00:00").expect("parses");
        vec![
            Post {
                username: "ana".into(),
                timestamp,
                text: "first".into(),
            },
            Post {
                username: "bo".into(),
                timestamp,
                text: "second".into(),
            },
        ]
    }

    #[test]
    fn test_write_posts_json_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("posts.json");

        write_posts_json(&posts(), &path).expect("writes");

        let content = std::fs::read_to_string(&path).expect("reads");
        let parsed: Vec<Post> = serde_json::from_str(&content).expect("parses");
        assert_eq!(parsed, posts());
    }

    #[test]
    fn test_write_posts_ndjson_one_record_per_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("posts.ndjson");

        write_posts_ndjson(&posts(), &path).expect("writes");

        let content = std::fs::read_to_string(&path).expect("reads");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Post = serde_json::from_str(lines[0]).expect("parses");
        assert_eq!(first.username, "ana");
    }

    #[test]
    fn test_empty_history_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("posts.json");

        assert!(matches!(
            write_posts_json(&[], &path),
            Err(ExportError::NoPosts)
        ));
        assert!(matches!(
            write_posts_ndjson(&[], &path),
            Err(ExportError::NoPosts)
        ));
        assert!(!path.exists());
    }
}
