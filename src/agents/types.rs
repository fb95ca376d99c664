//! Domain records produced and consumed by the pipeline.
//!
//! Profiles and script events are created once by their owning stage and
//! read-only afterwards. Posts accumulate in an append-only history owned by
//! the pipeline driver; a post's identity is its position in that history.
//! Judge verdicts are ephemeral steering signals and are never persisted.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A synthesized user persona.
///
/// Usernames are unique within a channel; the full persona set is immutable
/// for the lifetime of a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Handle the persona posts under.
    pub username: String,
    /// Short biography text.
    pub bio: String,
    /// Personality label steering how the persona writes.
    pub personality: String,
}

/// Categorical stylistic signals attached to a script event.
///
/// Values are free-form labels ("low", "hostile", "joyful", ...); the
/// pipeline requires them to be present but does not interpret them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Toxicity level of the planned post.
    pub toxicity: String,
    /// Sentiment of the planned post.
    pub sentiment: String,
    /// Dominant emotion of the planned post.
    pub emotion: String,
}

impl FeatureSet {
    /// Whether all three signals carry a non-empty label.
    pub fn is_complete(&self) -> bool {
        !self.toxicity.trim().is_empty()
            && !self.sentiment.trim().is_empty()
            && !self.emotion.trim().is_empty()
    }
}

/// One planned interaction in a channel script.
///
/// The script is an ordered sequence; sequence order defines both rendering
/// order and conversational context order, regardless of timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptEvent {
    /// Username of the persona making the post.
    pub username: String,
    /// When the post is made in the simulated timeline.
    pub timestamp: NaiveDateTime,
    /// Intent of the post ("share news", "ask a question", ...).
    pub purpose: String,
    /// Stylistic directives for the rendered post.
    pub features: FeatureSet,
}

/// A rendered post in the channel history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Author username.
    pub username: String,
    /// Timestamp copied verbatim from the originating script event.
    pub timestamp: NaiveDateTime,
    /// Final (possibly revised) post text.
    pub text: String,
}

/// The adversarial judge's assessment of a draft.
///
/// Consumed immediately by the revision step; never stored beyond the round
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    /// True when the draft reads as machine-generated.
    pub ai_generated: bool,
    /// Critique used to steer the next revision.
    pub feedback: String,
}

/// Timestamp formats accepted from the model, most common first.
///
/// The script prompt asks for `dd/mm/yy HH:MM:SS`, but models drift into
/// four-digit years, ISO dates, and the slashed-time variant of the
/// original schema wording.
const EVENT_TIME_FORMATS: &[&str] = &[
    "%d/%m/%y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%y %H/%M/%S",
];

/// Parses an event timestamp from any accepted wire format.
///
/// Returns `None` when no format matches; the planner maps that to a schema
/// error and retries.
pub fn parse_event_time(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();

    for format in EVENT_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }

    // RFC 3339 as a last resort ("2024-11-05T13:45:00Z")
    chrono::DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_year_format() {
        let parsed = parse_event_time("05/11/24 13:45:00").expect("parses");
        assert_eq!(parsed.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-11-05 13:45:00");
    }

    #[test]
    fn test_parse_long_year_format() {
        assert!(parse_event_time("05/11/2024 13:45:00").is_some());
    }

    #[test]
    fn test_parse_iso_format() {
        assert!(parse_event_time("2024-11-05 13:45:00").is_some());
    }

    #[test]
    fn test_parse_slashed_time_format() {
        assert!(parse_event_time("05/11/24 13/45/00").is_some());
    }

    #[test]
    fn test_parse_rfc3339() {
        assert!(parse_event_time("2024-11-05T13:45:00Z").is_some());
    }

    #[test]
    fn test_parse_garbage_returns_none() {
        assert!(parse_event_time("yesterday afternoon").is_none());
        assert!(parse_event_time("").is_none());
    }

    #[test]
    fn test_feature_set_completeness() {
        let complete = FeatureSet {
            toxicity: "low".into(),
            sentiment: "positive".into(),
            emotion: "joy".into(),
        };
        assert!(complete.is_complete());

        let incomplete = FeatureSet {
            toxicity: "low".into(),
            sentiment: "  ".into(),
            emotion: "joy".into(),
        };
        assert!(!incomplete.is_complete());
    }

    #[test]
    fn test_post_serialization_shape() {
        let post = Post {
            username: "ana".into(),
            timestamp: parse_event_time("05/11/24 13:45:00").expect("parses"),
            text: "hello".into(),
        };
        let json = serde_json::to_value(&post).expect("serializes");
        assert_eq!(json["username"], "ana");
        assert_eq!(json["text"], "hello");
        assert!(json["timestamp"].is_string());
    }
}
