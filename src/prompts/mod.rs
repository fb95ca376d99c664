//! LLM prompts for each stage of the channel generation pipeline.
//!
//! Templates use `{placeholder}` substitution and every template that
//! requests structured output spells out the exact JSON shape and instructs
//! the model to emit the object alone. The parsers never rely on the model
//! honoring that instruction; they run the extraction utility first.

use crate::agents::types::{Post, ScriptEvent, UserProfile};
use crate::channel::ChannelSpec;

/// System prompt shared by the persona and script stages.
pub const SOCIAL_SCIENTIST_SYSTEM_PROMPT: &str = "You are an expert computational social scientist \
who has studied the dynamics of countless online communities. You construct plausible synthetic \
social-network data for research use. You reply with raw JSON only: no markdown fences, no \
commentary, no text before or after the JSON object.";

/// User prompt template for persona synthesis.
pub const PROFILE_USER_TEMPLATE: &str = r#"Invent the cast of users for a social network channel.

Channel: '{title}' - {description}
Overall atmosphere: {vibe}

Create exactly {user_count} users. Each needs a username of the kind seen on a real social
network, a short biography, and a personality sketch that will shape how they write. Vary the
personalities and opinions across the cast; usernames must all be distinct.

Output as JSON:
{
  "USERS": [
    {"USERNAME": "the user's username", "BIO": "the user's bio", "PERSONALITY": "the user's personality"}
  ]
}

IMPORTANT: Output ONLY the JSON object, with exactly {user_count} entries in USERS."#;

/// User prompt template for drafting a full channel spec from a seed.
pub const SPEC_DRAFT_USER_TEMPLATE: &str = r#"Write the abstract for a plausible social network
channel based on this seed description: '{seed}'.

Decide on a fitting title, a channel bio, the overall atmosphere, the narrative taking place on
the channel, and sensible sizes for the cast and the post volume of a dataset snapshot.

Output as JSON:
{
  "TITLE": "the title of the channel",
  "DESCRIPTION": "the bio of the channel",
  "NUMBER_OF_USERS": 8,
  "CHANNEL_VIBE": "a summary of the conditions and atmosphere of the channel",
  "STORY_AGENDA": "the story and activity taking place on the channel",
  "NUMBER_OF_POSTS": 20
}

IMPORTANT: Output ONLY the JSON object. NUMBER_OF_USERS and NUMBER_OF_POSTS must be integers."#;

/// User prompt template for script planning.
pub const SCRIPT_USER_TEMPLATE: &str = r#"Write a play-by-play script of interactions on a social
network channel, similar to a microblogging feed.

Channel: '{title}' - {description}
Overall atmosphere: {vibe}
The narrative of the script centers on: {agenda}

The cast of users:
{roster}

Plan exactly {post_count} posts. Do not write the post text itself; for each post record only who
posts, when, why, and the stylistic features of the post. Structure the script as a narrative with
small conversations baked in: users reply to each other in blocks, some lead new threads, some
stay bystanders. Use a variety of purposes (sharing news, asking questions, making jokes, replying
to earlier posts). Only use usernames from the cast above. Timestamps use the format
'dd/mm/yy HH:MM:SS' and must not decrease from one post to the next.

Output as JSON:
{
  "SCRIPT": [
    {
      "USER": "username of the poster",
      "TIME": "dd/mm/yy HH:MM:SS",
      "PURPOSE": "the purpose of the post",
      "FEATURES": {"TOXICITY": "toxicity of the post", "SENTIMENT": "sentiment of the post", "EMOTION": "emotion of the post"}
    }
  ]
}

IMPORTANT: Output ONLY the JSON object, with exactly {post_count} entries in SCRIPT."#;

/// System prompt for post rendering.
pub const ACTOR_SYSTEM_PROMPT: &str = "You are role-playing a single user on a simulated social \
network for research-use synthetic data. Stay in character, write like a person typing quickly, \
and keep continuity with the conversation so far. You reply with raw JSON only: no markdown \
fences, no commentary.";

/// User prompt template for rendering one post.
pub const POST_USER_TEMPLATE: &str = r#"You are the user '{username}' on the channel
'{title}' - {description} (atmosphere: {vibe}).

Your persona: {persona}

The conversation so far:
{history}

Write your next post. Its purpose: {purpose}. Stylistic features to hit: {features}.

Your post should read naturally in the flow of the channel. You may '@' mention users who have
already spoken, reply to the latest messages, share links or hashtags, or start a new thread if
that fits your purpose. Match your persona and your own earlier posts.

Output as JSON:
{"POST": "the content of your post", "REASONING": "one sentence on why your persona writes this"}

IMPORTANT: Output ONLY the JSON object."#;

/// Template appended to the post prompt when a draft was rejected.
pub const REVISION_SUFFIX_TEMPLATE: &str = r#"You previously wrote the post '{previous}', which a
reviewer judged to read as machine-generated, for these reasons: '{critique}'. Write a different
post with the same purpose that addresses the critique. Same JSON output format."#;

/// System prompt for the adversarial judge.
pub const JUDGE_SYSTEM_PROMPT: &str = "You are an expert reviewer of social-media text. Your job \
is to assess whether a post was written by an AI large language model or by a person. You reply \
with raw JSON only: no markdown fences, no commentary.";

/// User prompt template for judging one draft.
pub const JUDGE_USER_TEMPLATE: &str = r#"Assess the following post text: '{text}'.

Output as JSON:
{
  "RESULT": true,
  "FEEDBACK": "what could be changed to make the text read as human-written"
}

RESULT is true if the text reads as AI-generated, false if it reads as human-written.
IMPORTANT: Output ONLY the JSON object."#;

/// Builds the persona synthesis prompt for a channel.
pub fn build_profile_prompt(spec: &ChannelSpec) -> String {
    PROFILE_USER_TEMPLATE
        .replace("{title}", &spec.title)
        .replace("{description}", &spec.description)
        .replace("{vibe}", &spec.vibe)
        .replace("{user_count}", &spec.user_count.to_string())
}

/// Builds the spec drafting prompt from a seed description.
pub fn build_spec_draft_prompt(seed: &str) -> String {
    SPEC_DRAFT_USER_TEMPLATE.replace("{seed}", seed)
}

/// Builds the script planning prompt from a channel and its cast.
pub fn build_script_prompt(spec: &ChannelSpec, profiles: &[UserProfile]) -> String {
    let roster = profiles
        .iter()
        .map(|p| format!("- {} | bio: {} | personality: {}", p.username, p.bio, p.personality))
        .collect::<Vec<_>>()
        .join("\n");

    SCRIPT_USER_TEMPLATE
        .replace("{title}", &spec.title)
        .replace("{description}", &spec.description)
        .replace("{vibe}", &spec.vibe)
        .replace("{agenda}", &spec.agenda)
        .replace("{roster}", &roster)
        .replace("{post_count}", &spec.post_count.to_string())
}

/// Builds the post rendering prompt for one script event.
///
/// `history` should already be limited to the context window; the most
/// recent post comes last, mirroring feed order.
pub fn build_post_prompt(
    spec: &ChannelSpec,
    persona: &UserProfile,
    event: &ScriptEvent,
    history: &[Post],
) -> String {
    let history_text = if history.is_empty() {
        "(no posts yet - the channel is quiet)".to_string()
    } else {
        history
            .iter()
            .map(|p| format!("[{}] @{}: {}", p.timestamp.format("%d/%m/%y %H:%M:%S"), p.username, p.text))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let features = format!(
        "toxicity: {}, sentiment: {}, emotion: {}",
        event.features.toxicity, event.features.sentiment, event.features.emotion
    );

    POST_USER_TEMPLATE
        .replace("{username}", &persona.username)
        .replace("{title}", &spec.title)
        .replace("{description}", &spec.description)
        .replace("{vibe}", &spec.vibe)
        .replace("{persona}", &format!("{} ({})", persona.bio, persona.personality))
        .replace("{history}", &history_text)
        .replace("{purpose}", &event.purpose)
        .replace("{features}", &features)
}

/// Builds the corrective suffix appended after a rejected draft.
pub fn build_revision_suffix(previous: &str, critique: &str) -> String {
    REVISION_SUFFIX_TEMPLATE
        .replace("{previous}", previous)
        .replace("{critique}", critique)
}

/// Builds the judge prompt for one draft.
pub fn build_judge_prompt(text: &str) -> String {
    JUDGE_USER_TEMPLATE.replace("{text}", text)
}
