//! LLM integration for social-forge.
//!
//! Every stage of the generation pipeline talks to a language model through
//! the [`LlmProvider`] trait; [`LiteLlmClient`] is the production
//! implementation, speaking the OpenAI-compatible chat-completions protocol
//! to a LiteLLM proxy or any compatible endpoint.
//!
//! Model output is treated as untrusted text: the client never promises that
//! a completion conforms to the JSON shape a prompt asked for. Each agent
//! validates what it gets back and drives its own retry policy.
//!
//! ```ignore
//! use social_forge::llm::{GenerationRequest, LiteLlmClient, LlmProvider, Message};
//!
//! let client = LiteLlmClient::from_env()?;
//! let request = GenerationRequest::new(
//!     "",
//!     vec![
//!         Message::system("You are a social scientist."),
//!         Message::user("Describe a plausible hobbyist forum."),
//!     ],
//! );
//! let response = client.generate(request).await?;
//! ```

pub mod litellm;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
};
