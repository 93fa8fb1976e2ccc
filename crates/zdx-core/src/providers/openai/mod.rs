//! OpenAI-compatible provider helpers and clients.

pub mod api;
pub mod chat_completions;
pub mod codex;
pub mod responses;
mod responses_sse;
mod responses_types;

pub use api::{OpenAIClient, OpenAIConfig};
pub use codex::{OpenAICodexClient, OpenAICodexConfig};
