//! Gemini provider helpers and clients.

pub mod api;
pub mod cli;
pub mod shared;
mod sse;

pub use api::{
    GeminiClient, GeminiConfig, GeminiImageGenerationOptions, GenerateImageResponse,
    GeneratedImage, SourceImage,
};
pub use cli::{GeminiCliClient, GeminiCliConfig};
pub use shared::GeminiThinkingConfig;
