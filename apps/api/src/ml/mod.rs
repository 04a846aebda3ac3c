//! Seams to the external AI provider.
//!
//! The rest of the crate only ever sees these two traits, so tests can swap in
//! deterministic doubles and a different provider can be plugged in at startup.

use crate::error::Result;
use async_trait::async_trait;

pub mod openai;

pub use openai::OpenAiClient;

/// Turns text into a fixed-length vector. Every call on one instance returns
/// vectors of the same dimensionality.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn model_name(&self) -> &str;
}

/// Single-turn text completion. No conversation state is kept between calls.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
