//! TextGenerator trait — the external LLM collaborator.
//!
//! The core consumes text generation only as an optional secondary conflict
//! detection strategy. Everything must keep working (with reduced conflict
//! recall) when no generator is configured or when it errors.

use async_trait::async_trait;

use crate::error::GenerateError;

/// Opaque prompt-in, text-out collaborator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for the given prompt.
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerateError>;
}

/// A generator that always fails — the default when no LLM is wired in.
pub struct NoopGenerator;

#[async_trait]
impl TextGenerator for NoopGenerator {
    async fn generate(&self, _prompt: &str) -> std::result::Result<String, GenerateError> {
        Err(GenerateError::NotConfigured)
    }
}
