//! Completion provider trait.

use anyhow::Result;
use async_trait::async_trait;

/// A language model that continues a prompt.
///
/// Implementations must decode deterministically (zero temperature) and
/// return the generated text unmodified.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}
