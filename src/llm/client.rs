//! LLM client trait

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// A vendor client capable of one blocking completion call.
///
/// The engine is polymorphic over this trait; tests inject scripted
/// implementations. No implementation may retain the request beyond the
/// call scope.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
