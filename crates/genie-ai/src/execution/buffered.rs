use async_trait::async_trait;
use tracing::debug;

use super::ExecutionStrategy;
use crate::resolver::BackendHandle;
use crate::{AiError, ChatResponse, Message};

/// Single-shot execution: one request, one complete reply.
#[derive(Debug, Default, Clone, Copy)]
pub struct BufferedStrategy;

#[async_trait]
impl ExecutionStrategy for BufferedStrategy {
    async fn run(
        &self,
        snapshot: &[Message],
        handle: &BackendHandle,
    ) -> Result<ChatResponse, AiError> {
        debug!(
            provider = %handle.provider(),
            model = handle.model(),
            messages = snapshot.len(),
            "buffered call"
        );
        handle.backend().chat(snapshot).await
    }
}
