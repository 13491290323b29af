use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::consumer::StreamConsumer;
use super::ExecutionStrategy;
use crate::resolver::BackendHandle;
use crate::{AiError, ChatResponse, Message};

/// Token-by-token execution through a [`StreamConsumer`].
///
/// Fragments reach the consumer as the backend emits them. The reply
/// returned at the end is the consumer's accumulated text; terminal
/// callbacks are left to the orchestrator.
#[derive(Debug, Clone)]
pub struct StreamingStrategy {
    consumer: Arc<StreamConsumer>,
}

impl StreamingStrategy {
    pub fn new(consumer: Arc<StreamConsumer>) -> Self {
        Self { consumer }
    }

    pub fn consumer(&self) -> &Arc<StreamConsumer> {
        &self.consumer
    }
}

#[async_trait]
impl ExecutionStrategy for StreamingStrategy {
    async fn run(
        &self,
        snapshot: &[Message],
        handle: &BackendHandle,
    ) -> Result<ChatResponse, AiError> {
        debug!(
            provider = %handle.provider(),
            model = handle.model(),
            messages = snapshot.len(),
            "streaming call"
        );
        let consumer = Arc::clone(&self.consumer);
        let mut response = handle
            .backend()
            .chat_streaming(
                snapshot,
                Box::new(move |token: String| {
                    consumer.deliver(&token);
                }),
            )
            .await?;

        let streamed = self.consumer.text();
        if !streamed.is_empty() {
            response.content = streamed;
        }
        Ok(response)
    }
}
