//! Request execution.
//!
//! [`ExecutionOrchestrator`] owns the per-session state machine
//! (`Idle -> Running -> {Completed, Cancelled, Failed} -> Idle`) and hands
//! backend calls to a bounded [`WorkerPool`]. A run is carried out by the
//! buffered or the streaming strategy; the orchestrator alone decides how
//! memory is updated or rolled back afterwards.

mod buffered;
mod consumer;
mod orchestrator;
mod pool;
mod request;
mod state;
mod streaming;


pub use buffered::BufferedStrategy;
pub use consumer::{StreamCallbacks, StreamConsumer, StreamPhase, StreamSink};
pub use orchestrator::{
    ExecutionHandle, ExecutionOrchestrator, OrchestratorBuilder, OrchestratorSettings, SubmitError,
    Submission,
};
pub use pool::{WorkerPool, DEFAULT_POOL_SIZE};
pub use request::{
    CompletionRequest, CompletionResult, CompletionStatus, FailureReason, DEFAULT_TIMEOUT,
};
pub use state::ExecutionState;
pub use streaming::StreamingStrategy;

use async_trait::async_trait;

use crate::resolver::BackendHandle;
use crate::{AiError, ChatResponse, Message};

/// One way of running a request against a backend.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    /// Send `snapshot` and produce the complete reply.
    async fn run(&self, snapshot: &[Message], handle: &BackendHandle)
        -> Result<ChatResponse, AiError>;
}
