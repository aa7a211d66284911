//! Execution strategies: interchangeable ways of running one cart task.

mod narrative;
mod scripted;

pub use narrative::{NarrativeSource, NarrativeStrategy, narrative_task};
pub use scripted::ScriptedStrategy;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::task::{TaskRequest, TaskResult};

#[async_trait]
pub trait ExecutionStrategy: Send {
    fn name(&self) -> &'static str;

    async fn start(&mut self) -> Result<(), AgentError>;

    async fn close(&mut self) -> Result<(), AgentError>;

    /// Run one task to completion. Expected failures come back as a
    /// `TaskResult` with `success == false`, never as a panic.
    async fn execute_task(&mut self, request: &TaskRequest) -> TaskResult;
}
