use async_trait::async_trait;
use tracing::{info, warn};

use super::ExecutionStrategy;
use crate::decision::decide;
use crate::error::AgentError;
use crate::extract::extract_narrative;
use crate::price::format_usd;
use crate::task::{TaskRequest, TaskResult};

const NAME: &str = "narrative";

/// Something that can carry out a browsing task on its own and report
/// back in free text, typically an LLM driving a browser.
#[async_trait]
pub trait NarrativeSource: Send {
    async fn start(&mut self) -> Result<(), AgentError> {
        Ok(())
    }

    /// Perform `task` and return the agent's final report.
    async fn run(&mut self, task: &str) -> Result<String, AgentError>;

    async fn close(&mut self) -> Result<(), AgentError> {
        Ok(())
    }
}

/// Instruction handed to the agent for one cart check.
pub fn narrative_task(start_url: &str, threshold: f64) -> String {
    let limit = format_usd(threshold);
    format!(
        "Go to {start_url}. Click cart. Print each item name. \
         Only report the total cart price (not individual prices). \
         If total is below {limit}, click checkout and stop when asked for personal info. \
         If total is above {limit}, do not checkout."
    )
}

pub struct NarrativeStrategy<S> {
    source: S,
    start_url: String,
    default_threshold: f64,
}

impl<S: NarrativeSource> NarrativeStrategy<S> {
    pub fn new(source: S, start_url: impl Into<String>, default_threshold: f64) -> Self {
        Self {
            source,
            start_url: start_url.into(),
            default_threshold,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[async_trait]
impl<S: NarrativeSource> ExecutionStrategy for NarrativeStrategy<S> {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn start(&mut self) -> Result<(), AgentError> {
        self.source.start().await
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        self.source.close().await
    }

    async fn execute_task(&mut self, request: &TaskRequest) -> TaskResult {
        let threshold = request.resolve_threshold(self.default_threshold);
        let task = match &request.goal {
            Some(goal) => format!("{goal}\n\n{}", narrative_task(&self.start_url, threshold)),
            None => narrative_task(&self.start_url, threshold),
        };
        info!(threshold, "starting narrative cart check");

        let text = match self.source.run(&task).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "agent run failed");
                return TaskResult::from_error(NAME, &e, threshold);
            }
        };

        let report = extract_narrative(&text);
        let verdict = decide(&report.snapshot, threshold, Some(report.checkout_reached));
        info!(
            action = %verdict.action,
            total = verdict.total,
            checkout_reached = report.checkout_reached,
            "agent report evaluated"
        );

        TaskResult::from_verdict(NAME, report.snapshot, &verdict)
            .with_data("checkout_reached", report.checkout_reached)
            .with_data("result", text)
    }
}
