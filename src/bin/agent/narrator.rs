use anyhow::Result;
use async_trait::async_trait;
use cart_agent::config::BrowserConfig;
use cart_agent::{AgentError, NarrativeSource};
use headless_chrome::Tab;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::brain::Brain;
use crate::dom;
use crate::face::AgentEvent;
use crate::hands::BrowserSession;
use crate::types::{EXTRACT_MAX_CHARS, Extraction, PageState, Step};

/// LLM-driven browsing agent. Each task runs in a fresh tab with a fresh
/// conversation and ends with the model's `Done` summary.
pub struct BrowserAgent {
    browser: BrowserConfig,
    brain: Brain,
    max_steps: usize,
    session: Option<BrowserSession>,
    events: Option<broadcast::Sender<AgentEvent>>,
}

impl BrowserAgent {
    pub fn new(
        browser: BrowserConfig,
        brain: Brain,
        max_steps: usize,
        events: Option<broadcast::Sender<AgentEvent>>,
    ) -> Self {
        Self {
            browser,
            brain,
            max_steps,
            session: None,
            events,
        }
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

#[async_trait]
impl NarrativeSource for BrowserAgent {
    async fn start(&mut self) -> Result<(), AgentError> {
        if self.session.is_some() {
            return Ok(());
        }
        let config = self.browser.clone();
        let session = tokio::task::spawn_blocking(move || BrowserSession::launch(&config))
            .await
            .map_err(|e| AgentError::Backend(format!("browser launch panicked: {e}")))?
            .map_err(|e| AgentError::Backend(format!("{e:#}")))?;
        self.session = Some(session);
        Ok(())
    }

    async fn run(&mut self, task: &str) -> Result<String, AgentError> {
        let Some(session) = self.session.as_mut() else {
            return Err(AgentError::Backend("browser not started".into()));
        };
        if let Err(e) = session.new_tab() {
            warn!(error = %e, "could not open a fresh tab, reusing the current one");
        }
        let tab = session.tab.clone();

        self.brain.start_task(task);
        for number in 1..=self.max_steps {
            self.emit(AgentEvent::Thinking);
            let step = match self.brain.decide_next_step().await {
                Ok(step) => step,
                Err(e) => {
                    self.emit(AgentEvent::TaskError {
                        message: format!("{e:#}"),
                    });
                    return Err(AgentError::Backend(format!("LLM error: {e:#}")));
                }
            };

            if let Step::Done { summary } = step {
                info!(steps = number - 1, "agent finished");
                self.emit(AgentEvent::TaskComplete {
                    summary: summary.clone(),
                });
                return Ok(summary);
            }

            let description = format!("{step:?}");
            debug!(number, step = %description, "executing step");
            self.emit(AgentEvent::Step {
                number,
                description,
            });

            let tab = tab.clone();
            let page_state = tokio::task::spawn_blocking(move || observe_after(&tab, &step))
                .await
                .map_err(|e| AgentError::Backend(format!("step panicked: {e}")))?;

            if let Some(ref err) = page_state.error {
                warn!(number, error = %err, "step failed");
                self.emit(AgentEvent::StepError {
                    message: err.clone(),
                });
            }
            self.brain.observe(&page_state);
        }

        let message = format!("agent stopped after {} steps without a report", self.max_steps);
        self.emit(AgentEvent::TaskError {
            message: message.clone(),
        });
        Err(AgentError::Backend(message))
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        self.session = None;
        Ok(())
    }
}

/// Execute `step`, then describe the resulting page for the model.
fn observe_after(tab: &Arc<Tab>, step: &Step) -> PageState {
    let mut extracted = Vec::new();
    let error = execute_step_on_tab(tab, step, &mut extracted)
        .err()
        .map(|e| format!("{e:#}"));

    PageState {
        url: dom::get_current_url(tab).unwrap_or_else(|_| "unknown".into()),
        title: dom::get_page_title(tab).unwrap_or_else(|_| "untitled".into()),
        dom_snapshot: dom::capture_dom_snapshot(tab).unwrap_or_default(),
        extracted,
        error,
    }
}

fn execute_step_on_tab(tab: &Arc<Tab>, step: &Step, extracted: &mut Vec<Extraction>) -> Result<()> {
    match step {
        Step::Navigate { url } => {
            tab.navigate_to(url)?;
            tab.wait_for_element("body")?;
            std::thread::sleep(Duration::from_millis(1500));
        }
        Step::WaitFor {
            selector,
            timeout_ms,
        } => {
            tab.wait_for_element_with_custom_timeout(selector, Duration::from_millis(*timeout_ms))?;
        }
        Step::TypeInto { selector, text } => {
            tab.find_element(selector)?.click()?;
            let js_sel = serde_json::to_string(selector)?;
            tab.evaluate(&format!("document.querySelector({js_sel}).value = ''"), false)?;
            tab.type_str(text)?;
        }
        Step::Click { selector } => {
            tab.find_element(selector)?.click()?;
            std::thread::sleep(Duration::from_millis(1000));
        }
        Step::PressKey { key } => {
            tab.press_key(key)?;
            std::thread::sleep(Duration::from_millis(1000));
        }
        Step::Extract { selector, label } => {
            let js_sel = serde_json::to_string(selector)?;
            let result = tab.evaluate(
                &format!("(document.querySelector({js_sel}) || {{}}).innerText || ''"),
                false,
            )?;
            let content = result
                .value
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default();
            extracted.push(Extraction {
                label: label.clone(),
                content: content.chars().take(EXTRACT_MAX_CHARS).collect(),
            });
        }
        Step::Done { .. } => {}
    }
    Ok(())
}
