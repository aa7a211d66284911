use anyhow::{Result, anyhow};
use cart_agent::config::LlmConfig;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::types::{ChatMessage, PageState, Step};

const SYSTEM_PROMPT: &str = r#"You are a shopping-cart inspection agent. You control a real Chrome browser by issuing ONE step at a time as JSON.

Available actions:
- {"action":"Navigate","url":"https://..."}
- {"action":"WaitFor","selector":"[data-eid=\"[e0]\"]","timeout_ms":5000}
- {"action":"TypeInto","selector":"[data-eid=\"[e0]\"]","text":"..."}
- {"action":"Click","selector":"[data-eid=\"[e0]\"]"}
- {"action":"PressKey","key":"Enter"}
- {"action":"Extract","selector":"body","label":"cart"}
- {"action":"Done","summary":"Items: ... Cart total: $45.00. Clicked checkout, stopped at sign in."}

Rules:
1. Return ONLY a single JSON object per response. No markdown, no explanation.
2. Target elements with the [eN] IDs from the DOM snapshot, using selector format [data-eid="[eN]"].
3. Never enter payment details, addresses or credentials. Stop as soon as personal information is requested.
4. Your Done summary is the report. List each item name on its own line starting with "- ", state "Cart total: $X", and say whether you clicked checkout and where you stopped.
5. If you get stuck after 3 attempts, use Done and explain what you saw."#;

/// Conversation with the chat-completions endpoint. One conversation per task.
pub struct Brain {
    client: Client,
    api_key: String,
    config: LlmConfig,
    conversation: Vec<ChatMessage>,
}

impl Brain {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} not set in environment", config.api_key_env))?;

        Ok(Self {
            client: Client::new(),
            api_key,
            config: config.clone(),
            conversation: vec![ChatMessage::new("system", SYSTEM_PROMPT)],
        })
    }

    /// Start a new task with a fresh conversation.
    pub fn start_task(&mut self, task: &str) {
        self.conversation.truncate(1);
        self.conversation.push(ChatMessage::new(
            "user",
            format!("Task: {task}\n\nThe browser is on a blank tab. What is your next step?"),
        ));
    }

    /// Feed observation back to the LLM.
    pub fn observe(&mut self, page_state: &PageState) {
        self.conversation
            .push(ChatMessage::new("user", render_observation(page_state)));
    }

    /// Ask the LLM for the next step.
    pub async fn decide_next_step(&mut self) -> Result<Step> {
        let messages: Vec<serde_json::Value> = self
            .conversation
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();

        if messages.len() > 20 {
            debug!(messages = messages.len(), "conversation is getting long");
        }

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.config.model,
                "messages": messages,
                "temperature": self.config.temperature,
            }))
            .send()
            .await?;

        let status = response.status();
        let json_resp: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let err_msg = json_resp["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error");
            warn!(%status, error = err_msg, "LLM API error");
            return Err(anyhow!("LLM API error ({status}): {err_msg}"));
        }

        let content = json_resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("No content in LLM response: {json_resp}"))?;
        debug!(reply = content, "LLM replied");

        self.conversation.push(ChatMessage::new("assistant", content));
        parse_step(content)
    }
}

fn render_observation(page_state: &PageState) -> String {
    let mut observation = format!(
        "Page URL: {}\nTitle: {}\n\nDOM:\n{}",
        page_state.url, page_state.title, page_state.dom_snapshot
    );
    if let Some(ref err) = page_state.error {
        observation.push_str(&format!("\n\nERROR from last step: {err}"));
    }
    for ext in &page_state.extracted {
        observation.push_str(&format!("\n\nExtracted [{}]: {}", ext.label, ext.content));
    }
    observation
}

/// Parse a step, tolerating markdown fences around the JSON.
fn parse_step(content: &str) -> Result<Step> {
    let cleaned = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(cleaned).map_err(|e| anyhow!("Failed to parse LLM response: {e}. Content: {cleaned}"))
}
