//! Task requests and the uniform result envelope every strategy returns.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::cart::CartSnapshot;
use crate::decision::ThresholdVerdict;
use crate::error::AgentError;
use crate::price::find_threshold;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskRequest {
    /// Free-text goal; may name the threshold ("... under $80").
    pub goal: Option<String>,
    pub threshold: Option<f64>,
}

impl TaskRequest {
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            goal: None,
            threshold: Some(threshold),
        }
    }

    pub fn with_goal(goal: impl Into<String>) -> Self {
        Self {
            goal: Some(goal.into()),
            threshold: None,
        }
    }

    /// Explicit threshold, else one named in the goal, else `default`.
    pub fn resolve_threshold(&self, default: f64) -> f64 {
        self.threshold
            .or_else(|| self.goal.as_deref().and_then(find_threshold))
            .unwrap_or(default)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<CartSnapshot>,
}

impl TaskResult {
    /// Successful run: verdict message plus the standard cart fields.
    pub fn from_verdict(strategy: &str, snapshot: CartSnapshot, verdict: &ThresholdVerdict) -> Self {
        let mut data = Map::new();
        data.insert("strategy".into(), json!(strategy));
        data.insert("cart_items".into(), json!(snapshot.item_names()));
        data.insert("total".into(), json!(snapshot.total()));
        data.insert("threshold".into(), json!(verdict.threshold));
        data.insert("action_taken".into(), json!(verdict.action));
        data.insert("items_count".into(), json!(snapshot.item_count()));
        data.insert("threshold_status".into(), json!(verdict.status));
        data.insert("should_checkout".into(), json!(verdict.should_checkout));
        if let Some(correct) = verdict.behavior_correct {
            data.insert("behavior_correct".into(), json!(correct));
        }
        Self {
            success: true,
            message: verdict.message.clone(),
            data: Some(data),
            snapshot: Some(snapshot),
        }
    }

    /// Failed run. Always well formed; never carries a snapshot.
    pub fn from_error(strategy: &str, err: &AgentError, threshold: f64) -> Self {
        let action = match err {
            AgentError::Cancelled(_) => "cancelled",
            _ => "error",
        };
        let mut data = Map::new();
        data.insert("strategy".into(), json!(strategy));
        data.insert("action_taken".into(), json!(action));
        data.insert("threshold".into(), json!(threshold));
        data.insert("error_kind".into(), json!(err.kind()));
        data.insert("error".into(), json!(err.to_string()));
        Self {
            success: false,
            message: err.to_string(),
            data: Some(data),
            snapshot: None,
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.get(key))
    }

    pub fn action_taken(&self) -> Option<&str> {
        self.get("action_taken").and_then(Value::as_str)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
