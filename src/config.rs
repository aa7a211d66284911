//! Runtime configuration.
//!
//! Built once at startup and passed explicitly to whatever needs it.
//! Every section has defaults, so an empty file is a valid configuration.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::ConfigError;
use crate::price::DEFAULT_THRESHOLD;

/// File looked up in the working directory when no path is given.
pub const LOCAL_CONFIG: &str = "cart-agent.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Follow the site graph with fallback selectors.
    #[default]
    Scripted,
    /// Delegate browsing to the LLM agent and parse its report.
    Narrative,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Scripted => "scripted",
            StrategyKind::Narrative => "narrative",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorPanel {
    #[default]
    Console,
    Web,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub navigation_ms: u64,
    /// Per selector candidate.
    pub selector_ms: u64,
    /// Per empty-cart indicator.
    pub probe_ms: u64,
    /// Pause after navigation before reading the page.
    pub settle_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 60_000,
            selector_ms: 10_000,
            probe_ms: 3_000,
            settle_ms: 3_000,
        }
    }
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn selector(&self) -> Duration {
        Duration::from_millis(self.selector_ms)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    /// DevTools endpoint of an already running Chrome, e.g. `http://127.0.0.1:9222`.
    pub attach_url: Option<String>,
    pub chrome_path: Option<PathBuf>,
    /// Persistent profile directory, so a manual sign-in survives restarts.
    pub user_data_dir: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            attach_url: None,
            chrome_path: None,
            user_data_dir: None,
            window_width: 1280,
            window_height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    pub max_steps: usize,
    pub endpoint: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            temperature: 0.1,
            max_steps: 25,
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            api_key_env: "OPENAI_API_KEY".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedConfig {
    /// Click through to checkout when the verdict allows it. Never pays.
    pub proceed_to_checkout: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub panel: OperatorPanel,
    /// First port tried by the web panel.
    pub port: u16,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            panel: OperatorPanel::Console,
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub strategy: StrategyKind,
    pub threshold: f64,
    /// Site profile JSON; the built-in Amazon profile when absent.
    pub profile: Option<PathBuf>,
    pub timeouts: Timeouts,
    pub browser: BrowserConfig,
    pub llm: LlmConfig,
    pub scripted: ScriptedConfig,
    pub operator: OperatorConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            threshold: DEFAULT_THRESHOLD,
            profile: None,
            timeouts: Timeouts::default(),
            browser: BrowserConfig::default(),
            llm: LlmConfig::default(),
            scripted: ScriptedConfig::default(),
            operator: OperatorConfig::default(),
        }
    }
}

impl Configuration {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    pub fn load_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Explicit path, else `./cart-agent.toml`, else the user config dir,
    /// else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            debug!(path = %path.display(), "loading configuration");
            return Self::load(path);
        }
        let candidates = std::iter::once(PathBuf::from(LOCAL_CONFIG))
            .chain(dirs::config_dir().map(|d| d.join("cart-agent").join("config.toml")));
        for path in candidates {
            if path.is_file() {
                debug!(path = %path.display(), "loading configuration");
                return Self::load(&path);
            }
        }
        debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(invalid("threshold", "must be a positive amount"));
        }
        let t = &self.timeouts;
        for (field, value) in [
            ("timeouts.navigation_ms", t.navigation_ms),
            ("timeouts.selector_ms", t.selector_ms),
            ("timeouts.probe_ms", t.probe_ms),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        if self.llm.max_steps == 0 {
            return Err(invalid("llm.max_steps", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        message: message.into(),
    }
}
