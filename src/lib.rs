//! Retail cart checker.
//!
//! Walks a shopping site to its cart, reads what is in it, and decides
//! whether the total is under a spending threshold. Two strategies share
//! the same snapshot and decision types: a scripted navigator driven by a
//! declarative site profile, and a narrative strategy that hands the task
//! to an LLM browsing agent and parses its report.

pub mod candidates;
pub mod cart;
pub mod config;
pub mod decision;
pub mod error;
pub mod extract;
pub mod graph;
pub mod operator;
pub mod page;
pub mod price;
pub mod profile;
pub mod resolver;
pub mod strategy;
pub mod task;

pub use cart::{CartLineItem, CartSnapshot};
pub use config::{Configuration, StrategyKind};
pub use decision::{ThresholdStatus, ThresholdVerdict, decide};
pub use error::{AgentError, ConfigError, PageError, ProfileError};
pub use operator::{OperatorGate, SignInDecision};
pub use page::{ElementHandle, PageContext, WaitPolicy};
pub use profile::SiteProfile;
pub use strategy::{ExecutionStrategy, NarrativeSource, NarrativeStrategy, ScriptedStrategy};
pub use task::{TaskRequest, TaskResult};
