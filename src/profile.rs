//! Site profiles: the pages, selectors and edges of one retail site.
//!
//! A profile is a JSON data artifact. It is loaded once and never
//! mutated, so the navigator and extractor stay site-agnostic.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ProfileError;
use crate::graph::{PageNode, SiteGraph};

const BUILTIN_AMAZON: &str = include_str!("../profiles/amazon.json");

/// Ranked selector chains used by cart extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartSelectors {
    /// Case-insensitive phrases that mark an empty cart in page content.
    pub empty_text: Vec<String>,
    pub empty_selectors: Vec<String>,
    pub item_rows: Vec<String>,
    /// Resolved inside each item row.
    pub item_name: Vec<String>,
    /// Resolved inside each item row.
    pub item_price: Vec<String>,
    pub total: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileDocument {
    name: String,
    start_page: String,
    cart_page: String,
    checkout_page: String,
    #[serde(default)]
    sign_in_markers: Vec<String>,
    pages: Vec<PageNode>,
    #[serde(default)]
    cart: CartSelectors,
}

#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub name: String,
    pub start_page: String,
    pub cart_page: String,
    pub checkout_page: String,
    pub sign_in_markers: Vec<String>,
    pub cart: CartSelectors,
    graph: SiteGraph,
}

impl SiteProfile {
    /// The Amazon profile shipped with the crate.
    pub fn builtin() -> Result<Self, ProfileError> {
        Self::from_json(BUILTIN_AMAZON)
    }

    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading site profile");
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ProfileError> {
        let doc: ProfileDocument = serde_json::from_str(content)?;
        let graph = SiteGraph::from_pages(doc.pages)?;

        for id in [&doc.start_page, &doc.cart_page] {
            if graph.page(id).is_none() {
                return Err(ProfileError::MissingPage(id.clone()));
            }
        }
        for target in graph.dangling_targets() {
            warn!(profile = %doc.name, target, "action target page is not declared");
        }

        Ok(Self {
            name: doc.name,
            start_page: doc.start_page,
            cart_page: doc.cart_page,
            checkout_page: doc.checkout_page,
            sign_in_markers: doc.sign_in_markers,
            cart: doc.cart,
            graph,
        })
    }

    pub fn graph(&self) -> &SiteGraph {
        &self.graph
    }

    /// URL of a declared page.
    pub fn url_of(&self, page_id: &str) -> Option<&str> {
        self.graph.page(page_id).map(|p| p.url.as_str())
    }

    /// True when `url` looks like a sign-in wall.
    pub fn is_sign_in(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.sign_in_markers
            .iter()
            .any(|m| url.contains(&m.to_lowercase()))
    }
}
