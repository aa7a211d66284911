//! Declarative site graph: pages are nodes, actions are edges.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::error::ProfileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Button,
    Textbox,
    Table,
    Link,
    Form,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Click,
    Type,
    Submit,
    Navigate,
    Wait,
}

/// A logical element on a page with its ranked selector chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSpec {
    pub id: String,
    pub kind: ElementKind,
    pub selector: String,
    #[serde(default)]
    pub fallbacks: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl ElementSpec {
    /// Primary selector followed by the fallbacks, in priority order.
    pub fn chain(&self) -> Vec<String> {
        std::iter::once(self.selector.clone())
            .chain(self.fallbacks.iter().cloned())
            .collect()
    }
}

/// An edge leaving a page through one of its elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEdge {
    pub element: String,
    pub kind: ActionKind,
    pub target: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageNode {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
    #[serde(default)]
    pub actions: Vec<ActionEdge>,
}

impl PageNode {
    pub fn element(&self, id: &str) -> Option<&ElementSpec> {
        self.elements.iter().find(|e| e.id == id)
    }
}

/// Outcome of a path search.
#[derive(Debug, Clone, PartialEq)]
pub enum PathOutcome<'g> {
    /// Start and target are the same page.
    AlreadyThere,
    Route(Vec<&'g ActionEdge>),
    NotFound,
}

impl<'g> PathOutcome<'g> {
    /// Edges to follow; empty for both `AlreadyThere` and `NotFound`.
    pub fn edges(&self) -> &[&'g ActionEdge] {
        match self {
            PathOutcome::Route(edges) => edges,
            _ => &[],
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, PathOutcome::NotFound)
    }
}

/// Immutable page graph, built once from a site profile.
#[derive(Debug, Clone, Default)]
pub struct SiteGraph {
    pages: HashMap<String, PageNode>,
}

impl SiteGraph {
    /// Build a graph, rejecting duplicate page ids, duplicate element ids
    /// within a page, and edges leaving through undeclared elements.
    /// Undeclared edge targets are allowed; they resolve lazily.
    pub fn from_pages(pages: Vec<PageNode>) -> Result<Self, ProfileError> {
        let mut map = HashMap::with_capacity(pages.len());
        for page in pages {
            let mut seen = HashSet::new();
            for element in &page.elements {
                if !seen.insert(element.id.as_str()) {
                    return Err(ProfileError::DuplicateElement {
                        page: page.id.clone(),
                        element: element.id.clone(),
                    });
                }
            }
            for action in &page.actions {
                if action.kind != ActionKind::Navigate
                    && action.kind != ActionKind::Wait
                    && !seen.contains(action.element.as_str())
                {
                    return Err(ProfileError::UnknownElement {
                        page: page.id.clone(),
                        element: action.element.clone(),
                    });
                }
            }
            if map.contains_key(&page.id) {
                return Err(ProfileError::DuplicatePage(page.id));
            }
            map.insert(page.id.clone(), page);
        }
        Ok(Self { pages: map })
    }

    pub fn page(&self, id: &str) -> Option<&PageNode> {
        self.pages.get(id)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn actions_from(&self, id: &str) -> &[ActionEdge] {
        self.pages
            .get(id)
            .map(|p| p.actions.as_slice())
            .unwrap_or(&[])
    }

    /// Edge targets that no declared page satisfies.
    pub fn dangling_targets(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .pages
            .values()
            .flat_map(|p| p.actions.iter())
            .map(|a| a.target.as_str())
            .filter(|t| !self.pages.contains_key(*t))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Breadth-first search from `start` to `target`.
    ///
    /// Returns the first route discovered, which is shortest in edge
    /// count; ties go to the edge declared first. Visited pages are never
    /// expanded twice, so cycles terminate.
    pub fn find_path(&self, start: &str, target: &str) -> PathOutcome<'_> {
        if start == target {
            return PathOutcome::AlreadyThere;
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<(&str, Vec<&ActionEdge>)> = VecDeque::new();
        queue.push_back((start, Vec::new()));

        while let Some((current, path)) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            for action in self.actions_from(current) {
                let mut next = path.clone();
                next.push(action);
                if action.target == target {
                    return PathOutcome::Route(next);
                }
                queue.push_back((action.target.as_str(), next));
            }
        }

        PathOutcome::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(id: &str) -> ElementSpec {
        ElementSpec {
            id: id.into(),
            kind: ElementKind::Link,
            selector: format!("#{id}"),
            fallbacks: vec![format!(".{id}")],
            description: String::new(),
        }
    }

    fn edge(element: &str, target: &str) -> ActionEdge {
        ActionEdge {
            element: element.into(),
            kind: ActionKind::Click,
            target: target.into(),
            description: String::new(),
            parameters: BTreeMap::new(),
        }
    }

    fn page(id: &str, edges: &[(&str, &str)]) -> PageNode {
        PageNode {
            id: id.into(),
            url: format!("https://shop.test/{id}"),
            description: String::new(),
            elements: edges.iter().map(|(el, _)| link(el)).collect(),
            actions: edges.iter().map(|(el, t)| edge(el, t)).collect(),
        }
    }

    fn graph(pages: Vec<PageNode>) -> SiteGraph {
        SiteGraph::from_pages(pages).unwrap()
    }

    #[test]
    fn same_page_is_already_there() {
        let g = graph(vec![page("home", &[("to_cart", "cart")])]);
        assert_eq!(g.find_path("home", "home"), PathOutcome::AlreadyThere);
        assert!(g.find_path("home", "home").edges().is_empty());
        // even for pages that are not declared
        assert_eq!(g.find_path("ghost", "ghost"), PathOutcome::AlreadyThere);
    }

    #[test]
    fn unreachable_is_not_found() {
        let g = graph(vec![
            page("home", &[("to_cart", "cart")]),
            page("cart", &[]),
            page("orders", &[]),
        ]);
        let outcome = g.find_path("home", "orders");
        assert_eq!(outcome, PathOutcome::NotFound);
        assert!(!outcome.is_found());
        assert!(outcome.edges().is_empty());
    }

    #[test]
    fn shortest_route_wins() {
        let g = graph(vec![
            page("home", &[("to_deals", "deals"), ("to_cart", "cart")]),
            page("deals", &[("deal_cart", "cart")]),
            page("cart", &[("to_checkout", "checkout")]),
        ]);
        let outcome = g.find_path("home", "checkout");
        let elements: Vec<_> = outcome.edges().iter().map(|e| e.element.as_str()).collect();
        assert_eq!(elements, vec!["to_cart", "to_checkout"]);
    }

    #[test]
    fn ties_break_by_declaration_order() {
        let g = graph(vec![
            page("home", &[("via_a", "a"), ("via_b", "b")]),
            page("a", &[("a_cart", "cart")]),
            page("b", &[("b_cart", "cart")]),
        ]);
        let outcome = g.find_path("home", "cart");
        let elements: Vec<_> = outcome.edges().iter().map(|e| e.element.as_str()).collect();
        assert_eq!(elements, vec!["via_a", "a_cart"]);
    }

    #[test]
    fn cycles_terminate() {
        let g = graph(vec![
            page("home", &[("to_a", "a")]),
            page("a", &[("to_home", "home"), ("to_b", "b")]),
            page("b", &[("to_a2", "a")]),
        ]);
        assert_eq!(g.find_path("home", "nowhere"), PathOutcome::NotFound);
    }

    #[test]
    fn lazy_targets_are_reported() {
        let g = graph(vec![page("home", &[("to_cart", "cart")])]);
        assert_eq!(g.dangling_targets(), vec!["cart"]);
        assert_eq!(g.find_path("home", "cart").edges().len(), 1);
    }

    #[test]
    fn duplicate_element_rejected() {
        let mut p = page("home", &[("to_cart", "cart")]);
        p.elements.push(link("to_cart"));
        let err = SiteGraph::from_pages(vec![p]).unwrap_err();
        assert!(matches!(err, ProfileError::DuplicateElement { .. }));
    }

    #[test]
    fn duplicate_page_rejected() {
        let err = SiteGraph::from_pages(vec![page("home", &[]), page("home", &[])]).unwrap_err();
        assert!(matches!(err, ProfileError::DuplicatePage(id) if id == "home"));
    }

    #[test]
    fn undeclared_action_element_rejected() {
        let mut p = page("home", &[]);
        p.actions.push(edge("missing", "cart"));
        let err = SiteGraph::from_pages(vec![p]).unwrap_err();
        assert!(matches!(err, ProfileError::UnknownElement { .. }));
    }

    #[test]
    fn chain_puts_primary_first() {
        assert_eq!(link("nav").chain(), vec!["#nav".to_string(), ".nav".to_string()]);
    }
}
