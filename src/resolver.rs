//! Fallback selector resolution.
//!
//! A logical element (cart link, checkout button, item row, price,
//! total) is described by an ordered chain of selectors. Candidates are
//! tried strictly in order; a miss or backend hiccup on one candidate is
//! logged and the next one is tried. Exhausting the chain is an
//! outcome, not an error: callers decide whether it is fatal.

use std::time::Duration;
use tracing::debug;

use crate::candidates::first_match;
use crate::page::{ElementHandle, PageContext};

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found {
        handle: ElementHandle,
        selector: String,
        rank: usize,
    },
    NotFound {
        tried: usize,
    },
}

impl Resolution {
    pub fn handle(&self) -> Option<&ElementHandle> {
        match self {
            Resolution::Found { handle, .. } => Some(handle),
            Resolution::NotFound { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SelectorResolver {
    per_candidate: Duration,
}

impl SelectorResolver {
    pub fn new(per_candidate: Duration) -> Self {
        Self { per_candidate }
    }

    pub fn per_candidate(&self) -> Duration {
        self.per_candidate
    }

    /// First candidate that becomes visible within the per-candidate timeout.
    pub fn resolve(&self, page: &dyn PageContext, chain: &[String]) -> Resolution {
        let found = first_match(chain.iter().enumerate(), |(rank, selector)| {
            match page.locate(selector, self.per_candidate) {
                Ok(Some(handle)) => Some((rank, selector.clone(), handle)),
                Ok(None) => {
                    debug!(selector = %selector, rank, "selector not visible");
                    None
                }
                Err(e) => {
                    debug!(selector = %selector, rank, error = %e, "selector lookup failed");
                    None
                }
            }
        });

        match found {
            Some((rank, selector, handle)) => {
                debug!(selector = %selector, rank, "resolved element");
                Resolution::Found {
                    handle,
                    selector,
                    rank,
                }
            }
            None => Resolution::NotFound { tried: chain.len() },
        }
    }

    /// First candidate matching at least one element; returns all its matches.
    pub fn resolve_all(
        &self,
        page: &dyn PageContext,
        chain: &[String],
    ) -> Option<(String, Vec<ElementHandle>)> {
        first_match(chain, |selector| match page.locate_all(selector) {
            Ok(handles) if !handles.is_empty() => {
                debug!(selector = %selector, count = handles.len(), "resolved element list");
                Some((selector.clone(), handles))
            }
            Ok(_) => None,
            Err(e) => {
                debug!(selector = %selector, error = %e, "list lookup failed");
                None
            }
        })
    }

    /// First candidate whose text `accept` turns into a value.
    ///
    /// With a `scope`, candidates are looked up inside that element without
    /// waiting; otherwise each gets the per-candidate timeout.
    pub fn read_first<T>(
        &self,
        page: &dyn PageContext,
        scope: Option<&ElementHandle>,
        chain: &[String],
        mut accept: impl FnMut(&str) -> Option<T>,
    ) -> Option<T> {
        first_match(chain, |selector| {
            let located = match scope {
                Some(scope) => page.locate_within(scope, selector),
                None => page.locate(selector, self.per_candidate),
            };
            let handle = match located {
                Ok(Some(handle)) => handle,
                Ok(None) => return None,
                Err(e) => {
                    debug!(selector = %selector, error = %e, "lookup failed");
                    return None;
                }
            };
            match page.read_text(&handle) {
                Ok(text) => accept(text.trim()),
                Err(e) => {
                    debug!(selector = %selector, error = %e, "text read failed");
                    None
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::fake::{FakeNode, FakePage, FakeScreen};

    const URL: &str = "https://shop.test/cart";

    fn chain(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn resolver() -> SelectorResolver {
        SelectorResolver::new(Duration::from_millis(10))
    }

    #[test]
    fn skips_absent_and_hidden_candidates() {
        let page = FakePage::new()
            .screen(
                URL,
                FakeScreen::new()
                    .node(FakeNode::new("#nav-cart", "Cart").hidden())
                    .node(FakeNode::new(".nav-cart-icon", "Cart (2)")),
            )
            .at(URL);

        let res = resolver().resolve(&page, &chain(&["#missing", "#nav-cart", ".nav-cart-icon"]));
        match res {
            Resolution::Found { selector, rank, .. } => {
                assert_eq!(selector, ".nav-cart-icon");
                assert_eq!(rank, 2);
            }
            other => panic!("expected a match, got {other:?}"),
        }
        assert_eq!(page.lookups(), chain(&["#missing", "#nav-cart", ".nav-cart-icon"]));
    }

    #[test]
    fn stops_at_first_visible() {
        let page = FakePage::new()
            .screen(
                URL,
                FakeScreen::new()
                    .node(FakeNode::new("#a", "first"))
                    .node(FakeNode::new("#b", "second")),
            )
            .at(URL);

        let res = resolver().resolve(&page, &chain(&["#a", "#b"]));
        assert!(res.is_found());
        assert_eq!(page.lookups(), chain(&["#a"]));
    }

    #[test]
    fn exhausted_chain_is_not_found() {
        let page = FakePage::new().screen(URL, FakeScreen::new()).at(URL);
        let res = resolver().resolve(&page, &chain(&["#a", "#b", "#c"]));
        assert_eq!(res, Resolution::NotFound { tried: 3 });
        assert!(res.handle().is_none());
    }

    #[test]
    fn backend_errors_do_not_escape() {
        let page = FakePage::new().broken();
        let res = resolver().resolve(&page, &chain(&["#a"]));
        assert_eq!(res, Resolution::NotFound { tried: 1 });
        assert!(resolver().resolve_all(&page, &chain(&["#a"])).is_none());
    }

    #[test]
    fn resolve_all_takes_first_non_empty_selector() {
        let page = FakePage::new()
            .screen(
                URL,
                FakeScreen::new()
                    .node(FakeNode::new(".row", "one"))
                    .node(FakeNode::new(".row", "two"))
                    .node(FakeNode::new(".item", "three")),
            )
            .at(URL);

        let (selector, rows) = resolver()
            .resolve_all(&page, &chain(&[".missing", ".row", ".item"]))
            .unwrap();
        assert_eq!(selector, ".row");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn read_first_skips_unacceptable_text() {
        let page = FakePage::new()
            .screen(
                URL,
                FakeScreen::new().node(
                    FakeNode::new(".row", "")
                        .child(".price", "see cart")
                        .child(".a-offscreen", "$19.99"),
                ),
            )
            .at(URL);
        let row = page.locate_all(".row").unwrap().remove(0);

        let price = resolver().read_first(
            &page,
            Some(&row),
            &chain(&[".missing", ".price", ".a-offscreen"]),
            crate::price::positive_amount,
        );
        assert_eq!(price, Some(19.99));
    }
}
