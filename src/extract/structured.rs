use std::time::Duration;
use tracing::{debug, info, warn};

use super::MAX_ITEMS;
use crate::cart::{CartLineItem, CartSnapshot, TotalSource, UNKNOWN_ITEM};
use crate::error::AgentError;
use crate::page::PageContext;
use crate::price::positive_amount;
use crate::profile::CartSelectors;
use crate::resolver::SelectorResolver;

/// Reads a cart page through ranked selector chains.
#[derive(Debug, Clone)]
pub struct CartExtractor {
    selectors: CartSelectors,
    resolver: SelectorResolver,
    probe: SelectorResolver,
}

impl CartExtractor {
    /// `selector_timeout` bounds each total lookup; `probe_timeout` bounds
    /// each empty-cart indicator lookup.
    pub fn new(selectors: CartSelectors, selector_timeout: Duration, probe_timeout: Duration) -> Self {
        Self {
            selectors,
            resolver: SelectorResolver::new(selector_timeout),
            probe: SelectorResolver::new(probe_timeout),
        }
    }

    /// Snapshot the cart currently shown on `page`.
    ///
    /// Fails only when the page backend itself errors or when neither
    /// item rows nor a total can be located on a page that does not
    /// look empty.
    pub fn extract(&self, page: &dyn PageContext) -> Result<CartSnapshot, AgentError> {
        if self.looks_empty(page)? {
            info!("cart is empty");
            return Ok(CartSnapshot::empty());
        }

        let mut builder = CartSnapshot::builder();
        let rows_found = match self.resolver.resolve_all(page, &self.selectors.item_rows) {
            Some((selector, rows)) => {
                debug!(selector = %selector, rows = rows.len(), "found cart rows");
                for row in rows.iter().take(MAX_ITEMS) {
                    if let Some(item) = self.read_row(page, row) {
                        builder.push(item);
                    }
                }
                true
            }
            None => {
                warn!(tried = self.selectors.item_rows.len(), "no cart row selector matched");
                false
            }
        };

        let stated = self
            .resolver
            .read_first(page, None, &self.selectors.total, positive_amount);

        if !rows_found && stated.is_none() {
            return Err(AgentError::SelectorExhausted {
                element: "cart_items".into(),
                tried: self.selectors.item_rows.len() + self.selectors.total.len(),
            });
        }

        let snapshot = match stated {
            Some(total) => builder.stated_total(total, TotalSource::Page).build(),
            None => builder.build(),
        };
        info!(
            items = snapshot.item_count(),
            total = snapshot.total(),
            source = ?snapshot.total_source(),
            "extracted cart"
        );
        Ok(snapshot)
    }

    fn looks_empty(&self, page: &dyn PageContext) -> Result<bool, AgentError> {
        let content = page.read_full_content()?.to_lowercase();
        if let Some(phrase) = self
            .selectors
            .empty_text
            .iter()
            .find(|p| content.contains(&p.to_lowercase()))
        {
            debug!(phrase = %phrase, "empty-cart text present");
            return Ok(true);
        }
        Ok(self
            .probe
            .resolve(page, &self.selectors.empty_selectors)
            .is_found())
    }

    /// A row needs a readable name or a positive price to count.
    fn read_row(
        &self,
        page: &dyn PageContext,
        row: &crate::page::ElementHandle,
    ) -> Option<CartLineItem> {
        let name = self
            .resolver
            .read_first(page, Some(row), &self.selectors.item_name, |text| {
                let name = text.split_whitespace().collect::<Vec<_>>().join(" ");
                (name.chars().count() > 3).then_some(name)
            });
        let price = self
            .resolver
            .read_first(page, Some(row), &self.selectors.item_price, positive_amount);

        match (name, price) {
            // Nothing readable: a placeholder at 0.0 would only add noise
            // to the item list and cannot change the total.
            (None, None) => {
                debug!(row = row.token(), "skipping row without name or price");
                None
            }
            (name, price) => Some(CartLineItem::new(
                name.unwrap_or_else(|| UNKNOWN_ITEM.to_string()),
                price.unwrap_or(0.0),
            )),
        }
    }
}
