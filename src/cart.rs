//! Cart snapshot: what extraction hands to the decision engine.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Placeholder name for a row whose title could not be read.
pub const UNKNOWN_ITEM: &str = "Unknown Item";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub name: String,
    /// Unit price; `0.0` when unknown.
    pub price: f64,
    pub quantity: u32,
}

impl CartLineItem {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            price: price.max(0.0),
            quantity: 1,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity.max(1);
        self
    }

    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// Where a snapshot's total came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalSource {
    /// A total/subtotal element on the page (authoritative).
    Page,
    /// A total stated in narrative text (authoritative).
    Narrative,
    /// Sum of line totals, used when no stated total was found.
    ItemSum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    items: Vec<CartLineItem>,
    total: f64,
    total_source: TotalSource,
}

impl CartSnapshot {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0.0,
            total_source: TotalSource::ItemSum,
        }
    }

    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    pub fn item_names(&self) -> Vec<String> {
        self.items.iter().map(|i| i.name.clone()).collect()
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn total_source(&self) -> TotalSource {
        self.total_source
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// No items and nothing to pay.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.total <= 0.0
    }
}

/// Accumulates line items in extraction order.
///
/// Items whose name matches an earlier one case-insensitively are
/// dropped, except the [`UNKNOWN_ITEM`] placeholder, which stands for
/// distinct unnamed rows.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    items: Vec<CartLineItem>,
    seen: HashSet<String>,
    stated_total: Option<(f64, TotalSource)>,
}

impl SnapshotBuilder {
    /// Returns false when the item was suppressed as a duplicate.
    pub fn push(&mut self, item: CartLineItem) -> bool {
        if item.name != UNKNOWN_ITEM && !self.seen.insert(item.name.to_lowercase()) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn item(mut self, item: CartLineItem) -> Self {
        self.push(item);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Record a total read from the page or narrative. Non-positive totals are ignored.
    pub fn stated_total(mut self, total: f64, source: TotalSource) -> Self {
        if total > 0.0 {
            self.stated_total = Some((total, source));
        }
        self
    }

    /// A stated total wins over the item sum, even when they disagree.
    pub fn build(self) -> CartSnapshot {
        let (total, total_source) = self.stated_total.unwrap_or_else(|| {
            (
                self.items.iter().map(CartLineItem::line_total).sum(),
                TotalSource::ItemSum,
            )
        });
        CartSnapshot {
            items: self.items,
            total,
            total_source,
        }
    }
}
