use regex::Regex;
use std::sync::LazyLock;

use super::MAX_ITEMS;
use crate::candidates::first_match;
use crate::cart::{CartLineItem, CartSnapshot, TotalSource};
use crate::price::positive_amount;

const AMOUNT: &str = r"\$\s*(\d[\d,]*(?:\.\d+)?)";

/// Words that suggest the agent got as far as checkout.
const CHECKOUT_KEYWORDS: &[&str] = &[
    "checkout",
    "sign in",
    "login",
    "personal info",
    "stopped",
    "address",
    "payment",
];

/// Phrases an agent uses when the cart has nothing in it.
const EMPTY_CART_PHRASES: &[&str] = &[
    "cart is empty",
    "cart is currently empty",
    "no items in your cart",
    "no items in the cart",
];

fn compile(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("built-in narrative pattern is valid"))
        .collect()
}

static TOTAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        format!(r"(?i)\bcart\s+total\b[^$\n]{{0,30}}{AMOUNT}"),
        format!(r"(?i)\bsubtotal\b[^$\n]{{0,30}}{AMOUNT}"),
        format!(r"(?i)\btotal\b[^$\n]{{0,30}}{AMOUNT}"),
    ])
});

static ANY_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(AMOUNT).expect("built-in amount pattern is valid"));

static ITEM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?im)\b(?:item|product)(?:\s+name)?(?:\s*#?\d+)?\s*[:\-]\s*([^\n\r$]+)".to_string(),
        r"(?m)^\s*(?:\d+[.)]|[-*•])\s+([^\n\r$]+)".to_string(),
        r"\b([A-Z][^:\n\r$]{10,50})".to_string(),
    ])
});

/// What an agent's free-text report says about the cart.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeReport {
    pub snapshot: CartSnapshot,
    /// Heuristic: the report mentions checkout, sign-in or payment.
    pub checkout_reached: bool,
}

/// Recover a cart snapshot from unstructured agent output.
///
/// Labelled totals (`cart total`, `subtotal`, `total`) win over the
/// largest bare dollar amount. Item names come from `item:`/`product:`
/// labels, then list bullets, then capitalised phrases; the first tier
/// that yields anything is used. Item prices are not recovered. A report
/// saying the cart is empty yields an empty snapshot, as on a live page.
pub fn extract_narrative(text: &str) -> NarrativeReport {
    let lower = text.to_lowercase();
    let checkout_reached = CHECKOUT_KEYWORDS.iter().any(|k| lower.contains(k));
    if EMPTY_CART_PHRASES.iter().any(|p| lower.contains(p)) {
        return NarrativeReport {
            snapshot: CartSnapshot::empty(),
            checkout_reached,
        };
    }

    let total = first_match(TOTAL_PATTERNS.iter(), |re| largest_amount(re, text))
        .or_else(|| largest_amount(&ANY_AMOUNT, text));

    let names = first_match(ITEM_PATTERNS.iter(), |re| {
        let names: Vec<String> = re
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| clean_name(m.as_str()))
            .collect();
        (!names.is_empty()).then_some(names)
    })
    .unwrap_or_default();

    let mut builder = CartSnapshot::builder();
    for name in names {
        if builder.len() == MAX_ITEMS {
            break;
        }
        builder.push(CartLineItem::new(name, 0.0));
    }
    if let Some(total) = total {
        builder = builder.stated_total(total, TotalSource::Narrative);
    }

    NarrativeReport {
        snapshot: builder.build(),
        checkout_reached,
    }
}

fn largest_amount(re: &Regex, text: &str) -> Option<f64> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| positive_amount(m.as_str()))
        .reduce(f64::max)
}

fn clean_name(raw: &str) -> Option<String> {
    let name = raw
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | '-' | '–' | '(' | ' '))
        .trim();
    let lower = name.to_lowercase();
    (name.chars().count() > 5 && !lower.contains("total")).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labelled_total_and_checkout_signal() {
        let report = extract_narrative(
            "Opened the cart. Cart Total: $45.00. Clicked checkout and stopped at the sign in page.",
        );
        assert_eq!(report.snapshot.total(), 45.0);
        assert_eq!(report.snapshot.total_source(), TotalSource::Narrative);
        assert!(report.checkout_reached);
    }

    #[test]
    fn subtotal_beats_larger_unlabelled_amount() {
        let report = extract_narrative("Saw a $250.00 TV in deals. Subtotal (2 items): $38.20");
        assert_eq!(report.snapshot.total(), 38.2);
    }

    #[test]
    fn largest_amount_fallback() {
        let report = extract_narrative("Prices seen: $12.00, $1,045.50 and $3.");
        assert_eq!(report.snapshot.total(), 1045.5);
    }

    #[test]
    fn no_amount_means_no_total() {
        let report = extract_narrative("The page would not load.");
        assert_eq!(report.snapshot.total(), 0.0);
        assert!(!report.checkout_reached);
    }

    #[test]
    fn labelled_items_win_over_heuristics() {
        let text = "Item 1: Wireless Mouse\nItem 2: Mechanical Keyboard\n\
                    Product: wireless mouse\nThe Grand Total was $89.98";
        let report = extract_narrative(text);
        assert_eq!(
            report.snapshot.item_names(),
            vec!["Wireless Mouse", "Mechanical Keyboard"]
        );
        assert_eq!(report.snapshot.total(), 89.98);
    }

    #[test]
    fn bullet_items_when_no_labels() {
        let text = "Cart contents:\n- Stainless Water Bottle\n- Yoga Mat Extra Thick\n";
        let report = extract_narrative(text);
        assert_eq!(
            report.snapshot.item_names(),
            vec!["Stainless Water Bottle", "Yoga Mat Extra Thick"]
        );
    }

    #[test]
    fn items_are_capped() {
        let text: String = (0..15).map(|i| format!("Item: Gadget model {i}\n")).collect();
        let report = extract_narrative(&text);
        assert_eq!(report.snapshot.item_count(), MAX_ITEMS);
    }

    #[test]
    fn empty_report_is_empty_snapshot() {
        let report = extract_narrative("your cart is empty");
        assert!(report.snapshot.is_empty());
    }

    #[test]
    fn capitalised_empty_report_is_not_an_item() {
        let report = extract_narrative("Opened the cart page. Your Amazon Cart is empty.");
        assert!(report.snapshot.is_empty());
        assert!(report.snapshot.item_names().is_empty());
        assert!(!report.checkout_reached);

        let verdict = crate::decision::decide(&report.snapshot, 100.0, Some(false));
        assert_eq!(verdict.action, "cart_empty");
        assert_eq!(verdict.status, crate::decision::ThresholdStatus::Unknown);
    }
}
