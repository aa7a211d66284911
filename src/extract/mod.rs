//! Cart extraction from a live page or from an agent's free-text report.
//!
//! Both paths produce the same [`CartSnapshot`](crate::cart::CartSnapshot),
//! so the decision engine never needs to know which one ran.

mod narrative;
mod structured;

pub use narrative::{NarrativeReport, extract_narrative};
pub use structured::CartExtractor;

/// Upper bound on line items taken from one extraction.
pub const MAX_ITEMS: usize = 10;
