//! The page-context capability the navigator and extractor drive.

use std::time::Duration;

use crate::error::PageError;

/// Opaque token for an element located by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

/// How long `navigate` waits before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Return once the document body exists.
    #[default]
    DomReady,
    /// Return once the load event has fired.
    Load,
}

/// A live browser page, exclusively owned by one task at a time.
///
/// Every wait is bounded by the timeout passed in; a timeout surfaces as
/// `Ok(None)` from `locate` or an `Err` from `navigate`, never a hang.
pub trait PageContext: Send + Sync {
    fn navigate(&self, url: &str, wait: WaitPolicy, timeout: Duration) -> Result<(), PageError>;

    fn current_url(&self) -> Result<String, PageError>;

    /// Wait up to `timeout` for a visible element matching `selector`.
    fn locate(&self, selector: &str, timeout: Duration) -> Result<Option<ElementHandle>, PageError>;

    /// All visible elements matching `selector`, in document order. No waiting.
    fn locate_all(&self, selector: &str) -> Result<Vec<ElementHandle>, PageError>;

    /// First element matching `selector` inside `scope`. No waiting.
    fn locate_within(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, PageError>;

    fn read_text(&self, handle: &ElementHandle) -> Result<String, PageError>;

    /// Full serialized page content.
    fn read_full_content(&self) -> Result<String, PageError>;

    fn click(&self, handle: &ElementHandle) -> Result<(), PageError>;

    fn type_text(&self, handle: &ElementHandle, text: &str) -> Result<(), PageError>;

    /// Let dynamic content stabilise.
    fn settle(&self, delay: Duration) {
        std::thread::sleep(delay);
    }

    fn close(&self) -> Result<(), PageError> {
        Ok(())
    }
}
