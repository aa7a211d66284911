use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::ExecutionStrategy;
use crate::config::{Configuration, Timeouts};
use crate::decision::decide;
use crate::error::AgentError;
use crate::extract::CartExtractor;
use crate::graph::{ActionEdge, ActionKind, PathOutcome};
use crate::operator::{OperatorGate, SignInDecision};
use crate::page::{ElementHandle, PageContext, WaitPolicy};
use crate::profile::SiteProfile;
use crate::resolver::{Resolution, SelectorResolver};
use crate::task::{TaskRequest, TaskResult};

const NAME: &str = "scripted";

/// Drives the page along the site graph, then reads the cart directly.
///
/// The page context is blocking, so each task runs on tokio's blocking
/// pool and owns the page for its whole duration.
#[derive(Clone)]
pub struct ScriptedStrategy {
    page: Arc<dyn PageContext>,
    profile: Arc<SiteProfile>,
    gate: Arc<dyn OperatorGate>,
    timeouts: Timeouts,
    default_threshold: f64,
    proceed_to_checkout: bool,
}

impl ScriptedStrategy {
    pub fn new(
        config: &Configuration,
        profile: Arc<SiteProfile>,
        page: Arc<dyn PageContext>,
        gate: Arc<dyn OperatorGate>,
    ) -> Self {
        Self {
            page,
            profile,
            gate,
            timeouts: config.timeouts.clone(),
            default_threshold: config.threshold,
            proceed_to_checkout: config.scripted.proceed_to_checkout,
        }
    }

    /// Blocking body of one task.
    pub fn run(&self, threshold: f64) -> Result<TaskResult, AgentError> {
        let profile = &self.profile;

        self.open_start_page()?;
        self.travel(&profile.start_page, &profile.cart_page)?;
        self.page.settle(self.timeouts.settle());
        self.pass_sign_in()?;

        let extractor = CartExtractor::new(
            profile.cart.clone(),
            self.timeouts.selector(),
            self.timeouts.probe(),
        );
        let snapshot = extractor.extract(self.page.as_ref())?;
        let verdict = decide(&snapshot, threshold, None);
        info!(action = %verdict.action, total = verdict.total, threshold, "cart evaluated");

        let mut result = TaskResult::from_verdict(NAME, snapshot, &verdict);
        if self.proceed_to_checkout && verdict.should_checkout {
            let reached = match self.travel(&profile.cart_page, &profile.checkout_page) {
                Ok(()) => {
                    info!("reached checkout, stopping before personal information");
                    true
                }
                Err(e) => {
                    warn!(error = %e, "could not reach checkout");
                    result.message.push_str(&format!(" Checkout attempt failed: {e}"));
                    false
                }
            };
            result = result.with_data("checkout_reached", reached);
        }
        Ok(result)
    }

    fn open_start_page(&self) -> Result<(), AgentError> {
        let start = &self.profile.start_page;
        let url = self.url_of(start)?;
        info!(url = %url, "opening start page");
        match self.goto(&url) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "start page unreachable, going straight to the cart");
                self.direct(&self.profile.cart_page)
            }
        }
    }

    /// Follow the shortest route between two pages, falling back to the
    /// target's URL when a step cannot be performed.
    fn travel(&self, from: &str, to: &str) -> Result<(), AgentError> {
        let edges = match self.profile.graph().find_path(from, to) {
            PathOutcome::AlreadyThere => return Ok(()),
            PathOutcome::NotFound => {
                warn!(from, to, "no route in site graph");
                return self.direct(to);
            }
            PathOutcome::Route(edges) => edges,
        };

        let mut current = from.to_string();
        for edge in edges {
            if let Err(e) = self.follow(&current, edge) {
                warn!(page = %current, element = %edge.element, error = %e, "step failed, using direct URL");
                return self.direct(to);
            }
            current = edge.target.clone();
        }
        Ok(())
    }

    fn follow(&self, page_id: &str, edge: &ActionEdge) -> Result<(), AgentError> {
        debug!(page = page_id, element = %edge.element, kind = ?edge.kind, "following edge");
        match edge.kind {
            ActionKind::Click | ActionKind::Submit => {
                let handle = self.resolve(page_id, &edge.element)?;
                self.page.click(&handle)?;
                self.page.settle(self.timeouts.settle());
            }
            ActionKind::Type => {
                let handle = self.resolve(page_id, &edge.element)?;
                let text = edge.parameters.get("text").map(String::as_str).unwrap_or("");
                self.page.type_text(&handle, text)?;
            }
            ActionKind::Navigate => {
                let url = match edge.parameters.get("url") {
                    Some(url) => url.clone(),
                    None => self.url_of(&edge.target)?,
                };
                self.goto(&url)?;
            }
            ActionKind::Wait => {
                let delay = edge
                    .parameters
                    .get("ms")
                    .and_then(|ms| ms.parse().ok())
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| self.timeouts.settle());
                self.page.settle(delay);
            }
        }
        Ok(())
    }

    fn resolve(&self, page_id: &str, element_id: &str) -> Result<ElementHandle, AgentError> {
        let chain = self
            .profile
            .graph()
            .page(page_id)
            .and_then(|p| p.element(element_id))
            .map(|e| e.chain())
            .unwrap_or_default();

        let resolver = SelectorResolver::new(self.timeouts.selector());
        match resolver.resolve(self.page.as_ref(), &chain) {
            Resolution::Found { handle, selector, rank } => {
                debug!(element = element_id, selector = %selector, rank, "element resolved");
                Ok(handle)
            }
            Resolution::NotFound { tried } => {
                warn!(element = element_id, tried, "all selectors failed");
                Err(AgentError::SelectorExhausted {
                    element: element_id.to_string(),
                    tried,
                })
            }
        }
    }

    fn direct(&self, page_id: &str) -> Result<(), AgentError> {
        let url = self.url_of(page_id)?;
        info!(url = %url, "navigating directly");
        self.goto(&url)?;
        self.page.settle(self.timeouts.settle());
        Ok(())
    }

    fn goto(&self, url: &str) -> Result<(), AgentError> {
        self.page
            .navigate(url, WaitPolicy::DomReady, self.timeouts.navigation())?;
        Ok(())
    }

    fn url_of(&self, page_id: &str) -> Result<String, AgentError> {
        self.profile
            .url_of(page_id)
            .map(str::to_string)
            .ok_or_else(|| AgentError::Navigation(format!("page '{page_id}' has no known URL")))
    }

    fn pass_sign_in(&self) -> Result<(), AgentError> {
        let url = self.page.current_url()?;
        if !self.profile.is_sign_in(&url) {
            return Ok(());
        }
        info!(url = %url, "sign-in required, waiting for operator");
        match self.gate.await_sign_in(&url) {
            SignInDecision::Continue => {
                info!("operator confirmed sign-in, continuing");
                self.page.settle(self.timeouts.settle());
                Ok(())
            }
            SignInDecision::Cancel => Err(AgentError::Cancelled(format!(
                "sign-in required at {url}"
            ))),
        }
    }
}

#[async_trait]
impl ExecutionStrategy for ScriptedStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn start(&mut self) -> Result<(), AgentError> {
        info!(
            profile = %self.profile.name,
            pages = self.profile.graph().len(),
            "scripted strategy ready"
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        let page = self.page.clone();
        tokio::task::spawn_blocking(move || page.close())
            .await
            .map_err(|e| AgentError::Backend(e.to_string()))??;
        Ok(())
    }

    async fn execute_task(&mut self, request: &TaskRequest) -> TaskResult {
        let threshold = request.resolve_threshold(self.default_threshold);
        info!(threshold, "starting scripted cart check");

        let this = self.clone();
        let outcome = tokio::task::spawn_blocking(move || this.run(threshold))
            .await
            .map_err(|e| AgentError::Backend(format!("task panicked: {e}")))
            .and_then(|r| r);

        match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "scripted task failed");
                TaskResult::from_error(NAME, &e, threshold)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::FixedGate;
    use crate::page::fake::{FakeNode, FakePage, FakeScreen};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOME: &str = "https://www.amazon.com";
    const CART: &str = "https://www.amazon.com/gp/cart/view.html";
    const CHECKOUT: &str = "https://www.amazon.com/gp/buy/spc/handlers/display.html";
    const SIGN_IN: &str = "https://www.amazon.com/ap/signin?return=cart";

    struct CountingGate {
        calls: AtomicUsize,
        decision: SignInDecision,
    }

    impl OperatorGate for CountingGate {
        fn await_sign_in(&self, _url: &str) -> SignInDecision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.decision
        }
    }

    fn config(proceed: bool) -> Configuration {
        let mut config = Configuration::default();
        config.timeouts.selector_ms = 5;
        config.timeouts.probe_ms = 5;
        config.timeouts.settle_ms = 0;
        config.scripted.proceed_to_checkout = proceed;
        config
    }

    fn row(name: &str, price: &str) -> FakeNode {
        FakeNode::new(".sc-list-item", "")
            .child(".sc-product-title", name)
            .child(".a-price-whole", price)
    }

    fn cart_screen() -> FakeScreen {
        FakeScreen::new()
            .node(row("Desk Lamp", "$10.00"))
            .node(row("USB-C Cable", "$20.00"))
            .node(FakeNode::new("input[name='proceedToRetailCheckout']", "").clicks_to(CHECKOUT))
    }

    fn home_screen() -> FakeScreen {
        FakeScreen::new().node(FakeNode::new("#nav-cart", "Cart").clicks_to(CART))
    }

    fn strategy(page: Arc<FakePage>, gate: Arc<dyn OperatorGate>, proceed: bool) -> ScriptedStrategy {
        let profile = Arc::new(SiteProfile::builtin().unwrap());
        ScriptedStrategy::new(&config(proceed), profile, page, gate)
    }

    fn continue_gate() -> Arc<dyn OperatorGate> {
        Arc::new(FixedGate(SignInDecision::Continue))
    }

    #[tokio::test]
    async fn clicks_through_to_cart_and_decides() {
        let page = Arc::new(FakePage::new().screen(HOME, home_screen()).screen(CART, cart_screen()));
        let mut strategy = strategy(page.clone(), continue_gate(), false);

        let result = strategy.execute_task(&TaskRequest::with_threshold(100.0)).await;

        assert!(result.success, "{}", result.message);
        assert_eq!(result.action_taken(), Some("eligible_for_checkout"));
        assert_eq!(result.get("total"), Some(&json!(30.0)));
        assert_eq!(result.get("items_count"), Some(&json!(2)));
        assert_eq!(result.get("checkout_reached"), None);
        assert_eq!(page.navigations(), vec![HOME.to_string()]);
        assert_eq!(page.clicks().len(), 1);
    }

    #[tokio::test]
    async fn missing_cart_link_falls_back_to_direct_url() {
        let page = Arc::new(
            FakePage::new()
                .screen(HOME, FakeScreen::new())
                .screen(CART, cart_screen()),
        );
        let mut strategy = strategy(page.clone(), continue_gate(), false);

        let result = strategy.execute_task(&TaskRequest::with_threshold(25.0)).await;

        assert!(result.success);
        assert_eq!(result.action_taken(), Some("exceeds_threshold"));
        assert_eq!(page.navigations(), vec![HOME.to_string(), CART.to_string()]);
        assert!(page.clicks().is_empty());
    }

    #[tokio::test]
    async fn unreachable_site_is_navigation_failure() {
        let page = Arc::new(FakePage::new().unreachable(HOME).unreachable(CART));
        let mut strategy = strategy(page, continue_gate(), false);

        let result = strategy.execute_task(&TaskRequest::with_threshold(100.0)).await;

        assert!(!result.success);
        assert_eq!(result.get("error_kind"), Some(&json!("navigation_failure")));
        assert_eq!(result.get("threshold"), Some(&json!(100.0)));
    }

    #[tokio::test]
    async fn sign_in_cancel_stops_task() {
        let page = Arc::new(
            FakePage::new()
                .screen(HOME, home_screen())
                .redirect(CART, SIGN_IN),
        );
        let gate = Arc::new(CountingGate {
            calls: AtomicUsize::new(0),
            decision: SignInDecision::Cancel,
        });
        let mut strategy = strategy(page, gate.clone(), false);

        let result = strategy.execute_task(&TaskRequest::default()).await;

        assert!(!result.success);
        assert_eq!(result.action_taken(), Some("cancelled"));
        assert_eq!(gate.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sign_in_continue_resumes_extraction() {
        let page = Arc::new(
            FakePage::new()
                .screen(HOME, home_screen())
                .redirect(CART, SIGN_IN)
                .screen(SIGN_IN, cart_screen()),
        );
        let gate = Arc::new(CountingGate {
            calls: AtomicUsize::new(0),
            decision: SignInDecision::Continue,
        });
        let mut strategy = strategy(page, gate.clone(), false);

        let result = strategy.execute_task(&TaskRequest::with_goal("keep it under $50")).await;

        assert!(result.success, "{}", result.message);
        assert_eq!(gate.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.get("threshold"), Some(&json!(50.0)));
        assert_eq!(result.action_taken(), Some("eligible_for_checkout"));
    }

    #[tokio::test]
    async fn proceeds_to_checkout_when_below() {
        let page = Arc::new(
            FakePage::new()
                .screen(HOME, home_screen())
                .screen(CART, cart_screen())
                .screen(CHECKOUT, FakeScreen::new()),
        );
        let mut strategy = strategy(page.clone(), continue_gate(), true);

        let result = strategy.execute_task(&TaskRequest::with_threshold(100.0)).await;

        assert!(result.success);
        assert_eq!(result.get("checkout_reached"), Some(&json!(true)));
        assert_eq!(page.clicks().len(), 2);
        assert_eq!(page.current_url().unwrap(), CHECKOUT);
    }

    #[tokio::test]
    async fn never_checks_out_at_or_above_threshold() {
        let page = Arc::new(FakePage::new().screen(HOME, home_screen()).screen(CART, cart_screen()));
        let mut strategy = strategy(page.clone(), continue_gate(), true);

        let result = strategy.execute_task(&TaskRequest::with_threshold(30.0)).await;

        assert_eq!(result.action_taken(), Some("exceeds_threshold"));
        assert_eq!(result.get("should_checkout"), Some(&json!(false)));
        assert_eq!(result.get("checkout_reached"), None);
        assert_eq!(page.clicks().len(), 1);
    }

    #[tokio::test]
    async fn backend_crash_is_reported() {
        let page = Arc::new(FakePage::new().broken());
        let mut strategy = strategy(page, continue_gate(), false);

        let result = strategy.execute_task(&TaskRequest::default()).await;

        assert!(!result.success);
        assert_eq!(result.get("error_kind"), Some(&json!("backend_failure")));
    }

    const SHOP_HOME: &str = "https://shop.test/";
    const SHOP_CART: &str = "https://shop.test/cart";
    const SHOP_CHECKOUT: &str = "https://shop.test/checkout";
    const SHOP_CHECKOUT_STEP: &str = "https://shop.test/checkout?step=1";

    /// Home types a query, waits for results, then navigates to the cart.
    /// The cart leaves for checkout through an explicit URL.
    const SHOP_PROFILE: &str = r##"{
        "name": "shop",
        "start_page": "home",
        "cart_page": "cart",
        "checkout_page": "checkout",
        "pages": [
            { "id": "home", "url": "https://shop.test/",
              "elements": [{ "id": "search_box", "kind": "textbox", "selector": "input[name='q']",
                             "fallbacks": ["#search"] }],
              "actions": [
                  { "element": "search_box", "kind": "type", "target": "results",
                    "parameters": { "text": "usb cable" } },
                  { "element": "", "kind": "navigate", "target": "promo" }
              ] },
            { "id": "results", "url": "https://shop.test/",
              "actions": [{ "element": "", "kind": "wait", "target": "loaded",
                            "parameters": { "ms": "250" } }] },
            { "id": "loaded", "url": "https://shop.test/",
              "actions": [{ "element": "", "kind": "navigate", "target": "cart" }] },
            { "id": "cart", "url": "https://shop.test/cart",
              "actions": [{ "element": "", "kind": "navigate", "target": "checkout",
                            "parameters": { "url": "https://shop.test/checkout?step=1" } }] },
            { "id": "checkout", "url": "https://shop.test/checkout" }
        ],
        "cart": {
            "item_rows": [".line"],
            "item_name": [".title"],
            "item_price": [".price"],
            "total": [".grand-total"]
        }
    }"##;

    fn shop_strategy(page: Arc<FakePage>) -> ScriptedStrategy {
        let profile = Arc::new(SiteProfile::from_json(SHOP_PROFILE).unwrap());
        ScriptedStrategy::new(&config(false), profile, page, continue_gate())
    }

    fn shop_home() -> FakeScreen {
        FakeScreen::new().node(FakeNode::new("input[name='q']", ""))
    }

    fn shop_cart() -> FakeScreen {
        FakeScreen::new()
            .node(
                FakeNode::new(".line", "")
                    .child(".title", "Braided USB cable")
                    .child(".price", "$12.50"),
            )
            .node(FakeNode::new(".grand-total", "$12.50"))
    }

    #[tokio::test]
    async fn types_waits_and_navigates_to_cart() {
        let page = Arc::new(
            FakePage::new()
                .screen(SHOP_HOME, shop_home())
                .screen(SHOP_CART, shop_cart())
                .at(SHOP_HOME),
        );
        let strategy = shop_strategy(page.clone());

        let travelled = tokio::task::spawn_blocking(move || strategy.travel("home", "cart"))
            .await
            .unwrap();

        assert!(travelled.is_ok(), "{travelled:?}");
        assert_eq!(page.typed(), vec![format!("{SHOP_HOME}#0=usb cable")]);
        assert_eq!(page.settles(), vec![Duration::from_millis(250)]);
        assert_eq!(page.navigations(), vec![SHOP_CART.to_string()]);
        assert_eq!(page.current_url().unwrap(), SHOP_CART);
    }

    #[tokio::test]
    async fn navigate_edge_prefers_explicit_url() {
        let page = Arc::new(
            FakePage::new()
                .screen(SHOP_CART, shop_cart())
                .screen(SHOP_CHECKOUT_STEP, FakeScreen::new())
                .at(SHOP_CART),
        );
        let strategy = shop_strategy(page.clone());

        let travelled = tokio::task::spawn_blocking(move || strategy.travel("cart", "checkout"))
            .await
            .unwrap();

        assert!(travelled.is_ok(), "{travelled:?}");
        assert_eq!(page.navigations(), vec![SHOP_CHECKOUT_STEP.to_string()]);
        assert_eq!(page.current_url().unwrap(), SHOP_CHECKOUT_STEP);
    }

    #[tokio::test]
    async fn failed_explicit_url_falls_back_to_target_page_url() {
        let page = Arc::new(
            FakePage::new()
                .screen(SHOP_CART, shop_cart())
                .screen(SHOP_CHECKOUT, FakeScreen::new())
                .unreachable(SHOP_CHECKOUT_STEP)
                .at(SHOP_CART),
        );
        let strategy = shop_strategy(page.clone());

        let travelled = tokio::task::spawn_blocking(move || strategy.travel("cart", "checkout"))
            .await
            .unwrap();

        assert!(travelled.is_ok(), "{travelled:?}");
        assert_eq!(
            page.navigations(),
            vec![SHOP_CHECKOUT_STEP.to_string(), SHOP_CHECKOUT.to_string()]
        );
        assert_eq!(page.current_url().unwrap(), SHOP_CHECKOUT);
    }

    #[tokio::test]
    async fn undeclared_navigate_target_has_no_url() {
        let page = Arc::new(FakePage::new().screen(SHOP_HOME, shop_home()).at(SHOP_HOME));
        let strategy = shop_strategy(page.clone());

        let travelled = tokio::task::spawn_blocking(move || strategy.travel("home", "promo"))
            .await
            .unwrap();

        assert!(
            matches!(travelled, Err(AgentError::Navigation(ref m)) if m.contains("promo")),
            "{travelled:?}"
        );
        assert!(page.navigations().is_empty());
        assert_eq!(page.current_url().unwrap(), SHOP_HOME);
    }

    #[tokio::test]
    async fn full_run_over_custom_profile() {
        let page = Arc::new(
            FakePage::new()
                .screen(SHOP_HOME, shop_home())
                .screen(SHOP_CART, shop_cart()),
        );
        let mut strategy = shop_strategy(page.clone());

        let result = strategy.execute_task(&TaskRequest::with_threshold(20.0)).await;

        assert!(result.success, "{}", result.message);
        assert_eq!(result.action_taken(), Some("eligible_for_checkout"));
        assert_eq!(result.get("total"), Some(&json!(12.5)));
        assert_eq!(page.navigations(), vec![SHOP_HOME.to_string(), SHOP_CART.to_string()]);
        assert_eq!(page.typed().len(), 1);
        assert!(page.settles().contains(&Duration::from_millis(250)));
    }

    #[tokio::test]
    async fn lifecycle() {
        let page = Arc::new(FakePage::new());
        let mut strategy = strategy(page, continue_gate(), false);
        assert_eq!(strategy.name(), "scripted");
        assert!(strategy.start().await.is_ok());
        assert!(strategy.close().await.is_ok());
    }
}
