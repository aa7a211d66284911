use anyhow::{Result, anyhow};
use cart_agent::config::BrowserConfig;
use cart_agent::{ElementHandle, PageContext, PageError, WaitPolicy};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::dom;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Browser session. Owns the Chrome process (or the attachment to one)
/// and the tab every task drives.
pub struct BrowserSession {
    browser: Browser,
    pub tab: Arc<Tab>,
}

impl BrowserSession {
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        if let Some(url) = &config.attach_url {
            info!(url = %url, "attaching to running Chrome");
            match Browser::connect(url.clone()) {
                Ok(browser) => {
                    let tab = browser.new_tab()?;
                    return Ok(Self { browser, tab });
                }
                Err(e) => warn!(error = %e, "could not attach, launching a new browser"),
            }
        }

        let options = LaunchOptions {
            headless: config.headless,
            path: config.chrome_path.clone(),
            user_data_dir: config.user_data_dir.clone(),
            window_size: Some((config.window_width, config.window_height)),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-infobars"),
                OsStr::new("--password-store=basic"),
            ],
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        };

        info!(headless = config.headless, "starting Chrome");
        let browser = Browser::new(options).map_err(|e| anyhow!("Browser launch failed: {e}"))?;
        let tab = browser.new_tab()?;
        tab.navigate_to("about:blank")?;
        debug!("Chrome ready");

        Ok(Self { browser, tab })
    }

    pub fn new_tab(&mut self) -> Result<()> {
        self.tab = self.browser.new_tab()?;
        Ok(())
    }
}

fn backend(e: impl std::fmt::Display) -> PageError {
    PageError::Backend(e.to_string())
}

impl PageContext for BrowserSession {
    fn navigate(&self, url: &str, wait: WaitPolicy, timeout: Duration) -> Result<(), PageError> {
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .map_err(|e| PageError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let waited = match wait {
            WaitPolicy::DomReady => self
                .tab
                .wait_for_element_with_custom_timeout("body", timeout)
                .map(|_| ()),
            WaitPolicy::Load => self.tab.wait_until_navigated().map(|_| ()),
        };
        waited.map_err(|e| PageError::Timeout(format!("{url}: {e}")))
    }

    fn current_url(&self) -> Result<String, PageError> {
        dom::get_current_url(&self.tab).map_err(backend)
    }

    fn locate(&self, selector: &str, timeout: Duration) -> Result<Option<ElementHandle>, PageError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(token) = dom::tag_first(&self.tab, selector).map_err(backend)? {
                return Ok(Some(ElementHandle::new(token)));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn locate_all(&self, selector: &str) -> Result<Vec<ElementHandle>, PageError> {
        Ok(dom::tag_all(&self.tab, selector)
            .map_err(backend)?
            .into_iter()
            .map(ElementHandle::new)
            .collect())
    }

    fn locate_within(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, PageError> {
        Ok(dom::tag_within(&self.tab, scope.token(), selector)
            .map_err(backend)?
            .map(ElementHandle::new))
    }

    fn read_text(&self, handle: &ElementHandle) -> Result<String, PageError> {
        dom::inner_text(&self.tab, handle.token()).map_err(backend)
    }

    fn read_full_content(&self) -> Result<String, PageError> {
        self.tab.get_content().map_err(backend)
    }

    fn click(&self, handle: &ElementHandle) -> Result<(), PageError> {
        let element = self
            .tab
            .find_element(&dom::handle_selector(handle.token()))
            .map_err(backend)?;
        element.click().map_err(backend)?;
        Ok(())
    }

    fn type_text(&self, handle: &ElementHandle, text: &str) -> Result<(), PageError> {
        let element = self
            .tab
            .find_element(&dom::handle_selector(handle.token()))
            .map_err(backend)?;
        element.click().map_err(backend)?;
        dom::clear_value(&self.tab, handle.token()).map_err(backend)?;
        self.tab.type_str(text).map_err(backend)?;
        Ok(())
    }

    fn close(&self) -> Result<(), PageError> {
        self.tab.close(true).map_err(backend)?;
        Ok(())
    }
}
