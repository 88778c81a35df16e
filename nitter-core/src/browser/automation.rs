use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetLocaleOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserSection;

use super::error::{BrowserError, BrowserResult};
use super::session::MirrorSession;

const DRIVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct LaunchOverrides {
    pub headless: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    config: Arc<BrowserSection>,
}

impl BrowserLauncher {
    pub fn new(config: BrowserSection) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Launches Chromium, its CDP driver task, an isolated context and a page.
    ///
    /// Anything created before a failing step is released before the error is
    /// returned.
    pub async fn acquire(&self, overrides: LaunchOverrides) -> BrowserResult<BrowserSession> {
        let headless = overrides.headless.unwrap_or(self.config.headless);
        let chromium_config = self.build_chromium_config(headless)?;
        let [width, height] = self.config.viewport;
        info!(
            ua = %self.config.user_agent,
            width,
            height,
            headless,
            "Launching Chromium instance"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let driver = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "Chromium handler reported error");
                }
            }
        });

        let mut session = BrowserSession {
            browser: Some(browser),
            driver: Some(driver),
            context_id: None,
            page: None,
            items: Vec::new(),
            config: Arc::clone(&self.config),
        };
        if let Err(err) = session.open_page().await {
            warn!(error = %err, "Browser session setup failed, releasing partial resources");
            session.release().await;
            return Err(err);
        }
        debug!("Browser session ready");
        Ok(session)
    }

    fn build_chromium_config(&self, headless: bool) -> BrowserResult<ChromiumConfig> {
        let [width, height] = self.config.viewport;
        let mut builder = ChromiumConfig::builder().viewport(ChromiumViewport {
            width,
            height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: width >= height,
            has_touch: false,
        });

        if let Some(path) = &self.config.executable_path {
            builder = builder.chrome_executable(path);
        }
        if !headless {
            builder = builder.with_head();
        }
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(timeout) = self.config.request_timeout_seconds {
            builder = builder.request_timeout(Duration::from_secs(timeout));
        }

        let mut args = vec![
            format!("--user-agent={}", self.config.user_agent),
            format!("--window-size={width},{height}"),
            format!("--lang={}", self.config.locale),
        ];
        args.extend(self.config.args.iter().cloned());
        builder = builder.args(args);

        builder.build().map_err(BrowserError::Configuration)
    }
}

/// One Chromium process, its driver task, one browser context and one page.
///
/// Call [`BrowserSession::release`] when done; dropping without it only aborts
/// the driver task.
#[derive(Debug)]
pub struct BrowserSession {
    browser: Option<Browser>,
    driver: Option<JoinHandle<()>>,
    context_id: Option<BrowserContextId>,
    page: Option<Page>,
    items: Vec<Element>,
    config: Arc<BrowserSection>,
}

impl BrowserSession {
    async fn open_page(&mut self) -> BrowserResult<()> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| BrowserError::Unexpected("browser not running".to_string()))?;

        let created = browser
            .execute(CreateBrowserContextParams::default())
            .await?;
        let context_id = created.result.browser_context_id.clone();
        self.context_id = Some(context_id.clone());

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id)
            .build()
            .map_err(BrowserError::Configuration)?;
        let page = browser.new_page(target).await?;
        self.page = Some(page);

        let page = self.page()?;
        page.enable_stealth_mode_with_agent(&self.config.user_agent)
            .await?;
        let params = SetUserAgentOverrideParams::builder()
            .user_agent(self.config.user_agent.clone())
            .accept_language(self.config.locale.clone())
            .build()
            .map_err(BrowserError::Configuration)?;
        page.set_user_agent(params).await?;
        page.execute(SetLocaleOverrideParams {
            locale: Some(self.config.locale.clone()),
        })
        .await?;
        Ok(())
    }

    /// Tears down page and context, then the browser, then the driver task.
    /// Failures are logged and never returned.
    pub async fn release(mut self) {
        self.items.clear();
        if let Some(page) = self.page.take() {
            if let Err(err) = page.close().await {
                warn!(error = %err, "Failed to close page");
            }
        }
        if let Some(context_id) = self.context_id.take() {
            if let Some(browser) = self.browser.as_ref() {
                if let Err(err) = browser
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await
                {
                    warn!(error = %err, "Failed to dispose browser context");
                }
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(err) = browser.close().await {
                warn!(error = %err, "Failed to close browser gracefully");
            }
            if let Err(err) = browser.wait().await {
                warn!(error = %err, "Failed to reap browser process");
            }
        }
        if let Some(mut driver) = self.driver.take() {
            match tokio::time::timeout(DRIVER_SHUTDOWN_TIMEOUT, &mut driver).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "Browser driver join error"),
                Err(_) => {
                    warn!("Browser driver did not stop, aborting");
                    driver.abort();
                }
            }
        }
        debug!("Browser resources released");
    }

    fn page(&self) -> BrowserResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::Unexpected("browser session has no page".to_string()))
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            warn!("BrowserSession dropped without explicit release");
            driver.abort();
        }
    }
}

#[async_trait(?Send)]
impl MirrorSession for BrowserSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> BrowserResult<()> {
        self.items.clear();
        let page = self.page()?;
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Configuration)?;
        let navigation = async {
            page.goto(params).await?;
            page.wait_for_navigation().await?;
            Ok::<_, BrowserError>(())
        };
        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result.map_err(|err| BrowserError::Navigation {
                url: url.to_string(),
                reason: err.to_string(),
            }),
            Err(_) => Err(BrowserError::Timeout(format!("navigation to {url}"))),
        }
    }

    async fn count(&mut self, selector: &str) -> BrowserResult<usize> {
        Ok(self.page()?.find_elements(selector).await?.len())
    }

    async fn collect_items(&mut self, selector: &str) -> BrowserResult<usize> {
        let elements = self.page()?.find_elements(selector).await?;
        self.items = elements;
        Ok(self.items.len())
    }

    async fn item_html(&mut self, index: usize) -> BrowserResult<String> {
        let element = self.items.get(index).ok_or_else(|| {
            BrowserError::Unexpected(format!("timeline item {index} is not in the snapshot"))
        })?;
        element
            .inner_html()
            .await?
            .ok_or_else(|| BrowserError::Unexpected(format!("timeline item {index} has no markup")))
    }

    async fn viewport_height(&mut self) -> BrowserResult<u32> {
        let height: u32 = self
            .page()?
            .evaluate("window.innerHeight")
            .await?
            .into_value()
            .map_err(|err| {
                BrowserError::Unexpected(format!("failed to read viewport height: {err}"))
            })?;
        if height == 0 {
            Ok(self.config.viewport[1])
        } else {
            Ok(height)
        }
    }

    async fn scroll_by(&mut self, delta_y: u32) -> BrowserResult<()> {
        let script = format!("window.scrollBy({{ top: {delta_y}, left: 0, behavior: 'smooth' }});");
        self.page()?
            .evaluate(script.as_str())
            .await
            .map_err(|err| {
                BrowserError::Unexpected(format!("failed to execute scroll script: {err}"))
            })?;
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> BrowserResult<()> {
        self.page()?
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .map_err(|err| {
                BrowserError::Unexpected(format!("failed to scroll to bottom: {err}"))
            })?;
        Ok(())
    }

    async fn is_visible(&mut self, selector: &str) -> BrowserResult<bool> {
        let literal = serde_json::to_string(selector)
            .map_err(|err| BrowserError::Unexpected(format!("invalid selector: {err}")))?;
        let script = format!(
            r#"(() => {{
    const el = document.querySelector({literal});
    if (!el) return false;
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    return style.display !== 'none' && style.visibility !== 'hidden' && (rect.width > 0 || rect.height > 0);
}})()"#
        );
        self.page()?
            .evaluate(script.as_str())
            .await?
            .into_value()
            .map_err(|err| BrowserError::Unexpected(format!("failed to decode visibility: {err}")))
    }

    async fn click_and_wait(&mut self, selector: &str, timeout: Duration) -> BrowserResult<()> {
        self.items.clear();
        let page = self.page()?;
        let action = async {
            let element = page.find_element(selector).await?;
            element.click().await?;
            page.wait_for_navigation().await?;
            Ok::<_, BrowserError>(())
        };
        match tokio::time::timeout(timeout, action).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::Timeout(format!("navigation after clicking {selector}"))),
        }
    }
}
