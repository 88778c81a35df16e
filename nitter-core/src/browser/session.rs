use std::time::Duration;

use async_trait::async_trait;

use super::error::BrowserResult;

/// The slice of browser control the prober and the orchestrator rely on.
///
/// `collect_items` snapshots the containers matching a selector; `item_html`
/// reads one of them by index until the next snapshot or navigation.
#[async_trait(?Send)]
pub trait MirrorSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> BrowserResult<()>;
    async fn count(&mut self, selector: &str) -> BrowserResult<usize>;
    async fn collect_items(&mut self, selector: &str) -> BrowserResult<usize>;
    async fn item_html(&mut self, index: usize) -> BrowserResult<String>;
    async fn viewport_height(&mut self) -> BrowserResult<u32>;
    async fn scroll_by(&mut self, delta_y: u32) -> BrowserResult<()>;
    async fn scroll_to_bottom(&mut self) -> BrowserResult<()>;
    async fn is_visible(&mut self, selector: &str) -> BrowserResult<bool>;
    async fn click_and_wait(&mut self, selector: &str, timeout: Duration) -> BrowserResult<()>;
}
