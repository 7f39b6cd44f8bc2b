//! Headless Chrome over the DevTools protocol

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, FrameId};
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::layout::Point;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{BrowserDriver, BrowserLauncher, DriverError, DriverResult, SessionConfig};

/// Extra Chrome switches for unattended video capture
pub const CHROME_ARGS: &[&str] = &[
    "--mute-audio",
    "--autoplay-policy=no-user-gesture-required",
    "--hide-scrollbars",
    "--force-device-scale-factor=1",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-infobars",
];

/// Launches one headless Chrome per session
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher;

impl ChromeLauncher {
    pub fn new() -> Self {
        Self
    }

    fn browser_config(config: &SessionConfig) -> DriverResult<BrowserConfig> {
        let viewport = Viewport {
            width: config.viewport_width,
            height: config.viewport_height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: config.viewport_width >= config.viewport_height,
            has_touch: false,
        };
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(config.viewport_width, config.viewport_height)
            .viewport(viewport)
            .request_timeout(config.request_timeout)
            .args(CHROME_ARGS.iter().copied());
        if let Some(bin) = &config.chrome_bin {
            builder = builder.chrome_executable(bin);
        }
        builder.build().map_err(DriverError::Launch)
    }
}

#[async_trait::async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, config: &SessionConfig) -> DriverResult<Box<dyn BrowserDriver>> {
        let (browser, mut handler) = Browser::launch(Self::browser_config(config)?)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        // The handler drives the websocket; it must be polled for the
        // browser to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let mut driver = ChromeDriver::new(browser, None, handler_task);
                if let Err(close_err) = driver.close().await {
                    warn!(error = %close_err, "Failed to close browser after page error");
                }
                return Err(DriverError::Launch(e.to_string()));
            }
        };

        info!(
            width = config.viewport_width,
            height = config.viewport_height,
            "Browser launched"
        );
        Ok(Box::new(ChromeDriver::new(browser, Some(page), handler_task)))
    }
}

/// Interaction context inside a child frame
#[derive(Debug, Clone)]
struct FrameContext {
    context: ExecutionContextId,
    /// Frame's top-left corner in top-level page coordinates
    offset: (f64, f64),
}

/// [`BrowserDriver`] backed by a live Chrome
pub struct ChromeDriver {
    browser: Browser,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
    frame: Option<FrameContext>,
    closed: bool,
}

impl ChromeDriver {
    fn new(browser: Browser, page: Option<Page>, handler_task: JoinHandle<()>) -> Self {
        Self {
            browser,
            page,
            handler_task,
            frame: None,
            closed: false,
        }
    }

    fn page(&self) -> DriverResult<&Page> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        self.page.as_ref().ok_or(DriverError::Closed)
    }

    /// Child frames in document order, main frame excluded
    async fn child_frames(&self) -> DriverResult<Vec<(FrameId, String)>> {
        let page = self.page()?;
        let main = page.mainframe().await?;
        let mut frames = Vec::new();
        for id in page.frames().await? {
            if Some(&id) == main.as_ref() {
                continue;
            }
            let url = page.frame_url(id.clone()).await?.unwrap_or_default();
            frames.push((id, url));
        }
        Ok(frames)
    }

    /// Offset of the iframe element showing `url` in the top-level page
    async fn frame_offset(&self, url: &str) -> DriverResult<(f64, f64)> {
        let script = format!(
            "(function(u){{\
               var frames = Array.from(document.querySelectorAll('iframe'));\
               var f = frames.find(function(f){{ return f.src === u; }})\
                    || frames.find(function(f){{ try {{ return new URL(f.src).host === new URL(u).host; }} catch (e) {{ return false; }} }});\
               if (!f) return null;\
               var r = f.getBoundingClientRect();\
               return {{ x: r.x + f.clientLeft, y: r.y + f.clientTop }};\
             }})({})",
            json!(url)
        );
        let result = self.page()?.evaluate_expression(script).await?;
        let value = result.value().cloned().unwrap_or(Value::Null);
        let x = value.get("x").and_then(Value::as_f64).unwrap_or(0.0);
        let y = value.get("y").and_then(Value::as_f64).unwrap_or(0.0);
        Ok((x, y))
    }

    fn to_page(&self, x: f64, y: f64) -> Point {
        match &self.frame {
            Some(frame) => Point::new(x + frame.offset.0, y + frame.offset.1),
            None => Point::new(x, y),
        }
    }
}

#[async_trait::async_trait]
impl BrowserDriver for ChromeDriver {
    fn name(&self) -> &str {
        "chrome"
    }

    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.frame = None;
        self.page()?.goto(url).await?;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> DriverResult<Value> {
        let page = self.page()?;
        let result = match &self.frame {
            Some(frame) => {
                let params = EvaluateParams::builder()
                    .expression(script)
                    .context_id(frame.context)
                    .return_by_value(true)
                    .await_promise(true)
                    .build()
                    .map_err(DriverError::Script)?;
                page.evaluate_expression(params).await?
            }
            None => page.evaluate_expression(script).await?,
        };
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn frame_sources(&mut self) -> DriverResult<Vec<String>> {
        Ok(self
            .child_frames()
            .await?
            .into_iter()
            .map(|(_, url)| url)
            .collect())
    }

    async fn enter_frame(&mut self, index: usize) -> DriverResult<()> {
        let (id, url) = self
            .child_frames()
            .await?
            .into_iter()
            .nth(index)
            .ok_or(DriverError::NoFrame(index))?;
        let context = self
            .page()?
            .frame_execution_context(id)
            .await?
            .ok_or_else(|| DriverError::NotFound(format!("execution context for {}", url)))?;
        let offset = self.frame_offset(&url).await?;
        debug!(index, url = %url, x = offset.0, y = offset.1, "Entered frame");
        self.frame = Some(FrameContext { context, offset });
        Ok(())
    }

    async fn leave_frame(&mut self) -> DriverResult<()> {
        self.frame = None;
        Ok(())
    }

    async fn click_at(&mut self, x: f64, y: f64) -> DriverResult<()> {
        let point = self.to_page(x, y);
        self.page()?.click(point).await?;
        Ok(())
    }

    async fn move_mouse(&mut self, x: f64, y: f64) -> DriverResult<()> {
        let point = self.to_page(x, y);
        self.page()?.move_mouse(point).await?;
        Ok(())
    }

    async fn screenshot_element(&mut self, selector: &str) -> DriverResult<Vec<u8>> {
        let element = self.page()?.find_element(selector).await?;
        Ok(element.screenshot(CaptureScreenshotFormat::Png).await?)
    }

    async fn screenshot_viewport(&mut self) -> DriverResult<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        Ok(self.page()?.screenshot(params).await?)
    }

    async fn close(&mut self) -> DriverResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.frame = None;
        self.page = None;

        let result = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler_task.abort();
        result?;
        info!("Browser closed");
        Ok(())
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Browser dropped without close");
            self.handler_task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_browser_config_builds() {
        let config = SessionConfig {
            chrome_bin: Some(PathBuf::from("/usr/bin/chromium")),
            ..SessionConfig::default()
        };
        assert!(ChromeLauncher::browser_config(&config).is_ok());
    }

    #[test]
    fn test_capture_switches() {
        assert!(CHROME_ARGS.contains(&"--mute-audio"));
        assert!(CHROME_ARGS.contains(&"--autoplay-policy=no-user-gesture-required"));
        assert!(CHROME_ARGS.contains(&"--hide-scrollbars"));
    }
}
