//! Headless Chromium surface over CDP.
//!
//! The card is a live DOM element located by `root_selector`; the text node
//! is a descendant matched by `text_selector`. Every operation is a small
//! script evaluated in the page, and rasterization is a PNG screenshot
//! clipped to the root element's bounding box.

use super::{BoxStyle, RenderSurface, TextTarget, DEFAULT_TEXT_SELECTOR};
use crate::bitmap::Bitmap;
use crate::result::{ExportError, ExportResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, Viewport,
};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Default selector of the exported card element
pub const DEFAULT_ROOT_SELECTOR: &str = "[data-export-root]";

/// Browser surface configuration
#[derive(Debug, Clone)]
pub struct BrowserSurfaceConfig {
    /// Page hosting the card
    pub url: String,
    /// Selector of the card element
    pub root_selector: String,
    /// Selector of the text node inside the card
    pub text_selector: String,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Emulated viewport width
    pub viewport_width: u32,
    /// Emulated viewport height
    pub viewport_height: u32,
}

impl BrowserSurfaceConfig {
    /// Capture the card on `url` with default selectors
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            root_selector: DEFAULT_ROOT_SELECTOR.to_string(),
            text_selector: DEFAULT_TEXT_SELECTOR.to_string(),
            chromium_path: None,
            sandbox: true,
            viewport_width: 1280,
            viewport_height: 1280,
        }
    }

    /// Set the card selector
    #[must_use]
    pub fn with_root_selector(mut self, selector: impl Into<String>) -> Self {
        self.root_selector = selector.into();
        self
    }

    /// Set the text node selector
    #[must_use]
    pub fn with_text_selector(mut self, selector: impl Into<String>) -> Self {
        self.text_selector = selector.into();
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Set the emulated viewport
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ClientRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// A card element in a headless Chromium page
#[derive(Debug)]
pub struct BrowserSurface {
    config: BrowserSurfaceConfig,
    browser: CdpBrowser,
    page: CdpPage,
    handle: tokio::task::JoinHandle<()>,
}

fn launch_error(e: impl std::fmt::Display) -> ExportError {
    ExportError::capture(format!("Failed to launch browser: {e}"))
}

/// Quote `value` as a JavaScript string literal
fn js_string(value: &str) -> ExportResult<String> {
    serde_json::to_string(value)
        .map_err(|e| ExportError::capture(format!("Failed to quote script argument: {e}")))
}

impl BrowserSurface {
    /// Launch Chromium, open the card page and pin the viewport
    ///
    /// # Errors
    ///
    /// Returns a capture error if the browser cannot be launched or the page
    /// does not load
    pub async fn launch(config: BrowserSurfaceConfig) -> ExportResult<Self> {
        let mut builder = CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder.build().map_err(launch_error)?;

        let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(launch_error)?;
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page(config.url.as_str())
            .await
            .map_err(|e| ExportError::capture(format!("Failed to open {}: {e}", config.url)))?;
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(config.viewport_width),
            i64::from(config.viewport_height),
            1.0,
            false,
        ))
        .await
        .map_err(|e| ExportError::capture(format!("Failed to set viewport: {e}")))?;
        debug!(url = %config.url, "browser surface ready");

        Ok(Self {
            config,
            browser,
            page,
            handle,
        })
    }

    /// Surface configuration
    #[must_use]
    pub const fn config(&self) -> &BrowserSurfaceConfig {
        &self.config
    }

    /// Close the browser
    ///
    /// # Errors
    ///
    /// Returns a capture error if the browser does not shut down cleanly
    pub async fn close(mut self) -> ExportResult<()> {
        let closed = self.browser.close().await;
        self.handle.abort();
        closed
            .map(|_| ())
            .map_err(|e| ExportError::capture(format!("Failed to close browser: {e}")))
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> ExportResult<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| ExportError::capture(format!("Script failed: {e}")))?;
        result
            .into_value()
            .map_err(|e| ExportError::capture(format!("Unexpected script result: {e}")))
    }

    /// Script prelude binding `root` to the card element, failing when absent
    fn with_root(&self, body: &str) -> ExportResult<String> {
        Ok(format!(
            "(() => {{ const root = document.querySelector({}); \
             if (!root) {{ throw new Error('card element not found'); }} {body} }})()",
            js_string(&self.config.root_selector)?
        ))
    }

    fn with_text(&self, target: &TextTarget, body: &str) -> ExportResult<String> {
        self.with_root(&format!(
            "const node = root.querySelector({}); \
             if (!node) {{ throw new Error('text node not found'); }} {body}",
            js_string(target.selector())?
        ))
    }
}

#[async_trait]
impl RenderSurface for BrowserSurface {
    async fn is_attached(&mut self) -> ExportResult<bool> {
        let script = format!(
            "(() => {{ const root = document.querySelector({}); return !!root && root.isConnected; }})()",
            js_string(&self.config.root_selector)?
        );
        self.eval(&script).await
    }

    async fn find_text_target(&mut self) -> ExportResult<Option<TextTarget>> {
        let script = self.with_root(&format!(
            "return root.querySelector({}) !== null;",
            js_string(&self.config.text_selector)?
        ))?;
        let found: bool = self.eval(&script).await?;
        Ok(found.then(|| TextTarget::new(self.config.text_selector.clone())))
    }

    async fn read_text(&mut self, target: &TextTarget) -> ExportResult<String> {
        let script = self.with_text(target, "return node.textContent || '';")?;
        self.eval(&script).await
    }

    async fn write_text(&mut self, target: &TextTarget, text: &str) -> ExportResult<()> {
        let script = self.with_text(
            target,
            &format!("node.textContent = {}; return true;", js_string(text)?),
        )?;
        let _: bool = self.eval(&script).await?;
        Ok(())
    }

    async fn snapshot_text(&mut self, target: &TextTarget) -> ExportResult<String> {
        let script = self.with_text(target, "return node.innerHTML;")?;
        self.eval(&script).await
    }

    async fn restore_text(&mut self, target: &TextTarget, snapshot: &str) -> ExportResult<()> {
        let script = self.with_text(target, &markup_assignment(snapshot)?)?;
        let _: bool = self.eval(&script).await?;
        Ok(())
    }

    async fn box_style(&mut self) -> ExportResult<BoxStyle> {
        let script = self.with_root(
            "const v = (p) => root.style[p] || null; \
             return { transform: v('transform'), width: v('width'), height: v('height'), \
             transition: v('transition') };",
        )?;
        self.eval(&script).await
    }

    async fn apply_box_style(&mut self, style: &BoxStyle) -> ExportResult<()> {
        let script = self.with_root(&style_assignments(style)?)?;
        let _: bool = self.eval(&script).await?;
        Ok(())
    }

    async fn next_paint(&mut self) -> ExportResult<()> {
        let _: bool = self
            .eval(
                "new Promise(resolve => requestAnimationFrame(() => setTimeout(() => resolve(true), 0)))",
            )
            .await?;
        Ok(())
    }

    async fn await_resources(&mut self, timeout: Duration) -> ExportResult<()> {
        let script = self.with_root(
            "const images = Array.from(root.querySelectorAll('img')); \
             images.forEach(img => { if (!img.crossOrigin) { img.crossOrigin = 'anonymous'; } }); \
             return Promise.all(images.map(img => img.complete ? true : new Promise(resolve => { \
               img.addEventListener('load', () => resolve(true), { once: true }); \
               img.addEventListener('error', () => resolve(false), { once: true }); \
             }))).then(states => states.filter(ok => !ok).length);",
        )?;
        match tokio::time::timeout(timeout, self.eval::<u32>(&script)).await {
            Ok(Ok(0)) => Ok(()),
            Ok(Ok(failed)) => {
                warn!(failed, "some images failed to load");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ExportError::capture(format!(
                "Images did not load within {} ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn rasterize(&mut self) -> ExportResult<Bitmap> {
        let script = self.with_root(
            "const r = root.getBoundingClientRect(); \
             return { x: r.x + window.scrollX, y: r.y + window.scrollY, width: r.width, height: r.height };",
        )?;
        let rect: ClientRect = self.eval(&script).await?;
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(Viewport {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                scale: 1.0,
            })
            .capture_beyond_viewport(true)
            .build();
        let screenshot = self
            .page
            .execute(params)
            .await
            .map_err(|e| ExportError::capture(format!("Screenshot failed: {e}")))?;

        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&screenshot.data)
            .map_err(|e| ExportError::capture(format!("Screenshot is not base64: {e}")))?;
        Bitmap::from_png_bytes(&bytes)
    }
}

/// Inline style writes; `transition` goes first so the transform change is not animated
fn style_assignments(style: &BoxStyle) -> ExportResult<String> {
    let value = |v: &Option<String>| js_string(v.as_deref().unwrap_or(""));
    Ok(format!(
        "root.style.transition = {}; root.style.transform = {}; \
         root.style.width = {}; root.style.height = {}; return true;",
        value(&style.transition)?,
        value(&style.transform)?,
        value(&style.width)?,
        value(&style.height)?
    ))
}

/// Restores child elements too; typing steps write `textContent` instead
fn markup_assignment(markup: &str) -> ExportResult<String> {
    Ok(format!("node.innerHTML = {}; return true;", js_string(markup)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = BrowserSurfaceConfig::new("http://localhost:3000/studio")
            .with_root_selector("#card")
            .with_text_selector(".body")
            .with_no_sandbox()
            .with_viewport(640, 480);
        assert_eq!(config.root_selector, "#card");
        assert_eq!(config.text_selector, ".body");
        assert!(!config.sandbox);
        assert_eq!((config.viewport_width, config.viewport_height), (640, 480));
    }

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("a\"b").unwrap(), "\"a\\\"b\"");
        assert_eq!(js_string("line\nbreak").unwrap(), "\"line\\nbreak\"");
    }

    #[test]
    fn test_capture_style_disables_transition_first() {
        let script = style_assignments(&BoxStyle::capture(1080, 1080)).unwrap();
        let transition = script.find("root.style.transition = \"none\"").unwrap();
        let transform = script.find("root.style.transform = \"none\"").unwrap();
        assert!(transition < transform);
        assert!(script.contains("root.style.width = \"1080px\""));
    }

    #[test]
    fn test_restored_style_clears_unset_properties() {
        let script = style_assignments(&BoxStyle::preview(0.5)).unwrap();
        assert!(script.contains("root.style.transition = \"\""));
        assert!(script.contains("root.style.transform = \"scale(0.5)\""));
    }

    #[test]
    fn test_markup_restore_keeps_child_elements() {
        let markup = r#"<span class="typewriter">Hi</span>"#;
        let script = markup_assignment(markup).unwrap();
        assert!(script.starts_with("node.innerHTML = "));
        assert!(script.contains(r#"<span class=\"typewriter\">Hi</span>"#));
    }
}
