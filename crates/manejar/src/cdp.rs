//! Chromium-backed [`UiDriver`] over the Chrome DevTools Protocol.
//!
//! Only compiled with the `browser` feature. Element primitives are
//! implemented as in-page script evaluation keyed by the handle's selector:
//! a handle whose node has left the document re-resolves to nothing, which
//! acting primitives report as [`DriverError::Stale`].

use crate::driver::{BrowserKind, DriverError, DriverFactory, ElementHandle, LaunchSpec, UiDriver};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Fixed window size for launched browsers
///
/// CDP windows are sized at launch; there is no later maximize, so the
/// factory launches at a desktop-sized viewport directly.
const WINDOW_WIDTH: u32 = 1920;
/// See [`WINDOW_WIDTH`]
const WINDOW_HEIGHT: u32 = 1080;

fn backend(e: impl std::fmt::Display) -> DriverError {
    DriverError::Backend {
        message: e.to_string(),
    }
}

fn script(e: impl std::fmt::Display) -> DriverError {
    DriverError::Script {
        message: e.to_string(),
    }
}

/// JSON-quote a selector for safe embedding in an evaluated script
fn quote(selector: &str) -> String {
    serde_json::to_string(selector).unwrap_or_else(|_| String::from("\"\""))
}

/// [`UiDriver`] driving one Chromium page over CDP
pub struct ChromiumDriver {
    browser: Mutex<CdpBrowser>,
    page: CdpPage,
    handler: StdMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl std::fmt::Debug for ChromiumDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumDriver").finish_non_exhaustive()
    }
}

impl ChromiumDriver {
    /// Launch a browser per the startup parameters and open a blank page
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Backend`] when the browser cannot be launched
    /// or the page cannot be created.
    pub async fn launch(spec: &LaunchSpec) -> Result<Self, DriverError> {
        let mut builder = CdpConfig::builder().window_size(WINDOW_WIDTH, WINDOW_HEIGHT);
        if !spec.headless {
            builder = builder.with_head();
        }
        if !spec.sandbox {
            builder = builder.no_sandbox();
        }
        for arg in &spec.args {
            builder = builder.arg(arg.clone());
        }
        let config = builder.build().map_err(backend)?;

        info!(kind = %spec.kind, headless = spec.headless, "launching chromium");
        let (browser, mut events) = CdpBrowser::launch(config).await.map_err(backend)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(backend)?;

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler: StdMutex::new(Some(handler)),
        })
    }

    /// Evaluate a script and deserialize its completion value
    async fn eval<T: serde::de::DeserializeOwned>(&self, expr: &str) -> Result<T, DriverError> {
        let result = self.page.evaluate(expr).await.map_err(script)?;
        result.into_value().map_err(script)
    }

    /// Run an acting primitive script whose completion value is `"ok"`,
    /// `null` when the node is gone, or a failure tag
    async fn act(&self, element: &ElementHandle, expr: &str) -> Result<(), DriverError> {
        debug!(element = %element, "evaluating action script");
        let status: Option<String> = self.eval(expr).await?;
        match status.as_deref() {
            Some("ok") => Ok(()),
            None => Err(DriverError::Stale),
            Some(other) => Err(DriverError::NotInteractable {
                message: other.to_string(),
            }),
        }
    }
}

#[async_trait]
impl UiDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.page.goto(url).await.map_err(backend)?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.eval("window.location.href").await
    }

    async fn maximize(&self) -> Result<(), DriverError> {
        // Window size is fixed at launch; this just proves the page answers
        let _: bool = self.eval("true").await?;
        Ok(())
    }

    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return null; \
             const r = el.getBoundingClientRect(); \
             const st = window.getComputedStyle(el); \
             return r.width > 0 && r.height > 0 \
                 && st.display !== 'none' && st.visibility !== 'hidden'; }})()",
            sel = quote(element.selector()),
        );
        let displayed: Option<bool> = self.eval(&expr).await?;
        displayed.ok_or(DriverError::NoSuchElement)
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return null; return !el.disabled; }})()",
            sel = quote(element.selector()),
        );
        let enabled: Option<bool> = self.eval(&expr).await?;
        enabled.ok_or(DriverError::NoSuchElement)
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError> {
        // Hit-test the element's center first so an overlay blocks the
        // click the way a real pointer would be blocked
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return null; \
             const r = el.getBoundingClientRect(); \
             const hit = document.elementFromPoint(r.x + r.width / 2, r.y + r.height / 2); \
             if (!hit || !(el.contains(hit) || hit.contains(el))) return 'obscured by another element'; \
             el.click(); return 'ok'; }})()",
            sel = quote(element.selector()),
        );
        self.act(element, &expr).await
    }

    async fn click_via_script(&self, element: &ElementHandle) -> Result<(), DriverError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return null; el.click(); return 'ok'; }})()",
            sel = quote(element.selector()),
        );
        match self.act(element, &expr).await {
            // The whole point of the forced click is that nothing blocks
            // it; a vanished node is a script failure here, not staleness
            Err(DriverError::Stale) => Err(DriverError::Script {
                message: format!("'{}' is not attached to the document", element.selector()),
            }),
            other => other,
        }
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), DriverError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return null; \
             el.value = ''; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return 'ok'; }})()",
            sel = quote(element.selector()),
        );
        self.act(element, &expr).await
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return null; \
             el.focus(); \
             el.value = el.value + {text}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return 'ok'; }})()",
            sel = quote(element.selector()),
            text = quote(text),
        );
        self.act(element, &expr).await
    }

    async fn read_text(&self, element: &ElementHandle) -> Result<String, DriverError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return null; return el.innerText; }})()",
            sel = quote(element.selector()),
        );
        let text: Option<String> = self.eval(&expr).await?;
        text.ok_or(DriverError::Stale)
    }

    async fn select_by_label(
        &self,
        element: &ElementHandle,
        label: &str,
    ) -> Result<(), DriverError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return null; \
             for (let i = 0; i < el.options.length; i++) {{ \
                 if (el.options[i].text === {label}) {{ \
                     el.selectedIndex = i; \
                     el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
                     return 'ok'; }} }} \
             return 'nooption'; }})()",
            sel = quote(element.selector()),
            label = quote(label),
        );
        let status: Option<String> = self.eval(&expr).await?;
        match status.as_deref() {
            Some("ok") => Ok(()),
            Some("nooption") => Err(DriverError::NoSuchOption {
                label: label.to_string(),
            }),
            _ => Err(DriverError::Stale),
        }
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), DriverError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return null; \
             el.scrollIntoView({{ block: 'center' }}); return 'ok'; }})()",
            sel = quote(element.selector()),
        );
        self.act(element, &expr).await
    }

    async fn move_to(&self, element: &ElementHandle) -> Result<(), DriverError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return null; \
             const r = el.getBoundingClientRect(); \
             const opts = {{ bubbles: true, \
                 clientX: r.x + r.width / 2, clientY: r.y + r.height / 2 }}; \
             el.dispatchEvent(new MouseEvent('mouseover', opts)); \
             el.dispatchEvent(new MouseEvent('mousemove', opts)); \
             return 'ok'; }})()",
            sel = quote(element.selector()),
        );
        self.act(element, &expr).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let shot = self.page.execute(params).await.map_err(backend)?;
        base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(backend)
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(backend)?;
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handler) = handler {
            handler.abort();
        }
        Ok(())
    }
}

/// [`DriverFactory`] launching [`ChromiumDriver`]s for CDP-capable kinds
#[derive(Debug, Default)]
pub struct ChromiumFactory;

impl ChromiumFactory {
    /// Create a factory
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Whether a browser kind can be driven over CDP
    #[must_use]
    pub const fn supports(kind: BrowserKind) -> bool {
        matches!(kind, BrowserKind::Chrome | BrowserKind::Edge)
    }
}

#[async_trait]
impl DriverFactory for ChromiumFactory {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn UiDriver>, DriverError> {
        if !Self::supports(spec.kind) {
            return Err(DriverError::Backend {
                message: format!("no CDP backend for {}", spec.kind),
            });
        }
        let driver = ChromiumDriver::launch(spec).await?;
        Ok(Box::new(driver))
    }
}
