//! Abstract browser automation driver.
//!
//! The scaffold never talks to a browser directly; it drives everything
//! through the [`UiDriver`] trait so backends can be swapped. The default
//! real backend is the CDP implementation behind the `browser` feature;
//! [`ScriptedDriver`] is the in-process implementation used by unit tests.

use crate::result::ManejarError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Supported browser kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrowserKind {
    /// Google Chrome / Chromium
    Chrome,
    /// Mozilla Firefox
    Firefox,
    /// Microsoft Edge
    Edge,
    /// Apple Safari
    Safari,
}

impl BrowserKind {
    /// Canonical lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Edge => "edge",
            Self::Safari => "safari",
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BrowserKind {
    type Err = ManejarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" => Ok(Self::Chrome),
            "firefox" => Ok(Self::Firefox),
            "edge" => Ok(Self::Edge),
            "safari" => Ok(Self::Safari),
            _ => Err(ManejarError::UnsupportedBrowser {
                browser: s.to_string(),
            }),
        }
    }
}

/// Startup parameters for one driver launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Browser kind to launch
    pub kind: BrowserKind,
    /// Run without a visible window
    pub headless: bool,
    /// Keep the browser sandbox enabled
    pub sandbox: bool,
    /// Extra command-line arguments
    pub args: Vec<String>,
}

impl LaunchSpec {
    /// Build the startup parameters for a browser kind
    ///
    /// Chrome runs unsandboxed with shared-memory workarounds so it survives
    /// containerized CI; the other kinds take their defaults.
    #[must_use]
    pub fn for_kind(kind: BrowserKind, headless: bool) -> Self {
        let (sandbox, args) = match kind {
            BrowserKind::Chrome => (false, vec!["--disable-dev-shm-usage".to_string()]),
            BrowserKind::Firefox | BrowserKind::Edge | BrowserKind::Safari => (true, Vec::new()),
        };
        Self {
            kind,
            headless,
            sandbox,
            args,
        }
    }
}

/// Reference to an already-located UI node
///
/// Handles are supplied by the caller's locator layer; the scaffold only
/// carries the selector the node was located with plus an optional human
/// name for logs and errors. A handle can go stale at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    selector: String,
    name: Option<String>,
}

impl ElementHandle {
    /// Create a handle from the selector it was located with
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            name: None,
        }
    }

    /// Create a handle with a human-readable name for reporting
    #[must_use]
    pub fn named(selector: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            name: Some(name.into()),
        }
    }

    /// The selector this handle was located with
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.selector),
            None => write!(f, "{}", self.selector),
        }
    }
}

/// Failures a driver backend can report
///
/// This is the full vocabulary a backend may speak; the interaction layer
/// classifies these into the public error taxonomy and the raw backend
/// error never crosses that boundary.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// The element detached from the live document
    #[error("element is stale")]
    Stale,

    /// No node matches the handle
    #[error("no such element")]
    NoSuchElement,

    /// No select option carries the requested label
    #[error("no option with visible label '{label}'")]
    NoSuchOption {
        /// The requested label
        label: String,
    },

    /// The element exists but cannot receive the interaction
    #[error("element not interactable: {message}")]
    NotInteractable {
        /// Backend detail
        message: String,
    },

    /// In-page script execution failed
    #[error("script execution failed: {message}")]
    Script {
        /// Backend detail
        message: String,
    },

    /// Anything else the backend cannot classify
    #[error("driver error: {message}")]
    Backend {
        /// Backend detail
        message: String,
    },
}

/// Primitive automation capabilities supplied by an external backend
///
/// All element operations act on an already-located [`ElementHandle`];
/// locator resolution happens in the caller's page-object layer.
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Navigate the session to a URL
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// The page's current URL
    async fn current_url(&self) -> Result<String, DriverError>;

    /// Maximize the viewport
    async fn maximize(&self) -> Result<(), DriverError>;

    /// Whether the element is rendered and visible
    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool, DriverError>;

    /// Whether the element accepts interaction
    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, DriverError>;

    /// Native pointer click on the element's center
    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Script-executed click, bypassing hit-testing and overlays
    async fn click_via_script(&self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Clear the element's current value
    async fn clear(&self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Send text to the element
    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), DriverError>;

    /// The element's rendered text, verbatim
    async fn read_text(&self, element: &ElementHandle) -> Result<String, DriverError>;

    /// Select the option whose visible label equals `label` exactly
    async fn select_by_label(
        &self,
        element: &ElementHandle,
        label: &str,
    ) -> Result<(), DriverError>;

    /// Script-scroll the element into the viewport
    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Move the pointer to the element's center
    async fn move_to(&self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Capture a PNG screenshot of the page
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;

    /// Shut the browser down
    async fn close(&self) -> Result<(), DriverError>;
}

/// Launches driver instances for the session registry
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Launch a driver per the startup parameters
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn UiDriver>, DriverError>;
}

// ============================================================================
// Scripted driver (in-process backend for unit tests)
// ============================================================================

/// Scripted behavior for one element in a [`ScriptedDriver`]
#[derive(Debug, Clone)]
pub struct ElementScript {
    /// Whether the element is rendered at all
    pub displayed: bool,
    /// Whether the element accepts interaction
    pub enabled: bool,
    /// Element only becomes displayed this long after driver creation
    pub visible_after: Duration,
    /// Inject a staleness failure into the next N acting primitives
    pub stale_failures: u32,
    /// Rendered text returned by `read_text`
    pub text: String,
    /// Visible labels of the element's options
    pub options: Vec<String>,
}

impl Default for ElementScript {
    fn default() -> Self {
        Self {
            displayed: true,
            enabled: true,
            visible_after: Duration::ZERO,
            stale_failures: 0,
            text: String::new(),
            options: Vec::new(),
        }
    }
}

impl ElementScript {
    /// A visible, enabled element with no scripted failures
    #[must_use]
    pub fn ready() -> Self {
        Self::default()
    }

    /// Mark the element as never displayed
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    /// Mark the element as displayed but not interactable
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Element becomes displayed only after the given delay
    #[must_use]
    pub fn visible_after(mut self, delay: Duration) -> Self {
        self.visible_after = delay;
        self
    }

    /// Fail the next `count` acting primitives with a staleness error
    #[must_use]
    pub fn stale_times(mut self, count: u32) -> Self {
        self.stale_failures = count;
        self
    }

    /// Set the rendered text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the option labels
    #[must_use]
    pub fn with_options(mut self, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Default)]
struct ScriptedState {
    elements: HashMap<String, ElementScript>,
    calls: Vec<String>,
    typed: HashMap<String, String>,
    selected: HashMap<String, String>,
    url: String,
    closed: bool,
}

/// In-process [`UiDriver`] with scriptable element behavior
///
/// Elements are keyed by selector and configured with [`ElementScript`]s:
/// delayed visibility, injected staleness, option lists. Every call is
/// recorded so tests can assert on the primitive sequence.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    started: Option<Instant>,
    fail_close: bool,
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedDriver {
    /// Create a driver with no scripted elements
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Some(Instant::now()),
            fail_close: false,
            state: Arc::new(Mutex::new(ScriptedState::default())),
        }
    }

    /// Script an element's behavior
    #[must_use]
    pub fn with_element(self, selector: impl Into<String>, script: ElementScript) -> Self {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .elements
            .insert(selector.into(), script);
        self
    }

    /// Make `close` report a backend failure
    #[must_use]
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// A probe sharing this driver's state, for assertions after the
    /// driver has been handed to a session
    #[must_use]
    pub fn probe(&self) -> ScriptedProbe {
        ScriptedProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptedState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record(&self, call: String) {
        self.lock().calls.push(call);
    }

    fn elapsed(&self) -> Duration {
        self.started.map_or(Duration::ZERO, |s| s.elapsed())
    }

    /// Consume one scripted staleness failure if any remain
    fn take_stale(&self, selector: &str) -> bool {
        let mut state = self.lock();
        match state.elements.get_mut(selector) {
            Some(script) if script.stale_failures > 0 => {
                script.stale_failures -= 1;
                true
            }
            _ => false,
        }
    }

    fn script_for(&self, selector: &str) -> Result<ElementScript, DriverError> {
        self.lock()
            .elements
            .get(selector)
            .cloned()
            .ok_or(DriverError::NoSuchElement)
    }
}

#[async_trait]
impl UiDriver for ScriptedDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.record(format!("navigate:{url}"));
        self.lock().url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.lock().url.clone())
    }

    async fn maximize(&self) -> Result<(), DriverError> {
        self.record("maximize".to_string());
        Ok(())
    }

    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        let script = self.script_for(element.selector())?;
        Ok(script.displayed && self.elapsed() >= script.visible_after)
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        let script = self.script_for(element.selector())?;
        Ok(script.enabled)
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError> {
        self.record(format!("click:{}", element.selector()));
        if self.take_stale(element.selector()) {
            return Err(DriverError::Stale);
        }
        self.script_for(element.selector())?;
        Ok(())
    }

    async fn click_via_script(&self, element: &ElementHandle) -> Result<(), DriverError> {
        self.record(format!("click_via_script:{}", element.selector()));
        self.script_for(element.selector()).map_err(|_| DriverError::Script {
            message: format!("'{}' is not attached to the document", element.selector()),
        })?;
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), DriverError> {
        self.record(format!("clear:{}", element.selector()));
        if self.take_stale(element.selector()) {
            return Err(DriverError::Stale);
        }
        self.script_for(element.selector())?;
        self.lock().typed.remove(element.selector());
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        self.record(format!("type:{}:{text}", element.selector()));
        if self.take_stale(element.selector()) {
            return Err(DriverError::Stale);
        }
        self.script_for(element.selector())?;
        let mut state = self.lock();
        state
            .typed
            .entry(element.selector().to_string())
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn read_text(&self, element: &ElementHandle) -> Result<String, DriverError> {
        self.record(format!("read_text:{}", element.selector()));
        if self.take_stale(element.selector()) {
            return Err(DriverError::Stale);
        }
        Ok(self.script_for(element.selector())?.text)
    }

    async fn select_by_label(
        &self,
        element: &ElementHandle,
        label: &str,
    ) -> Result<(), DriverError> {
        self.record(format!("select:{}:{label}", element.selector()));
        if self.take_stale(element.selector()) {
            return Err(DriverError::Stale);
        }
        let script = self.script_for(element.selector())?;
        if !script.options.iter().any(|o| o == label) {
            return Err(DriverError::NoSuchOption {
                label: label.to_string(),
            });
        }
        self.lock()
            .selected
            .insert(element.selector().to_string(), label.to_string());
        Ok(())
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), DriverError> {
        self.record(format!("scroll_into_view:{}", element.selector()));
        self.script_for(element.selector())?;
        Ok(())
    }

    async fn move_to(&self, element: &ElementHandle) -> Result<(), DriverError> {
        self.record(format!("move_to:{}", element.selector()));
        if self.take_stale(element.selector()) {
            return Err(DriverError::Stale);
        }
        self.script_for(element.selector())?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.record("screenshot".to_string());
        // PNG signature followed by an empty payload
        Ok(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.record("close".to_string());
        self.lock().closed = true;
        if self.fail_close {
            return Err(DriverError::Backend {
                message: "scripted close failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Read-only view into a [`ScriptedDriver`]'s recorded state
#[derive(Debug, Clone)]
pub struct ScriptedProbe {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedProbe {
    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptedState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// All recorded calls, in order
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Whether any recorded call starts with the prefix
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.lock().calls.iter().any(|c| c.starts_with(prefix))
    }

    /// Number of recorded calls starting with the prefix
    #[must_use]
    pub fn call_count(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Text typed into the element, if any
    #[must_use]
    pub fn typed_value(&self, selector: &str) -> Option<String> {
        self.lock().typed.get(selector).cloned()
    }

    /// Label currently selected in the element, if any
    #[must_use]
    pub fn selected_label(&self, selector: &str) -> Option<String> {
        self.lock().selected.get(selector).cloned()
    }

    /// Current page URL
    #[must_use]
    pub fn current_url(&self) -> String {
        self.lock().url.clone()
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// [`DriverFactory`] producing [`ScriptedDriver`]s from a shared template
#[derive(Debug, Default)]
pub struct ScriptedFactory {
    template: Mutex<HashMap<String, ElementScript>>,
    fail_launches: AtomicU32,
    fail_close: std::sync::atomic::AtomicBool,
    launches: AtomicU32,
    probes: Mutex<Vec<ScriptedProbe>>,
}

impl ScriptedFactory {
    /// Create a factory with no scripted elements
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script an element into every driver this factory launches
    #[must_use]
    pub fn with_element(self, selector: impl Into<String>, script: ElementScript) -> Self {
        self.template
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(selector.into(), script);
        self
    }

    /// Fail the next `count` launches
    pub fn fail_next_launches(&self, count: u32) {
        self.fail_launches.store(count, Ordering::SeqCst);
    }

    /// Make launched drivers fail their `close`
    pub fn fail_closes(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Number of successful launches so far
    #[must_use]
    pub fn launch_count(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }

    /// Probes for every launched driver, in launch order
    #[must_use]
    pub fn probes(&self) -> Vec<ScriptedProbe> {
        self.probes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DriverFactory for ScriptedFactory {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn UiDriver>, DriverError> {
        let remaining = self.fail_launches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_launches.store(remaining - 1, Ordering::SeqCst);
            return Err(DriverError::Backend {
                message: format!("scripted launch failure for {}", spec.kind),
            });
        }
        let mut driver = ScriptedDriver::new();
        if self.fail_close.load(Ordering::SeqCst) {
            driver = driver.failing_close();
        }
        {
            let template = self
                .template
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            for (selector, script) in template.iter() {
                driver = driver.with_element(selector.clone(), script.clone());
            }
        }
        self.probes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(driver.probe());
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(driver))
    }
}
