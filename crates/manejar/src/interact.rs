//! Resilient interaction layer.
//!
//! Wraps each primitive UI action in a readiness wait, retries exactly once
//! on element staleness, and offers a script-executed click fallback for
//! elements whose native click is blocked by overlays. Every failure leaves
//! with the action kind and element descriptor attached; raw driver errors
//! never cross this boundary.

use crate::driver::{DriverError, ElementHandle, UiDriver};
use crate::result::{ManejarError, ManejarResult};
use crate::session::Session;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Default polling interval while waiting on element readiness (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Fixed pause after a scroll so layout and animation can settle (500ms)
pub const SETTLE_DELAY_MS: u64 = 500;

/// The primitive being performed, for logs and error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Native pointer click
    Click,
    /// Script-executed click fallback
    ForcedClick,
    /// Clear-then-type text entry
    TypeText,
    /// Dropdown option selection
    SelectOption,
    /// Rendered text read
    ReadText,
    /// Pointer hover
    Hover,
    /// Script scroll into view
    Scroll,
}

impl ActionKind {
    /// Human-readable action name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::ForcedClick => "forced click",
            Self::TypeText => "type text",
            Self::SelectOption => "select option",
            Self::ReadText => "read text",
            Self::Hover => "hover",
            Self::Scroll => "scroll into view",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The readiness condition an action waits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    /// Element is rendered and visible
    Visibility,
    /// Element is visible and accepts interaction
    Clickability,
}

impl WaitKind {
    /// The condition name as it appears in errors
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Visibility => "visible",
            Self::Clickability => "clickable",
        }
    }
}

impl fmt::Display for WaitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Timing bounds for readiness waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    timeout: Duration,
    poll_interval: Duration,
}

impl WaitPolicy {
    /// Create a policy with the default polling interval
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Override the polling interval
    ///
    /// The interval should stay short relative to the timeout; waits check
    /// the condition once per interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The wait timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The polling interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Wait-gated actions over one session's already-located elements
///
/// Waits suspend only the calling task; within one context actions execute
/// strictly in the order issued.
#[derive(Debug)]
pub struct Interactor {
    session: Arc<Session>,
    policy: WaitPolicy,
}

impl Interactor {
    /// Create an interactor using the session's configured wait timeout
    #[must_use]
    pub fn new(session: Arc<Session>) -> Self {
        let policy = WaitPolicy::new(session.timeout());
        Self { session, policy }
    }

    /// Create an interactor with an explicit wait policy
    #[must_use]
    pub const fn with_policy(session: Arc<Session>, policy: WaitPolicy) -> Self {
        Self { session, policy }
    }

    /// The session this interactor drives
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn driver(&self) -> &dyn UiDriver {
        self.session.driver()
    }

    /// Wait for the element's readiness condition, native-click it, and
    /// retry exactly once if the element went stale in between
    ///
    /// # Errors
    ///
    /// [`ManejarError::ElementNotReady`] when the element never becomes
    /// clickable, [`ManejarError::StaleElement`] when the single retry also
    /// hit staleness, [`ManejarError::Interaction`] for anything else.
    pub async fn click(&self, element: &ElementHandle) -> ManejarResult<()> {
        self.run(element, ActionKind::Click, WaitKind::Clickability, || {
            self.driver().click(element)
        })
        .await
    }

    /// Script-executed click, waiting for visibility only
    ///
    /// Bypasses overlay/occlusion checks, so callers choose it explicitly
    /// when a native click is known to be blocked. There is no staleness
    /// retry here: if the element is gone, the failure is final.
    ///
    /// # Errors
    ///
    /// [`ManejarError::ElementNotReady`] or [`ManejarError::Interaction`].
    pub async fn forced_click(&self, element: &ElementHandle) -> ManejarResult<()> {
        self.wait_until_ready(element, WaitKind::Visibility).await?;
        debug!(element = %element, "forced click via script");
        self.driver()
            .click_via_script(element)
            .await
            .map_err(|e| self.interaction(ActionKind::ForcedClick, element, &e))
    }

    /// Wait for visibility, clear the element, then send `text`
    ///
    /// Clearing and typing are not atomic with respect to concurrent DOM
    /// mutation; a race surfaces as [`ManejarError::Interaction`] rather
    /// than silently partial text.
    ///
    /// # Errors
    ///
    /// Same contract as [`Interactor::click`], gated on visibility.
    pub async fn type_text(&self, element: &ElementHandle, text: &str) -> ManejarResult<()> {
        self.run(element, ActionKind::TypeText, WaitKind::Visibility, || async {
            self.driver().clear(element).await?;
            self.driver().type_text(element, text).await
        })
        .await
    }

    /// Select the option whose visible label equals `text` exactly
    ///
    /// # Errors
    ///
    /// [`ManejarError::Interaction`] naming the label when no option
    /// matches; otherwise the same contract as [`Interactor::click`].
    pub async fn select_by_visible_text(
        &self,
        element: &ElementHandle,
        text: &str,
    ) -> ManejarResult<()> {
        self.run(element, ActionKind::SelectOption, WaitKind::Visibility, || {
            self.driver().select_by_label(element, text)
        })
        .await
    }

    /// Wait for visibility and return the element's rendered text, verbatim
    ///
    /// # Errors
    ///
    /// Same contract as [`Interactor::click`], gated on visibility.
    pub async fn read_text(&self, element: &ElementHandle) -> ManejarResult<String> {
        self.run(element, ActionKind::ReadText, WaitKind::Visibility, || {
            self.driver().read_text(element)
        })
        .await
    }

    /// Best-effort displayed check: no wait, never raises
    ///
    /// Returns `false` when the element is absent or stale, so callers can
    /// use it as a polling predicate.
    pub async fn is_displayed(&self, element: &ElementHandle) -> bool {
        self.driver()
            .is_displayed(element)
            .await
            .unwrap_or(false)
    }

    /// Script-scroll the element into view, then pause for the settle delay
    ///
    /// Does not wait for visibility first; the element may only become
    /// visible after scrolling. Cancelling the calling task cancels the
    /// settle pause with it.
    ///
    /// # Errors
    ///
    /// [`ManejarError::Interaction`] when the scroll script fails.
    pub async fn scroll_into_view(&self, element: &ElementHandle) -> ManejarResult<()> {
        debug!(element = %element, "scrolling into view");
        self.driver()
            .scroll_into_view(element)
            .await
            .map_err(|e| self.interaction(ActionKind::Scroll, element, &e))?;
        tokio::time::sleep(Duration::from_millis(SETTLE_DELAY_MS)).await;
        Ok(())
    }

    /// Wait for visibility and move the pointer to the element's center
    ///
    /// # Errors
    ///
    /// Same contract as [`Interactor::click`], gated on visibility.
    pub async fn hover(&self, element: &ElementHandle) -> ManejarResult<()> {
        self.run(element, ActionKind::Hover, WaitKind::Visibility, || {
            self.driver().move_to(element)
        })
        .await
    }

    /// Poll the element's readiness condition until it holds or the
    /// configured timeout elapses
    async fn wait_until_ready(
        &self,
        element: &ElementHandle,
        wait: WaitKind,
    ) -> ManejarResult<()> {
        let start = Instant::now();
        loop {
            if self.condition_met(element, wait).await {
                debug!(element = %element, condition = %wait, elapsed_ms = start.elapsed().as_millis() as u64, "element ready");
                return Ok(());
            }
            let elapsed = start.elapsed();
            if elapsed >= self.policy.timeout() {
                error!(element = %element, condition = %wait, elapsed_ms = elapsed.as_millis() as u64, "wait timed out");
                return Err(ManejarError::ElementNotReady {
                    wait: wait.as_str().to_string(),
                    element: element.to_string(),
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.policy.poll_interval()).await;
        }
    }

    /// One readiness probe; driver-side failures (absent, stale) read as
    /// "not ready yet" and polling continues
    async fn condition_met(&self, element: &ElementHandle, wait: WaitKind) -> bool {
        let displayed = self
            .driver()
            .is_displayed(element)
            .await
            .unwrap_or(false);
        if !displayed {
            return false;
        }
        match wait {
            WaitKind::Visibility => true,
            WaitKind::Clickability => self.driver().is_enabled(element).await.unwrap_or(false),
        }
    }

    /// Wait, perform the primitive, and compensate a single staleness
    /// failure with a refreshed wait plus one re-attempt
    async fn run<F, Fut, T>(
        &self,
        element: &ElementHandle,
        action: ActionKind,
        wait: WaitKind,
        op: F,
    ) -> ManejarResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, DriverError>>,
    {
        self.wait_until_ready(element, wait).await?;
        debug!(action = %action, element = %element, "performing action");
        match op().await {
            Ok(value) => Ok(value),
            Err(DriverError::Stale) => {
                warn!(action = %action, element = %element, "element went stale, retrying once");
                self.wait_until_ready(element, wait).await?;
                match op().await {
                    Ok(value) => Ok(value),
                    Err(DriverError::Stale) => {
                        error!(action = %action, element = %element, "element stale again after retry");
                        Err(ManejarError::StaleElement {
                            action: action.as_str().to_string(),
                            element: element.to_string(),
                        })
                    }
                    Err(e) => Err(self.interaction(action, element, &e)),
                }
            }
            Err(e) => Err(self.interaction(action, element, &e)),
        }
    }

    fn interaction(
        &self,
        action: ActionKind,
        element: &ElementHandle,
        cause: &DriverError,
    ) -> ManejarError {
        error!(action = %action, element = %element, cause = %cause, "action failed");
        ManejarError::Interaction {
            action: action.as_str().to_string(),
            element: element.to_string(),
            message: cause.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{keys, Settings};
    use crate::driver::{DriverFactory, ElementScript, ScriptedFactory, ScriptedProbe};
    use crate::session::{ContextId, SessionRegistry};

    const FAST: WaitPolicy =
        WaitPolicy::new(Duration::from_millis(250)).with_poll_interval(Duration::from_millis(20));

    async fn interactor_with(factory: ScriptedFactory) -> (Interactor, ScriptedProbe) {
        let settings = Settings::new();
        settings.set(keys::BROWSER, "chrome");
        settings.set(keys::HEADLESS, "true");
        let factory = Arc::new(factory);
        let handle: Arc<dyn DriverFactory> = factory.clone();
        let registry = SessionRegistry::new(Arc::new(settings), handle);
        let session = registry.acquire(&ContextId::new("test")).await.unwrap();
        let probe = factory.probes().remove(0);
        (Interactor::with_policy(session, FAST), probe)
    }

    mod click_tests {
        use super::*;

        #[tokio::test]
        async fn test_click_after_wait() {
            let (interactor, probe) =
                interactor_with(ScriptedFactory::new().with_element("#btn", ElementScript::ready()))
                    .await;

            interactor.click(&ElementHandle::new("#btn")).await.unwrap();
            assert_eq!(probe.call_count("click:#btn"), 1);
        }

        #[tokio::test]
        async fn test_click_waits_for_delayed_element() {
            let (interactor, probe) = interactor_with(ScriptedFactory::new().with_element(
                "#late",
                ElementScript::ready().visible_after(Duration::from_millis(60)),
            ))
            .await;

            interactor.click(&ElementHandle::new("#late")).await.unwrap();
            assert_eq!(probe.call_count("click:#late"), 1);
        }

        #[tokio::test]
        async fn test_click_recovers_from_single_staleness() {
            let (interactor, probe) = interactor_with(
                ScriptedFactory::new()
                    .with_element("#btn", ElementScript::ready().stale_times(1)),
            )
            .await;

            interactor.click(&ElementHandle::new("#btn")).await.unwrap();
            // One failed attempt plus the successful retry
            assert_eq!(probe.call_count("click:#btn"), 2);
        }

        #[tokio::test]
        async fn test_click_fails_on_double_staleness() {
            let (interactor, probe) = interactor_with(
                ScriptedFactory::new()
                    .with_element("#btn", ElementScript::ready().stale_times(2)),
            )
            .await;

            let err = interactor
                .click(&ElementHandle::new("#btn"))
                .await
                .unwrap_err();
            assert!(matches!(err, ManejarError::StaleElement { .. }));
            // The retry is bounded: exactly two attempts, never a third
            assert_eq!(probe.call_count("click:#btn"), 2);
        }

        #[tokio::test]
        async fn test_disabled_element_never_becomes_clickable() {
            let (interactor, probe) = interactor_with(
                ScriptedFactory::new().with_element("#btn", ElementScript::ready().disabled()),
            )
            .await;

            let err = interactor
                .click(&ElementHandle::new("#btn"))
                .await
                .unwrap_err();
            match err {
                ManejarError::ElementNotReady { wait, .. } => assert_eq!(wait, "clickable"),
                other => panic!("unexpected error: {other}"),
            }
            // The primitive was never attempted
            assert_eq!(probe.call_count("click:#btn"), 0);
        }

        #[tokio::test]
        async fn test_wait_timeout_elapses_approximately() {
            let (interactor, _) = interactor_with(
                ScriptedFactory::new().with_element("#never", ElementScript::ready().hidden()),
            )
            .await;

            let start = Instant::now();
            let err = interactor
                .click(&ElementHandle::new("#never"))
                .await
                .unwrap_err();
            let elapsed = start.elapsed();

            match err {
                ManejarError::ElementNotReady { elapsed_ms, .. } => {
                    assert!(elapsed_ms >= 250, "gave up too early: {elapsed_ms}ms");
                }
                other => panic!("unexpected error: {other}"),
            }
            assert!(elapsed >= Duration::from_millis(250));
            assert!(elapsed < Duration::from_secs(3), "wait never gave up");
        }
    }

    mod forced_click_tests {
        use super::*;

        #[tokio::test]
        async fn test_forced_click_ignores_clickability() {
            // Disabled element: native click would wait forever, the forced
            // variant only needs visibility.
            let (interactor, probe) = interactor_with(
                ScriptedFactory::new().with_element("#btn", ElementScript::ready().disabled()),
            )
            .await;

            interactor
                .forced_click(&ElementHandle::new("#btn"))
                .await
                .unwrap();
            assert_eq!(probe.call_count("click_via_script:#btn"), 1);
            assert_eq!(probe.call_count("click:#btn"), 0);
        }

        #[tokio::test]
        async fn test_forced_click_requires_visibility() {
            let (interactor, _) = interactor_with(
                ScriptedFactory::new().with_element("#btn", ElementScript::ready().hidden()),
            )
            .await;

            let err = interactor
                .forced_click(&ElementHandle::new("#btn"))
                .await
                .unwrap_err();
            assert!(matches!(err, ManejarError::ElementNotReady { .. }));
        }
    }

    mod type_text_tests {
        use super::*;

        #[tokio::test]
        async fn test_clears_before_typing() {
            let (interactor, probe) = interactor_with(
                ScriptedFactory::new().with_element("#user", ElementScript::ready()),
            )
            .await;
            let el = ElementHandle::new("#user");

            interactor.type_text(&el, "admin").await.unwrap();

            let history = probe.history();
            let clear_pos = history.iter().position(|c| c == "clear:#user").unwrap();
            let type_pos = history.iter().position(|c| c == "type:#user:admin").unwrap();
            assert!(clear_pos < type_pos);
            assert_eq!(probe.typed_value("#user"), Some("admin".to_string()));
        }

        #[tokio::test]
        async fn test_staleness_retry_repeats_clear_and_type() {
            let (interactor, probe) = interactor_with(
                ScriptedFactory::new()
                    .with_element("#user", ElementScript::ready().stale_times(1)),
            )
            .await;
            let el = ElementHandle::new("#user");

            interactor.type_text(&el, "admin").await.unwrap();

            // The first clear hit the staleness; the retry re-ran the pair
            assert_eq!(probe.call_count("clear:#user"), 2);
            assert_eq!(probe.typed_value("#user"), Some("admin".to_string()));
        }
    }

    mod select_tests {
        use super::*;

        #[tokio::test]
        async fn test_select_exact_label() {
            let (interactor, probe) = interactor_with(ScriptedFactory::new().with_element(
                "#country",
                ElementScript::ready().with_options(["Chile", "Peru"]),
            ))
            .await;

            interactor
                .select_by_visible_text(&ElementHandle::new("#country"), "Chile")
                .await
                .unwrap();
            assert_eq!(probe.selected_label("#country"), Some("Chile".to_string()));
        }

        #[tokio::test]
        async fn test_select_is_case_sensitive() {
            let (interactor, _) = interactor_with(ScriptedFactory::new().with_element(
                "#country",
                ElementScript::ready().with_options(["Chile"]),
            ))
            .await;

            let err = interactor
                .select_by_visible_text(&ElementHandle::new("#country"), "chile")
                .await
                .unwrap_err();
            match err {
                ManejarError::Interaction { message, .. } => assert!(message.contains("chile")),
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn test_select_missing_label_names_it() {
            let (interactor, _) = interactor_with(ScriptedFactory::new().with_element(
                "#country",
                ElementScript::ready().with_options(["Chile", "Peru"]),
            ))
            .await;

            let err = interactor
                .select_by_visible_text(&ElementHandle::new("#country"), "Narnia")
                .await
                .unwrap_err();
            match err {
                ManejarError::Interaction {
                    action, message, ..
                } => {
                    assert_eq!(action, "select option");
                    assert!(message.contains("Narnia"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    mod read_text_tests {
        use super::*;

        #[tokio::test]
        async fn test_read_text_verbatim() {
            let (interactor, _) = interactor_with(ScriptedFactory::new().with_element(
                "#msg",
                ElementScript::ready().with_text("  Welcome back!  "),
            ))
            .await;

            let text = interactor
                .read_text(&ElementHandle::new("#msg"))
                .await
                .unwrap();
            assert_eq!(text, "  Welcome back!  ");
        }
    }

    mod is_displayed_tests {
        use super::*;

        #[tokio::test]
        async fn test_never_raises() {
            let (interactor, _) = interactor_with(
                ScriptedFactory::new()
                    .with_element("#shown", ElementScript::ready())
                    .with_element("#hidden", ElementScript::ready().hidden()),
            )
            .await;

            assert!(interactor.is_displayed(&ElementHandle::new("#shown")).await);
            assert!(!interactor.is_displayed(&ElementHandle::new("#hidden")).await);
            // Non-existent element: false, not an error
            assert!(!interactor.is_displayed(&ElementHandle::new("#ghost")).await);
        }

        #[tokio::test]
        async fn test_does_not_wait() {
            let (interactor, _) = interactor_with(ScriptedFactory::new().with_element(
                "#late",
                ElementScript::ready().visible_after(Duration::from_secs(30)),
            ))
            .await;

            let start = Instant::now();
            assert!(!interactor.is_displayed(&ElementHandle::new("#late")).await);
            assert!(start.elapsed() < Duration::from_millis(100));
        }
    }

    mod scroll_and_hover_tests {
        use super::*;

        #[tokio::test]
        async fn test_scroll_imposes_settle_delay() {
            let (interactor, probe) = interactor_with(
                ScriptedFactory::new().with_element("#footer", ElementScript::ready().hidden()),
            )
            .await;

            // No visibility wait: scrolling a hidden element is fine
            let start = Instant::now();
            interactor
                .scroll_into_view(&ElementHandle::new("#footer"))
                .await
                .unwrap();
            assert!(start.elapsed() >= Duration::from_millis(SETTLE_DELAY_MS));
            assert!(probe.was_called("scroll_into_view:#footer"));
        }

        #[tokio::test]
        async fn test_hover_waits_for_visibility() {
            let (interactor, probe) = interactor_with(
                ScriptedFactory::new().with_element("#menu", ElementScript::ready()),
            )
            .await;

            interactor.hover(&ElementHandle::new("#menu")).await.unwrap();
            assert!(probe.was_called("move_to:#menu"));
        }
    }
}
