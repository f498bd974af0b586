//! Suite and test lifecycle wiring.
//!
//! The harness ties the collaborators together: shared settings, the session
//! registry, the screenshot service, and the run report. A test body brackets
//! itself with [`Harness::start_test`] and [`Harness::finish_test`]; the
//! harness owns everything that must happen around it, including the
//! failure screenshot and the unconditional session release.

use crate::config::Settings;
use crate::driver::DriverFactory;
use crate::report::{RunReport, TestEntry};
use crate::result::ManejarResult;
use crate::screenshot::ScreenshotService;
use crate::session::{ContextId, Session, SessionRegistry};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Lifecycle coordinator for one test run
#[derive(Debug)]
pub struct Harness {
    settings: Arc<Settings>,
    registry: SessionRegistry,
    screenshots: ScreenshotService,
    report: RunReport,
}

impl Harness {
    /// Create a harness over shared settings and a driver factory
    #[must_use]
    pub fn new(settings: Arc<Settings>, factory: Arc<dyn DriverFactory>) -> Self {
        let registry = SessionRegistry::new(Arc::clone(&settings), factory);
        Self {
            settings,
            registry,
            screenshots: ScreenshotService::default(),
            report: RunReport::new("Manejar test run"),
        }
    }

    /// Write failure screenshots under `dir`
    #[must_use]
    pub fn with_screenshot_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.screenshots = ScreenshotService::new(dir);
        self
    }

    /// Title the run report
    #[must_use]
    pub fn with_report_title(mut self, title: impl Into<String>) -> Self {
        self.report = RunReport::new(title);
        self
    }

    /// The shared settings
    #[must_use]
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// The session registry
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The run report
    #[must_use]
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Per-test setup: acquire the context's session and navigate to the
    /// configured base URL, if one is set
    ///
    /// A navigation failure releases the just-acquired session before
    /// surfacing, so the context never starts a test half-initialized.
    ///
    /// # Errors
    ///
    /// Propagates session-creation errors from
    /// [`SessionRegistry::acquire`] and navigation failures as
    /// [`crate::ManejarError::Interaction`].
    pub async fn start_test(&self, context: &ContextId) -> ManejarResult<Arc<Session>> {
        let session = self.registry.acquire(context).await?;
        if let Some(url) = self.settings.base_url() {
            if let Err(e) = session.navigate(&url).await {
                self.registry.release(context).await;
                return Err(e);
            }
        }
        Ok(session)
    }

    /// Per-test teardown: capture a screenshot on failure, record the
    /// outcome, and release the context's session
    ///
    /// Always releases, whatever the outcome; a failed screenshot capture is
    /// logged and the entry recorded without one.
    pub async fn finish_test(
        &self,
        context: &ContextId,
        name: &str,
        started: Instant,
        outcome: &ManejarResult<()>,
    ) {
        let duration = started.elapsed();
        let entry = match outcome {
            Ok(()) => {
                info!(test = name, "test passed");
                TestEntry::new(name).passed(duration)
            }
            Err(error) => {
                warn!(test = name, %error, "test failed");
                let mut entry = TestEntry::new(name).failed(duration, error.to_string());
                if let Some(path) = self.failure_screenshot(context, name).await {
                    entry = entry.with_screenshot(path);
                }
                entry
            }
        };
        self.report.record(entry);
        self.registry.release(context).await;
    }

    /// Suite teardown: render the report to `path`
    ///
    /// # Errors
    ///
    /// Returns [`crate::ManejarError::Report`] when the write fails.
    pub async fn flush_report(&self, path: impl AsRef<Path>) -> ManejarResult<()> {
        self.report.flush(path).await
    }

    async fn failure_screenshot(
        &self,
        context: &ContextId,
        name: &str,
    ) -> Option<std::path::PathBuf> {
        if !self.registry.is_bound(context).await {
            return None;
        }
        // Re-acquire is a get, not a create: the session is still bound
        let session = match self.registry.acquire(context).await {
            Ok(session) => session,
            Err(e) => {
                warn!(%context, error = %e, "no session for failure screenshot");
                return None;
            }
        };
        match self.screenshots.capture(&session, name).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(%context, error = %e, "failure screenshot capture failed");
                None
            }
        }
    }
}
