//! Session lifecycle: one browser automation session per execution context.
//!
//! The registry maps each execution context to at most one live [`Session`]
//! and owns every session's lifetime. Acquire is an idempotent get-or-create
//! with exactly-once construction per context; release tears the driver down
//! and always unbinds, even when the driver-side shutdown fails.

use crate::config::Settings;
use crate::driver::{BrowserKind, DriverFactory, LaunchSpec, UiDriver};
use crate::result::{ManejarError, ManejarResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Identifier for a logically independent, possibly concurrent, test run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextId(String);

impl ContextId {
    /// Create a context id from a caller-chosen name (e.g. a worker label)
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random context id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identifier as a string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContextId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ContextId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One live automation session: a driver handle plus its configuration
///
/// A session is exclusively owned by the context it was created for; the
/// registry is the only component allowed to close it.
pub struct Session {
    id: Uuid,
    kind: BrowserKind,
    headless: bool,
    timeout: Duration,
    driver: Box<dyn UiDriver>,
}

impl Session {
    fn new(kind: BrowserKind, headless: bool, timeout: Duration, driver: Box<dyn UiDriver>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            headless,
            timeout,
            driver,
        }
    }

    /// Unique id of this session
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Browser kind the session was launched with
    #[must_use]
    pub fn kind(&self) -> BrowserKind {
        self.kind
    }

    /// Whether the session runs headless
    #[must_use]
    pub fn is_headless(&self) -> bool {
        self.headless
    }

    /// The configured action wait timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The underlying driver handle
    ///
    /// Exposed so collaborators like the screenshot service can consume the
    /// driver capability; session lifetime stays with the registry.
    #[must_use]
    pub fn driver(&self) -> &dyn UiDriver {
        self.driver.as_ref()
    }

    /// Navigate the session to a URL
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::Interaction`] when navigation fails.
    pub async fn navigate(&self, url: &str) -> ManejarResult<()> {
        self.driver
            .navigate(url)
            .await
            .map_err(|e| ManejarError::Interaction {
                action: "navigate".to_string(),
                element: url.to_string(),
                message: e.to_string(),
            })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("headless", &self.headless)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Per-context slot holding at most one session
///
/// The slot's async lock makes construction exactly-once per context while
/// leaving other contexts free to launch concurrently.
#[derive(Debug, Default)]
struct SessionSlot {
    cell: Mutex<Option<Arc<Session>>>,
}

/// Maps execution contexts to live sessions
pub struct SessionRegistry {
    settings: Arc<Settings>,
    factory: Arc<dyn DriverFactory>,
    slots: StdMutex<HashMap<ContextId, Arc<SessionSlot>>>,
}

impl SessionRegistry {
    /// Create a registry over shared settings and a driver factory
    #[must_use]
    pub fn new(settings: Arc<Settings>, factory: Arc<dyn DriverFactory>) -> Self {
        Self {
            settings,
            factory,
            slots: StdMutex::new(HashMap::new()),
        }
    }

    fn slot(&self, context: &ContextId) -> Arc<SessionSlot> {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(slots.entry(context.clone()).or_default())
    }

    /// Look up a context's slot without creating one
    fn peek(&self, context: &ContextId) -> Option<Arc<SessionSlot>> {
        self.slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(context)
            .cloned()
    }

    /// Get the context's session, creating it if absent
    ///
    /// Browser kind, headless flag, and wait timeout come from the shared
    /// settings at creation time. A failed launch leaves the context unbound
    /// so a later acquire can retry with corrected configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::UnsupportedBrowser`] for an unrecognized
    /// browser kind and [`ManejarError::DriverStartup`] when the driver
    /// cannot be launched.
    pub async fn acquire(&self, context: &ContextId) -> ManejarResult<Arc<Session>> {
        let slot = self.slot(context);
        let mut cell = slot.cell.lock().await;
        if let Some(session) = cell.as_ref() {
            return Ok(Arc::clone(session));
        }

        let kind = self.settings.browser_kind()?;
        let headless = self.settings.headless();
        let timeout = self.settings.wait_timeout()?;
        let spec = LaunchSpec::for_kind(kind, headless);

        info!(%context, browser = %kind, headless, "launching session");
        let driver =
            self.factory
                .launch(&spec)
                .await
                .map_err(|e| ManejarError::DriverStartup {
                    message: e.to_string(),
                })?;

        if let Err(e) = driver.maximize().await {
            // Startup is all-or-nothing: an unusable viewport counts as a
            // failed launch and the context stays unbound.
            if let Err(close_err) = driver.close().await {
                warn!(%context, error = %close_err, "failed to close driver after bad startup");
            }
            return Err(ManejarError::DriverStartup {
                message: e.to_string(),
            });
        }

        let session = Arc::new(Session::new(kind, headless, timeout, driver));
        info!(%context, session = %session.id(), browser = %kind, "session ready");
        *cell = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Tear down and unbind the context's session, if any
    ///
    /// Driver shutdown failures are logged, never propagated; the binding is
    /// cleared regardless so the context slot can never leak as occupied.
    /// Releasing an unbound context is a no-op.
    pub async fn release(&self, context: &ContextId) {
        let Some(slot) = self.peek(context) else {
            return;
        };
        let mut cell = slot.cell.lock().await;
        if let Some(session) = cell.take() {
            info!(%context, session = %session.id(), "releasing session");
            if let Err(e) = session.driver().close().await {
                warn!(%context, session = %session.id(), error = %e, "driver shutdown failed during release");
            }
        }
        drop(cell);
        // Drop the now-empty slot entry so context churn does not grow the
        // map. Skip it while another task still holds this slot: clones are
        // only taken under the map lock, so the count cannot rise mid-check.
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let unshared = Arc::strong_count(&slot) == 2;
        if unshared && slots.get(context).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
            slots.remove(context);
        }
    }

    /// Whether the context currently has a bound session
    pub async fn is_bound(&self, context: &ContextId) -> bool {
        match self.peek(context) {
            Some(slot) => slot.cell.lock().await.is_some(),
            None => false,
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Number of currently bound sessions
    pub async fn active_sessions(&self) -> usize {
        let slots: Vec<Arc<SessionSlot>> = {
            let map = self
                .slots
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            map.values().map(Arc::clone).collect()
        };
        let mut count = 0;
        for slot in slots {
            if slot.cell.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry").finish_non_exhaustive()
    }
}
