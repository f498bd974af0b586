//! Process-wide test settings.
//!
//! Settings are loaded once from a properties file (`key=value` lines) and
//! shared read-mostly across execution contexts. Overrides via [`Settings::set`]
//! are part of suite setup; mutating settings while sessions are live is
//! unsupported.

use crate::driver::BrowserKind;
use crate::result::{ManejarError, ManejarResult};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Well-known settings keys
pub mod keys {
    /// Browser kind: one of `chrome`, `firefox`, `edge`, `safari`
    pub const BROWSER: &str = "browser";
    /// Headless flag, boolean-as-string
    pub const HEADLESS: &str = "headless";
    /// Action wait timeout in seconds, integer-as-string
    pub const WAIT_TIME_SECONDS: &str = "wait.time.seconds";
    /// Base navigation URL for the test lifecycle
    pub const URL: &str = "url";
}

/// Default wait timeout when `wait.time.seconds` is absent
pub const DEFAULT_WAIT_TIME_SECONDS: u64 = 30;

/// Key/value settings store with load-once-then-override semantics
#[derive(Debug, Default)]
pub struct Settings {
    values: RwLock<HashMap<String, String>>,
}

impl Settings {
    /// Create an empty settings store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a properties file
    ///
    /// Lines are `key=value`; blank lines and lines starting with `#` or `!`
    /// are ignored. Keys and values are trimmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> ManejarResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading settings");
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::parse(&contents))
    }

    /// Parse settings from properties-file contents
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        let mut values = HashMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                values.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Self {
            values: RwLock::new(values),
        }
    }

    /// Get a value by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let value = self
            .values
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned();
        if value.is_none() {
            warn!(key, "setting not found");
        }
        value
    }

    /// Get a value by key, falling back to a default
    #[must_use]
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.values
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Set a value, overriding any loaded one
    ///
    /// Intended for suite setup (e.g. a per-run browser override) before
    /// sessions are created.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        debug!(%key, %value, "settings override");
        self.values
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key, value);
    }

    /// Resolve the configured browser kind
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::Config`] when the `browser` key is absent and
    /// [`ManejarError::UnsupportedBrowser`] when its value is not recognized.
    pub fn browser_kind(&self) -> ManejarResult<BrowserKind> {
        let raw = self.get(keys::BROWSER).ok_or_else(|| ManejarError::Config {
            message: format!("missing required setting '{}'", keys::BROWSER),
        })?;
        raw.parse()
    }

    /// The configured headless flag, `false` when absent or unparsable
    #[must_use]
    pub fn headless(&self) -> bool {
        self.get_or(keys::HEADLESS, "false")
            .eq_ignore_ascii_case("true")
    }

    /// The configured action wait timeout
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::Config`] when `wait.time.seconds` is present
    /// but not an integer.
    pub fn wait_timeout(&self) -> ManejarResult<Duration> {
        let raw = self.get_or(keys::WAIT_TIME_SECONDS, "");
        if raw.is_empty() {
            return Ok(Duration::from_secs(DEFAULT_WAIT_TIME_SECONDS));
        }
        let seconds: u64 = raw.parse().map_err(|_| ManejarError::Config {
            message: format!("'{}' is not an integer: '{raw}'", keys::WAIT_TIME_SECONDS),
        })?;
        Ok(Duration::from_secs(seconds))
    }

    /// The configured base URL, if any
    #[must_use]
    pub fn base_url(&self) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(keys::URL)
            .cloned()
    }
}
