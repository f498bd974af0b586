//! Screenshot capture to disk.

use crate::result::{ManejarError, ManejarResult};
use crate::session::Session;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default directory for captured screenshots
pub const DEFAULT_SCREENSHOT_DIR: &str = "screenshots";

/// Captures page screenshots into a directory, one timestamped PNG per call
#[derive(Debug, Clone)]
pub struct ScreenshotService {
    dir: PathBuf,
}

impl Default for ScreenshotService {
    fn default() -> Self {
        Self::new(DEFAULT_SCREENSHOT_DIR)
    }
}

impl ScreenshotService {
    /// Create a service writing into the given directory
    ///
    /// The directory is created on first capture, not here.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory screenshots are written to
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Capture the session's page as `<label>_<yyyymmdd_hhmmss>.png` and
    /// return the written path
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::Screenshot`] when the driver capture or the
    /// filesystem write fails.
    pub async fn capture(&self, session: &Session, label: &str) -> ManejarResult<PathBuf> {
        let bytes = session
            .driver()
            .screenshot()
            .await
            .map_err(|e| ManejarError::Screenshot {
                message: e.to_string(),
            })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ManejarError::Screenshot {
                message: format!("cannot create '{}': {e}", self.dir.display()),
            })?;

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("{label}_{stamp}.png"));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ManejarError::Screenshot {
                message: format!("cannot write '{}': {e}", path.display()),
            })?;

        info!(path = %path.display(), bytes = bytes.len(), "screenshot captured");
        Ok(path)
    }
}
