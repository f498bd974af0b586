//! Manejar: Browser-Driven UI Test Automation Scaffold
//!
//! Manejar (Spanish: "to drive") manages one browser automation session per
//! concurrent execution context and wraps primitive UI actions in readiness
//! waits with bounded staleness recovery. The actual browser capability is
//! supplied externally through the [`UiDriver`] trait; the CDP backend lives
//! behind the `browser` feature.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     MANEJAR Architecture                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌─────────────┐    ┌────────────┐            │
//! │   │ Test Body  │    │ Interactor  │    │ UiDriver   │            │
//! │   │ + Harness  │───►│ wait→act→   │───►│ (CDP or    │            │
//! │   │            │    │ classify    │    │  scripted) │            │
//! │   └─────┬──────┘    └─────────────┘    └─────▲──────┘            │
//! │         │           ┌─────────────┐          │                   │
//! │         └──────────►│ Session     │──────────┘                   │
//! │                     │ Registry    │  one session per context     │
//! │                     └─────────────┘                              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod api;
pub mod config;
pub mod data;
pub mod driver;
pub mod harness;
pub mod interact;
pub mod page;
pub mod report;
pub mod result;
pub mod screenshot;
pub mod session;

#[cfg(feature = "browser")]
pub mod cdp;

pub use api::{ApiClient, ApiResponse};
pub use config::Settings;
pub use data::DataTable;
pub use driver::{
    BrowserKind, DriverError, DriverFactory, ElementHandle, ElementScript, LaunchSpec,
    ScriptedDriver, ScriptedFactory, ScriptedProbe, UiDriver,
};
pub use harness::Harness;
pub use interact::{ActionKind, Interactor, WaitKind, WaitPolicy};
pub use page::PageObject;
pub use report::{ReportSummary, RunReport, StepEntry, StepLevel, TestEntry, TestStatus};
pub use result::{ManejarError, ManejarResult};
pub use screenshot::ScreenshotService;
pub use session::{ContextId, Session, SessionRegistry};

#[cfg(feature = "browser")]
pub use cdp::{ChromiumDriver, ChromiumFactory};
