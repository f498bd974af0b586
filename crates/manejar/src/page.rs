//! Page-object seam.
//!
//! Pages stay thin: they name the elements a screen exposes and delegate all
//! interaction to the [`Interactor`]. The trait only asks for a name and a
//! load marker; flows are composed in caller code.

use crate::driver::ElementHandle;
use crate::interact::Interactor;
use async_trait::async_trait;

/// A named screen with a marker element that proves it loaded
#[async_trait]
pub trait PageObject: Send + Sync {
    /// Human-readable page name for logs and reports
    fn page_name(&self) -> &str;

    /// The element whose visibility means the page finished loading
    fn load_marker(&self) -> ElementHandle;

    /// Whether the page's load marker is currently displayed
    ///
    /// Best-effort check, never raises.
    async fn is_loaded(&self, ui: &Interactor) -> bool {
        ui.is_displayed(&self.load_marker()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{keys, Settings};
    use crate::driver::{DriverFactory, ElementScript, ScriptedFactory};
    use crate::session::{ContextId, SessionRegistry};
    use std::sync::Arc;

    struct LoginPage;

    impl LoginPage {
        fn username(&self) -> ElementHandle {
            ElementHandle::named("#username", "username field")
        }

        fn submit(&self) -> ElementHandle {
            ElementHandle::named("#submit", "login button")
        }
    }

    #[async_trait]
    impl PageObject for LoginPage {
        fn page_name(&self) -> &str {
            "Login"
        }

        fn load_marker(&self) -> ElementHandle {
            ElementHandle::new("#login-form")
        }
    }

    async fn interactor(factory: ScriptedFactory) -> Interactor {
        let settings = Settings::new();
        settings.set(keys::BROWSER, "chrome");
        settings.set(keys::WAIT_TIME_SECONDS, "1");
        let factory: Arc<dyn DriverFactory> = Arc::new(factory);
        let registry = SessionRegistry::new(Arc::new(settings), factory);
        let session = registry.acquire(&ContextId::new("page")).await.unwrap();
        Interactor::new(session)
    }

    #[tokio::test]
    async fn test_is_loaded_follows_marker() {
        let ui = interactor(
            ScriptedFactory::new().with_element("#login-form", ElementScript::ready()),
        )
        .await;
        assert!(LoginPage.is_loaded(&ui).await);
    }

    #[tokio::test]
    async fn test_is_loaded_false_when_marker_absent() {
        let ui = interactor(ScriptedFactory::new()).await;
        assert!(!LoginPage.is_loaded(&ui).await);
    }

    #[tokio::test]
    async fn test_page_drives_flow_through_interactor() {
        let ui = interactor(
            ScriptedFactory::new()
                .with_element("#login-form", ElementScript::ready())
                .with_element("#username", ElementScript::ready())
                .with_element("#submit", ElementScript::ready()),
        )
        .await;
        let page = LoginPage;

        assert_eq!(page.page_name(), "Login");
        ui.type_text(&page.username(), "admin").await.unwrap();
        ui.click(&page.submit()).await.unwrap();
    }
}
