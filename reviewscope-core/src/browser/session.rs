use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::automation::{BrowserAutomation, BrowserContext, BrowserLauncher, LaunchOverrides};
use super::error::{BrowserError, BrowserResult};
use super::human::HumanMotionController;

/// A rating-filter (or any other) control as rendered on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterControl {
    pub label: String,
    pub active: bool,
}

/// The operations the pipeline needs from a live page. Everything above this
/// trait is plain logic and is exercised against scripted sessions in tests.
#[async_trait(?Send)]
pub trait ReviewSession {
    async fn goto(&mut self, url: &str) -> BrowserResult<()>;
    async fn is_present(&mut self, selector: &str) -> BrowserResult<bool>;
    async fn controls(
        &mut self,
        selector: &str,
        active_class: &str,
    ) -> BrowserResult<Vec<FilterControl>>;
    /// Clicks the `index`-th match of `selector`; returns false when there is
    /// no such element.
    async fn click_nth(&mut self, selector: &str, index: usize) -> BrowserResult<bool>;
    async fn scroll_into_view(&mut self, selector: &str) -> BrowserResult<()>;
    async fn html(&mut self) -> BrowserResult<String>;
    async fn release(&mut self) -> BrowserResult<()>;
}

#[async_trait(?Send)]
pub trait SessionProvider: Send + Sync {
    async fn acquire(&self, headless: bool) -> BrowserResult<Box<dyn ReviewSession>>;
}

pub struct BrowserSessionProvider {
    launcher: Arc<BrowserLauncher>,
}

impl BrowserSessionProvider {
    pub fn new(launcher: BrowserLauncher) -> Self {
        Self {
            launcher: Arc::new(launcher),
        }
    }
}

#[async_trait(?Send)]
impl SessionProvider for BrowserSessionProvider {
    async fn acquire(&self, headless: bool) -> BrowserResult<Box<dyn ReviewSession>> {
        let automation = self
            .launcher
            .launch_with_overrides(LaunchOverrides {
                headless: Some(headless),
            })
            .await?;
        let context = match automation.new_context().await {
            Ok(context) => context,
            Err(err) => {
                if let Err(shutdown) = automation.shutdown().await {
                    warn!(error = %shutdown, "teardown after failed page setup also failed");
                }
                return Err(BrowserError::SessionInit(format!(
                    "page setup failed: {err}"
                )));
            }
        };
        let human = HumanMotionController::new(self.launcher.config().human_simulation.clone());
        Ok(Box::new(BrowserReviewSession {
            automation: Some(automation),
            context,
            human,
        }))
    }
}

pub struct BrowserReviewSession {
    automation: Option<BrowserAutomation>,
    context: BrowserContext,
    human: HumanMotionController,
}

impl BrowserReviewSession {
    async fn evaluate<T: serde::de::DeserializeOwned>(&self, script: String) -> BrowserResult<T> {
        self.context
            .page()
            .evaluate(script.as_str())
            .await
            .map_err(|err| BrowserError::Script(err.to_string()))?
            .into_value()
            .map_err(|err| BrowserError::Script(format!("failed to decode result: {err}")))
    }
}

#[async_trait(?Send)]
impl ReviewSession for BrowserReviewSession {
    async fn goto(&mut self, url: &str) -> BrowserResult<()> {
        self.context.goto(url).await?;
        self.human.idle().await
    }

    async fn is_present(&mut self, selector: &str) -> BrowserResult<bool> {
        let script = format!(
            "document.querySelector({}) !== null",
            js_string(selector)?
        );
        self.evaluate(script).await
    }

    async fn controls(
        &mut self,
        selector: &str,
        active_class: &str,
    ) -> BrowserResult<Vec<FilterControl>> {
        let script = format!(
            r#"
(() => Array.from(document.querySelectorAll({selector})).map(el => ({{
    label: (el.innerText || el.textContent || '').trim(),
    active: el.classList.contains({active}),
}})))()
"#,
            selector = js_string(selector)?,
            active = js_string(active_class)?,
        );
        self.evaluate(script).await
    }

    async fn click_nth(&mut self, selector: &str, index: usize) -> BrowserResult<bool> {
        let elements = self.context.page().find_elements(selector).await?;
        let Some(element) = elements.get(index) else {
            return Ok(false);
        };
        self.human.click_element(self.context.page(), element).await?;
        Ok(true)
    }

    async fn scroll_into_view(&mut self, selector: &str) -> BrowserResult<()> {
        match self.context.page().find_element(selector).await {
            Ok(element) => {
                element
                    .scroll_into_view()
                    .await
                    .map_err(|err| BrowserError::Script(err.to_string()))?;
            }
            Err(err) => debug!(selector, error = %err, "scroll target missing"),
        }
        self.human.scroll_burst(self.context.page()).await
    }

    async fn html(&mut self) -> BrowserResult<String> {
        Ok(self.context.page().content().await?)
    }

    async fn release(&mut self) -> BrowserResult<()> {
        match self.automation.take() {
            Some(automation) => automation.shutdown().await,
            None => Ok(()),
        }
    }
}

fn js_string(value: &str) -> BrowserResult<String> {
    serde_json::to_string(value).map_err(|err| BrowserError::Script(err.to_string()))
}
