use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use rand::seq::SliceRandom;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;

use super::error::{BrowserError, BrowserResult};
use super::fingerprint::FingerprintMasker;
use super::profile::{BrowserProfile, ProfileManager};

const FALLBACK_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Chromium's own default switches minus `--enable-automation`, which is
/// what paints the "controlled by automated test software" infobar.
const BASE_ARGS: &[&str] = &[
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-component-extensions-with-background-pages",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--disable-infobars",
    "--metrics-recording-only",
    "--password-store=basic",
    "--use-mock-keychain",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ViewportSpec {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

#[derive(Debug, Clone, Default)]
pub struct LaunchOverrides {
    pub headless: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    config: Arc<ScraperConfig>,
    profiles: ProfileManager,
    fingerprint: Arc<FingerprintMasker>,
}

impl BrowserLauncher {
    pub fn new(config: ScraperConfig) -> BrowserResult<Self> {
        let profiles = ProfileManager::from_config(&config.chromium)?;
        let fingerprint = Arc::new(FingerprintMasker::new(config.fingerprint.clone()));
        Ok(Self {
            config: Arc::new(config),
            profiles,
            fingerprint,
        })
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn profile_manager(&self) -> &ProfileManager {
        &self.profiles
    }

    pub async fn launch(&self) -> BrowserResult<BrowserAutomation> {
        self.launch_with_overrides(LaunchOverrides::default()).await
    }

    pub async fn launch_with_overrides(
        &self,
        overrides: LaunchOverrides,
    ) -> BrowserResult<BrowserAutomation> {
        let swept = self.profiles.cleanup_expired()?;
        if swept > 0 {
            debug!(swept, "removed expired chromium profiles");
        }
        let profile = self.profiles.allocate()?;
        let viewport = self.viewport();
        let user_agent = self.select_user_agent();
        let headless = overrides.headless.unwrap_or(self.config.chromium.headless);
        let chromium_config = self.build_chromium_config(&profile, &viewport, &user_agent, headless)?;
        info!(
            profile = %profile.id(),
            ua = %user_agent,
            width = viewport.width,
            height = viewport.height,
            headless,
            "Launching Chromium instance"
        );

        let (browser, mut handler) = match Browser::launch(chromium_config).await {
            Ok(launched) => launched,
            Err(err) => {
                if let Err(cleanup) = profile.remove().await {
                    warn!(error = %cleanup, "failed to remove profile after launch failure");
                }
                return Err(BrowserError::SessionInit(err.to_string()));
            }
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "Chromium handler reported error");
                }
            }
        });

        profile.touch().await?;

        Ok(BrowserAutomation {
            browser,
            profile,
            handler_task: Some(handler_task),
            config: Arc::clone(&self.config),
            viewport,
            user_agent,
            fingerprint: Arc::clone(&self.fingerprint),
        })
    }

    fn viewport(&self) -> ViewportSpec {
        let section = &self.config.viewport;
        ViewportSpec {
            width: section.width.clamp(640, 3840),
            height: section.height.clamp(480, 2160),
            device_scale_factor: section.device_scale_factor,
        }
    }

    fn select_user_agent(&self) -> String {
        let mut rng = rand::thread_rng();
        self.config
            .user_agents
            .pool
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| FALLBACK_USER_AGENT.to_string())
    }

    fn build_chromium_config(
        &self,
        profile: &BrowserProfile,
        viewport: &ViewportSpec,
        user_agent: &str,
        headless: bool,
    ) -> BrowserResult<ChromiumConfig> {
        let mut builder = ChromiumConfig::builder()
            .user_data_dir(profile.path())
            .window_size(viewport.width, viewport.height)
            .viewport(ChromiumViewport {
                width: viewport.width,
                height: viewport.height,
                device_scale_factor: Some(viewport.device_scale_factor),
                emulating_mobile: false,
                is_landscape: viewport.width >= viewport.height,
                has_touch: false,
            });

        if let Some(executable) = &self.config.chromium.executable_path {
            builder = builder.chrome_executable(executable);
        }
        if !headless {
            builder = builder.with_head();
        }
        if !self.config.chromium.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(timeout) = self.config.chromium.request_timeout_seconds {
            builder = builder.request_timeout(Duration::from_secs(timeout));
        }
        if self.config.flags.exclude_automation_switch {
            builder = builder.disable_default_args();
        }

        builder = builder.args(self.launch_args(viewport, user_agent, headless));
        builder.build().map_err(BrowserError::Configuration)
    }

    fn launch_args(&self, viewport: &ViewportSpec, user_agent: &str, headless: bool) -> Vec<String> {
        let flags = &self.config.flags;
        let mut args = vec![
            format!("--user-agent={user_agent}"),
            format!("--window-size={},{}", viewport.width, viewport.height),
        ];
        if flags.exclude_automation_switch {
            args.extend(BASE_ARGS.iter().map(|arg| arg.to_string()));
        }
        if !headless && flags.start_maximized {
            args.push("--start-maximized".into());
        }
        if self.config.chromium.disable_gpu {
            args.push("--disable-gpu".into());
        }
        if let Some(lang) = &flags.lang {
            args.push(format!("--lang={lang}"));
        }
        if !flags.disable_blink_features.is_empty() {
            args.push(format!(
                "--disable-blink-features={}",
                flags.disable_blink_features.join(",")
            ));
        }
        if flags.no_first_run {
            args.push("--no-first-run".into());
            args.push("--no-default-browser-check".into());
        }
        if flags.disable_automation_controlled {
            args.push("--disable-features=AutomationControlled".into());
        }
        if let Some(accept) = &flags.accept_language {
            args.push(format!("--accept-lang={accept}"));
        }
        args
    }
}

#[derive(Debug)]
pub struct BrowserAutomation {
    browser: Browser,
    profile: BrowserProfile,
    handler_task: Option<JoinHandle<()>>,
    config: Arc<ScraperConfig>,
    viewport: ViewportSpec,
    user_agent: String,
    fingerprint: Arc<FingerprintMasker>,
}

impl BrowserAutomation {
    pub fn profile(&self) -> &BrowserProfile {
        &self.profile
    }

    pub fn viewport(&self) -> &ViewportSpec {
        &self.viewport
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub async fn new_context(&self) -> BrowserResult<BrowserContext> {
        let params = CreateTargetParams::new("about:blank");
        let page = self.browser.new_page(params).await?;
        self.configure_page(&page).await?;
        Ok(BrowserContext {
            page,
            user_agent: self.user_agent.clone(),
            viewport: self.viewport.clone(),
        })
    }

    pub async fn shutdown(mut self) -> BrowserResult<()> {
        info!(profile = %self.profile.id(), "Shutting down Chromium instance");
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "Failed to close browser gracefully");
        }
        if let Err(err) = self.browser.wait().await {
            debug!(error = %err, "Chromium process wait failed");
        }
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Browser handler join error");
            }
        }
        self.profile.remove().await
    }

    async fn configure_page(&self, page: &Page) -> BrowserResult<()> {
        let mut params_builder =
            SetUserAgentOverrideParams::builder().user_agent(self.user_agent.clone());
        if let Some(accept) = &self.config.flags.accept_language {
            params_builder = params_builder.accept_language(accept.clone());
        }
        let params = params_builder
            .build()
            .map_err(BrowserError::Configuration)?;
        page.set_user_agent(params).await?;

        if let Some(lang) = &self.config.flags.lang {
            let languages_script = format!(
                "Object.defineProperty(navigator, 'language', {{ get: () => '{lang}' }});\nObject.defineProperty(navigator, 'languages', {{ get: () => ['{lang}', 'en'] }});"
            );
            page.evaluate_on_new_document(
                AddScriptToEvaluateOnNewDocumentParams::builder()
                    .source(languages_script)
                    .build()
                    .map_err(BrowserError::Configuration)?,
            )
            .await?;
        }

        self.fingerprint.apply(page).await?;
        Ok(())
    }
}

impl Drop for BrowserAutomation {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task {
            if !handle.is_finished() {
                warn!(
                    profile = %self.profile.id(),
                    "BrowserAutomation dropped without explicit shutdown"
                );
            }
        }
    }
}

/// One tab inside a launched browser.
#[derive(Debug)]
pub struct BrowserContext {
    page: Page,
    user_agent: String,
    viewport: ViewportSpec,
}

impl BrowserContext {
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn viewport(&self) -> &ViewportSpec {
        &self.viewport
    }

    pub async fn goto(&self, url: &str) -> BrowserResult<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Configuration)?;
        self.page.goto(params).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }
}
