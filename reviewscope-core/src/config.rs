use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    pub chromium: ChromiumSection,
    pub flags: FlagsSection,
    pub user_agents: UserAgentSection,
    pub viewport: ViewportSection,
    pub human_simulation: HumanSimulationSection,
    pub fingerprint: FingerprintSection,
    pub timeouts: TimeoutSection,
    pub selectors: SelectorSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChromiumSection {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub profile_dir: String,
    pub profile_ttl_hours: u64,
    pub request_timeout_seconds: Option<u64>,
}

impl ChromiumSection {
    pub fn profile_ttl(&self) -> Duration {
        Duration::from_secs(self.profile_ttl_hours * 60 * 60)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlagsSection {
    pub no_first_run: bool,
    /// Drops chromium's default switch list, which carries `--enable-automation`.
    pub exclude_automation_switch: bool,
    pub disable_automation_controlled: bool,
    pub disable_blink_features: Vec<String>,
    pub start_maximized: bool,
    pub lang: Option<String>,
    pub accept_language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentSection {
    pub pool: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewportSection {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HumanSimulationSection {
    pub mouse_speed_min_px_s: u32,
    pub mouse_speed_max_px_s: u32,
    pub mouse_jitter_px: u32,
    pub click_hesitation_ms: [u32; 2],
    pub click_duration_ms: [u32; 2],
    pub scroll_burst_px: [u32; 2],
    pub scroll_pause_ms: [u32; 2],
    pub idle_duration_ms: [u32; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct FingerprintSection {
    pub mask_webdriver: bool,
    pub mask_plugins: bool,
    pub enable_webgl_mask: bool,
    pub webgl_vendor: Option<String>,
    pub webgl_renderer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutSection {
    pub navigation_seconds: u64,
    pub filter_refresh_seconds: u64,
    pub page_advance_seconds: u64,
    pub poll_interval_ms: u64,
}

impl TimeoutSection {
    pub fn navigation(&self) -> Duration {
        Duration::from_secs(self.navigation_seconds)
    }

    pub fn filter_refresh(&self) -> Duration {
        Duration::from_secs(self.filter_refresh_seconds)
    }

    pub fn page_advance(&self) -> Duration {
        Duration::from_secs(self.page_advance_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// CSS selectors for the target storefront. The review markup is not stable
/// across marketplace releases, so none of these live in code.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorSection {
    pub product_marker: String,
    pub review_list: String,
    pub review_entry: String,
    pub rating_filter: String,
    pub rating_filter_active_class: String,
    pub rating_star_active: String,
    pub author: String,
    pub timestamp: String,
    pub comment: Vec<String>,
    pub next_page: String,
    pub end_of_content: String,
    pub empty_list: String,
}

pub fn load_scraper_config<P: AsRef<Path>>(path: P) -> Result<ScraperConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: PathBuf::from(path),
    })
}
