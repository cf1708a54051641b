mod automation;
mod error;
mod fingerprint;
mod human;
mod metrics;
mod profile;
mod session;
mod wait;

pub use automation::{
    BrowserAutomation, BrowserContext, BrowserLauncher, LaunchOverrides, ViewportSpec,
};
pub use error::{BrowserError, BrowserResult};
pub use fingerprint::FingerprintMasker;
pub use human::{HumanMotionController, HumanMotionPlan, MotionEvent};
pub use metrics::ScrapeMetrics;
pub use profile::{BrowserProfile, ProfileManager};
pub use session::{
    BrowserReviewSession, BrowserSessionProvider, FilterControl, ReviewSession, SessionProvider,
};
pub use wait::{BoundedWait, WaitPolicy};
