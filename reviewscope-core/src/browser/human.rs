use std::time::Duration;

use rand::distributions::Uniform;
use rand::rngs::ThreadRng;
use rand::{thread_rng, Rng};
use tokio::time::sleep;

use chromiumoxide::element::Element;
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page;

use crate::config::HumanSimulationSection;

use super::error::{BrowserError, BrowserResult};

#[derive(Debug, Clone)]
pub struct HumanMotionPlan {
    pub events: Vec<MotionEvent>,
}

#[derive(Debug, Clone)]
pub enum MotionEvent {
    Move { point: Point, delay: Duration },
    Pause(Duration),
    Scroll { delta_y: f64 },
}

/// Pointer and scroll input with human-ish timing. Storefronts score
/// instant teleporting clicks as automation.
#[derive(Debug)]
pub struct HumanMotionController {
    config: HumanSimulationSection,
    last_point: Option<Point>,
    rng: ThreadRng,
}

impl HumanMotionController {
    pub fn new(config: HumanSimulationSection) -> Self {
        Self {
            config,
            last_point: None,
            rng: thread_rng(),
        }
    }

    pub async fn idle(&mut self) -> BrowserResult<()> {
        let delay = self.random_duration(self.config.idle_duration_ms);
        sleep(delay).await;
        Ok(())
    }

    pub async fn move_to_element(
        &mut self,
        page: &Page,
        element: &Element,
    ) -> BrowserResult<Point> {
        let bbox = element.bounding_box().await.map_err(|err| {
            BrowserError::Unexpected(format!("failed to get element bounding box: {err}"))
        })?;
        let jitter = self.config.mouse_jitter_px as f64;
        let target_x = bbox.x + self.rng.gen_range(0.3..0.7) * bbox.width;
        let target_y = bbox.y + self.rng.gen_range(0.2..0.6) * bbox.height;
        let target = Point::new(
            target_x + self.random_offset(jitter),
            target_y + self.random_offset(jitter),
        );
        let plan = self.plan_motion(target);
        self.execute_motion(page, &plan).await?;
        self.last_point = Some(target);
        Ok(target)
    }

    pub async fn click_element(&mut self, page: &Page, element: &Element) -> BrowserResult<()> {
        element.scroll_into_view().await.map_err(|err| {
            BrowserError::Unexpected(format!("failed to scroll element into view: {err}"))
        })?;
        self.move_to_element(page, element).await?;
        let hesitation = self.random_duration(self.config.click_hesitation_ms);
        sleep(hesitation).await;
        element
            .click()
            .await
            .map_err(|err| BrowserError::Unexpected(format!("failed to click element: {err}")))?;
        let dwell = self.random_duration(self.config.click_duration_ms);
        sleep(dwell).await;
        Ok(())
    }

    /// Scrolls by one randomized burst inside the configured range.
    pub async fn scroll_burst(&mut self, page: &Page) -> BrowserResult<()> {
        let [low, high] = self.config.scroll_burst_px;
        let delta = self.rng.gen_range(low.min(high)..=high.max(low)) as f64;
        self.scroll_by(page, delta).await
    }

    pub async fn scroll_by(&mut self, page: &Page, delta: f64) -> BrowserResult<()> {
        let pause = self.random_duration(self.config.scroll_pause_ms);
        let plan = HumanMotionPlan {
            events: vec![MotionEvent::Scroll { delta_y: delta }, MotionEvent::Pause(pause)],
        };
        self.execute_motion(page, &plan).await
    }

    fn plan_motion(&mut self, target: Point) -> HumanMotionPlan {
        let start = self.last_point.unwrap_or_else(|| Point::new(0.0, 0.0));
        let distance = ((target.x - start.x).powi(2) + (target.y - start.y).powi(2)).sqrt();
        let speed = self
            .rng
            .gen_range(self.config.mouse_speed_min_px_s..=self.config.mouse_speed_max_px_s)
            .max(1) as f64;
        let duration_secs = (distance / speed).max(0.08);
        let steps = (duration_secs * 60.0).clamp(12.0, 48.0) as usize;
        let mut events = Vec::with_capacity(steps);
        for idx in 0..steps {
            let t = idx as f64 / steps as f64;
            let eased = ease_in_out_cubic(t);
            let intermediate = Point::new(
                start.x + (target.x - start.x) * eased + self.random_offset(1.2),
                start.y + (target.y - start.y) * eased + self.random_offset(1.2),
            );
            let delay = Duration::from_secs_f64(duration_secs / steps as f64);
            events.push(MotionEvent::Move {
                point: intermediate,
                delay,
            });
        }
        HumanMotionPlan { events }
    }

    async fn execute_motion(&mut self, page: &Page, plan: &HumanMotionPlan) -> BrowserResult<()> {
        for event in &plan.events {
            match event {
                MotionEvent::Move { point, delay } => {
                    page.move_mouse(*point).await.map_err(|err| {
                        BrowserError::Unexpected(format!("failed to move mouse: {err}"))
                    })?;
                    sleep(*delay).await;
                }
                MotionEvent::Pause(duration) => sleep(*duration).await,
                MotionEvent::Scroll { delta_y } => {
                    let js = format!("window.scrollBy({{ top: {delta_y}, behavior: 'smooth' }});");
                    page.evaluate(js.as_str()).await.map_err(|err| {
                        BrowserError::Script(format!("failed to execute scroll: {err}"))
                    })?;
                }
            }
        }
        Ok(())
    }

    fn random_duration(&mut self, bounds: [u32; 2]) -> Duration {
        let low = bounds[0].min(bounds[1]);
        let high = bounds[0].max(bounds[1]);
        let ms = self.rng.gen_range(low..=high) as u64;
        Duration::from_millis(ms)
    }

    fn random_offset(&mut self, max: f64) -> f64 {
        if max <= 0.0 {
            return 0.0;
        }
        let distribution = Uniform::new_inclusive(-max, max);
        self.rng.sample(distribution)
    }
}

fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}
