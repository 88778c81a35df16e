use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::PacingSection;

use super::error::BrowserResult;
use super::session::MirrorSession;

/// Randomized, clock-driven pacing shared by the prober and the orchestrator.
pub struct HumanPacer {
    config: PacingSection,
    clock: Arc<dyn Clock>,
    rng: ChaCha8Rng,
}

impl HumanPacer {
    pub fn new(config: PacingSection, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    pub fn with_seed(config: PacingSection, clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self {
            config,
            clock,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &PacingSection {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Sleeps a uniform random number of milliseconds in `bounds` (inclusive).
    pub async fn pause(&mut self, bounds: [u64; 2]) -> Duration {
        let delay = self.random_duration(bounds);
        self.wait(delay).await;
        delay
    }

    pub async fn wait(&self, delay: Duration) {
        if !delay.is_zero() {
            self.clock.sleep(delay).await;
        }
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    pub fn scroll_distance(&mut self, viewport_height: u32) -> u32 {
        let [a, b] = self.config.scroll_fraction;
        let low = (viewport_height as f64 * a.min(b)) as u32;
        let high = (viewport_height as f64 * a.max(b)) as u32;
        if high <= low {
            low
        } else {
            self.rng.gen_range(low..=high)
        }
    }

    /// Reads the page the way a person would: an initial hesitation, a few
    /// scroll bursts with pauses, then a jump to the bottom so lazy content
    /// loads. Automation errors are logged and swallowed.
    pub async fn simulate_browsing(&mut self, session: &mut dyn MirrorSession, verbose: bool) {
        if let Err(err) = self.browse(session, verbose).await {
            warn!(error = %err, "Interaction simulation failed");
        }
    }

    async fn browse(&mut self, session: &mut dyn MirrorSession, verbose: bool) -> BrowserResult<()> {
        self.pause(self.config.initial_delay_ms).await;

        let [min, max] = self.config.scroll_count;
        let scrolls = self.rng.gen_range(min.min(max)..=min.max(max));
        if verbose {
            info!(scrolls, "Simulating human scrolling");
        } else {
            debug!(scrolls, "Simulating human scrolling");
        }

        let viewport_height = session.viewport_height().await?;
        for _ in 0..scrolls {
            let distance = self.scroll_distance(viewport_height);
            session.scroll_by(distance).await?;
            self.pause(self.config.scroll_duration_ms).await;
            self.pause(self.config.scroll_pause_ms).await;
        }

        session.scroll_to_bottom().await?;
        self.wait(Duration::from_millis(self.config.bottom_settle_ms))
            .await;
        Ok(())
    }

    fn random_duration(&mut self, bounds: [u64; 2]) -> Duration {
        let lower = bounds[0].min(bounds[1]);
        let upper = bounds[0].max(bounds[1]);
        if upper == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.gen_range(lower..=upper))
    }
}
