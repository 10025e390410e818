use crate::config::{DelayBand, EnforcementConfig};
use rand::Rng;
use std::time::Duration;

/// Length of one pacing cycle in actions.
pub const CYCLE_LEN: u32 = 16;

/// Which band an action count falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    Fast,
    Slow,
}

/// Five fast actions, six slow, five fast, repeating every [`CYCLE_LEN`].
pub fn pace_for(count: u32) -> Pace {
    let cycle = count % CYCLE_LEN;
    if cycle < 5 || cycle >= 11 {
        Pace::Fast
    } else {
        Pace::Slow
    }
}

/// Maps an action counter to a randomized post-action delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayScheduler {
    fast: DelayBand,
    slow: DelayBand,
}

impl DelayScheduler {
    pub const fn new(fast: DelayBand, slow: DelayBand) -> Self {
        Self { fast, slow }
    }

    pub fn from_config(config: &EnforcementConfig) -> Self {
        Self::new(config.fast_band, config.slow_band)
    }

    pub fn band_for(&self, count: u32) -> DelayBand {
        match pace_for(count) {
            Pace::Fast => self.fast,
            Pace::Slow => self.slow,
        }
    }

    pub fn delay_ms_with<R: Rng + ?Sized>(&self, count: u32, rng: &mut R) -> u64 {
        let band = self.band_for(count);
        if band.min_ms >= band.max_ms {
            return band.min_ms;
        }
        rng.random_range(band.min_ms..=band.max_ms)
    }

    pub fn delay(&self, count: u32) -> Duration {
        Duration::from_millis(self.delay_ms_with(count, &mut rand::rng()))
    }
}
