//! Deterministic synthetic market models.
//!
//! A model is a price level (base + linear drift + phases) with Gaussian
//! noise, a volume level with its own noise and multipliers, clip bounds and
//! a candle shape. All randomness comes from one seeded `ChaCha8Rng`, so a
//! model and seed always produce the same bars.

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Distribution;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use crate::models::OhlcvBar;

/// One regular session of one-minute bars.
pub const SESSION_BARS: usize = 390;

/// Piecewise adjustment to the price level over bars `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricePhase {
    /// Add a linear ramp going from `from` to `to`.
    Shift { start: usize, end: usize, from: f64, to: f64 },
    /// Replace the level with a linear path from `from` to `to`.
    Path { start: usize, end: usize, from: f64, to: f64 },
}

impl PricePhase {
    fn apply(&self, levels: &mut [f64]) {
        let (start, end, from, to, replace) = match *self {
            Self::Shift { start, end, from, to } => (start, end, from, to, false),
            Self::Path { start, end, from, to } => (start, end, from, to, true),
        };
        let end = end.min(levels.len());
        if start >= end {
            return;
        }
        let span = (end - start) as f64;
        for (k, level) in levels[start..end].iter_mut().enumerate() {
            // numpy-style linspace: last bar lands exactly on `to`
            let frac = if span > 1.0 { k as f64 / (span - 1.0) } else { 1.0 };
            let v = from + (to - from) * frac;
            if replace {
                *level = v;
            } else {
                *level += v;
            }
        }
    }
}

/// Multiplies volume over bars `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeBurst {
    pub start: usize,
    pub end: usize,
    pub multiplier: f64,
}

/// High/low distance from the candle body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandleShape {
    /// Fixed price distance above and below.
    Absolute { up: f64, down: f64 },
    /// Fraction of the close above and below.
    Relative { up: f64, down: f64 },
}

impl CandleShape {
    fn wicks(&self, close: f64) -> (f64, f64) {
        match *self {
            Self::Absolute { up, down } => (up, down),
            Self::Relative { up, down } => (close * up, close * down),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketModel {
    pub seed: u64,
    pub bars: usize,
    pub base_price: f64,
    /// Price change per bar before phases.
    pub drift: f64,
    pub price_noise: f64,
    pub base_volume: f64,
    /// Volume change per bar before bursts.
    pub volume_drift: f64,
    pub volume_noise: f64,
    pub price_phases: Vec<PricePhase>,
    pub volume_bursts: Vec<VolumeBurst>,
    pub price_clip: (f64, f64),
    pub volume_clip: (f64, f64),
    pub shape: CandleShape,
}

impl MarketModel {
    /// Flat model around `base_price`; the builder methods add structure.
    pub fn new(seed: u64, base_price: f64, base_volume: f64) -> Self {
        Self {
            seed,
            bars: SESSION_BARS,
            base_price,
            drift: 0.0,
            price_noise: 0.0,
            base_volume,
            volume_drift: 0.0,
            volume_noise: 0.0,
            price_phases: Vec::new(),
            volume_bursts: Vec::new(),
            price_clip: (f64::MIN_POSITIVE, f64::MAX),
            volume_clip: (0.0, f64::MAX),
            shape: CandleShape::Relative { up: 0.0, down: 0.0 },
        }
    }

    pub fn drift(mut self, per_bar: f64) -> Self {
        self.drift = per_bar;
        self
    }

    pub fn noise(mut self, price_sigma: f64, volume_sigma: f64) -> Self {
        self.price_noise = price_sigma;
        self.volume_noise = volume_sigma;
        self
    }

    pub fn volume_drift(mut self, per_bar: f64) -> Self {
        self.volume_drift = per_bar;
        self
    }

    pub fn phase(mut self, phase: PricePhase) -> Self {
        self.price_phases.push(phase);
        self
    }

    pub fn burst(mut self, start: usize, end: usize, multiplier: f64) -> Self {
        self.volume_bursts.push(VolumeBurst {
            start,
            end,
            multiplier,
        });
        self
    }

    pub fn clip(mut self, price: (f64, f64), volume: (f64, f64)) -> Self {
        self.price_clip = price;
        self.volume_clip = volume;
        self
    }

    pub fn shape(mut self, shape: CandleShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generate bars starting at `open`, one minute apart.
    ///
    /// Each bar opens at the previous close; the first opens at its own close.
    pub fn generate(&self, open: DateTime<Utc>) -> Vec<OhlcvBar> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let n = self.bars;

        let mut levels: Vec<f64> = (0..n)
            .map(|t| self.base_price + self.drift * t as f64)
            .collect();
        for phase in &self.price_phases {
            phase.apply(&mut levels);
        }
        let price_noise = gaussian(&mut rng, self.price_noise, n);
        let closes: Vec<f64> = levels
            .iter()
            .zip(&price_noise)
            .map(|(l, e)| (l + e).clamp(self.price_clip.0, self.price_clip.1))
            .collect();

        let mut volumes: Vec<f64> = gaussian(&mut rng, self.volume_noise, n)
            .into_iter()
            .enumerate()
            .map(|(t, e)| self.base_volume + self.volume_drift * t as f64 + e)
            .collect();
        for b in &self.volume_bursts {
            let end = b.end.min(n);
            for v in volumes.iter_mut().take(end).skip(b.start) {
                *v *= b.multiplier;
            }
        }

        let floor = self.price_clip.0;
        (0..n)
            .map(|t| {
                let close = closes[t];
                let open_px = if t == 0 { close } else { closes[t - 1] };
                let (up, down) = self.shape.wicks(close);
                let high = open_px.max(close) + up;
                let low = (open_px.min(close) - down).max(floor);
                let volume = volumes[t]
                    .clamp(self.volume_clip.0, self.volume_clip.1)
                    .floor();
                OhlcvBar::new(
                    open + Duration::minutes(t as i64),
                    open_px,
                    high,
                    low,
                    close,
                    volume,
                )
            })
            .collect()
    }
}

/// `n` draws from N(0, sigma); zeros when sigma is not positive.
fn gaussian(rng: &mut ChaCha8Rng, sigma: f64, n: usize) -> Vec<f64> {
    match Normal::new(0.0, sigma) {
        Ok(dist) if sigma > 0.0 => (0..n).map(|_| dist.sample(rng)).collect(),
        _ => vec![0.0; n],
    }
}
