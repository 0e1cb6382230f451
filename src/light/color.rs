//! RGB color triple shared by the lexicon and the light coordinator

use serde::{Deserialize, Serialize};

/// 8-bit RGB color
///
/// Serialized as a `[r, g, b]` array so lexicon files stay compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Multiply every channel by `factor` (clamped to `0.0..=1.0`), truncating toward zero
    #[must_use]
    pub fn scale(self, factor: f64) -> Self {
        let factor = if factor.is_nan() { 0.0 } else { factor.clamp(0.0, 1.0) };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let channel = |c: u8| (f64::from(c) * factor) as u8;
        Self::new(channel(self.r), channel(self.g), channel(self.b))
    }

    /// Apply a brightness percentage (`0..=100`)
    #[must_use]
    pub fn with_brightness(self, percent: u8) -> Self {
        self.scale(f64::from(percent.min(100)) / 100.0)
    }

    /// Move a fraction `t` of the way toward `target`
    #[must_use]
    pub fn approach(self, target: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let channel = |from: u8, to: u8| {
            let from = f64::from(from);
            (from + (f64::from(to) - from) * t).clamp(0.0, 255.0) as u8
        };
        Self::new(
            channel(self.r, target.r),
            channel(self.g, target.g),
            channel(self.b, target.b),
        )
    }

    /// Clamp every channel into `lo..=hi`
    #[must_use]
    pub fn clamp_channels(self, lo: u8, hi: u8) -> Self {
        Self::new(self.r.clamp(lo, hi), self.g.clamp(lo, hi), self.b.clamp(lo, hi))
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        [c.r, c.g, c.b]
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}
