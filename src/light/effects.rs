//! Per-tick color math for each effect
//!
//! These are plain state machines: the coordinator owns the timing and the
//! shared state, and asks an effect for the next frame on every tick.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Frame, Rgb};

/// Light mode; exactly one is active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Static,
    Wave,
    Breathing,
    MusicReactive,
    AmbientMonitor,
}

impl Mode {
    /// Tick period of the effect loop, `None` for static
    #[must_use]
    pub const fn period(self) -> Option<Duration> {
        match self {
            Self::Static => None,
            Self::Wave | Self::MusicReactive => Some(Duration::from_millis(30)),
            Self::Breathing => Some(Duration::from_millis(50)),
            Self::AmbientMonitor => Some(Duration::from_millis(80)),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Static => "static",
            Self::Wave => "wave",
            Self::Breathing => "breathing",
            Self::MusicReactive => "music_reactive",
            Self::AmbientMonitor => "ambient_monitor",
        };
        f.write_str(name)
    }
}

/// Phase step per wave tick
pub const WAVE_SPEED: u32 = 5;
/// Wave length in pixels
pub const WAVE_LENGTH: u32 = 15;

/// Device-rendered wave; only the phase lives here
#[derive(Debug, Clone)]
pub struct Wave {
    phase: u64,
    speed: u32,
    length: u32,
}

impl Default for Wave {
    fn default() -> Self {
        Self {
            phase: 0,
            speed: WAVE_SPEED,
            length: WAVE_LENGTH,
        }
    }
}

impl Wave {
    /// Frame for this tick, then advance the phase
    pub fn tick(&mut self, color: Rgb, brightness: u8) -> Frame {
        let frame = Frame::Wave {
            color: color.with_brightness(brightness),
            phase: self.phase,
            speed: self.speed,
            length: self.length,
        };
        self.phase = self.phase.wrapping_add(u64::from(self.speed));
        frame
    }
}

/// Phase increment per breathing tick
pub const BREATHING_STEP: f64 = 0.1;

/// Sinusoidal fade of a single color
#[derive(Debug, Clone, Default)]
pub struct Breathing {
    phase: f64,
}

impl Breathing {
    /// Current multiplier in `0.0..=1.0`
    #[must_use]
    pub fn factor(&self) -> f64 {
        (self.phase.sin() + 1.0) / 2.0
    }

    pub fn tick(&mut self, base: Rgb, brightness: u8) -> Frame {
        let color = base.scale(self.factor()).with_brightness(brightness);
        self.phase += BREATHING_STEP;
        if self.phase > std::f64::consts::TAU {
            self.phase -= std::f64::consts::TAU;
        }
        Frame::Solid(color)
    }
}

/// Display gamma applied to normalized loudness
pub const GAMMA: f64 = 2.2;

/// Loudness-driven intensity
#[derive(Debug, Clone, Copy)]
pub struct MusicReactive {
    ceiling: f64,
}

impl MusicReactive {
    /// `ceiling` is the amplitude that maps to full intensity
    #[must_use]
    pub fn new(ceiling: f32) -> Self {
        Self {
            ceiling: f64::from(ceiling.max(f32::EPSILON)),
        }
    }

    /// Gamma-corrected intensity for an amplitude
    #[must_use]
    pub fn intensity(&self, amplitude: f32) -> f64 {
        let normalized = (f64::from(amplitude.max(0.0)) / self.ceiling).min(1.0);
        normalized.powf(1.0 / GAMMA)
    }

    #[must_use]
    pub fn frame(&self, amplitude: f32, color: Rgb, brightness: u8) -> Frame {
        Frame::Solid(color.scale(self.intensity(amplitude)).with_brightness(brightness))
    }
}

/// Fraction of the distance to the new sample covered per tick
pub const AMBIENT_SMOOTHING: f64 = 0.4;

/// Exponentially smoothed screen color
#[derive(Debug, Clone)]
pub struct Ambient {
    last: Rgb,
}

impl Default for Ambient {
    fn default() -> Self {
        Self {
            last: Rgb::new(50, 50, 50),
        }
    }
}

impl Ambient {
    pub fn tick(&mut self, sample: Rgb, brightness: u8) -> Frame {
        self.last = self.last.approach(sample, AMBIENT_SMOOTHING);
        Frame::Solid(self.last.with_brightness(brightness))
    }

    #[must_use]
    pub const fn current(&self) -> Rgb {
        self.last
    }
}
