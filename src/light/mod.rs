//! LED strip control
//!
//! - [`Rgb`] and [`Frame`]: colors and the wire format
//! - [`SerialChannel`]: the one connection to the controller
//! - [`LightController`]: power, brightness, color and the mutually exclusive effects

mod color;
mod coordinator;
pub mod effects;
mod frame;
pub mod serial;

pub use color::Rgb;
pub use coordinator::{EffectSources, EffectState, LightController, LightSettings};
pub use effects::Mode;
pub use frame::Frame;
pub use serial::{ChannelSettings, PortOpener, SerialChannel, SerialPortOpener};

use crate::Result;

/// Rolling loudness of the room, for the music-reactive effect
pub trait AmplitudeSource: Send + Sync {
    /// Begin capturing
    ///
    /// # Errors
    ///
    /// Returns error if no input device is usable
    fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Stop capturing
    fn stop(&self) {}

    /// Recent average amplitude on the i16 scale, `None` until enough audio arrived
    fn level(&self) -> Option<f32>;
}

/// Dominant screen color, for the ambient monitor effect
pub trait ScreenColorSource: Send + Sync {
    /// Take one sample; may block for the duration of a screenshot
    ///
    /// # Errors
    ///
    /// Returns error if the screen could not be captured
    fn sample(&self) -> Result<Rgb>;
}
