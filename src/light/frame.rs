//! Wire frames for the LED controller
//!
//! Every frame is ASCII and newline-terminated:
//!
//! ```text
//! R,G,B                      solid color
//! LED:R,G,B;R,G,B;...        per-pixel colors
//! WAVE:R,G,B,T,SPEED,LENGTH  device-side wave animation
//! ```

use super::Rgb;

/// One message for the hardware channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Whole strip set to one color
    Solid(Rgb),
    /// Explicit color per pixel
    Pixels(Vec<Rgb>),
    /// Wave animation the device renders from a sine table
    Wave {
        color: Rgb,
        phase: u64,
        speed: u32,
        length: u32,
    },
}

impl Frame {
    /// All LEDs off
    pub const OFF: Self = Self::Solid(Rgb::BLACK);

    /// Render the frame as it goes on the wire
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Solid(c) => format!("{c}\n"),
            Self::Pixels(pixels) => {
                let body = pixels
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(";");
                format!("LED:{body}\n")
            }
            Self::Wave {
                color,
                phase,
                speed,
                length,
            } => format!("WAVE:{color},{phase},{speed},{length}\n"),
        }
    }
}
