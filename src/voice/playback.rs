//! Track playback to speakers
//!
//! Decodes an MP3 file with minimp3 and streams it through cpal. The
//! audio callback reads a shared [`Transport`] so volume, pause and skip
//! take effect without rebuilding the stream.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Poll interval while waiting for a track to end
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Live playback controls shared with the audio callback
#[derive(Debug)]
pub struct Transport {
    volume: AtomicU8,
    paused: AtomicBool,
    interrupt: AtomicBool,
}

impl Transport {
    /// `volume` in percent, clamped to `0..=100`
    #[must_use]
    pub fn new(volume: u8) -> Self {
        Self {
            volume: AtomicU8::new(volume.min(100)),
            paused: AtomicBool::new(false),
            interrupt: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }

    pub fn set_volume(&self, percent: u8) {
        self.volume.store(percent.min(100), Ordering::Relaxed);
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Ask the current track to stop
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
    }

    /// Consume a pending interrupt
    pub fn take_interrupt(&self) -> bool {
        self.interrupt.swap(false, Ordering::SeqCst)
    }
}

/// How a track ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    Finished,
    Interrupted,
}

/// Decoded mono PCM
#[derive(Debug, Clone)]
pub struct DecodedTrack {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Plays tracks on the default output device
pub struct AudioPlayback;

impl AudioPlayback {
    /// Play an MP3 file, blocking until it ends or is interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, decoded or played
    pub fn play_file(path: &Path, transport: &Arc<Transport>) -> Result<PlaybackEnd> {
        let data = std::fs::read(path)?;
        let track = decode_mp3(&data)?;
        tracing::debug!(
            path = %path.display(),
            samples = track.samples.len(),
            sample_rate = track.sample_rate,
            "track decoded"
        );
        play_track(track, transport)
    }
}

fn play_track(track: DecodedTrack, transport: &Arc<Transport>) -> Result<PlaybackEnd> {
    if track.samples.is_empty() {
        return Ok(PlaybackEnd::Finished);
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let rate = SampleRate(track.sample_rate);
    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .min_by_key(|c| c.channels())
        .ok_or_else(|| Error::Audio(format!("no output config for {} Hz", track.sample_rate)))?;
    let config: StreamConfig = supported.with_sample_rate(rate).config();
    let channels = usize::from(config.channels);

    let samples = Arc::new(track.samples);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);
        let transport = Arc::clone(transport);
        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let paused = transport.is_paused();
                    let gain = f32::from(transport.volume()) / 100.0;
                    let mut pos = position.load(Ordering::Relaxed);

                    for frame in data.chunks_mut(channels) {
                        let sample = if paused {
                            0.0
                        } else if let Some(&s) = samples.get(pos) {
                            pos += 1;
                            s * gain
                        } else {
                            finished.store(true, Ordering::Relaxed);
                            0.0
                        };
                        frame.fill(sample);
                    }

                    position.store(pos, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let end = loop {
        if transport.take_interrupt() {
            break PlaybackEnd::Interrupted;
        }
        if finished.load(Ordering::Relaxed) {
            break PlaybackEnd::Finished;
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    drop(stream);
    tracing::debug!(played = position.load(Ordering::Relaxed), ?end, "playback ended");
    Ok(end)
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error on a corrupt stream
pub fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedTrack> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                }
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 && !samples.is_empty() {
        return Err(Error::Audio("MP3 stream without sample rate".to_string()));
    }
    Ok(DecodedTrack {
        samples,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_clamps_volume() {
        let transport = Transport::new(150);
        assert_eq!(transport.volume(), 100);
        transport.set_volume(30);
        assert_eq!(transport.volume(), 30);
    }

    #[test]
    fn test_interrupt_is_consumed_once() {
        let transport = Transport::new(50);
        assert!(!transport.take_interrupt());
        transport.interrupt();
        assert!(transport.take_interrupt());
        assert!(!transport.take_interrupt());
    }

    #[test]
    fn test_decode_empty_input() {
        let track = decode_mp3(&[]).unwrap();
        assert!(track.samples.is_empty());
    }
}
