//! Microphone loudness meter
//!
//! Feeds the music-reactive light effect. The cpal stream lives on its own
//! thread (streams are not `Send` on every host); callbacks push one
//! loudness value per audio block into a shared rolling window.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream};
use parking_lot::Mutex;

use crate::light::AmplitudeSource;
use crate::{Error, Result};

/// Preferred capture rate
pub const SAMPLE_RATE: u32 = 44_100;

/// Blocks kept in the rolling window
const WINDOW_BLOCKS: usize = 100;

/// Blocks averaged for the reported level
const RECENT_BLOCKS: usize = 10;

/// How long `start` waits for the device to come up
const START_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-block loudness history
#[derive(Debug, Clone, Default)]
pub struct AmplitudeWindow {
    blocks: VecDeque<f32>,
}

impl AmplitudeWindow {
    /// Record one block of `[-1.0, 1.0]` samples as its mean absolute value on the i16 scale
    pub fn push_block(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32;
        if self.blocks.len() == WINDOW_BLOCKS {
            self.blocks.pop_front();
        }
        self.blocks.push_back(mean * 32768.0);
    }

    /// Mean of the most recent blocks, once more than [`RECENT_BLOCKS`] arrived
    #[must_use]
    pub fn level(&self) -> Option<f32> {
        if self.blocks.len() <= RECENT_BLOCKS {
            return None;
        }
        let recent = self.blocks.iter().rev().take(RECENT_BLOCKS);
        #[allow(clippy::cast_precision_loss)]
        Some(recent.sum::<f32>() / RECENT_BLOCKS as f32)
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }
}

struct CaptureWorker {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// [`AmplitudeSource`] backed by the default input device
#[derive(Default)]
pub struct AmplitudeMeter {
    window: Arc<Mutex<AmplitudeWindow>>,
    worker: Mutex<Option<CaptureWorker>>,
}

impl AmplitudeMeter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if currently capturing
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.worker.lock().is_some()
    }
}

impl AmplitudeSource for AmplitudeMeter {
    fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let window = Arc::clone(&self.window);

        let handle = std::thread::Builder::new()
            .name("amplitude-meter".into())
            .spawn(move || match open_stream(window) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Sender dropped or signalled: either way we are done
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })?;

        match ready_rx.recv_timeout(START_TIMEOUT) {
            Ok(Ok(())) => {
                *worker = Some(CaptureWorker {
                    stop: stop_tx,
                    handle,
                });
                tracing::debug!("audio capture started");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                drop(stop_tx);
                Err(Error::Audio("input device did not start in time".to_string()))
            }
        }
    }

    fn stop(&self) {
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.stop.send(());
            if worker.handle.join().is_err() {
                tracing::warn!("audio capture thread panicked");
            }
            self.window.lock().clear();
            tracing::debug!("audio capture stopped");
        }
    }

    fn level(&self) -> Option<f32> {
        self.window.lock().level()
    }
}

impl Drop for AmplitudeMeter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_stream(window: Arc<Mutex<AmplitudeWindow>>) -> Result<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

    let supported = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| c.sample_format() == SampleFormat::F32)
        .ok_or_else(|| Error::Audio("no f32 input config found".to_string()))?;

    let rate = SampleRate(SAMPLE_RATE);
    let supported = if supported.min_sample_rate() <= rate && supported.max_sample_rate() >= rate {
        supported.with_sample_rate(rate)
    } else {
        supported.with_max_sample_rate()
    };
    let config = supported.config();

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = config.sample_rate.0,
        channels = config.channels,
        "audio capture initialized"
    );

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                window.lock().push_block(data);
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;
    Ok(stream)
}
