//! Effect coordinator
//!
//! Owns the [`SerialChannel`] and the single [`EffectState`]. Effects run as
//! tokio tasks; a new effect is only spawned after the previous one has been
//! cancelled and joined (bounded by [`LightSettings::join_timeout`]).
//!
//! Every frame is computed and queued on the serial writer while the state
//! lock is held, so a frame never mixes two colors and nothing follows the
//! "off" frame of [`LightController::turn_off`] until power comes back.
//! Queueing never blocks; reconnects happen on the writer thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::effects::{Ambient, Breathing, Mode, MusicReactive, Wave};
use super::{AmplitudeSource, Frame, Rgb, ScreenColorSource, SerialChannel};

/// Upper bound on waiting for queued frames at shutdown
const SHUTDOWN_FLUSH: Duration = Duration::from_secs(5);

/// Coordinator tuning
#[derive(Debug, Clone, Copy)]
pub struct LightSettings {
    /// How long a transition waits for the previous effect to exit
    pub join_timeout: Duration,
    /// Pause after a failed screen sample
    pub ambient_backoff: Duration,
    /// Amplitude that maps to full intensity in music mode
    pub amplitude_ceiling: f32,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(1),
            ambient_backoff: Duration::from_secs(1),
            amplitude_ceiling: 10_000.0,
        }
    }
}

/// Optional collaborators feeding the reactive effects
#[derive(Clone, Default)]
pub struct EffectSources {
    pub amplitude: Option<Arc<dyn AmplitudeSource>>,
    pub screen: Option<Arc<dyn ScreenColorSource>>,
}

/// Snapshot of the light state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectState {
    pub mode: Mode,
    pub color: Rgb,
    pub brightness: u8,
    pub palette: Option<String>,
    pub powered: bool,
}

impl Default for EffectState {
    fn default() -> Self {
        Self {
            mode: Mode::Static,
            color: Rgb::WHITE,
            brightness: 100,
            palette: None,
            powered: false,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: EffectState,
    palette_primary: Option<Rgb>,
}

impl Inner {
    fn solid(&self) -> Frame {
        Frame::Solid(self.state.color.with_brightness(self.state.brightness))
    }

    fn shows_static(&self) -> bool {
        self.state.powered && self.state.mode == Mode::Static
    }
}

struct Shared {
    inner: Mutex<Inner>,
    channel: SerialChannel,
    live: Arc<AtomicUsize>,
    closed: AtomicBool,
    sources: EffectSources,
    settings: LightSettings,
}

impl Shared {
    /// Queue a frame; caller holds the state lock
    fn emit(&self, frame: &Frame) {
        if let Err(e) = self.channel.send(frame) {
            tracing::warn!(error = %e, "light frame not delivered");
        }
    }

    fn is_mode(&self, mode: Mode) -> bool {
        self.inner.lock().state.mode == mode
    }

    /// Render and send one effect frame
    ///
    /// Returns `false` once `mode` is no longer current. Nothing is sent
    /// while power is off.
    fn render(&self, mode: Mode, render: impl FnOnce(&Inner) -> Option<Frame>) -> bool {
        let inner = self.inner.lock();
        if inner.state.mode != mode {
            return false;
        }
        if inner.state.powered {
            if let Some(frame) = render(&inner) {
                self.emit(&frame);
            }
        }
        true
    }

    fn power_off(&self) {
        let mut inner = self.inner.lock();
        inner.state.powered = false;
        if let Err(e) = self.channel.send_raw(Frame::OFF.encode().as_bytes()) {
            tracing::warn!(error = %e, "failed to switch lights off");
        }
    }
}

/// Decrements the live-effect counter when the effect task ends
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct RunningEffect {
    mode: Mode,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Power, brightness, color and the active effect of the LED strip
pub struct LightController {
    shared: Arc<Shared>,
    running: tokio::sync::Mutex<Option<RunningEffect>>,
}

impl std::fmt::Debug for LightController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightController")
            .field("state", &self.state())
            .field("channel", &self.shared.channel)
            .finish_non_exhaustive()
    }
}

impl LightController {
    /// Take ownership of the channel; starts static, white, full brightness, off
    #[must_use]
    pub fn new(channel: SerialChannel, sources: EffectSources, settings: LightSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                channel,
                live: Arc::new(AtomicUsize::new(0)),
                closed: AtomicBool::new(false),
                sources,
                settings,
            }),
            running: tokio::sync::Mutex::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> EffectState {
        self.shared.inner.lock().state.clone()
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.shared.inner.lock().state.mode
    }

    /// Number of effect tasks that have not exited yet
    #[must_use]
    pub fn live_effects(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    pub fn turn_on(&self) {
        let mut inner = self.shared.inner.lock();
        inner.state.powered = true;
        if inner.state.mode == Mode::Static {
            let frame = inner.solid();
            self.shared.emit(&frame);
        }
        tracing::info!(mode = %inner.state.mode, "lights on");
    }

    /// Switch off; "0,0,0" goes out immediately whatever the mode
    pub fn turn_off(&self) {
        self.shared.power_off();
        tracing::info!("lights off");
    }

    /// Set brightness, clamped to `0..=100`; returns the stored value
    pub fn set_brightness(&self, percent: i64) -> u8 {
        let value = u8::try_from(percent.clamp(0, 100)).unwrap_or(100);
        let mut inner = self.shared.inner.lock();
        inner.state.brightness = value;
        if inner.shows_static() {
            let frame = inner.solid();
            self.shared.emit(&frame);
        }
        tracing::debug!(brightness = value, "brightness set");
        value
    }

    /// Change brightness by `delta` percent points
    pub fn adjust_brightness(&self, delta: i64) -> u8 {
        let current = i64::from(self.shared.inner.lock().state.brightness);
        self.set_brightness(current.saturating_add(delta))
    }

    /// Set a plain color; effects pick it up on their next tick
    pub fn set_color(&self, color: Rgb) {
        let mut inner = self.shared.inner.lock();
        inner.state.color = color;
        inner.state.palette = None;
        inner.palette_primary = None;
        if inner.shows_static() {
            let frame = inner.solid();
            self.shared.emit(&frame);
        }
        tracing::debug!(%color, mode = %inner.state.mode, "color set");
    }

    /// Select a palette; its first color becomes the current color
    ///
    /// Returns `false` for an empty palette.
    pub fn set_palette(&self, name: &str, colors: &[Rgb]) -> bool {
        let Some(&primary) = colors.first() else {
            tracing::warn!(palette = name, "palette has no colors");
            return false;
        };
        let mut inner = self.shared.inner.lock();
        inner.state.color = primary;
        inner.state.palette = Some(name.to_string());
        inner.palette_primary = Some(primary);
        if inner.shows_static() {
            let frame = inner.solid();
            self.shared.emit(&frame);
        }
        tracing::debug!(palette = name, mode = %inner.state.mode, "palette set");
        true
    }

    /// Send explicit per-pixel colors (brightness applied); ignored while off
    pub fn show_pixels(&self, pixels: &[Rgb]) {
        let inner = self.shared.inner.lock();
        if !inner.state.powered {
            return;
        }
        let brightness = inner.state.brightness;
        let frame = Frame::Pixels(pixels.iter().map(|p| p.with_brightness(brightness)).collect());
        self.shared.emit(&frame);
    }

    /// Switch to `mode`
    ///
    /// Returns `false` if `mode` is already active. Otherwise the running
    /// effect is cancelled and joined before the new one starts.
    pub async fn start(&self, mode: Mode) -> bool {
        let mut slot = self.running.lock().await;
        if self.mode() == mode {
            tracing::debug!(%mode, "mode already active");
            return false;
        }
        self.stop_running(&mut slot).await;

        let repaint = {
            let mut inner = self.shared.inner.lock();
            inner.state.mode = mode;
            if inner.shows_static() {
                let frame = inner.solid();
                self.shared.emit(&frame);
            }
            mode == Mode::Static
        };

        if !repaint {
            *slot = Some(self.spawn_effect(mode));
        }
        tracing::info!(%mode, "light mode changed");
        true
    }

    /// Stop any effect and show the last solid color
    pub async fn set_static(&self) {
        let mut slot = self.running.lock().await;
        self.stop_running(&mut slot).await;
        let mut inner = self.shared.inner.lock();
        inner.state.mode = Mode::Static;
        if inner.state.powered {
            let frame = inner.solid();
            self.shared.emit(&frame);
        }
        tracing::info!("light mode static");
    }

    /// Wait until every frame queued so far has reached the port
    ///
    /// Blocks the calling thread; returns `false` on timeout.
    #[must_use]
    pub fn flush(&self, timeout: Duration) -> bool {
        self.shared.channel.flush(timeout)
    }

    /// Stop effects, switch off and release the port
    ///
    /// Returns once the "off" frame has been delivered (or the writer gave up).
    pub async fn shutdown(&self) {
        {
            let mut slot = self.running.lock().await;
            self.stop_running(&mut slot).await;
        }
        self.shared.inner.lock().state.mode = Mode::Static;
        self.shared.power_off();
        self.shared.channel.disconnect();
        self.shared.closed.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        match tokio::task::spawn_blocking(move || shared.channel.flush(SHUTDOWN_FLUSH)).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("serial writer still busy at shutdown"),
            Err(e) => tracing::warn!(error = %e, "serial flush panicked"),
        }
        tracing::info!("light controller shut down");
    }

    fn spawn_effect(&self, mode: Mode) -> RunningEffect {
        let cancel = CancellationToken::new();
        self.shared.live.fetch_add(1, Ordering::SeqCst);
        let guard = LiveGuard(Arc::clone(&self.shared.live));
        let handle = tokio::spawn(run_effect(
            Arc::clone(&self.shared),
            mode,
            cancel.clone(),
            guard,
        ));
        RunningEffect {
            mode,
            cancel,
            handle,
        }
    }

    async fn stop_running(&self, slot: &mut Option<RunningEffect>) {
        let Some(RunningEffect {
            mode,
            cancel,
            handle,
        }) = slot.take()
        else {
            return;
        };

        cancel.cancel();
        match tokio::time::timeout(self.shared.settings.join_timeout, handle).await {
            Ok(Ok(())) => tracing::debug!(%mode, "effect stopped"),
            Ok(Err(e)) => tracing::warn!(%mode, error = %e, "effect task ended abnormally"),
            Err(_) => tracing::warn!(%mode, "effect did not stop in time, abandoning join"),
        }
    }
}

impl Drop for LightController {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            self.shared.power_off();
            self.shared.channel.disconnect();
        }
    }
}

/// Wait for the next tick; `false` once cancelled
async fn next_tick(cancel: &CancellationToken, ticker: &mut Interval) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        _ = ticker.tick() => true,
    }
}

async fn run_effect(shared: Arc<Shared>, mode: Mode, cancel: CancellationToken, _live: LiveGuard) {
    let Some(period) = mode.period() else {
        return;
    };
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::debug!(%mode, "effect loop started");

    match mode {
        Mode::Static => {}
        Mode::Wave => {
            let mut wave = Wave::default();
            while next_tick(&cancel, &mut ticker).await
                && shared.render(mode, |inner| {
                    Some(wave.tick(inner.state.color, inner.state.brightness))
                })
            {}
        }
        Mode::Breathing => {
            let mut breathing = Breathing::default();
            while next_tick(&cancel, &mut ticker).await
                && shared.render(mode, |inner| {
                    let base = inner.palette_primary.unwrap_or(inner.state.color);
                    Some(breathing.tick(base, inner.state.brightness))
                })
            {}
        }
        Mode::MusicReactive => run_music(&shared, &cancel, &mut ticker).await,
        Mode::AmbientMonitor => run_ambient(&shared, &cancel, &mut ticker).await,
    }

    tracing::debug!(%mode, "effect loop exited");
}

async fn run_music(shared: &Arc<Shared>, cancel: &CancellationToken, ticker: &mut Interval) {
    let mode = Mode::MusicReactive;
    let music = MusicReactive::new(shared.settings.amplitude_ceiling);

    let source = match shared.sources.amplitude.clone() {
        None => {
            tracing::warn!("no audio amplitude source, music mode idle");
            None
        }
        Some(source) => {
            let starter = Arc::clone(&source);
            match tokio::task::spawn_blocking(move || starter.start()).await {
                Ok(Ok(())) => Some(source),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "audio capture unavailable, music mode idle");
                    None
                }
                Err(e) => {
                    tracing::warn!(error = %e, "audio capture start panicked, music mode idle");
                    None
                }
            }
        }
    };

    while next_tick(cancel, ticker).await {
        let level = source.as_ref().and_then(|s| s.level());
        let active = shared.render(mode, |inner| {
            level.map(|amp| music.frame(amp, inner.state.color, inner.state.brightness))
        });
        if !active {
            break;
        }
    }

    if let Some(source) = source {
        source.stop();
    }
}

async fn run_ambient(shared: &Arc<Shared>, cancel: &CancellationToken, ticker: &mut Interval) {
    let mode = Mode::AmbientMonitor;
    let Some(source) = shared.sources.screen.clone() else {
        tracing::warn!("no screen color source, ambient mode idle");
        while next_tick(cancel, ticker).await && shared.is_mode(mode) {}
        return;
    };

    let mut ambient = Ambient::default();
    while next_tick(cancel, ticker).await {
        let sampler = Arc::clone(&source);
        let sample = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            joined = tokio::task::spawn_blocking(move || sampler.sample()) => joined,
        };

        let failure = match sample {
            Ok(Ok(color)) => {
                if shared.render(mode, |inner| Some(ambient.tick(color, inner.state.brightness))) {
                    continue;
                }
                break;
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };

        if !shared.is_mode(mode) {
            break;
        }
        tracing::warn!(error = %failure, "screen sample failed, backing off");
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(shared.settings.ambient_backoff) => {}
        }
    }
}
