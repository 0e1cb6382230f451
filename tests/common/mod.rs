//! Shared test utilities
#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use domovoy::light::serial::Connection;
use domovoy::light::{
    AmplitudeSource, ChannelSettings, EffectSources, LightController, LightSettings, PortOpener,
    Rgb, ScreenColorSource, SerialChannel,
};
use domovoy::music::MusicDomain;
use domovoy::speech::Speaker;
use domovoy::system::SystemDomain;
use domovoy::{Error, Lexicon, Result};

/// Small lexicon covering every category
pub const TEST_LEXICON: &str = r#"{
    "action_patterns": {
        "включи": {"свет": "light_on", "музыку": "play", "волну": "wave_effect", "плейлист": "switch_playlist"},
        "выключи": {"свет": "light_off"},
        "сделай": {"ярче": "brightness_up", "громче": "volume_up"}
    },
    "parameter_commands": {"громкость": "set_volume", "яркость": "set_brightness"},
    "direct_commands": {"пауза": "pause", "дальше": "next", "повтори": "repeat", "найди": "search", "дыхание": "breathing_effect"},
    "colors": {
        "красный": {"command": "set_color_red", "rgb": [255, 0, 0]},
        "синий": {"command": "set_color_blue", "rgb": [0, 0, 255]}
    },
    "palettes": {
        "холодная": {"command": "set_palette_cold", "colors": [[200, 230, 255], [170, 210, 255]]}
    }
}"#;

#[must_use]
pub fn test_lexicon() -> Lexicon {
    Lexicon::from_json(TEST_LEXICON).expect("test lexicon parses")
}

#[must_use]
pub fn default_lexicon() -> Lexicon {
    Lexicon::embedded().expect("embedded lexicon parses")
}

/// Serial opener that records every write as a string
#[derive(Clone, Default)]
pub struct RecordingOpener {
    pub writes: Arc<Mutex<Vec<String>>>,
    pub opens: Arc<AtomicUsize>,
    pub fail_writes: Arc<AtomicBool>,
    /// Slows every open down, like a board resetting on DTR
    pub open_delay: Arc<Mutex<Option<Duration>>>,
}

impl RecordingOpener {
    /// Everything written so far
    #[must_use]
    pub fn frames(&self) -> Vec<String> {
        self.writes.lock().clone()
    }

    pub fn clear(&self) {
        self.writes.lock().clear();
    }

    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.writes.lock().last().cloned()
    }
}

struct RecordingPort(RecordingOpener);

impl Write for RecordingPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.0.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        }
        self.0
            .writes
            .lock()
            .push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl PortOpener for RecordingOpener {
    fn open(&self) -> Result<Connection> {
        if let Some(delay) = *self.open_delay.lock() {
            std::thread::sleep(delay);
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingPort(self.clone())))
    }

    fn describe(&self) -> String {
        "recording".into()
    }
}

/// Fast settings for tests
#[must_use]
pub fn quick_settings() -> LightSettings {
    LightSettings {
        join_timeout: Duration::from_secs(1),
        ambient_backoff: Duration::from_millis(20),
        amplitude_ceiling: 10_000.0,
    }
}

/// Controller over a recording port; the forced-off frames are cleared
#[must_use]
pub fn light_controller(sources: EffectSources) -> (Arc<LightController>, RecordingOpener) {
    let opener = RecordingOpener::default();
    let channel = SerialChannel::new(
        opener.clone(),
        ChannelSettings {
            off_repeats: 3,
            off_spacing: Duration::ZERO,
        },
    )
    .expect("serial writer starts");
    assert!(channel.flush(DELIVERY_WAIT), "forced off not delivered");
    opener.clear();
    let light = Arc::new(LightController::new(channel, sources, quick_settings()));
    (light, opener)
}

/// How long tests wait for queued frames to reach the port
pub const DELIVERY_WAIT: Duration = Duration::from_secs(2);

/// Block until every frame queued so far has been written
pub fn delivered(light: &LightController) {
    assert!(light.flush(DELIVERY_WAIT), "serial writer stalled");
}

/// Parse an "R,G,B\n" frame
#[must_use]
pub fn parse_solid(frame: &str) -> Option<Rgb> {
    let mut parts = frame.trim_end().split(',').map(str::parse::<u8>);
    let r = parts.next()?.ok()?;
    let g = parts.next()?.ok()?;
    let b = parts.next()?.ok()?;
    parts.next().is_none().then_some(Rgb::new(r, g, b))
}

/// Amplitude source returning a fixed level
pub struct FixedAmplitude {
    pub level: Option<f32>,
    pub started: AtomicBool,
    pub refuse: bool,
}

impl FixedAmplitude {
    #[must_use]
    pub fn new(level: Option<f32>) -> Self {
        Self {
            level,
            started: AtomicBool::new(false),
            refuse: false,
        }
    }
}

impl AmplitudeSource for FixedAmplitude {
    fn start(&self) -> Result<()> {
        if self.refuse {
            return Err(Error::Audio("no input device".into()));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    fn level(&self) -> Option<f32> {
        self.level
    }
}

/// Screen source returning a fixed color, or failing
pub struct FixedScreen {
    pub color: Option<Rgb>,
    pub samples: AtomicUsize,
}

impl FixedScreen {
    #[must_use]
    pub fn new(color: Option<Rgb>) -> Self {
        Self {
            color,
            samples: AtomicUsize::new(0),
        }
    }
}

impl ScreenColorSource for FixedScreen {
    fn sample(&self) -> Result<Rgb> {
        self.samples.fetch_add(1, Ordering::SeqCst);
        self.color
            .ok_or_else(|| Error::Screen("capture failed".into()))
    }
}

/// Music domain recording its calls
#[derive(Default)]
pub struct MockMusic {
    pub calls: Mutex<Vec<String>>,
    pub volume: Mutex<u8>,
    pub repeat: AtomicBool,
    pub playing: AtomicBool,
    pub fail_play: AtomicBool,
    pub panic_next: AtomicBool,
    /// Slows every call down to expose ordering
    pub delay: Mutex<Option<Duration>>,
}

impl MockMusic {
    #[must_use]
    pub fn new() -> Self {
        Self {
            volume: Mutex::new(50),
            ..Self::default()
        }
    }

    fn record(&self, call: impl Into<String>) {
        if let Some(delay) = *self.delay.lock() {
            std::thread::sleep(delay);
        }
        self.calls.lock().push(call.into());
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl MusicDomain for MockMusic {
    fn play(&self) -> Result<()> {
        self.record("play");
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(Error::Music("playlist is empty".into()));
        }
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.record("pause");
        self.playing.store(false, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.record("resume");
        self.playing.store(true, Ordering::SeqCst);
    }

    fn next(&self) -> Result<()> {
        if self.panic_next.load(Ordering::SeqCst) {
            panic!("decoder exploded");
        }
        self.record("next");
        Ok(())
    }

    fn previous(&self) -> Result<()> {
        self.record("previous");
        Ok(())
    }

    fn volume(&self) -> u8 {
        *self.volume.lock()
    }

    fn set_volume(&self, percent: i64) -> u8 {
        let value = u8::try_from(percent.clamp(0, 100)).unwrap_or(100);
        *self.volume.lock() = value;
        self.record(format!("volume {value}"));
        value
    }

    fn toggle_repeat(&self) -> bool {
        let on = !self.repeat.fetch_xor(true, Ordering::SeqCst);
        self.record(format!("repeat {on}"));
        on
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn switch_playlist(&self, name: &str) -> Result<String> {
        self.record(format!("switch {name}"));
        Ok(name.to_string())
    }

    fn create_playlist(&self, name: &str) -> Result<()> {
        self.record(format!("create {name}"));
        Ok(())
    }
}

/// System domain recording its calls
#[derive(Default)]
pub struct MockSystem {
    pub calls: Mutex<Vec<String>>,
}

impl MockSystem {
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl SystemDomain for MockSystem {
    fn open_browser(&self) -> Result<()> {
        self.calls.lock().push("browser".into());
        Ok(())
    }

    fn search(&self, query: &str) -> Result<()> {
        self.calls.lock().push(format!("search {query}"));
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.calls.lock().push("shutdown".into());
        Ok(())
    }
}

/// Speaker keeping every reply
#[derive(Default)]
pub struct RecordingSpeaker {
    pub replies: Mutex<Vec<String>>,
    /// Time each reply takes to say
    pub delay: Mutex<Option<Duration>>,
}

impl RecordingSpeaker {
    #[must_use]
    pub fn replies(&self) -> Vec<String> {
        self.replies.lock().clone()
    }
}

impl Speaker for RecordingSpeaker {
    fn speak(&self, text: &str) -> Result<()> {
        if let Some(delay) = *self.delay.lock() {
            std::thread::sleep(delay);
        }
        self.replies.lock().push(text.to_string());
        Ok(())
    }
}
