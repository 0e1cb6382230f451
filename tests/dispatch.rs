//! Dispatcher and daemon behaviour with recording collaborators

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use domovoy::daemon::{Components, Daemon};
use domovoy::dispatch::{FAILURE_REPLY, HomeContext, NOT_HEARD_REPLY, Steps};
use domovoy::light::{EffectSources, LightController, Mode, Rgb};
use domovoy::speech::{POSITIVE_REPLIES, Responses};
use domovoy::{CommandKey, Config, Dispatcher, Parameters};

mod common;

use common::{MockMusic, MockSystem, RecordingOpener, RecordingSpeaker, delivered, light_controller};

struct Harness {
    dispatcher: Dispatcher,
    light: Arc<LightController>,
    port: RecordingOpener,
    music: Arc<MockMusic>,
    system: Arc<MockSystem>,
    speaker: Arc<RecordingSpeaker>,
}

fn harness(capacity: usize) -> Harness {
    let (light, port) = light_controller(EffectSources::default());
    let music = Arc::new(MockMusic::new());
    let system = Arc::new(MockSystem::default());
    let speaker = Arc::new(RecordingSpeaker::default());

    let ctx = HomeContext {
        lexicon: Arc::new(common::test_lexicon()),
        light: Arc::clone(&light),
        music: music.clone(),
        system: system.clone(),
        speaker: speaker.clone(),
        responses: Responses::default(),
        steps: Steps::default(),
        default_playlist: "всякое".to_string(),
    };

    Harness {
        dispatcher: Dispatcher::spawn(ctx, capacity),
        light,
        port,
        music,
        system,
        speaker,
    }
}

fn is_positive(reply: &str) -> bool {
    POSITIVE_REPLIES.contains(&reply)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_music_commands_run_in_order() {
    let h = harness(16);
    *h.music.delay.lock() = Some(Duration::from_millis(10));

    let commands = [
        (CommandKey::Play, Parameters::default()),
        (CommandKey::SetVolume, Parameters::with_value(30)),
        (CommandKey::VolumeUp, Parameters::default()),
        (CommandKey::VolumeDown, Parameters::with_value(25)),
        (CommandKey::Repeat, Parameters::default()),
        (CommandKey::Next, Parameters::default()),
    ];
    for (command, params) in commands {
        assert!(h.dispatcher.dispatch(command, params).await);
    }
    h.dispatcher.shutdown().await;

    assert_eq!(
        h.music.calls(),
        ["play", "volume 30", "volume 40", "volume 15", "repeat true", "next"]
    );
    let replies = h.speaker.replies();
    assert_eq!(replies.len(), 6);
    assert!(is_positive(&replies[0]));
    assert_eq!(&replies[1..5], ["громкость 30", "громкость 40", "громкость 15", "повтор включен"]);
    assert!(is_positive(&replies[5]));
}

#[tokio::test]
async fn test_missing_parameters_use_defaults() {
    let h = harness(16);
    h.light.set_brightness(40);

    h.dispatcher.dispatch(CommandKey::SetVolume, Parameters::default()).await;
    h.dispatcher.dispatch(CommandKey::SwitchPlaylist, Parameters::default()).await;
    h.dispatcher.dispatch(CommandKey::CreatePlaylist, Parameters::default()).await;
    h.dispatcher.dispatch(CommandKey::SetBrightness, Parameters::default()).await;
    h.dispatcher.dispatch(CommandKey::Search, Parameters::default()).await;
    h.dispatcher.shutdown().await;

    assert_eq!(h.music.calls(), ["volume 50", "switch всякое"]);
    assert_eq!(h.light.state().brightness, 40);
    assert!(h.system.calls().is_empty());

    let replies = h.speaker.replies();
    assert!(replies.contains(&NOT_HEARD_REPLY.to_string()));
    assert!(replies.contains(&"что найти?".to_string()));
    assert!(replies.contains(&"включаю плейлист всякое".to_string()));
}

#[tokio::test]
async fn test_system_commands() {
    let h = harness(16);
    let search = Parameters {
        query: Some("погода".into()),
        ..Parameters::default()
    };
    h.dispatcher.dispatch(CommandKey::Browser, Parameters::default()).await;
    h.dispatcher.dispatch(CommandKey::Search, search).await;
    h.dispatcher.dispatch(CommandKey::Shutdown, Parameters::default()).await;
    h.dispatcher.shutdown().await;

    assert_eq!(h.system.calls(), ["browser", "search погода", "shutdown"]);
}

#[tokio::test]
async fn test_unknown_key_has_no_effect() {
    let h = harness(16);
    assert!(!h.dispatcher.dispatch_key("make_coffee", Parameters::default()).await);
    assert!(!h.dispatcher.dispatch_key("set_color_", Parameters::default()).await);
    h.dispatcher.shutdown().await;

    assert!(h.music.calls().is_empty());
    assert!(h.system.calls().is_empty());
    assert!(h.speaker.replies().is_empty());
    delivered(&h.light);
    assert!(h.port.frames().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failures_are_contained() {
    let h = harness(16);
    h.music.fail_play.store(true, Ordering::SeqCst);
    h.music.panic_next.store(true, Ordering::SeqCst);

    h.dispatcher.dispatch(CommandKey::Play, Parameters::default()).await;
    h.dispatcher.dispatch(CommandKey::Next, Parameters::default()).await;
    h.dispatcher.dispatch(CommandKey::Pause, Parameters::default()).await;
    h.dispatcher.shutdown().await;

    // the panicking action is dropped, the worker carries on
    assert_eq!(h.music.calls(), ["play", "pause"]);
    let replies = h.speaker.replies();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0], FAILURE_REPLY);
    assert!(is_positive(&replies[1]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_light_commands() {
    let h = harness(16);

    assert!(h.dispatcher.dispatch_key("set_color_red", Parameters::default()).await);
    h.dispatcher.dispatch(CommandKey::LightOn, Parameters::default()).await;
    h.dispatcher.dispatch(CommandKey::BrightnessDown, Parameters::with_value(30)).await;
    h.dispatcher.dispatch(CommandKey::SetPalette("cold".into()), Parameters::default()).await;
    h.dispatcher.dispatch(CommandKey::SetColor("purple".into()), Parameters::default()).await;
    h.dispatcher.shutdown().await;

    let state = h.light.state();
    assert!(state.powered);
    assert_eq!(state.brightness, 70);
    assert_eq!(state.palette.as_deref(), Some("холодная"));
    assert_eq!(state.color, Rgb::new(200, 230, 255));

    let replies = h.speaker.replies();
    assert_eq!(replies[2], "яркость 70");
    // purple is not in the test lexicon
    assert_eq!(replies.last().map(String::as_str), Some(FAILURE_REPLY));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_effect_commands_power_on() {
    let h = harness(16);
    let blue = Parameters {
        color: Some(Rgb::new(0, 0, 255)),
        ..Parameters::default()
    };

    h.dispatcher.dispatch(CommandKey::WaveEffect, blue).await;
    h.dispatcher.dispatch(CommandKey::WaveEffect, Parameters::default()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.light.mode(), Mode::Wave);
    assert!(h.light.state().powered);
    assert_eq!(h.light.state().color, Rgb::new(0, 0, 255));
    assert_eq!(h.light.live_effects(), 1);

    h.dispatcher.dispatch(CommandKey::StaticMode, Parameters::default()).await;
    h.dispatcher.dispatch(CommandKey::LightOff, Parameters::default()).await;
    h.dispatcher.shutdown().await;

    assert_eq!(h.light.mode(), Mode::Static);
    assert_eq!(h.light.live_effects(), 0);
    delivered(&h.light);
    assert_eq!(h.port.last().as_deref(), Some("0,0,0\n"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_domains_do_not_block_each_other() {
    let h = harness(16);
    *h.music.delay.lock() = Some(Duration::from_millis(400));

    h.dispatcher.dispatch(CommandKey::Play, Parameters::default()).await;
    h.dispatcher.dispatch(CommandKey::LightOn, Parameters::default()).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(h.light.state().powered);
    assert!(h.music.calls().is_empty());

    h.dispatcher.shutdown().await;
    assert_eq!(h.music.calls(), ["play"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_reply_does_not_delay_next_command() {
    let h = harness(16);
    *h.speaker.delay.lock() = Some(Duration::from_millis(400));

    h.dispatcher.dispatch(CommandKey::LightOn, Parameters::default()).await;
    h.dispatcher.dispatch(CommandKey::BrightnessDown, Parameters::with_value(30)).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(h.light.state().powered);
    assert_eq!(h.light.state().brightness, 70);
    assert!(h.speaker.replies().is_empty());

    h.dispatcher.shutdown().await;
    let replies = h.speaker.replies();
    assert_eq!(replies.len(), 2);
    assert!(is_positive(&replies[0]));
    assert_eq!(replies[1], "яркость 70");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_queue_applies_backpressure() {
    let h = harness(1);
    *h.music.delay.lock() = Some(Duration::from_millis(20));

    for _ in 0..5 {
        assert!(h.dispatcher.dispatch(CommandKey::Next, Parameters::default()).await);
    }
    h.dispatcher.shutdown().await;
    assert_eq!(h.music.calls().len(), 5);
}

#[tokio::test]
async fn test_dispatch_after_shutdown() {
    let h = harness(16);
    h.dispatcher.shutdown().await;
    assert!(!h.dispatcher.dispatch(CommandKey::Pause, Parameters::default()).await);
    assert!(h.music.calls().is_empty());
}

fn daemon(config: &Config) -> (Daemon, Arc<MockMusic>, Arc<RecordingSpeaker>) {
    let (light, _port) = light_controller(EffectSources::default());
    let music = Arc::new(MockMusic::new());
    let speaker = Arc::new(RecordingSpeaker::default());
    let components = Components {
        lexicon: Arc::new(common::default_lexicon()),
        light,
        music: music.clone(),
        system: Arc::new(MockSystem::default()),
        speaker: speaker.clone(),
    };
    (Daemon::from_components(config, components), music, speaker)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_daemon_understands_utterances() {
    let (daemon, music, _speaker) = daemon(&Config::default());

    assert_eq!(
        daemon.hear("Геля, включи синий свет").await,
        Some(CommandKey::LightOn)
    );
    assert_eq!(daemon.handle_utterance("громкость 35").await, Some(CommandKey::SetVolume));
    assert_eq!(daemon.handle_utterance("абракадабра").await, None);
    daemon.shutdown().await;

    assert_eq!(daemon.light().state().color, Rgb::new(0, 0, 255));
    assert_eq!(music.calls(), ["volume 35"]);
}

#[tokio::test]
async fn test_daemon_ignores_quick_repeats() {
    let (daemon, music, _speaker) = daemon(&Config::default());

    assert_eq!(daemon.handle_utterance("дальше").await, Some(CommandKey::Next));
    assert_eq!(daemon.handle_utterance("Дальше!").await, None);
    assert_eq!(daemon.handle_utterance("пауза").await, Some(CommandKey::Pause));
    daemon.shutdown().await;

    assert_eq!(music.calls(), ["next", "pause"]);
}

#[tokio::test]
async fn test_daemon_wake_word_required() {
    let mut config = Config::default();
    config.wake.required = true;
    let (daemon, music, speaker) = daemon(&config);

    assert_eq!(daemon.hear("пауза").await, None);
    assert_eq!(daemon.hear("геля").await, None);
    assert_eq!(daemon.hear("ангелина пауза").await, Some(CommandKey::Pause));
    daemon.shutdown().await;

    assert_eq!(music.calls(), ["pause"]);
    assert_eq!(speaker.replies().first().map(String::as_str), Some("слушаю"));
}

#[test]
fn test_dispatcher_on_current_thread_runtime() {
    tokio_test::block_on(async {
        let h = harness(2);
        let params = Parameters {
            playlist: Some("джаз".into()),
            ..Parameters::default()
        };
        assert!(h.dispatcher.dispatch(CommandKey::CreatePlaylist, params).await);
        assert!(h.dispatcher.dispatch(CommandKey::Repeat, Parameters::default()).await);
        h.dispatcher.shutdown().await;

        assert_eq!(h.music.calls(), ["create джаз", "repeat true"]);
        assert_eq!(h.speaker.replies(), ["плейлист джаз создан", "повтор включен"]);
    });
}
