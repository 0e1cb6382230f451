//! What each command does
//!
//! One function per domain with an exhaustive match over its keys. Each
//! returns the reply to speak.

use crate::extract::Parameters;
use crate::lexicon::CommandKey;
use crate::light::{Mode, Rgb};
use crate::{Error, Result};

use super::HomeContext;

/// Spoken when an action fails
pub const FAILURE_REPLY: &str = "не получилось";

/// Spoken when a value was expected but none was heard
pub const NOT_HEARD_REPLY: &str = "не расслышала";

const DEFAULT_VOLUME: i64 = 50;

fn wrong_domain(command: &CommandKey) -> Error {
    Error::System(format!("{command} routed to the wrong domain"))
}

pub fn music(ctx: &HomeContext, command: &CommandKey, params: &Parameters) -> Result<String> {
    let music = &ctx.music;
    let reply = match command {
        CommandKey::Play => {
            music.play()?;
            ctx.responses.positive().to_string()
        }
        CommandKey::Pause => {
            music.pause();
            ctx.responses.positive().to_string()
        }
        CommandKey::Resume => {
            music.resume();
            ctx.responses.positive().to_string()
        }
        CommandKey::Next => {
            music.next()?;
            ctx.responses.positive().to_string()
        }
        CommandKey::Previous => {
            music.previous()?;
            ctx.responses.positive().to_string()
        }
        CommandKey::VolumeUp | CommandKey::VolumeDown => {
            let step = params.value.unwrap_or(ctx.steps.volume).abs();
            let delta = if *command == CommandKey::VolumeUp { step } else { -step };
            let volume = music.set_volume(i64::from(music.volume()).saturating_add(delta));
            format!("громкость {volume}")
        }
        CommandKey::SetVolume => {
            let volume = music.set_volume(params.value.unwrap_or(DEFAULT_VOLUME));
            format!("громкость {volume}")
        }
        CommandKey::Repeat => {
            if music.toggle_repeat() {
                "повтор включен".to_string()
            } else {
                "повтор выключен".to_string()
            }
        }
        CommandKey::CreatePlaylist => match params.playlist.as_deref() {
            Some(name) => {
                music.create_playlist(name)?;
                format!("плейлист {name} создан")
            }
            None => "как назвать плейлист?".to_string(),
        },
        CommandKey::SwitchPlaylist => {
            let requested = params.playlist.as_deref().unwrap_or(&ctx.default_playlist);
            let chosen = music.switch_playlist(requested)?;
            format!("включаю плейлист {chosen}")
        }
        CommandKey::Browser
        | CommandKey::Search
        | CommandKey::Shutdown
        | CommandKey::LightOn
        | CommandKey::LightOff
        | CommandKey::BrightnessUp
        | CommandKey::BrightnessDown
        | CommandKey::SetBrightness
        | CommandKey::MusicMode
        | CommandKey::WaveEffect
        | CommandKey::BreathingEffect
        | CommandKey::MonitorMode
        | CommandKey::StaticMode
        | CommandKey::SetColor(_)
        | CommandKey::SetPalette(_) => return Err(wrong_domain(command)),
    };
    Ok(reply)
}

pub fn system(ctx: &HomeContext, command: &CommandKey, params: &Parameters) -> Result<String> {
    let reply = match command {
        CommandKey::Browser => {
            ctx.system.open_browser()?;
            ctx.responses.positive().to_string()
        }
        CommandKey::Search => match params.query.as_deref() {
            Some(query) => {
                ctx.system.search(query)?;
                format!("ищу {query}")
            }
            None => "что найти?".to_string(),
        },
        CommandKey::Shutdown => {
            ctx.system.shutdown()?;
            "выключаю компьютер".to_string()
        }
        CommandKey::Play
        | CommandKey::Pause
        | CommandKey::Resume
        | CommandKey::Next
        | CommandKey::Previous
        | CommandKey::VolumeUp
        | CommandKey::VolumeDown
        | CommandKey::SetVolume
        | CommandKey::Repeat
        | CommandKey::CreatePlaylist
        | CommandKey::SwitchPlaylist
        | CommandKey::LightOn
        | CommandKey::LightOff
        | CommandKey::BrightnessUp
        | CommandKey::BrightnessDown
        | CommandKey::SetBrightness
        | CommandKey::MusicMode
        | CommandKey::WaveEffect
        | CommandKey::BreathingEffect
        | CommandKey::MonitorMode
        | CommandKey::StaticMode
        | CommandKey::SetColor(_)
        | CommandKey::SetPalette(_) => return Err(wrong_domain(command)),
    };
    Ok(reply)
}

pub async fn light(ctx: &HomeContext, command: &CommandKey, params: &Parameters) -> Result<String> {
    let light = &ctx.light;
    let reply = match command {
        CommandKey::LightOn => {
            if let Some(color) = params.color {
                light.set_color(color);
            }
            light.turn_on();
            ctx.responses.positive().to_string()
        }
        CommandKey::LightOff => {
            light.turn_off();
            ctx.responses.positive().to_string()
        }
        CommandKey::BrightnessUp | CommandKey::BrightnessDown => {
            let step = params.value.unwrap_or(ctx.steps.brightness).abs();
            let delta = if *command == CommandKey::BrightnessUp { step } else { -step };
            let brightness = light.adjust_brightness(delta);
            format!("яркость {brightness}")
        }
        CommandKey::SetBrightness => match params.value {
            Some(value) => format!("яркость {}", light.set_brightness(value)),
            None => NOT_HEARD_REPLY.to_string(),
        },
        CommandKey::MusicMode => start_effect(ctx, Mode::MusicReactive, None).await,
        CommandKey::WaveEffect => start_effect(ctx, Mode::Wave, params.color).await,
        CommandKey::BreathingEffect => start_effect(ctx, Mode::Breathing, params.color).await,
        CommandKey::MonitorMode => start_effect(ctx, Mode::AmbientMonitor, None).await,
        CommandKey::StaticMode => {
            if let Some(color) = params.color {
                light.set_color(color);
            }
            light.set_static().await;
            if !light.state().powered {
                light.turn_on();
            }
            ctx.responses.positive().to_string()
        }
        CommandKey::SetColor(_) => {
            let color = ctx
                .lexicon
                .color(command)
                .ok_or_else(|| Error::Lexicon(format!("no color for {command}")))?;
            light.set_color(color.rgb);
            ctx.responses.positive().to_string()
        }
        CommandKey::SetPalette(_) => {
            let palette = ctx
                .lexicon
                .palette(command)
                .ok_or_else(|| Error::Lexicon(format!("no palette for {command}")))?;
            light.set_palette(&palette.name, &palette.colors);
            ctx.responses.positive().to_string()
        }
        CommandKey::Play
        | CommandKey::Pause
        | CommandKey::Resume
        | CommandKey::Next
        | CommandKey::Previous
        | CommandKey::VolumeUp
        | CommandKey::VolumeDown
        | CommandKey::SetVolume
        | CommandKey::Repeat
        | CommandKey::CreatePlaylist
        | CommandKey::SwitchPlaylist
        | CommandKey::Browser
        | CommandKey::Search
        | CommandKey::Shutdown => return Err(wrong_domain(command)),
    };
    Ok(reply)
}

/// Switch to an effect and make sure the strip is lit
async fn start_effect(ctx: &HomeContext, mode: Mode, color: Option<Rgb>) -> String {
    if let Some(color) = color {
        ctx.light.set_color(color);
    }
    if !ctx.light.start(mode).await {
        tracing::debug!(%mode, "effect already running");
    }
    if !ctx.light.state().powered {
        ctx.light.turn_on();
    }
    ctx.responses.positive().to_string()
}
