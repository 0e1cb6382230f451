use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use domovoy::extract::extract;
use domovoy::light::{
    AmplitudeSource, EffectSources, LightController, Rgb, SerialChannel, SerialPortOpener,
};
use domovoy::resolver::Resolver;
use domovoy::voice::AmplitudeMeter;
use domovoy::{Config, Daemon, Lexicon};

/// Domovoy - Russian voice assistant for music, LED lighting and the desktop
#[derive(Parser)]
#[command(name = "domovoy", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (defaults to ~/.config/domovoy/config.toml)
    #[arg(short, long, env = "DOMOVOY_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for utterances on stdin (default)
    Run,
    /// Show how an utterance is understood
    Resolve {
        /// Utterance to resolve
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Validate the lexicon and show its size
    Lexicon {
        /// Print the lexicon as JSON
        #[arg(long)]
        dump: bool,
    },
    /// Cycle a few colors on the LED strip
    TestLight {
        /// Serial port overriding the configured one
        #[arg(short, long)]
        port: Option<String>,
    },
    /// Show the microphone level
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,domovoy=info",
        1 => "info,domovoy=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load_with_options(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let daemon = Daemon::new(config).await?;
            tracing::info!("domovoy ready");
            daemon.run().await?;
            Ok(())
        }
        Command::Resolve { text } => resolve(&config, &text.join(" ")),
        Command::Lexicon { dump } => show_lexicon(&config, dump),
        Command::TestLight { port } => test_light(config, port).await,
        Command::TestMic { seconds } => test_mic(seconds).await,
    }
}

fn load_lexicon(config: &Config) -> anyhow::Result<Lexicon> {
    let lexicon = match &config.lexicon_path {
        Some(path) => Lexicon::load(path)
            .with_context(|| format!("failed to load lexicon {}", path.display()))?,
        None => Lexicon::embedded()?,
    };
    Ok(lexicon)
}

/// Print the resolution and extracted parameters as JSON
fn resolve(config: &Config, text: &str) -> anyhow::Result<()> {
    let lexicon = load_lexicon(config)?;
    let resolution = Resolver::new(config.resolver).resolve(text, &lexicon);
    let parameters = resolution
        .command
        .as_ref()
        .map(|command| extract(text, command, &lexicon));

    let output = serde_json::json!({
        "utterance": text,
        "resolution": resolution,
        "parameters": parameters,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn show_lexicon(config: &Config, dump: bool) -> anyhow::Result<()> {
    let lexicon = load_lexicon(config)?;
    if dump {
        println!("{}", serde_json::to_string_pretty(&lexicon.to_file())?);
        return Ok(());
    }

    let summary = lexicon.summary();
    println!("Lexicon OK");
    println!("  actions:            {} ({} objects)", summary.actions, summary.action_objects);
    println!("  parameter commands: {}", summary.parameter_commands);
    println!("  direct commands:    {}", summary.direct_commands);
    println!("  colors:             {}", summary.colors);
    println!("  palettes:           {}", summary.palettes);
    Ok(())
}

/// Power on, cycle colors, show a rainbow, power off
async fn test_light(config: Config, port: Option<String>) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.serial.port);
    println!("Testing LED strip on {port}...");

    let opener = SerialPortOpener::new(port, config.serial.baud)
        .with_timeout(config.serial.timeout)
        .with_settle(config.serial.settle);
    let settings = config.light.channel;
    let channel = SerialChannel::new(opener, settings)?;
    tokio::task::block_in_place(|| channel.ensure_connected()).context("controller not reachable")?;

    let light = LightController::new(channel, EffectSources::default(), config.light.effects);
    light.turn_on();

    let colors = [
        ("red", Rgb::new(255, 0, 0)),
        ("green", Rgb::new(0, 255, 0)),
        ("blue", Rgb::new(0, 0, 255)),
        ("white", Rgb::WHITE),
    ];
    for (name, color) in colors {
        println!("  {name}");
        light.set_color(color);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    println!("  rainbow");
    light.show_pixels(&rainbow(30));
    tokio::time::sleep(Duration::from_secs(2)).await;

    light.shutdown().await;
    println!("Done. The strip should now be dark.");
    Ok(())
}

/// `count` pixels spread around the color wheel
fn rainbow(count: usize) -> Vec<Rgb> {
    (0..count)
        .map(|i| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let pos = ((i * 255) / count.max(1)) as u8;
            match pos {
                0..=84 => Rgb::new(255 - pos * 3, pos * 3, 0),
                85..=169 => {
                    let p = pos - 85;
                    Rgb::new(0, 255 - p * 3, p * 3)
                }
                _ => {
                    let p = pos - 170;
                    Rgb::new(p * 3, 0, 255 - p * 3)
                }
            }
        })
        .collect()
}

/// Print the rolling microphone level once a second
async fn test_mic(seconds: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {seconds} seconds...");
    println!("Speak or play music near the microphone!\n");

    let meter = AmplitudeMeter::new();
    tokio::task::block_in_place(|| meter.start())?;

    for i in 0..seconds {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let level = meter.level().unwrap_or(0.0);
        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (level / 200.0).min(50.0) as usize;
        let bar: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);
        println!("[{:2}s] level: {level:8.1} | [{bar}]", i + 1);
    }

    meter.stop();

    println!("\n---");
    println!("If the level moved, music mode will react to sound.");
    println!("If it stayed at 0, check the default input device.");
    Ok(())
}
