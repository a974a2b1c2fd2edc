//! chime-play: play one sound file through the engine
//!
//! Small driver for manual testing: resolves the file against the asset
//! root, plays it to completion (or forever with --loop), and prints the
//! position once a second.

use anyhow::{bail, Context};
use chime_audio::{AudioEngine, EngineConfig, Sound};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chime-play", about = "Play an Ogg Vorbis file")]
struct Args {
    /// Sound file, relative to the asset root
    sound: String,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Loop playback until interrupted
    #[arg(long = "loop")]
    looping: bool,

    /// Voice volume (0.0 to 1.0)
    #[arg(long, default_value_t = 1.0)]
    volume: f32,

    /// Output device name (overrides configuration)
    #[arg(long)]
    device: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if args.device.is_some() {
        config.device = args.device.clone();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    let engine = AudioEngine::start(&config).context("starting audio engine")?;

    let paths = config.media_paths()?;
    let path = paths.asset(&args.sound)?;

    let mut sound = Sound::open(&engine, &path).context("opening sound")?;
    sound.set_looping(args.looping);
    sound.set_volume(args.volume);

    let completed = Arc::new(AtomicBool::new(false));
    let completed_flag = Arc::clone(&completed);
    sound.set_on_complete(move || {
        completed_flag.store(true, Ordering::Release);
    });

    info!(
        "Playing {} ({} ms{})",
        path.display(),
        sound.duration_ms(),
        if args.looping { ", looping" } else { "" }
    );

    sound.play();
    if !sound.is_playing() {
        bail!("playback did not start (see log)");
    }

    while sound.is_playing() {
        std::thread::sleep(Duration::from_secs(1));
        info!("{} / {} ms", sound.position_ms(), sound.duration_ms());
    }

    if completed.load(Ordering::Acquire) {
        info!("Playback complete");
    }

    Ok(())
}
