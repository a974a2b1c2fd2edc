//! # Chime Audio (chime-audio)
//!
//! Streaming voice engine for games: a fixed pool of 24 voice slots, each
//! fed by a worker thread that pull-decodes Ogg Vorbis into a small ring
//! of PCM wave buffers and hands them to a mixer.
//!
//! **Architecture:** symphonia decode sessions behind a [`PcmSource`]
//! trait, per-voice fill workers synchronized through a shared coalescing
//! drain event, and a software mixer feeding a cpal output stream through
//! a lock-free ring.
//!
//! ```no_run
//! use chime_audio::{AudioEngine, EngineConfig, Sound};
//!
//! # fn main() -> chime_audio::Result<()> {
//! let engine = AudioEngine::start(&EngineConfig::default())?;
//! let mut bgm = Sound::open(&engine, "assets/music.ogg")?;
//! bgm.set_looping(true);
//! bgm.play();
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod storage;

pub use audio::{PcmSource, SourceFactory, StreamSpec};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use playback::{AudioEngine, DrainEvent, Sound, VoiceMixer};
pub use storage::MediaPaths;
