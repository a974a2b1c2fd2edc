//! Voice playback: slot arena, wave buffers, fill workers, mixer boundary

pub mod engine;
pub mod event;
mod fill;
pub mod mixer;
pub mod slots;
pub mod software_mixer;
pub mod sound;
pub mod wave;

pub use engine::AudioEngine;
pub use event::DrainEvent;
pub use mixer::VoiceMixer;
pub use slots::NUM_VOICES;
pub use software_mixer::SoftwareMixer;
pub use sound::Sound;
pub use wave::{QueuedWave, WAVE_COUNT, WAVE_FREE, WAVE_IN_FLIGHT, WAVE_WINDOW_MS};
