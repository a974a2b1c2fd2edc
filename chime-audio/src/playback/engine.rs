//! Audio engine
//!
//! Owns the voice slot arena, the shared drain event, and the mixer
//! boundary. Sounds hold an `Arc<AudioEngine>` and go through it for every
//! slot and mixer interaction; nothing in the engine is global.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::playback::event::DrainEvent;
use crate::playback::mixer::VoiceMixer;
use crate::playback::slots::SlotPool;
use crate::playback::software_mixer::SoftwareMixer;
use std::sync::Arc;
use tracing::info;

/// The voice engine: slot arena + drain event + mixer.
pub struct AudioEngine {
    slots: Arc<SlotPool>,
    event: Arc<DrainEvent>,
    mixer: Arc<dyn VoiceMixer>,
}

impl AudioEngine {
    /// Start the engine against the default software mixer and the
    /// configured output device.
    pub fn start(config: &EngineConfig) -> Result<Arc<Self>> {
        let event = Arc::new(DrainEvent::new());
        let mixer = SoftwareMixer::start(
            Arc::clone(&event),
            config.device.clone(),
            config.master_volume,
        )?;

        info!("Audio engine started");
        Ok(Self::with_mixer(Arc::new(mixer), event))
    }

    /// Assemble an engine over an explicit mixer.
    ///
    /// The mixer must signal `event` whenever it retires a wave buffer.
    pub fn with_mixer(mixer: Arc<dyn VoiceMixer>, event: Arc<DrainEvent>) -> Arc<Self> {
        Arc::new(Self {
            slots: Arc::new(SlotPool::new()),
            event,
            mixer,
        })
    }

    /// Number of currently active voices.
    pub fn active_voices(&self) -> usize {
        self.slots.active_count()
    }

    pub(crate) fn slots(&self) -> &Arc<SlotPool> {
        &self.slots
    }

    pub(crate) fn event(&self) -> &Arc<DrainEvent> {
        &self.event
    }

    pub(crate) fn mixer(&self) -> &Arc<dyn VoiceMixer> {
        &self.mixer
    }
}
