//! Sound playback controller
//!
//! One [`Sound`] is one logical sound bound to an Ogg Vorbis file (or any
//! [`PcmSource`] factory). It owns a voice slot only while active and
//! coordinates with its fill worker through shared atomics plus a small
//! control block.
//!
//! State machine: IDLE -> PLAYING <-> PAUSED -> IDLE (stop or natural
//! end). `play()`, `pause()`, `resume()` and `stop()` report nothing:
//! failures roll the controller back to its prior state and are logged.
//! Only `replay()` reports success, since the caller has a meaningful
//! fallback (a fresh `play()`).

use crate::audio::source::{PcmSource, SourceFactory};
use crate::audio::vorbis::VorbisStream;
use crate::error::{Error, Result};
use crate::playback::engine::AudioEngine;
use crate::playback::fill::{self, VoiceContext};
use crate::playback::wave::WaveBank;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error};

/// Worker thread stack size; symphonia decode needs headroom.
const VOICE_STACK_BYTES: usize = 512 * 1024;

/// State shared between a Sound and its fill worker.
pub(crate) struct SoundShared {
    /// Decode cursor in milliseconds, written only by the fill loop.
    pub position_ms: AtomicU64,

    /// True from activation until stop or natural end.
    pub playing: AtomicBool,

    /// Read opportunistically by the fill loop at each end-of-stream.
    pub looping: AtomicBool,

    /// Voice gain as f32 bits; reapplied on activation and replay.
    volume_bits: AtomicU32,

    /// Invoked by the fill worker exactly once per natural end.
    pub on_complete: Mutex<Option<Box<dyn Fn() + Send>>>,
}

impl SoundShared {
    fn new() -> Self {
        Self {
            position_ms: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            volume_bits: AtomicU32::new(1.0f32.to_bits()),
            on_complete: Mutex::new(None),
        }
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Acquire))
    }

    fn set_volume(&self, volume: f32) {
        self.volume_bits.store(volume.to_bits(), Ordering::Release);
    }
}

/// Cooperative control block for one voice worker.
pub(crate) struct VoiceControl {
    /// Observed at the top of every fill pass.
    pub quit: AtomicBool,

    /// Replay request; handled by the worker, which owns the decode
    /// session.
    pub rewind: AtomicBool,

    /// Outcome of the last rewind request.
    pub rewind_done: Mutex<Option<bool>>,
    pub rewind_cond: Condvar,

    /// Set by the worker on every exit path.
    pub finished: AtomicBool,
}

impl VoiceControl {
    fn new() -> Self {
        Self {
            quit: AtomicBool::new(false),
            rewind: AtomicBool::new(false),
            rewind_done: Mutex::new(None),
            rewind_cond: Condvar::new(),
            finished: AtomicBool::new(false),
        }
    }
}

/// Controller-side record of one activation.
struct Voice {
    slot: usize,
    ctrl: Arc<VoiceControl>,
    handle: Option<JoinHandle<()>>,
}

/// One logical sound.
pub struct Sound {
    engine: Arc<AudioEngine>,
    factory: SourceFactory,
    /// For log messages only.
    label: String,
    duration_ms: u64,
    shared: Arc<SoundShared>,
    voice: Option<Voice>,
    paused: bool,
}

impl Sound {
    /// Bind a sound to an Ogg Vorbis file.
    ///
    /// Probes the file once for its duration; playback opens a fresh
    /// decode session per `play()`.
    ///
    /// # Errors
    /// [`Error::Open`] if the file is missing, unreadable, or not a
    /// mono/stereo Ogg Vorbis stream.
    pub fn open(engine: &Arc<AudioEngine>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let duration_ms = VorbisStream::open(&path)?.duration_ms();
        let label = path.display().to_string();

        let factory: SourceFactory = Box::new(move || {
            Ok(Box::new(VorbisStream::open(&path)?) as Box<dyn PcmSource>)
        });

        Ok(Self::from_factory(engine, factory, duration_ms, label))
    }

    /// Bind a sound to an arbitrary source factory.
    ///
    /// The factory is called once per activation and must yield a fresh
    /// session positioned at the start of the stream.
    pub fn from_factory(
        engine: &Arc<AudioEngine>,
        factory: SourceFactory,
        duration_ms: u64,
        label: impl Into<String>,
    ) -> Self {
        Self {
            engine: Arc::clone(engine),
            factory,
            label: label.into(),
            duration_ms,
            shared: Arc::new(SoundShared::new()),
            voice: None,
            paused: false,
        }
    }

    /// Start playback.
    ///
    /// No-op while already playing; resumes if paused; otherwise acquires
    /// a voice and starts from position zero. Activation failures (no free
    /// channel, open/alloc/spawn failure) are logged and leave the sound
    /// IDLE.
    pub fn play(&mut self) {
        if self.shared.playing.load(Ordering::Acquire) {
            if self.paused {
                self.resume();
            }
            return;
        }

        self.reap_voice();

        if let Err(e) = self.activate() {
            error!("Sound::play({}): {}", self.label, e);
        }
    }

    /// Pause playback, preserving position. Valid only while playing.
    pub fn pause(&mut self) {
        if !self.shared.playing.load(Ordering::Acquire) || self.paused {
            return;
        }
        if let Some(voice) = &self.voice {
            self.engine.mixer().set_paused(voice.slot, true);
            self.paused = true;
        }
    }

    /// Resume playback from a paused state.
    pub fn resume(&mut self) {
        if !self.shared.playing.load(Ordering::Acquire) || !self.paused {
            return;
        }
        if let Some(voice) = &self.voice {
            self.engine.mixer().set_paused(voice.slot, false);
            self.paused = false;
        }
    }

    /// Stop playback and reset the position to zero.
    ///
    /// Blocks until the voice worker has exited; the slot is free again
    /// when this returns.
    pub fn stop(&mut self) {
        let Some(mut voice) = self.voice.take() else {
            return;
        };

        voice.ctrl.quit.store(true, Ordering::Release);
        self.engine.event().signal();

        if let Some(handle) = voice.handle.take() {
            if handle.join().is_err() {
                error!("Voice worker for {} panicked", self.label);
            }
        }

        self.paused = false;
        debug!("Stopped {}", self.label);
    }

    /// Restart playback from the beginning without releasing the voice.
    ///
    /// If idle, equivalent to `play()`. If active, the in-flight buffers
    /// are discarded and replaced after the decoder rewinds, so no stale
    /// audio survives the restart. Returns false if the rewind failed, in
    /// which case playback continues unchanged and the caller may fall
    /// back to `stop()` + `play()`.
    pub fn replay(&mut self) -> bool {
        if self.voice.is_none() || !self.shared.playing.load(Ordering::Acquire) {
            self.play();
            return self.shared.playing.load(Ordering::Acquire);
        }

        let (slot, ctrl) = match &self.voice {
            Some(voice) => (voice.slot, Arc::clone(&voice.ctrl)),
            None => return false,
        };
        let mixer = Arc::clone(self.engine.mixer());

        // Hold output while the worker rewinds and swaps buffers.
        mixer.set_paused(slot, true);

        {
            let mut done = ctrl.rewind_done.lock().expect("voice control poisoned");
            *done = None;
        }
        ctrl.rewind.store(true, Ordering::Release);
        self.engine.event().signal();

        let ok = {
            let mut done = ctrl.rewind_done.lock().expect("voice control poisoned");
            loop {
                if let Some(ok) = done.take() {
                    break ok;
                }
                if ctrl.finished.load(Ordering::Acquire) {
                    break false;
                }
                done = ctrl
                    .rewind_cond
                    .wait(done)
                    .expect("voice control poisoned");
            }
        };

        if ok {
            mixer.set_gain(slot, self.shared.volume());
            mixer.set_paused(slot, false);
            self.paused = false;
            debug!("Replayed {}", self.label);
            true
        } else {
            // Leave playback exactly as it was.
            mixer.set_paused(slot, self.paused);
            false
        }
    }

    /// True from activation until stop or natural end (including while
    /// paused).
    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current decode position in milliseconds.
    pub fn position_ms(&self) -> u64 {
        self.shared.position_ms.load(Ordering::Acquire)
    }

    /// Total duration in milliseconds (0 if the container did not report
    /// a length).
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn volume(&self) -> f32 {
        self.shared.volume()
    }

    /// Set voice volume (clamped to 0.0..=1.0), applied immediately if
    /// active.
    pub fn set_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.shared.set_volume(volume);
        if self.shared.playing.load(Ordering::Acquire) {
            if let Some(voice) = &self.voice {
                self.engine.mixer().set_gain(voice.slot, volume);
            }
        }
    }

    pub fn looping(&self) -> bool {
        self.shared.looping.load(Ordering::Acquire)
    }

    /// Set the loop flag; takes effect at the next end-of-stream.
    pub fn set_looping(&mut self, looping: bool) {
        self.shared.looping.store(looping, Ordering::Release);
    }

    /// Register a completion callback, fired exactly once per natural end
    /// of a non-looping playback, on the voice worker thread, after the
    /// voice is already released. The callback must not call back into
    /// this Sound.
    pub fn set_on_complete(&mut self, callback: impl Fn() + Send + 'static) {
        let mut slot = self
            .shared
            .on_complete
            .lock()
            .expect("completion callback poisoned");
        *slot = Some(Box::new(callback));
    }

    /// Remove the completion callback.
    pub fn clear_on_complete(&mut self) {
        let mut slot = self
            .shared
            .on_complete
            .lock()
            .expect("completion callback poisoned");
        *slot = None;
    }

    /// Join a worker that ended on its own, reclaiming the thread before
    /// the next activation.
    fn reap_voice(&mut self) {
        if let Some(mut voice) = self.voice.take() {
            if let Some(handle) = voice.handle.take() {
                if handle.join().is_err() {
                    error!("Voice worker for {} panicked", self.label);
                }
            }
        }
    }

    /// IDLE -> PLAYING: acquire a slot, open a fresh decode session,
    /// allocate buffers, configure the mixer lane, and spawn the fill
    /// worker. Every failure rolls back the steps before it.
    fn activate(&mut self) -> Result<()> {
        let slot = self.engine.slots().acquire()?;

        let source = match (self.factory)() {
            Ok(source) => source,
            Err(e) => {
                self.engine.slots().release(slot);
                return Err(e);
            }
        };
        let spec = source.spec();

        let bank = match WaveBank::allocate(spec) {
            Ok(bank) => bank,
            Err(e) => {
                self.engine.slots().release(slot);
                return Err(e);
            }
        };

        self.engine.mixer().configure(slot, spec);
        self.engine.mixer().set_gain(slot, self.shared.volume());

        let ctrl = Arc::new(VoiceControl::new());
        self.shared.position_ms.store(0, Ordering::Release);
        self.shared.playing.store(true, Ordering::Release);

        let ctx = VoiceContext {
            slot,
            spec,
            source,
            bank,
            mixer: Arc::clone(self.engine.mixer()),
            event: Arc::clone(self.engine.event()),
            slots: Arc::clone(self.engine.slots()),
            shared: Arc::clone(&self.shared),
            ctrl: Arc::clone(&ctrl),
        };

        let spawned = std::thread::Builder::new()
            .name(format!("chime-voice-{}", slot))
            .stack_size(VOICE_STACK_BYTES)
            .spawn(move || fill::run(ctx));

        match spawned {
            Ok(handle) => {
                self.voice = Some(Voice {
                    slot,
                    ctrl,
                    handle: Some(handle),
                });
                self.paused = false;
                debug!("Playing {} on voice {}", self.label, slot);
                Ok(())
            }
            Err(e) => {
                self.engine.mixer().reset(slot);
                self.engine.slots().release(slot);
                self.shared.playing.store(false, Ordering::Release);
                Err(Error::ThreadSpawn(e))
            }
        }
    }
}

impl Drop for Sound {
    fn drop(&mut self) {
        // No worker may outlive its controller.
        self.stop();
    }
}
