//! Voice mixer boundary
//!
//! The platform-audio contract the fill loop and playback controller
//! program against: per-voice format configuration, a 3-deep FIFO wave
//! queue, a pause flag, per-voice gain, and flush/reset. The production
//! implementation is [`crate::playback::software_mixer::SoftwareMixer`];
//! tests drive the engine through a manually-drained double.

use crate::audio::types::StreamSpec;
use crate::playback::wave::QueuedWave;

/// Hardware-style voice mixer.
///
/// Implementations retire each fully played wave by storing `WAVE_FREE`
/// into its shared state and signalling the engine's drain event. Retiring
/// may be coalesced: fill loops rescan all of their buffers on every wake
/// and never assume a 1:1 signal-to-buffer correspondence.
///
/// All calls take a slot index; the engine guarantees a slot is driven by
/// at most one voice at a time. `configure` fully re-initializes a lane
/// (gain to 1.0, unpaused, empty queue), so a stray late call against a
/// released slot is erased by the next activation.
pub trait VoiceMixer: Send + Sync {
    /// Bind a lane to a stream format, resetting all lane state.
    fn configure(&self, slot: usize, spec: StreamSpec);

    /// Append a filled wave to the lane's FIFO queue.
    ///
    /// Callers keep at most [`crate::playback::wave::WAVE_COUNT`] waves in
    /// flight; submission order is playback order.
    fn submit(&self, slot: usize, wave: QueuedWave);

    /// Pause/resume a lane. A paused lane outputs silence and does not
    /// drain its queue.
    fn set_paused(&self, slot: usize, paused: bool);

    /// Per-voice gain (0.0 to 1.0).
    fn set_gain(&self, slot: usize, gain: f32);

    /// Drop all queued waves, marking each FREE, without unbinding the
    /// lane. Used by replay to discard stale in-flight audio.
    fn flush(&self, slot: usize);

    /// Fully deactivate a lane: drop its queue and unbind its format.
    fn reset(&self, slot: usize);
}
