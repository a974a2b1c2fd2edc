//! Wave buffer bank
//!
//! Each active voice owns a bank of 3 fixed-size PCM buffers sized from
//! the stream format and a 120 ms window. A buffer is either FREE
//! (available to fill) or IN_FLIGHT (queued to the mixer); the state lives
//! in a shared atomic so the mixer can retire buffers without locking the
//! fill loop.
//!
//! The bank's allocation is freed exactly once per activation: the bank
//! drops with the voice teardown, and mixer-held copies drop as they are
//! retired or flushed.

use crate::audio::types::StreamSpec;
use crate::error::{Error, Result};
use std::sync::atomic::AtomicU8;
use std::sync::Arc;

/// Wave buffers per voice.
pub const WAVE_COUNT: usize = 3;

/// Milliseconds of audio per wave buffer.
pub const WAVE_WINDOW_MS: u64 = 120;

/// Buffer is available to fill.
pub const WAVE_FREE: u8 = 0;

/// Buffer is queued to the mixer.
pub const WAVE_IN_FLIGHT: u8 = 1;

/// One wave buffer: persistent PCM scratch plus its shared state.
pub struct WaveBuf {
    /// Decode target; `samples_per_buf` capacity, refilled in place.
    pub pcm: Vec<i16>,

    /// FREE / IN_FLIGHT, shared with the mixer's queued copy.
    pub state: Arc<AtomicU8>,
}

/// A filled wave handed to the mixer.
///
/// Carries its own copy of the samples (the mixer consumes it at playback
/// rate) and the shared state handle it flips back to FREE when drained.
pub struct QueuedWave {
    pub pcm: Vec<i16>,
    pub state: Arc<AtomicU8>,
}

/// The per-voice set of wave buffers.
pub struct WaveBank {
    bufs: Vec<WaveBuf>,
    samples_per_buf: usize,
}

impl WaveBank {
    /// Allocate a bank for `spec`.
    ///
    /// All buffers start FREE. Reservation is fallible so an out-of-memory
    /// condition aborts voice activation instead of aborting the process.
    pub fn allocate(spec: StreamSpec) -> Result<Self> {
        let samples_per_buf = spec.samples_for_ms(WAVE_WINDOW_MS);
        let bytes = samples_per_buf * std::mem::size_of::<i16>() * WAVE_COUNT;

        let mut bufs = Vec::new();
        bufs.try_reserve_exact(WAVE_COUNT)
            .map_err(|_| Error::BufferAlloc { bytes })?;

        for _ in 0..WAVE_COUNT {
            let mut pcm = Vec::new();
            pcm.try_reserve_exact(samples_per_buf)
                .map_err(|_| Error::BufferAlloc { bytes })?;
            pcm.resize(samples_per_buf, 0);

            bufs.push(WaveBuf {
                pcm,
                state: Arc::new(AtomicU8::new(WAVE_FREE)),
            });
        }

        Ok(Self {
            bufs,
            samples_per_buf,
        })
    }

    pub fn samples_per_buf(&self) -> usize {
        self.samples_per_buf
    }

    pub fn len(&self) -> usize {
        self.bufs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bufs.is_empty()
    }

    pub fn buf_mut(&mut self, index: usize) -> &mut WaveBuf {
        &mut self.bufs[index]
    }

    /// True when no buffer is queued to the mixer.
    pub fn all_free(&self) -> bool {
        use std::sync::atomic::Ordering;
        self.bufs
            .iter()
            .all(|buf| buf.state.load(Ordering::Acquire) == WAVE_FREE)
    }
}
