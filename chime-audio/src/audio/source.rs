//! Pull-based PCM source contract
//!
//! The fill loop only ever sees this trait; the production implementation
//! is [`crate::audio::vorbis::VorbisStream`]. Tests substitute synthetic
//! sources to drive the engine without audio files.

use crate::audio::types::StreamSpec;
use crate::error::Result;

/// A pull-based, seekable source of interleaved i16 PCM.
///
/// One source instance represents one decode session: `play()` opens a
/// fresh session each time a voice is activated, so implementations do not
/// need to support rewinding past a failed seek.
pub trait PcmSource: Send {
    /// Stream format (fixed for the lifetime of the session).
    fn spec(&self) -> StreamSpec;

    /// Total stream duration in milliseconds (0 if unknown).
    fn duration_ms(&self) -> u64;

    /// Decode position in milliseconds (elapsed stream time).
    fn position_ms(&self) -> u64;

    /// Decode up to `out.len()` interleaved samples into `out`.
    ///
    /// # Returns
    /// Number of samples written. 0 means end of stream. `Err` means a
    /// decode error; callers treat it as "no bytes produced" for that
    /// attempt.
    fn read(&mut self, out: &mut [i16]) -> Result<usize>;

    /// Seek to an absolute stream position in milliseconds.
    ///
    /// Fails with [`crate::error::Error::Seek`] on unseekable streams;
    /// on failure the session stays usable at its prior position.
    fn seek_ms(&mut self, position_ms: u64) -> Result<()>;
}

/// Factory producing a fresh decode session per activation.
///
/// `Sound::play()` calls this once per IDLE -> PLAYING transition.
pub type SourceFactory = Box<dyn Fn() -> Result<Box<dyn PcmSource>> + Send + Sync>;
