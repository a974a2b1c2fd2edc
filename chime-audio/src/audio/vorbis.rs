//! Ogg Vorbis decode sessions using symphonia
//!
//! One [`VorbisStream`] is one pull-based decode session over a single
//! file. The engine opens a throwaway session at `Sound` construction to
//! probe the duration, then a fresh session per activation.
//!
//! Decoded output is interleaved i16 PCM at the stream's native rate and
//! channel count (mono or stereo only). Recoverable packet errors are
//! logged and skipped; container-level errors surface to the caller.

use crate::audio::source::PcmSource;
use crate::audio::types::StreamSpec;
use crate::error::{Error, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_VORBIS};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, warn};

/// Pull-based Ogg Vorbis decode session.
pub struct VorbisStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: TimeBase,
    spec: StreamSpec,
    duration_ms: u64,
    position_ms: u64,
    /// Decoded samples not yet handed out (one packet can exceed the
    /// caller's buffer).
    pending: Vec<i16>,
    pending_pos: usize,
    eof: bool,
}

impl VorbisStream {
    /// Open a decode session over an Ogg Vorbis file.
    ///
    /// # Errors
    /// [`Error::Open`] on a missing/unreadable file, a bad container
    /// header, a missing Vorbis track, or an unsupported channel layout.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::Open(format!("{}: {}", path.display(), e)))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        hint.with_extension("ogg");

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Open(format!("{}: {}", path.display(), e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec == CODEC_TYPE_VORBIS)
            .ok_or_else(|| Error::Open(format!("{}: no Vorbis track", path.display())))?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| Error::Open(format!("{}: sample rate not found", path.display())))?;

        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::Open(format!("{}: channel count not found", path.display())))?;

        if channels == 0 || channels > 2 {
            return Err(Error::Open(format!(
                "{}: {} channels (only mono or stereo supported)",
                path.display(),
                channels
            )));
        }

        let time_base = params
            .time_base
            .unwrap_or_else(|| TimeBase::new(1, sample_rate));

        let duration_ms = params
            .n_frames
            .map(|n| time_to_ms(time_base.calc_time(n)))
            .unwrap_or(0);

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| Error::Open(format!("{}: {}", path.display(), e)))?;

        debug!(
            "Opened {}: {} Hz, {} ch, {} ms",
            path.display(),
            sample_rate,
            channels,
            duration_ms
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            time_base,
            spec: StreamSpec::new(sample_rate, channels),
            duration_ms,
            position_ms: 0,
            pending: Vec::new(),
            pending_pos: 0,
            eof: false,
        })
    }
}

impl PcmSource for VorbisStream {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn position_ms(&self) -> u64 {
        self.position_ms
    }

    fn read(&mut self, out: &mut [i16]) -> Result<usize> {
        let mut written = 0;

        loop {
            // Hand out carried-over samples first.
            if self.pending_pos < self.pending.len() {
                let n = (self.pending.len() - self.pending_pos).min(out.len() - written);
                out[written..written + n]
                    .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
                self.pending_pos += n;
                written += n;
            }

            if written == out.len() || self.eof {
                return Ok(written);
            }

            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.eof = true;
                    return Ok(written);
                }
                // Chained Ogg streams are not supported; treat as end.
                Err(SymphoniaError::ResetRequired) => {
                    self.eof = true;
                    return Ok(written);
                }
                Err(e) => {
                    if written > 0 {
                        // Report what we have; the error resurfaces on the
                        // next call.
                        return Ok(written);
                    }
                    return Err(Error::Decode(e.to_string()));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    self.pending.clear();
                    self.pending_pos = 0;
                    convert_to_i16(&decoded, &mut self.pending)?;
                    self.position_ms =
                        time_to_ms(self.time_base.calc_time(packet.ts() + packet.dur()));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Recoverable decode error, skipping packet: {}", e);
                    continue;
                }
                Err(e) => return Err(Error::Decode(e.to_string())),
            }
        }
    }

    fn seek_ms(&mut self, position_ms: u64) -> Result<()> {
        let time = Time::new(position_ms / 1000, (position_ms % 1000) as f64 / 1000.0);

        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| Error::Seek(e.to_string()))?;

        self.decoder.reset();
        self.pending.clear();
        self.pending_pos = 0;
        self.eof = false;
        self.position_ms = time_to_ms(self.time_base.calc_time(seeked.actual_ts));

        Ok(())
    }
}

/// Probe a file's duration without keeping a decode session open.
///
/// Returns 0 for streams whose length the container does not report.
pub fn probe_duration_ms(path: &Path) -> Result<u64> {
    let stream = VorbisStream::open(path)?;
    Ok(stream.duration_ms())
}

fn time_to_ms(time: Time) -> u64 {
    time.seconds * 1000 + (time.frac * 1000.0) as u64
}

/// Interleave a decoded buffer into i16 samples.
///
/// Vorbis decodes to planar f32; S16/S32 are accepted for completeness.
fn convert_to_i16(decoded: &AudioBufferRef, out: &mut Vec<i16>) -> Result<()> {
    match decoded {
        AudioBufferRef::F32(buf) => {
            let channels = buf.spec().channels.count();
            for frame in 0..buf.frames() {
                for ch in 0..channels {
                    out.push(f32_to_i16(buf.chan(ch)[frame]));
                }
            }
            Ok(())
        }
        AudioBufferRef::S16(buf) => {
            let channels = buf.spec().channels.count();
            for frame in 0..buf.frames() {
                for ch in 0..channels {
                    out.push(buf.chan(ch)[frame]);
                }
            }
            Ok(())
        }
        AudioBufferRef::S32(buf) => {
            let channels = buf.spec().channels.count();
            for frame in 0..buf.frames() {
                for ch in 0..channels {
                    out.push((buf.chan(ch)[frame] >> 16) as i16);
                }
            }
            Ok(())
        }
        _ => Err(Error::Decode(
            "unsupported decoded sample format".to_string(),
        )),
    }
}

#[inline]
fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}
