//! Audio output using cpal
//!
//! Opens the output device and runs the playback stream. The stream
//! callback pulls mixed frames from a lock-free ring filled by the mixer
//! thread; underruns output silence and are counted rather than crashed
//! on.

use crate::audio::types::AudioFrame;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::{traits::*, HeapCons};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Audio output manager using cpal.
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    /// Master volume applied in the output callback.
    master_volume: Arc<Mutex<f32>>,
    /// Set by the stream error callback.
    error_flag: Arc<AtomicBool>,
}

impl AudioOutput {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device.
    ///
    /// # Arguments
    /// - `device_name`: Optional device name (None = default device)
    /// - `master_volume`: Shared master volume, applied in the callback
    ///
    /// If the requested device fails to open, falls back to the default
    /// device.
    pub fn new(device_name: Option<&str>, master_volume: Arc<Mutex<f32>>) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(name) = device_name {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            match devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                Some(dev) => {
                    info!("Found requested audio device: {}", name);
                    dev
                }
                None => {
                    warn!(
                        "Requested device '{}' not found, falling back to default device",
                        name
                    );
                    host.default_output_device().ok_or_else(|| {
                        Error::AudioOutput(format!(
                            "Device '{}' not found and no default device available",
                            name
                        ))
                    })?
                }
            }
        } else {
            let dev = host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
            info!(
                "Using default audio device: {}",
                dev.name().unwrap_or_else(|_| "Unknown".to_string())
            );
            dev
        };

        let (config, sample_format) = Self::get_best_config(&device)?;

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            master_volume,
            error_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get the best supported configuration for playback.
    ///
    /// Prefers 44.1kHz, stereo, f32 samples (matching our internal format).
    fn get_best_config(device: &Device) -> Result<(StreamConfig, SampleFormat)> {
        let mut supported_configs = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let preferred = supported_configs.find(|config| {
            config.channels() == 2
                && config.min_sample_rate().0 <= 44100
                && config.max_sample_rate().0 >= 44100
                && config.sample_format() == SampleFormat::F32
        });

        if let Some(supported_config) = preferred {
            let sample_format = supported_config.sample_format();
            let config = supported_config
                .with_sample_rate(cpal::SampleRate(44100))
                .config();
            return Ok((config, sample_format));
        }

        // Fallback: use default config
        let supported_config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;

        let sample_format = supported_config.sample_format();
        let config = supported_config.config();
        Ok((config, sample_format))
    }

    /// Start playback, pulling mixed frames from `frames`.
    ///
    /// The consumer side of the mixer ring moves into the stream callback;
    /// an empty ring produces silence and bumps the underrun counter.
    pub fn start(&mut self, frames: HeapCons<AudioFrame>) -> Result<()> {
        info!("Starting audio stream");

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream_f32(frames)?,
            SampleFormat::I16 => self.build_stream_i16(frames)?,
            SampleFormat::U16 => self.build_stream_u16(frames)?,
            sample_format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);

        info!("Audio stream started successfully");
        Ok(())
    }

    fn build_stream_f32(&self, mut frames: HeapCons<AudioFrame>) -> Result<Stream> {
        let channels = self.config.channels as usize;
        let master_volume = Arc::clone(&self.master_volume);
        let error_flag = Arc::clone(&self.error_flag);
        let underruns = AtomicU64::new(0);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let volume = *master_volume.lock().unwrap();

                    for out in data.chunks_mut(channels) {
                        let mut frame = next_frame(&mut frames, &underruns);
                        frame.apply_volume(volume);
                        frame.clamp();

                        out[0] = frame.left;
                        if channels > 1 {
                            out[1] = frame.right;
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    fn build_stream_i16(&self, mut frames: HeapCons<AudioFrame>) -> Result<Stream> {
        let channels = self.config.channels as usize;
        let master_volume = Arc::clone(&self.master_volume);
        let error_flag = Arc::clone(&self.error_flag);
        let underruns = AtomicU64::new(0);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let volume = *master_volume.lock().unwrap();

                    for out in data.chunks_mut(channels) {
                        let mut frame = next_frame(&mut frames, &underruns);
                        frame.apply_volume(volume);
                        frame.clamp();

                        out[0] = (frame.left * i16::MAX as f32) as i16;
                        if channels > 1 {
                            out[1] = (frame.right * i16::MAX as f32) as i16;
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    fn build_stream_u16(&self, mut frames: HeapCons<AudioFrame>) -> Result<Stream> {
        let channels = self.config.channels as usize;
        let master_volume = Arc::clone(&self.master_volume);
        let error_flag = Arc::clone(&self.error_flag);
        let underruns = AtomicU64::new(0);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    let volume = *master_volume.lock().unwrap();

                    for out in data.chunks_mut(channels) {
                        let mut frame = next_frame(&mut frames, &underruns);
                        frame.apply_volume(volume);
                        frame.clamp();

                        // Convert from [-1.0, 1.0] to [0, 65535]
                        out[0] = ((frame.left + 1.0) * 32767.5) as u16;
                        if channels > 1 {
                            out[1] = ((frame.right + 1.0) * 32767.5) as u16;
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    /// Stop playback and drop the stream.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            info!("Stopping audio stream");
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
            drop(stream);
        }

        Ok(())
    }

    /// Get sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Get channel count.
    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// True if the stream callback has flagged an error.
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Pop one frame, or silence on underrun (logged every 1000th occurrence).
fn next_frame(frames: &mut HeapCons<AudioFrame>, underruns: &AtomicU64) -> AudioFrame {
    match frames.try_pop() {
        Some(frame) => frame,
        None => {
            let count = underruns.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 1000 == 0 {
                warn!("Audio output underrun (total: {})", count);
            }
            AudioFrame::zero()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        // This test requires audio hardware; just verify it doesn't panic.
        let result = AudioOutput::list_devices();
        assert!(result.is_ok() || result.is_err());
    }

    #[test]
    fn test_underrun_produces_silence() {
        let ring = ringbuf::HeapRb::<AudioFrame>::new(4);
        let (_prod, mut cons) = ring.split();
        let underruns = AtomicU64::new(0);

        let frame = next_frame(&mut cons, &underruns);
        assert_eq!(frame.left, 0.0);
        assert_eq!(frame.right, 0.0);
        assert_eq!(underruns.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_next_frame_pops_in_order() {
        let ring = ringbuf::HeapRb::<AudioFrame>::new(4);
        let (mut prod, mut cons) = ring.split();
        let underruns = AtomicU64::new(0);

        prod.try_push(AudioFrame::from_stereo(0.1, 0.2)).unwrap();
        prod.try_push(AudioFrame::from_stereo(0.3, 0.4)).unwrap();

        assert_eq!(next_frame(&mut cons, &underruns).left, 0.1);
        assert_eq!(next_frame(&mut cons, &underruns).left, 0.3);
        assert_eq!(underruns.load(Ordering::Relaxed), 0);
    }
}
