//! Software voice mixer
//!
//! Production [`VoiceMixer`]: a dedicated mix thread sums all active
//! lanes (fractional-playhead linear resampling to the device rate) into
//! a lock-free frame ring consumed by the cpal output callback. Fully
//! played waves are retired: their shared state flips back to FREE and
//! the drain event is signalled so fill loops can refill them.
//!
//! The cpal stream is owned by the mix thread (stream handles are not
//! `Send`); startup errors are reported back through a channel before the
//! constructor returns.

use crate::audio::output::AudioOutput;
use crate::audio::types::{sample_to_f32, AudioFrame, StreamSpec};
use crate::error::{Error, Result};
use crate::playback::event::DrainEvent;
use crate::playback::mixer::VoiceMixer;
use crate::playback::slots::NUM_VOICES;
use crate::playback::wave::{QueuedWave, WAVE_FREE};
use ringbuf::{traits::*, HeapProd, HeapRb};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{info, warn};

/// Mixed frames buffered ahead of the output callback (~93 ms at 44.1kHz).
const RING_CAPACITY: usize = 4096;

/// Mix thread top-up interval.
const MIX_INTERVAL: Duration = Duration::from_millis(2);

/// One voice lane's playback state.
struct VoiceLane {
    /// Bound stream format; None = lane idle.
    spec: Option<StreamSpec>,

    /// FIFO of submitted waves, front is playing.
    queue: VecDeque<QueuedWave>,

    /// Fractional frame position into the front wave.
    phase: f64,

    paused: bool,
    gain: f32,
}

impl VoiceLane {
    fn idle() -> Self {
        Self {
            spec: None,
            queue: VecDeque::new(),
            phase: 0.0,
            paused: false,
            gain: 1.0,
        }
    }

    /// Free every queued wave back to its bank.
    fn free_queue(&mut self, retired: &mut usize) {
        for wave in self.queue.drain(..) {
            wave.state.store(WAVE_FREE, Ordering::Release);
            *retired += 1;
        }
        self.phase = 0.0;
    }
}

/// Software mixer over a cpal output stream.
pub struct SoftwareMixer {
    lanes: Arc<Mutex<Vec<VoiceLane>>>,
    event: Arc<DrainEvent>,
    shutdown: Arc<AtomicBool>,
    mix_thread: Option<JoinHandle<()>>,
    master_volume: Arc<Mutex<f32>>,
}

impl SoftwareMixer {
    /// Open the output device and start the mix thread.
    ///
    /// # Arguments
    /// - `event`: the engine's shared drain event
    /// - `device`: optional output device name (None = default)
    /// - `master_volume`: initial master volume (0.0 to 1.0)
    pub fn start(
        event: Arc<DrainEvent>,
        device: Option<String>,
        master_volume: f32,
    ) -> Result<Self> {
        let lanes: Arc<Mutex<Vec<VoiceLane>>> = Arc::new(Mutex::new(
            (0..NUM_VOICES).map(|_| VoiceLane::idle()).collect(),
        ));
        let shutdown = Arc::new(AtomicBool::new(false));
        let volume = Arc::new(Mutex::new(master_volume.clamp(0.0, 1.0)));

        let (startup_tx, startup_rx) = mpsc::channel::<Result<u32>>();

        let thread_lanes = Arc::clone(&lanes);
        let thread_event = Arc::clone(&event);
        let thread_shutdown = Arc::clone(&shutdown);
        let thread_volume = Arc::clone(&volume);

        let mix_thread = std::thread::Builder::new()
            .name("chime-mixer".to_string())
            .spawn(move || {
                let mut output = match AudioOutput::new(device.as_deref(), thread_volume) {
                    Ok(output) => output,
                    Err(e) => {
                        let _ = startup_tx.send(Err(e));
                        return;
                    }
                };

                let ring = HeapRb::<AudioFrame>::new(RING_CAPACITY);
                let (producer, consumer) = ring.split();

                if let Err(e) = output.start(consumer) {
                    let _ = startup_tx.send(Err(e));
                    return;
                }

                let device_rate = output.sample_rate();
                let _ = startup_tx.send(Ok(device_rate));

                mix_loop(thread_lanes, thread_event, thread_shutdown, producer, device_rate);

                let _ = output.stop();
            })
            .map_err(Error::ThreadSpawn)?;

        match startup_rx.recv() {
            Ok(Ok(rate)) => {
                info!("Software mixer running at {} Hz", rate);
                Ok(Self {
                    lanes,
                    event,
                    shutdown,
                    mix_thread: Some(mix_thread),
                    master_volume: volume,
                })
            }
            // The thread returns right after reporting a startup error (or
            // dropped the channel without reporting); reclaim it here.
            Ok(Err(e)) => {
                let _ = mix_thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = mix_thread.join();
                Err(Error::AudioOutput(
                    "Mixer thread exited during startup".to_string(),
                ))
            }
        }
    }

    /// Set master output volume (clamped to 0.0..=1.0).
    pub fn set_master_volume(&self, volume: f32) {
        *self.master_volume.lock().expect("mixer volume poisoned") = volume.clamp(0.0, 1.0);
    }

    /// Current master output volume.
    pub fn master_volume(&self) -> f32 {
        *self.master_volume.lock().expect("mixer volume poisoned")
    }

    fn with_lane(&self, slot: usize, f: impl FnOnce(&mut VoiceLane, &mut usize)) {
        let mut retired = 0;
        {
            let mut lanes = self.lanes.lock().expect("mixer lanes poisoned");
            match lanes.get_mut(slot) {
                Some(lane) => f(lane, &mut retired),
                None => warn!("Mixer call against out-of-range slot {}", slot),
            }
        }
        if retired > 0 {
            self.event.signal();
        }
    }
}

impl VoiceMixer for SoftwareMixer {
    fn configure(&self, slot: usize, spec: StreamSpec) {
        self.with_lane(slot, |lane, retired| {
            lane.free_queue(retired);
            *lane = VoiceLane {
                spec: Some(spec),
                ..VoiceLane::idle()
            };
        });
    }

    fn submit(&self, slot: usize, wave: QueuedWave) {
        self.with_lane(slot, |lane, retired| {
            if lane.spec.is_none() {
                warn!("Wave submitted to unconfigured slot {}", slot);
                wave.state.store(WAVE_FREE, Ordering::Release);
                *retired += 1;
                return;
            }
            lane.queue.push_back(wave);
        });
    }

    fn set_paused(&self, slot: usize, paused: bool) {
        self.with_lane(slot, |lane, _| lane.paused = paused);
    }

    fn set_gain(&self, slot: usize, gain: f32) {
        self.with_lane(slot, |lane, _| lane.gain = gain.clamp(0.0, 1.0));
    }

    fn flush(&self, slot: usize) {
        self.with_lane(slot, |lane, retired| lane.free_queue(retired));
    }

    fn reset(&self, slot: usize) {
        self.with_lane(slot, |lane, retired| {
            lane.free_queue(retired);
            *lane = VoiceLane::idle();
        });
    }
}

impl Drop for SoftwareMixer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.mix_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Keep the output ring topped up until shutdown.
fn mix_loop(
    lanes: Arc<Mutex<Vec<VoiceLane>>>,
    event: Arc<DrainEvent>,
    shutdown: Arc<AtomicBool>,
    mut producer: HeapProd<AudioFrame>,
    device_rate: u32,
) {
    while !shutdown.load(Ordering::Acquire) {
        let mut retired = 0;
        {
            let mut lanes = lanes.lock().expect("mixer lanes poisoned");
            while producer.vacant_len() > 0 {
                let mut acc = AudioFrame::zero();
                for lane in lanes.iter_mut() {
                    if let Some(frame) = advance_lane(lane, device_rate, &mut retired) {
                        acc.add(&frame);
                    }
                }
                acc.clamp();
                let _ = producer.try_push(acc);
            }
        }
        if retired > 0 {
            event.signal();
        }
        std::thread::sleep(MIX_INTERVAL);
    }
}

/// Produce one output frame from a lane, retiring exhausted waves.
///
/// Returns None for idle, paused, or starved lanes. Resampling is linear
/// interpolation over a fractional playhead; interpolation holds the last
/// sample at wave boundaries.
fn advance_lane(lane: &mut VoiceLane, device_rate: u32, retired: &mut usize) -> Option<AudioFrame> {
    let spec = lane.spec?;
    if lane.paused {
        return None;
    }

    let channels = spec.channels as usize;

    loop {
        let front = lane.queue.front()?;
        let frames_in_wave = front.pcm.len() / channels;
        let index = lane.phase as usize;

        if frames_in_wave == 0 || index >= frames_in_wave {
            if let Some(done) = lane.queue.pop_front() {
                done.state.store(WAVE_FREE, Ordering::Release);
                *retired += 1;
            }
            lane.phase = (lane.phase - frames_in_wave as f64).max(0.0);
            continue;
        }

        let frac = (lane.phase - index as f64) as f32;
        let f0 = frame_at(&front.pcm, index, channels);
        let f1 = if index + 1 < frames_in_wave {
            frame_at(&front.pcm, index + 1, channels)
        } else {
            f0
        };

        lane.phase += spec.sample_rate as f64 / device_rate as f64;

        let mut frame = AudioFrame::from_stereo(
            f0.left + (f1.left - f0.left) * frac,
            f0.right + (f1.right - f0.right) * frac,
        );
        frame.apply_volume(lane.gain);
        return Some(frame);
    }
}

#[inline]
fn frame_at(pcm: &[i16], frame_index: usize, channels: usize) -> AudioFrame {
    if channels == 1 {
        AudioFrame::from_mono(sample_to_f32(pcm[frame_index]))
    } else {
        AudioFrame::from_stereo(
            sample_to_f32(pcm[frame_index * 2]),
            sample_to_f32(pcm[frame_index * 2 + 1]),
        )
    }
}
