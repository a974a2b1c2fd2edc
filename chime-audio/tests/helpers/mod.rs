//! Shared test doubles: a deterministic synthetic PCM source and a
//! manually-drained voice mixer, so engine behavior can be driven without
//! audio files or hardware.

#![allow(dead_code)]

use chime_audio::audio::{PcmSource, SourceFactory, StreamSpec};
use chime_audio::error::{Error, Result};
use chime_audio::playback::{
    AudioEngine, DrainEvent, QueuedWave, VoiceMixer, NUM_VOICES, WAVE_FREE,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Deterministic sample value at interleaved index `k`.
///
/// The period is far longer than a wave buffer, so a buffer's first
/// samples identify its stream position unambiguously.
pub fn pattern(k: u64) -> i16 {
    (k % 30000) as i16
}

/// Synthetic ramp source: emits `pattern(k)` for the k-th interleaved
/// sample of the stream.
pub struct RampSource {
    spec: StreamSpec,
    total_samples: u64,
    cursor: u64,
    /// Cap per read call, to exercise the repeated-read fill path.
    max_read: usize,
    fail_seek: bool,
    /// Return a decode error once the cursor reaches this sample.
    error_after: Option<u64>,
}

impl RampSource {
    pub fn new(duration_ms: u64, sample_rate: u32, channels: u16) -> Self {
        let spec = StreamSpec::new(sample_rate, channels);
        // The read cap is smaller than a 120 ms wave buffer, so filling
        // one buffer always takes several reads (as real decoding does).
        Self {
            total_samples: spec.samples_for_ms(duration_ms) as u64,
            spec,
            cursor: 0,
            max_read: 331,
            fail_seek: false,
            error_after: None,
        }
    }

    pub fn with_failing_seek(mut self) -> Self {
        self.fail_seek = true;
        self
    }

    pub fn with_error_after_ms(mut self, ms: u64) -> Self {
        self.error_after = Some(self.spec.samples_for_ms(ms) as u64);
        self
    }
}

impl PcmSource for RampSource {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn duration_ms(&self) -> u64 {
        let frames = self.total_samples / self.spec.channels as u64;
        self.spec.frames_to_ms(frames)
    }

    fn position_ms(&self) -> u64 {
        let frames = self.cursor / self.spec.channels as u64;
        self.spec.frames_to_ms(frames)
    }

    fn read(&mut self, out: &mut [i16]) -> Result<usize> {
        if let Some(at) = self.error_after {
            if self.cursor >= at {
                return Err(Error::Decode("synthetic decode failure".to_string()));
            }
        }

        let remaining = (self.total_samples - self.cursor) as usize;
        let n = out.len().min(self.max_read).min(remaining);
        for (i, sample) in out.iter_mut().take(n).enumerate() {
            *sample = pattern(self.cursor + i as u64);
        }
        self.cursor += n as u64;
        Ok(n)
    }

    fn seek_ms(&mut self, position_ms: u64) -> Result<()> {
        if self.fail_seek {
            return Err(Error::Seek("synthetic unseekable stream".to_string()));
        }
        let frames = (position_ms * self.spec.sample_rate as u64) / 1000;
        self.cursor = (frames * self.spec.channels as u64).min(self.total_samples);
        Ok(())
    }
}

/// Factory for plain ramp sources.
pub fn ramp_factory(duration_ms: u64, sample_rate: u32, channels: u16) -> SourceFactory {
    Box::new(move || {
        Ok(Box::new(RampSource::new(duration_ms, sample_rate, channels)) as Box<dyn PcmSource>)
    })
}

/// Factory for ramp sources whose seek always fails.
pub fn failing_seek_factory(duration_ms: u64, sample_rate: u32, channels: u16) -> SourceFactory {
    Box::new(move || {
        Ok(Box::new(
            RampSource::new(duration_ms, sample_rate, channels).with_failing_seek(),
        ) as Box<dyn PcmSource>)
    })
}

/// Factory for ramp sources that start failing decode after `error_ms`.
pub fn erroring_factory(
    duration_ms: u64,
    error_ms: u64,
    sample_rate: u32,
    channels: u16,
) -> SourceFactory {
    Box::new(move || {
        Ok(Box::new(
            RampSource::new(duration_ms, sample_rate, channels).with_error_after_ms(error_ms),
        ) as Box<dyn PcmSource>)
    })
}

/// Everything a ManualMixer records.
#[derive(Debug, Clone, PartialEq)]
pub enum MixerOp {
    Configured(usize, StreamSpec),
    Submitted {
        slot: usize,
        len: usize,
        prefix: Vec<i16>,
    },
    Paused(usize, bool),
    Gain(usize, f32),
    Flushed(usize),
    Reset(usize),
}

struct TestLane {
    queue: VecDeque<QueuedWave>,
    paused: bool,
}

/// Manually-drained voice mixer: tests decide when "hardware" finishes a
/// wave buffer.
pub struct ManualMixer {
    event: Arc<DrainEvent>,
    lanes: Mutex<Vec<TestLane>>,
    log: Mutex<Vec<MixerOp>>,
}

impl ManualMixer {
    pub fn new(event: Arc<DrainEvent>) -> Arc<Self> {
        Arc::new(Self {
            event,
            lanes: Mutex::new(
                (0..NUM_VOICES)
                    .map(|_| TestLane {
                        queue: VecDeque::new(),
                        paused: false,
                    })
                    .collect(),
            ),
            log: Mutex::new(Vec::new()),
        })
    }

    /// Finish playing the front wave of a lane. Returns false if the lane
    /// is paused or has nothing queued.
    pub fn drain_one(&self, slot: usize) -> bool {
        let drained = {
            let mut lanes = self.lanes.lock().unwrap();
            let lane = &mut lanes[slot];
            if lane.paused {
                None
            } else {
                lane.queue.pop_front()
            }
        };

        match drained {
            Some(wave) => {
                wave.state.store(WAVE_FREE, Ordering::Release);
                self.event.signal();
                true
            }
            None => false,
        }
    }

    /// Number of waves currently queued on a lane.
    pub fn queued(&self, slot: usize) -> usize {
        self.lanes.lock().unwrap()[slot].queue.len()
    }

    /// Snapshot of everything recorded so far.
    pub fn ops(&self) -> Vec<MixerOp> {
        self.log.lock().unwrap().clone()
    }

    /// Sample prefixes of every wave ever submitted to a lane, in order.
    pub fn submitted_prefixes(&self, slot: usize) -> Vec<Vec<i16>> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                MixerOp::Submitted {
                    slot: s, prefix, ..
                } if s == slot => Some(prefix),
                _ => None,
            })
            .collect()
    }

    fn free_lane(lane: &mut TestLane) {
        for wave in lane.queue.drain(..) {
            wave.state.store(WAVE_FREE, Ordering::Release);
        }
    }

    fn record(&self, op: MixerOp) {
        self.log.lock().unwrap().push(op);
    }
}

impl VoiceMixer for ManualMixer {
    fn configure(&self, slot: usize, spec: StreamSpec) {
        let mut lanes = self.lanes.lock().unwrap();
        let lane = &mut lanes[slot];
        Self::free_lane(lane);
        lane.paused = false;
        drop(lanes);
        self.record(MixerOp::Configured(slot, spec));
    }

    fn submit(&self, slot: usize, wave: QueuedWave) {
        let prefix = wave.pcm.iter().take(4).copied().collect();
        let len = wave.pcm.len();
        self.lanes.lock().unwrap()[slot].queue.push_back(wave);
        self.record(MixerOp::Submitted { slot, len, prefix });
    }

    fn set_paused(&self, slot: usize, paused: bool) {
        self.lanes.lock().unwrap()[slot].paused = paused;
        self.record(MixerOp::Paused(slot, paused));
    }

    fn set_gain(&self, slot: usize, gain: f32) {
        self.record(MixerOp::Gain(slot, gain));
    }

    fn flush(&self, slot: usize) {
        {
            let mut lanes = self.lanes.lock().unwrap();
            Self::free_lane(&mut lanes[slot]);
        }
        self.record(MixerOp::Flushed(slot));
        self.event.signal();
    }

    fn reset(&self, slot: usize) {
        {
            let mut lanes = self.lanes.lock().unwrap();
            let lane = &mut lanes[slot];
            Self::free_lane(lane);
            lane.paused = false;
        }
        self.record(MixerOp::Reset(slot));
        self.event.signal();
    }
}

/// Background thread draining one wave per lane per tick, standing in for
/// hardware playback progress.
pub struct AutoDrain {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AutoDrain {
    pub fn spawn(mixer: Arc<ManualMixer>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            while !stop_flag.load(Ordering::Acquire) {
                for slot in 0..NUM_VOICES {
                    mixer.drain_one(slot);
                }
                std::thread::sleep(interval);
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for AutoDrain {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Engine wired to a ManualMixer.
pub fn test_engine() -> (Arc<AudioEngine>, Arc<ManualMixer>) {
    let event = Arc::new(DrainEvent::new());
    let mixer = ManualMixer::new(Arc::clone(&event));
    let engine = AudioEngine::with_mixer(Arc::clone(&mixer) as Arc<dyn VoiceMixer>, event);
    (engine, mixer)
}

/// Poll `cond` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
