//! Per-voice fill loop
//!
//! One worker thread per active voice. Each pass rescans the voice's wave
//! bank, decodes into every FREE buffer, and submits the results to the
//! mixer in decode order. The loop blocks on the shared drain event only
//! when a pass made no progress, and observes the quit flag at the top of
//! every pass.
//!
//! End-of-stream handling:
//! - loop flag set: seek the source back to zero mid-fill, so the wrap is
//!   seamless (no short buffer, no silence gap)
//! - loop flag clear: stop filling, wait for the in-flight buffers to
//!   drain, then retire the voice and fire the completion callback
//!
//! Decode errors are logged and treated as empty reads; a pass that
//! produces nothing at all ends playback gracefully.

use crate::audio::source::PcmSource;
use crate::audio::types::StreamSpec;
use crate::playback::event::DrainEvent;
use crate::playback::mixer::VoiceMixer;
use crate::playback::slots::SlotPool;
use crate::playback::sound::{SoundShared, VoiceControl};
use crate::playback::wave::{QueuedWave, WaveBank, WAVE_FREE, WAVE_IN_FLIGHT};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Everything a voice worker owns or shares while active.
pub(crate) struct VoiceContext {
    pub slot: usize,
    pub spec: StreamSpec,
    pub source: Box<dyn PcmSource>,
    pub bank: WaveBank,
    pub mixer: Arc<dyn VoiceMixer>,
    pub event: Arc<DrainEvent>,
    pub slots: Arc<SlotPool>,
    pub shared: Arc<SoundShared>,
    pub ctrl: Arc<VoiceControl>,
}

enum FinishReason {
    Stopped,
    EndOfStream,
}

/// Worker entry point.
pub(crate) fn run(mut ctx: VoiceContext) {
    let mut seen = ctx.event.observe();
    let mut at_eof = false;

    loop {
        if ctx.ctrl.quit.load(Ordering::Acquire) {
            finish(&ctx, FinishReason::Stopped);
            return;
        }

        if ctx.ctrl.rewind.swap(false, Ordering::AcqRel) {
            handle_rewind(&mut ctx, &mut at_eof);
        }

        let mut progressed = false;
        for i in 0..ctx.bank.len() {
            if at_eof {
                break;
            }
            if ctx.bank.buf_mut(i).state.load(Ordering::Acquire) != WAVE_FREE {
                continue;
            }

            let filled = {
                let VoiceContext {
                    source,
                    bank,
                    shared,
                    ..
                } = &mut ctx;
                fill_one(
                    source.as_mut(),
                    bank.buf_mut(i).pcm.as_mut_slice(),
                    shared,
                    &mut at_eof,
                )
            };

            if filled > 0 {
                let buf = ctx.bank.buf_mut(i);
                buf.state.store(WAVE_IN_FLIGHT, Ordering::Release);
                ctx.mixer.submit(
                    ctx.slot,
                    QueuedWave {
                        pcm: buf.pcm[..filled].to_vec(),
                        state: Arc::clone(&buf.state),
                    },
                );
                progressed = true;
            }
        }

        if at_eof && ctx.bank.all_free() {
            finish(&ctx, FinishReason::EndOfStream);
            return;
        }

        if !progressed {
            ctx.event.wait(&mut seen);
        }
    }
}

/// Decode into one wave buffer until it is full or the stream ends.
///
/// With the loop flag set, end-of-stream seeks back to zero and keeps
/// filling the same buffer. Returns the number of valid samples.
fn fill_one(
    source: &mut dyn PcmSource,
    out: &mut [i16],
    shared: &SoundShared,
    at_eof: &mut bool,
) -> usize {
    let mut filled = 0;
    let mut wrapped = false;

    while filled < out.len() {
        match source.read(&mut out[filled..]) {
            Ok(0) => {
                if shared.looping.load(Ordering::Acquire) {
                    // An empty stream would wrap forever; bail out.
                    if wrapped && filled == 0 {
                        *at_eof = true;
                        break;
                    }
                    match source.seek_ms(0) {
                        Ok(()) => {
                            wrapped = true;
                            shared.position_ms.store(0, Ordering::Release);
                        }
                        Err(e) => {
                            warn!("Loop rewind failed, ending playback: {}", e);
                            *at_eof = true;
                            break;
                        }
                    }
                } else {
                    *at_eof = true;
                    break;
                }
            }
            Ok(n) => {
                filled += n;
                shared
                    .position_ms
                    .store(source.position_ms(), Ordering::Release);
            }
            Err(e) => {
                warn!("Decode error treated as empty read: {}", e);
                if filled == 0 {
                    *at_eof = true;
                }
                break;
            }
        }
    }

    filled
}

/// Rewind the decode session to zero and swap in a fresh wave bank,
/// discarding whatever was still in flight.
///
/// On any failure playback is left exactly as it was; the controller
/// resumes it unchanged.
fn handle_rewind(ctx: &mut VoiceContext, at_eof: &mut bool) {
    let ok = match ctx.source.seek_ms(0) {
        Ok(()) => match WaveBank::allocate(ctx.spec) {
            Ok(bank) => {
                ctx.mixer.flush(ctx.slot);
                ctx.bank = bank;
                ctx.shared.position_ms.store(0, Ordering::Release);
                *at_eof = false;
                true
            }
            Err(e) => {
                error!("Replay buffer reallocation failed: {}", e);
                false
            }
        },
        Err(e) => {
            warn!("Replay seek failed: {}", e);
            false
        }
    };

    let mut done = ctx
        .ctrl
        .rewind_done
        .lock()
        .expect("voice control poisoned");
    *done = Some(ok);
    ctx.ctrl.rewind_cond.notify_all();
}

/// Retire the voice: unbind the mixer lane, release the slot, reset the
/// shared state, and (on natural end only) fire the completion callback
/// after the slot is already free, so the callback sees an idle channel.
fn finish(ctx: &VoiceContext, reason: FinishReason) {
    ctx.mixer.reset(ctx.slot);
    ctx.shared.playing.store(false, Ordering::Release);
    ctx.shared.position_ms.store(0, Ordering::Release);
    ctx.slots.release(ctx.slot);

    if matches!(reason, FinishReason::EndOfStream) {
        debug!("Voice {} reached end of stream", ctx.slot);
        let callback = ctx
            .shared
            .on_complete
            .lock()
            .expect("completion callback poisoned");
        if let Some(cb) = callback.as_ref() {
            cb();
        }
    }

    // Resolve any replay request that raced with termination, then mark
    // the worker finished so a waiting controller cannot block forever.
    let mut done = ctx
        .ctrl
        .rewind_done
        .lock()
        .expect("voice control poisoned");
    if ctx.ctrl.rewind.swap(false, Ordering::AcqRel) {
        *done = Some(false);
    }
    ctx.ctrl.finished.store(true, Ordering::Release);
    ctx.ctrl.rewind_cond.notify_all();
}
