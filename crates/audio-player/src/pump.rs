//! Output pump: the body of the audio output callback.
//!
//! The device asks for `n` samples at its own cadence. The pump drains the
//! session's playback buffer, refilling it synchronously (one decode unit at a
//! time) when it runs dry, applies volume/mute, and zero-fills plus raises the
//! EOF flag once the source is exhausted.
//!
//! ## Shared state
//! - the [`DecodeSession`] sits behind one mutex (the audio lock); the pump,
//!   seek, load and shutdown all take it for their whole read-modify-write
//! - position, duration, EOF, volume and mute are relaxed atomics; readers
//!   tolerate a callback period of staleness

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use crate::buffer::Gain;
use crate::error::DecodeError;
use crate::session::DecodeSession;

/// State shared between the control thread and the output callback.
pub struct SharedPlayback {
    session: Mutex<Option<DecodeSession>>,
    /// Seconds, stored as `f64` bits.
    position: AtomicU64,
    /// Seconds, stored as `f64` bits; `0.0` when unknown.
    duration: AtomicU64,
    eof: AtomicBool,
    /// Percent, stored as `f32` bits.
    volume: AtomicU32,
    muted: AtomicBool,
}

impl SharedPlayback {
    pub fn new(volume_percent: f32) -> Arc<Self> {
        Arc::new(Self {
            session: Mutex::new(None),
            position: AtomicU64::new(0f64.to_bits()),
            duration: AtomicU64::new(0f64.to_bits()),
            eof: AtomicBool::new(false),
            volume: AtomicU32::new(volume_percent.clamp(0.0, 100.0).to_bits()),
            muted: AtomicBool::new(false),
        })
    }

    /// Take the audio lock, blocking until the pump lets go of it.
    pub(crate) fn lock_session(&self) -> MutexGuard<'_, Option<DecodeSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Relaxed))
    }

    pub fn duration(&self) -> f64 {
        f64::from_bits(self.duration.load(Ordering::Relaxed))
    }

    pub fn eof(&self) -> bool {
        self.eof.load(Ordering::Relaxed)
    }

    pub fn clear_eof(&self) {
        self.eof.store(false, Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    pub fn set_volume(&self, percent: f32) {
        let percent = if percent.is_finite() { percent.clamp(0.0, 100.0) } else { 100.0 };
        self.volume.store(percent.to_bits(), Ordering::Relaxed);
    }

    pub fn muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    /// Swap in `session` (or nothing), dropping the old one under the audio lock.
    ///
    /// Position and EOF are reset; the duration starts from what the new
    /// session declared at open.
    pub fn replace_session(&self, session: Option<DecodeSession>) {
        let mut guard = self.lock_session();
        let duration = session.as_ref().and_then(DecodeSession::duration);
        *guard = session;
        self.reset_clock(duration);
    }

    /// Reset position/EOF for a freshly loaded session.
    fn reset_clock(&self, duration: Option<f64>) {
        self.position.store(0f64.to_bits(), Ordering::Relaxed);
        self.duration
            .store(duration.filter(|d| *d > 0.0).unwrap_or(0.0).to_bits(), Ordering::Relaxed);
        self.eof.store(false, Ordering::Relaxed);
    }

    /// Publish the target of a successful seek; the only way position moves back.
    pub(crate) fn publish_seek(&self, target: f64) {
        self.position.store(target.max(0.0).to_bits(), Ordering::Relaxed);
        self.eof.store(false, Ordering::Relaxed);
    }

    /// Publish the timestamp of a decoded frame and the latest known duration.
    pub(crate) fn publish_frame(&self, timestamp: Option<f64>, duration: Option<f64>) {
        if let Some(ts) = timestamp.filter(|t| t.is_finite() && *t >= 0.0) {
            // Non-negative f64 bit patterns order like the values they encode.
            self.position.fetch_max(ts.to_bits(), Ordering::Relaxed);
        }
        if let Some(d) = duration.filter(|d| d.is_finite() && *d > 0.0) {
            self.duration.store(d.to_bits(), Ordering::Relaxed);
        }
    }

    fn gain(&self) -> Gain {
        Gain::from_volume(self.volume(), self.muted())
    }
}

/// Cloneable handle that fills device buffers from the shared session.
#[derive(Clone)]
pub struct OutputPump {
    shared: Arc<SharedPlayback>,
}

impl OutputPump {
    pub fn new(shared: Arc<SharedPlayback>) -> Self {
        Self { shared }
    }

    /// Fill `out` with interleaved stereo `i16` samples.
    ///
    /// Never waits on the audio lock: while a seek or load holds it the
    /// request is answered with silence. Returns the number of samples that
    /// came from the source (the rest of `out` is silence).
    pub fn fill(&self, out: &mut [i16]) -> usize {
        let mut guard = match self.shared.session.try_lock() {
            Ok(g) => g,
            Err(TryLockError::WouldBlock) => {
                out.fill(0);
                return 0;
            }
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
        };
        let Some(session) = guard.as_mut() else {
            out.fill(0);
            return 0;
        };

        let gain = self.shared.gain();
        let mut written = 0usize;
        while written < out.len() {
            if session.buffer_exhausted() {
                match session.refill(&self.shared) {
                    Ok(()) => {}
                    Err(DecodeError::EndOfStream) => {
                        out[written..].fill(0);
                        if !self.shared.eof.swap(true, Ordering::Relaxed) {
                            tracing::debug!(path = %session.path().display(), "end of stream");
                        }
                        return written;
                    }
                    Err(e) => {
                        tracing::warn!("refill failed: {e}");
                        out[written..].fill(0);
                        return written;
                    }
                }
            }
            written += session.drain_into(&mut out[written..], gain);
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_session_outputs_silence() {
        let shared = SharedPlayback::new(100.0);
        let pump = OutputPump::new(shared.clone());
        let mut out = [5i16; 64];
        assert_eq!(pump.fill(&mut out), 0);
        assert!(out.iter().all(|&s| s == 0));
        assert!(!shared.eof());
    }

    #[test]
    fn publish_frame_never_moves_position_back() {
        let shared = SharedPlayback::new(100.0);
        shared.publish_frame(Some(2.5), Some(10.0));
        shared.publish_frame(Some(1.0), None);
        assert_eq!(shared.position(), 2.5);
        assert_eq!(shared.duration(), 10.0);
    }

    #[test]
    fn publish_seek_moves_position_back_and_clears_eof() {
        let shared = SharedPlayback::new(100.0);
        shared.publish_frame(Some(8.0), Some(10.0));
        shared.eof.store(true, Ordering::Relaxed);
        shared.publish_seek(3.0);
        assert_eq!(shared.position(), 3.0);
        assert!(!shared.eof());
    }

    #[test]
    fn publish_frame_ignores_invalid_values() {
        let shared = SharedPlayback::new(100.0);
        shared.publish_frame(Some(f64::NAN), Some(-1.0));
        shared.publish_frame(Some(-3.0), Some(f64::INFINITY));
        assert_eq!(shared.position(), 0.0);
        assert_eq!(shared.duration(), 0.0);
    }

    #[test]
    fn replace_session_clears_state() {
        let shared = SharedPlayback::new(100.0);
        shared.publish_frame(Some(4.0), Some(9.0));
        shared.eof.store(true, Ordering::Relaxed);
        shared.replace_session(None);
        assert_eq!(shared.position(), 0.0);
        assert_eq!(shared.duration(), 0.0);
        assert!(!shared.eof());
    }

    #[test]
    fn volume_is_clamped() {
        let shared = SharedPlayback::new(100.0);
        shared.set_volume(140.0);
        assert_eq!(shared.volume(), 100.0);
        shared.set_volume(-1.0);
        assert_eq!(shared.volume(), 0.0);
        shared.set_volume(f32::NAN);
        assert_eq!(shared.volume(), 100.0);
    }
}
