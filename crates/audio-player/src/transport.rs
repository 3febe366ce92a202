//! Transport controller: load / play / stop / seek over one decode session.
//!
//! Owns the output stream, the shared playback state and the sequencer. All
//! methods are called from the control thread; the output callback only ever
//! sees [`SharedPlayback`] through an [`OutputPump`].
//!
//! Teardown order is fixed: the output stream is paused and dropped first, so
//! the callback can no longer run, then the session is dropped under the audio
//! lock.

use std::path::Path;
use std::sync::Arc;

use crate::config::PlaybackConfig;
use crate::device::{OutputBackend, OutputStream};
use crate::playlist::{LastSession, PlaylistStore};
use crate::pump::{OutputPump, SharedPlayback};
use crate::sequencer::TrackSequencer;
use crate::session::DecodeSession;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    /// Nothing loaded.
    Idle,
    /// Loaded and never started since the load.
    Loaded,
    Playing,
    /// Stopped after playing; the position is kept.
    Paused,
}

/// Outcome of an end-of-track poll that fired.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// `finished` completed and `next` is now playing.
    Advanced { finished: String, next: String },
    /// `finished` completed and nothing could be started after it.
    Stopped { finished: String },
}

pub struct Transport {
    // Dropped before `shared` so the callback stops first.
    output: Option<Box<dyn OutputStream>>,
    shared: Arc<SharedPlayback>,
    backend: Box<dyn OutputBackend>,
    store: Arc<PlaylistStore>,
    sequencer: TrackSequencer,
    config: PlaybackConfig,
    state: TransportState,
    current: Option<String>,
    pending_resume: Option<f64>,
    shuffle: bool,
}

impl Transport {
    pub fn new(
        backend: Box<dyn OutputBackend>,
        store: Arc<PlaylistStore>,
        config: PlaybackConfig,
    ) -> Self {
        Self::with_sequencer(backend, store, config, TrackSequencer::new())
    }

    pub fn with_sequencer(
        backend: Box<dyn OutputBackend>,
        store: Arc<PlaylistStore>,
        config: PlaybackConfig,
        sequencer: TrackSequencer,
    ) -> Self {
        let config = config.sanitized();
        Self {
            output: None,
            shared: SharedPlayback::new(config.volume),
            backend,
            store,
            sequencer,
            config,
            state: TransportState::Idle,
            current: None,
            pending_resume: None,
            shuffle: false,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn current_track(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn store(&self) -> &Arc<PlaylistStore> {
        &self.store
    }

    /// A pump over this transport's shared state, for driving playback without
    /// a device.
    pub fn pump(&self) -> OutputPump {
        OutputPump::new(self.shared.clone())
    }

    /// Replace the current track with `path`.
    ///
    /// The previous session is torn down before the new file is opened, so a
    /// failed load leaves nothing loaded.
    pub fn load(&mut self, path: &str) -> bool {
        self.remember_position();
        self.teardown();

        // Opening probes the container; keep the audio lock out of it.
        let session = match DecodeSession::open(Path::new(path), self.config.chunk_frames) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(path, "load failed: {e}");
                return false;
            }
        };
        let duration = session.duration();
        self.shared.replace_session(Some(session));

        let pump = OutputPump::new(self.shared.clone());
        match self.backend.open(pump) {
            Ok(output) => self.output = Some(output),
            Err(e) => {
                tracing::warn!(path, "load failed: {e}");
                self.teardown();
                return false;
            }
        }

        self.current = Some(path.to_string());
        self.pending_resume = self.store.resume_position(path).filter(|r| *r > 0.0);
        self.state = TransportState::Loaded;
        tracing::info!(path, duration_s = ?duration, resume_s = ?self.pending_resume, "track loaded");
        true
    }

    /// Start output. Applies a pending resume position first.
    pub fn play(&mut self) {
        if !matches!(self.state, TransportState::Loaded | TransportState::Paused) {
            return;
        }
        if let Some(resume) = self.pending_resume.take() {
            let duration = self.total_duration();
            if resume > 0.0 && resume < duration - self.config.seek_guard_seconds {
                self.seek_to(resume);
            } else {
                tracing::debug!(resume_s = resume, duration_s = duration, "resume position ignored");
            }
        }
        if let Some(output) = self.output.as_mut() {
            if let Err(e) = output.play() {
                tracing::warn!("failed to start output: {e:#}");
                return;
            }
        }
        self.state = TransportState::Playing;
        tracing::debug!(position_s = self.current_position(), "playing");
    }

    /// Pause output, keeping the session and position.
    pub fn stop(&mut self) {
        if self.state != TransportState::Playing {
            return;
        }
        if let Some(output) = self.output.as_mut() {
            if let Err(e) = output.pause() {
                tracing::warn!("failed to pause output: {e:#}");
            }
        }
        self.state = TransportState::Paused;
        self.remember_position();
        tracing::debug!(position_s = self.current_position(), "paused");
    }

    pub fn toggle(&mut self) {
        if self.is_playing() {
            self.stop();
        } else {
            self.play();
        }
    }

    /// Seek to `seconds`, clamped so the target never lands on the end of the
    /// track.
    ///
    /// The pump answers with silence while the seek holds the audio lock.
    pub fn seek_to(&mut self, seconds: f64) -> bool {
        if self.state == TransportState::Idle {
            return false;
        }
        let target = clamp_seek(seconds, self.total_duration(), self.config.seek_guard_seconds);
        let mut guard = self.shared.lock_session();
        let Some(session) = guard.as_mut() else {
            return false;
        };
        match session.seek(target) {
            Ok(()) => {
                self.shared.publish_seek(target);
                tracing::debug!(seconds = target, "seek");
                true
            }
            Err(e) => {
                tracing::warn!(seconds = target, "{e}");
                false
            }
        }
    }

    /// Seek relative to the current position.
    pub fn seek_by(&mut self, delta_seconds: f64) -> bool {
        self.seek_to(self.current_position() + delta_seconds)
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn current_position(&self) -> f64 {
        self.shared.position()
    }

    /// Duration in seconds; `0.0` when unknown.
    pub fn total_duration(&self) -> f64 {
        self.shared.duration()
    }

    /// Whether the pump ran out of source. Stays set until cleared.
    pub fn reached_end_of_stream(&self) -> bool {
        self.shared.eof()
    }

    pub fn clear_end_of_stream(&self) {
        self.shared.clear_eof();
    }

    pub fn set_volume(&self, percent: f32) {
        self.shared.set_volume(percent);
    }

    pub fn volume(&self) -> f32 {
        self.shared.volume()
    }

    pub fn set_muted(&self, muted: bool) {
        self.shared.set_muted(muted);
    }

    pub fn muted(&self) -> bool {
        self.shared.muted()
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    /// Skip to the next track of the active playlist and play it.
    ///
    /// A skip does not count as a completion.
    pub fn next(&mut self) -> bool {
        let Some(view) = self.store.active_view() else {
            return false;
        };
        match self
            .sequencer
            .select_next(&view, self.current.as_deref(), self.shuffle)
        {
            Some(path) => self.load_and_play(&path),
            None => false,
        }
    }

    /// Go back to the previous track of the active playlist and play it.
    pub fn previous(&mut self) -> bool {
        let Some(view) = self.store.active_view() else {
            return false;
        };
        match self.sequencer.select_previous(&view, self.current.as_deref()) {
            Some(path) => self.load_and_play(&path),
            None => false,
        }
    }

    fn load_and_play(&mut self, path: &str) -> bool {
        if !self.load(path) {
            return false;
        }
        self.play();
        true
    }

    /// Detect the end of the playing track and advance.
    ///
    /// Fires when the pump raised EOF or the position reached a known
    /// duration. The finished track's play count is incremented and saved,
    /// then the sequencer's choice is loaded and started.
    pub fn poll_end_of_track(&mut self) -> Option<TransportEvent> {
        if self.state != TransportState::Playing {
            return None;
        }
        let duration = self.total_duration();
        let at_end = duration > 0.0 && self.current_position() >= duration;
        if !(self.reached_end_of_stream() || at_end) {
            return None;
        }
        self.clear_end_of_stream();
        let finished = self.current.take()?;
        tracing::info!(path = %finished, "track finished");

        if self.store.record_completion(&finished) {
            if let Err(e) = self.store.save() {
                tracing::warn!("failed to save playlists: {e:#}");
            }
        }
        let next = self.store.active_view().and_then(|view| {
            self.sequencer.record_completion(&view, &finished);
            self.sequencer
                .select_next(&view, Some(&finished), self.shuffle)
        });

        match next {
            Some(next) if self.load_and_play(&next) => Some(TransportEvent::Advanced { finished, next }),
            _ => {
                self.teardown();
                Some(TransportEvent::Stopped { finished })
            }
        }
    }

    /// Destroy the session, saving the current position first.
    pub fn unload(&mut self) {
        self.remember_position();
        self.teardown();
    }

    /// Remove the track at `index` from the active playlist, unloading it
    /// first when it is the one loaded.
    pub fn remove_track(&mut self, index: usize) -> bool {
        let Some(view) = self.store.active_view() else {
            return false;
        };
        let Some(path) = view.tracks.get(index) else {
            return false;
        };
        if self.current.as_deref() == Some(path.as_str()) {
            self.teardown();
        }
        self.store.remove_track(index).is_some()
    }

    /// Load the file that was playing at the last shutdown and resume it.
    pub fn resume_last_session(&mut self) -> bool {
        let Some(last) = self.store.last_session() else {
            return false;
        };
        if let Some(index) = self.store.find_playlist_containing(&last.file) {
            self.store.set_active(index);
        }
        if !self.load(&last.file) {
            return false;
        }
        self.pending_resume = Some(last.position);
        self.play();
        true
    }

    /// Record the last session, release the device and session, and save.
    pub fn shutdown(&mut self) -> anyhow::Result<()> {
        if let Some(path) = self.current.clone() {
            let position = self.current_position();
            self.store.set_resume_position(&path, position);
            self.store.set_last_session(Some(LastSession { file: path, position }));
        }
        self.teardown();
        self.store.save()
    }

    fn remember_position(&self) {
        if let Some(path) = self.current.as_deref() {
            self.store.set_resume_position(path, self.current_position());
        }
    }

    fn teardown(&mut self) {
        if let Some(mut output) = self.output.take() {
            if let Err(e) = output.pause() {
                tracing::debug!("pause before close failed: {e:#}");
            }
        }
        self.shared.replace_session(None);
        self.state = TransportState::Idle;
        self.current = None;
        self.pending_resume = None;
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Clamp a seek target into `[0, duration - guard]`.
///
/// With an unknown duration only the lower bound applies.
pub fn clamp_seek(seconds: f64, duration: f64, guard: f64) -> f64 {
    let seconds = if seconds.is_nan() { 0.0 } else { seconds };
    let upper = if duration > 0.0 {
        (duration - guard).max(0.0)
    } else {
        f64::INFINITY
    };
    let target = seconds.clamp(0.0, upper);
    if target.is_finite() { target } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::NullBackend;
    use crate::error::DecodeError;

    struct FailingBackend;

    impl OutputBackend for FailingBackend {
        fn open(&self, _pump: OutputPump) -> std::result::Result<Box<dyn OutputStream>, DecodeError> {
            Err(DecodeError::DeviceOpenFailed("no output device".into()))
        }
    }

    /// Mono 16-bit PCM WAV at 44.1 kHz holding `frames` samples of `value`.
    fn write_wav(path: &Path, frames: u32, value: i16) {
        let data_len = frames * 2;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&44_100u32.to_le_bytes());
        bytes.extend_from_slice(&88_200u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for _ in 0..frames {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }

    fn transport() -> (Transport, NullBackend, Arc<PlaylistStore>) {
        let backend = NullBackend::default();
        let store = Arc::new(PlaylistStore::in_memory());
        let t = Transport::with_sequencer(
            Box::new(backend.clone()),
            store.clone(),
            PlaybackConfig::default(),
            TrackSequencer::with_seed(9),
        );
        (t, backend, store)
    }

    #[test]
    fn clamp_seek_bounds() {
        assert_eq!(clamp_seek(-5.0, 10.0, 1.0), 0.0);
        assert_eq!(clamp_seek(110.0, 10.0, 1.0), 9.0);
        assert_eq!(clamp_seek(4.0, 10.0, 1.0), 4.0);
        assert_eq!(clamp_seek(3.0, 0.5, 1.0), 0.0);
        assert_eq!(clamp_seek(f64::NAN, 10.0, 1.0), 0.0);
        assert_eq!(clamp_seek(30.0, 0.0, 1.0), 30.0);
        assert_eq!(clamp_seek(f64::INFINITY, 0.0, 1.0), 0.0);
    }

    #[test]
    fn idle_transport_ignores_commands() {
        let (mut t, backend, _) = transport();
        assert_eq!(t.state(), TransportState::Idle);
        t.play();
        assert!(!t.is_playing());
        assert!(!backend.is_started());
        t.stop();
        assert!(!t.seek_to(3.0));
        assert!(t.poll_end_of_track().is_none());
        assert!(!t.next());
        assert!(!t.previous());
    }

    #[test]
    fn failed_load_leaves_idle() {
        let (mut t, backend, _) = transport();
        assert!(!t.load("/definitely/not/here.flac"));
        assert_eq!(t.state(), TransportState::Idle);
        assert_eq!(t.current_track(), None);
        assert_eq!(t.total_duration(), 0.0);
        assert!(!backend.is_started());
    }

    #[test]
    fn volume_and_mute_pass_through() {
        let (t, _, _) = transport();
        assert_eq!(t.volume(), 100.0);
        t.set_volume(35.0);
        t.set_muted(true);
        assert_eq!(t.volume(), 35.0);
        assert!(t.muted());
    }

    #[test]
    fn shuffle_flag_round_trips() {
        let (mut t, _, _) = transport();
        assert!(!t.shuffle());
        t.set_shuffle(true);
        assert!(t.shuffle());
    }

    #[test]
    fn remove_track_out_of_range_is_rejected() {
        let (mut t, _, store) = transport();
        assert!(!t.remove_track(0));
        store.create_playlist(None);
        store.add_track("a.flac");
        assert!(!t.remove_track(3));
        assert!(t.remove_track(0));
        assert!(store.active_view().unwrap().is_empty());
    }

    #[test]
    fn resume_without_last_session_does_nothing() {
        let (mut t, _, _) = transport();
        assert!(!t.resume_last_session());
        assert!(t.shutdown().is_ok());
    }

    #[test]
    fn device_open_failure_leaves_idle_and_silent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 44_100, 9_000);
        let mut t = Transport::new(
            Box::new(FailingBackend),
            Arc::new(PlaylistStore::in_memory()),
            PlaybackConfig::default(),
        );

        assert!(!t.load(&path.to_string_lossy()));
        assert_eq!(t.state(), TransportState::Idle);
        assert_eq!(t.current_track(), None);
        assert_eq!(t.total_duration(), 0.0);

        let mut chunk = vec![5i16; 512];
        assert_eq!(t.pump().fill(&mut chunk), 0);
        assert!(chunk.iter().all(|&s| s == 0));
        t.play();
        assert!(!t.is_playing());
    }

    #[test]
    fn position_at_duration_ends_track_without_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiet.wav");
        write_wav(&path, 44_100, 0);
        let path = path.to_string_lossy().into_owned();
        let (mut t, backend, _) = transport();

        assert!(t.load(&path));
        t.play();
        assert!(backend.is_started());
        let duration = t.total_duration();
        assert!(duration > 0.0);
        assert!(t.poll_end_of_track().is_none());

        t.shared.publish_frame(Some(duration), Some(duration));
        assert!(!t.reached_end_of_stream());
        assert_eq!(
            t.poll_end_of_track(),
            Some(TransportEvent::Stopped { finished: path })
        );
        assert_eq!(t.state(), TransportState::Idle);
        assert!(!backend.is_started());
    }
}
