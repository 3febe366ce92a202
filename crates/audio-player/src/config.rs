use serde::Deserialize;

/// Output sample rate every track is converted to.
pub const OUTPUT_SAMPLE_RATE: u32 = 44_100;
/// Output channel count (interleaved stereo).
pub const OUTPUT_CHANNELS: usize = 2;

/// Playback tuning parameters shared by decode/resample/output stages.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Resampler input chunk size in frames.
    pub chunk_frames: usize,
    /// Requested device buffer size in frames (`None` uses the device default).
    pub device_buffer_frames: Option<u32>,
    /// Guard band kept between a seek target and the end of the track.
    pub seek_guard_seconds: f64,
    /// Initial volume percent (0..=100).
    pub volume: f32,
}

impl Default for PlaybackConfig {
    /// Defaults tuned for low-risk playback across common devices.
    fn default() -> Self {
        Self {
            chunk_frames: 1024,
            device_buffer_frames: Some(4096),
            seek_guard_seconds: 1.0,
            volume: 100.0,
        }
    }
}

impl PlaybackConfig {
    /// Return a copy with out-of-range values pulled back into range.
    pub fn sanitized(mut self) -> Self {
        self.chunk_frames = self.chunk_frames.clamp(64, 16_384);
        if !self.seek_guard_seconds.is_finite() || self.seek_guard_seconds < 0.0 {
            self.seek_guard_seconds = 1.0;
        }
        if !self.volume.is_finite() {
            self.volume = 100.0;
        }
        self.volume = self.volume.clamp(0.0, 100.0);
        self
    }
}
