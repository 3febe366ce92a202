//! Playback buffer: one in-flight block of output samples plus a read cursor.
//!
//! Bridges the variable-size decode unit to the fixed-size pull requests of
//! the output device.

/// Output-format samples (interleaved stereo `i16`) waiting to be played.
#[derive(Debug, Default)]
pub struct PlaybackBuffer {
    samples: Vec<i16>,
    cursor: usize,
}

/// How the pump should write samples out.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gain {
    /// Zero-fill instead of copying.
    Muted,
    /// Linear scale, `1.0` is unity.
    Linear(f32),
}

impl Gain {
    /// Build from a volume percent and mute flag.
    pub fn from_volume(percent: f32, muted: bool) -> Self {
        if muted {
            Gain::Muted
        } else {
            Gain::Linear((percent / 100.0).clamp(0.0, 1.0))
        }
    }
}

impl PlaybackBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once the cursor has reached the end of the current block.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.samples.len()
    }

    /// Samples left to play in the current block.
    pub fn remaining(&self) -> usize {
        self.samples.len().saturating_sub(self.cursor)
    }

    /// Replace the current block and rewind the cursor.
    pub fn replace(&mut self, samples: Vec<i16>) {
        self.samples = samples;
        self.cursor = 0;
    }

    /// Drop any buffered samples so nothing stale is played.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.cursor = 0;
    }

    /// Copy up to `out.len()` samples into `out`, applying `gain`.
    ///
    /// Returns how many samples were written.
    pub fn drain_into(&mut self, out: &mut [i16], gain: Gain) -> usize {
        let n = self.remaining().min(out.len());
        let src = &self.samples[self.cursor..self.cursor + n];
        let dst = &mut out[..n];
        match gain {
            Gain::Muted => dst.fill(0),
            Gain::Linear(g) if g >= 1.0 => dst.copy_from_slice(src),
            Gain::Linear(g) => {
                for (d, &s) in dst.iter_mut().zip(src) {
                    *d = scale_sample(s, g);
                }
            }
        }
        self.cursor += n;
        n
    }
}

fn scale_sample(sample: i16, gain: f32) -> i16 {
    (sample as f32 * gain).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_exhausted() {
        let buf = PlaybackBuffer::new();
        assert!(buf.is_exhausted());
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn drain_into_advances_cursor_across_calls() {
        let mut buf = PlaybackBuffer::new();
        buf.replace(vec![1, 2, 3, 4, 5]);
        let mut out = [0i16; 3];
        assert_eq!(buf.drain_into(&mut out, Gain::Linear(1.0)), 3);
        assert_eq!(out, [1, 2, 3]);
        assert_eq!(buf.drain_into(&mut out, Gain::Linear(1.0)), 2);
        assert_eq!(&out[..2], &[4, 5]);
        assert!(buf.is_exhausted());
        assert_eq!(buf.drain_into(&mut out, Gain::Linear(1.0)), 0);
    }

    #[test]
    fn drain_into_scales_by_volume() {
        let mut buf = PlaybackBuffer::new();
        buf.replace(vec![1000, -1000, i16::MIN]);
        let mut out = [0i16; 3];
        buf.drain_into(&mut out, Gain::from_volume(50.0, false));
        assert_eq!(out, [500, -500, i16::MIN / 2]);
    }

    #[test]
    fn drain_into_zero_fills_when_muted() {
        let mut buf = PlaybackBuffer::new();
        buf.replace(vec![7, 7]);
        let mut out = [1i16; 2];
        assert_eq!(buf.drain_into(&mut out, Gain::from_volume(100.0, true)), 2);
        assert_eq!(out, [0, 0]);
        assert!(buf.is_exhausted());
    }

    #[test]
    fn clear_discards_pending_samples() {
        let mut buf = PlaybackBuffer::new();
        buf.replace(vec![1, 2]);
        buf.clear();
        assert!(buf.is_exhausted());
    }

    #[test]
    fn gain_clamps_out_of_range_volume() {
        assert_eq!(Gain::from_volume(150.0, false), Gain::Linear(1.0));
        assert_eq!(Gain::from_volume(-3.0, false), Gain::Linear(0.0));
    }
}
