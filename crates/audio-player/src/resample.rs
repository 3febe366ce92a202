//! Resample stage.
//!
//! Converts decoded frames of any layout/rate into the fixed output format:
//! interleaved stereo `i16` at [`OUTPUT_SAMPLE_RATE`]. Built lazily from the
//! first decoded frame of a session and reused for the rest of it.
//!
//! Rate conversion uses Rubato's streaming sinc resampler with a fixed input
//! chunk; input that does not fill a chunk is held back (the resampler delay)
//! until the next frame arrives or [`Resampler::flush`] is called at end of stream.

use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler as RubatoResampler, SincInterpolationParameters,
    SincInterpolationType, WindowFunction, calculate_cutoff,
};

use crate::config::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::decode::DecodedFrame;

/// Frame-to-output converter for one decode session.
pub struct Resampler {
    src_rate: u32,
    src_channels: usize,
    rate: Option<RateStage>,
}

struct RateStage {
    inner: Box<dyn RubatoResampler<f32> + Send>,
    chunk_frames: usize,
    /// Interleaved stereo input waiting for a full chunk.
    pending: Vec<f32>,
    /// Output past the per-call size bound, emitted first on the next call.
    carry: Vec<f32>,
    scratch: Vec<f32>,
    indexing: Indexing,
}

impl Resampler {
    /// Build from the first decoded frame of a session.
    ///
    /// Returns `None` if the frame has no usable rate or channel layout.
    pub fn from_first_frame(frame: &DecodedFrame, chunk_frames: usize) -> Option<Self> {
        if frame.sample_rate == 0 || frame.channels == 0 {
            return None;
        }
        let rate = if frame.sample_rate == OUTPUT_SAMPLE_RATE {
            tracing::info!(rate_hz = frame.sample_rate, "resample skipped");
            None
        } else {
            match RateStage::new(frame.sample_rate, chunk_frames) {
                Ok(stage) => {
                    tracing::info!(
                        from_hz = frame.sample_rate,
                        to_hz = OUTPUT_SAMPLE_RATE,
                        channels = frame.channels,
                        "resampling"
                    );
                    Some(stage)
                }
                Err(e) => {
                    tracing::error!("resampler init error: {e:#}");
                    return None;
                }
            }
        };
        Some(Self {
            src_rate: frame.sample_rate,
            src_channels: frame.channels,
            rate,
        })
    }

    /// Convert one decoded frame to interleaved stereo `i16`.
    ///
    /// May return fewer samples than the frame holds (or none) while input is
    /// buffered for the next chunk. Fresh output is capped at
    /// [`expected_output_frames`] for the held-back plus incoming input.
    /// Processing errors are logged and whatever was produced so far is returned.
    pub fn convert(&mut self, frame: &DecodedFrame) -> Vec<i16> {
        if frame.channels != self.src_channels {
            tracing::debug!(
                expected = self.src_channels,
                got = frame.channels,
                "frame layout differs from session layout"
            );
        }
        let stereo = map_to_stereo(&frame.samples, frame.channels);
        match self.rate.as_mut() {
            None => to_i16(&stereo),
            Some(stage) => {
                let delay = stage.pending.len() / OUTPUT_CHANNELS;
                let incoming = stereo.len() / OUTPUT_CHANNELS;
                let expected = expected_output_frames(delay, incoming, self.src_rate, OUTPUT_SAMPLE_RATE);
                stage.pending.extend_from_slice(&stereo);
                let mut out = std::mem::take(&mut stage.carry);
                let limit = out.len() + expected * OUTPUT_CHANNELS;
                out.reserve(expected * OUTPUT_CHANNELS);
                stage.process_full_chunks(&mut out);
                if out.len() > limit {
                    stage.carry = out.split_off(limit);
                }
                to_i16(&out)
            }
        }
    }

    /// Forget held-back input and the sinc history (used after a seek).
    pub fn discard_pending(&mut self) {
        if let Some(stage) = self.rate.as_mut() {
            stage.pending.clear();
            stage.carry.clear();
            stage.inner.reset();
        }
    }

    /// Push any held-back input through the resampler.
    pub fn flush(&mut self) -> Vec<i16> {
        let Some(stage) = self.rate.as_mut() else {
            return Vec::new();
        };
        let mut out = std::mem::take(&mut stage.carry);
        stage.process_tail(&mut out);
        to_i16(&out)
    }
}

impl RateStage {
    fn new(src_rate: u32, chunk_frames: usize) -> Result<Self, rubato::ResamplerConstructionError> {
        let f_ratio = OUTPUT_SAMPLE_RATE as f64 / src_rate as f64;

        let sinc_len = 128;
        let oversampling_factor = 256;
        let interpolation = SincInterpolationType::Cubic;
        let window = WindowFunction::BlackmanHarris2;
        let f_cutoff = calculate_cutoff(sinc_len, window);

        let params = SincInterpolationParameters {
            sinc_len,
            f_cutoff,
            interpolation,
            oversampling_factor,
            window,
        };

        let chunk_frames = chunk_frames.max(1);
        let inner = Async::<f32>::new_sinc(
            f_ratio,
            1.1,
            &params,
            chunk_frames,
            OUTPUT_CHANNELS,
            FixedAsync::Input,
        )?;

        Ok(Self {
            inner: Box::new(inner),
            chunk_frames,
            pending: Vec::new(),
            carry: Vec::new(),
            scratch: vec![0.0; max_output_frames(chunk_frames, f_ratio) * OUTPUT_CHANNELS],
            indexing: Indexing {
                input_offset: 0,
                output_offset: 0,
                active_channels_mask: None,
                partial_len: None,
            },
        })
    }

    fn process_full_chunks(&mut self, out: &mut Vec<f32>) {
        let chunk_samples = self.chunk_frames * OUTPUT_CHANNELS;
        let mut consumed = 0usize;
        while self.pending.len() - consumed >= chunk_samples {
            let input = &self.pending[consumed..consumed + chunk_samples];
            match run_chunk(
                self.inner.as_mut(),
                &mut self.indexing,
                input,
                self.chunk_frames,
                None,
                &mut self.scratch,
            ) {
                Some(produced) => out.extend_from_slice(&self.scratch[..produced]),
                None => {
                    // Drop the rest of the pending input rather than looping on it.
                    consumed = self.pending.len();
                    break;
                }
            }
            consumed += chunk_samples;
        }
        self.pending.drain(..consumed);
    }

    fn process_tail(&mut self, out: &mut Vec<f32>) {
        let tail_frames = self.pending.len() / OUTPUT_CHANNELS;
        if tail_frames == 0 {
            self.pending.clear();
            return;
        }
        let tail = std::mem::take(&mut self.pending);
        if let Some(produced) = run_chunk(
            self.inner.as_mut(),
            &mut self.indexing,
            &tail[..tail_frames * OUTPUT_CHANNELS],
            tail_frames,
            Some(tail_frames),
            &mut self.scratch,
        ) {
            out.extend_from_slice(&self.scratch[..produced]);
        }
    }
}

/// Run one resampler call; returns the number of output samples written to `scratch`.
fn run_chunk(
    resampler: &mut (dyn RubatoResampler<f32> + Send),
    indexing: &mut Indexing,
    input: &[f32],
    input_frames: usize,
    partial_len: Option<usize>,
    scratch: &mut [f32],
) -> Option<usize> {
    let input_adapter = match InterleavedSlice::new(input, OUTPUT_CHANNELS, input_frames) {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("interleaved slice (input) error: {e:#}");
            return None;
        }
    };

    let out_capacity_frames = scratch.len() / OUTPUT_CHANNELS;
    let mut output_adapter =
        match InterleavedSlice::new_mut(scratch, OUTPUT_CHANNELS, out_capacity_frames) {
            Ok(a) => a,
            Err(e) => {
                tracing::error!("interleaved slice (output) error: {e:#}");
                return None;
            }
        };

    indexing.input_offset = 0;
    indexing.output_offset = 0;
    indexing.partial_len = partial_len;

    match resampler.process_into_buffer(&input_adapter, &mut output_adapter, Some(&*indexing)) {
        Ok((_nbr_in, nbr_out)) => Some(nbr_out * OUTPUT_CHANNELS),
        Err(e) => {
            tracing::error!("resampler process error: {e:#}");
            None
        }
    }
}

/// Output frames needed for `delay + input` source frames, rounded up.
pub fn expected_output_frames(delay_frames: usize, input_frames: usize, in_rate: u32, out_rate: u32) -> usize {
    if in_rate == 0 {
        return 0;
    }
    let total = (delay_frames + input_frames) as u64 * out_rate as u64;
    total.div_ceil(in_rate as u64) as usize
}

fn max_output_frames(chunk_frames: usize, ratio: f64) -> usize {
    (chunk_frames as f64 * ratio * 1.1).ceil() as usize + 64
}

/// Map interleaved samples of any channel count onto stereo.
///
/// - mono: duplicated to both sides
/// - stereo: pass-through
/// - more channels: the first two are kept
pub fn map_to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples.to_vec(),
        n => samples
            .chunks_exact(n)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| <i16 as cpal::Sample>::from_sample::<f32>(s.clamp(-1.0, 1.0)))
        .collect()
}
