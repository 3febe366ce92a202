//! Source decoder.
//!
//! Uses Symphonia to:
//! - probe the input container and pick the first audio track
//! - decode one frame at a time on demand (no background thread; the output
//!   pump drives it)
//! - seek to a position in seconds

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, CodecParameters, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

use crate::error::{DecodeError, Result};

/// Metadata captured while opening the source.
#[derive(Clone, Debug, Default)]
pub struct StreamInfo {
    /// Source sample rate, when the container declares it.
    pub sample_rate: Option<u32>,
    /// Source channel count, when the container declares it.
    pub channels: Option<usize>,
    /// Declared duration in seconds (some containers only know it later).
    pub duration: Option<f64>,
    /// Codec name (best-effort).
    pub codec: Option<String>,
}

/// One decoded unit of audio.
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    /// Interleaved samples.
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
    /// Presentation timestamp in seconds, if the stream has a time base.
    pub timestamp: Option<f64>,
}

impl DecodedFrame {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }
}

/// Demux + codec handles for exactly one open file.
///
/// Field order is drop order: the codec is released before the demuxer.
pub struct SourceDecoder {
    decoder: Box<dyn Decoder>,
    format: Box<dyn FormatReader>,
    track_id: u32,
    time_base: Option<TimeBase>,
}

impl SourceDecoder {
    /// Open `path`, probe its container, select the first audio track and open a decoder.
    ///
    /// Anything acquired before a failure is dropped before returning.
    pub fn open(path: &Path) -> Result<(Self, StreamInfo)> {
        let display = path.display().to_string();
        let file = File::open(path).map_err(|e| DecodeError::OpenFailed {
            path: display.clone(),
            reason: e.to_string(),
        })?;

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| DecodeError::OpenFailed {
                path: display,
                reason: e.to_string(),
            })?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioStream)?;
        let track_id = track.id;
        let params: CodecParameters = track.codec_params.clone();

        let codecs = symphonia::default::get_codecs();
        if codecs.get_codec(params.codec).is_none() {
            let name = codec_name_from_params(&params).unwrap_or_else(|| format!("{:?}", params.codec));
            return Err(DecodeError::CodecUnavailable(name));
        }
        let decoder = codecs
            .make(&params, &DecoderOptions::default())
            .map_err(|e| DecodeError::CodecOpenFailed(e.to_string()))?;

        let info = StreamInfo {
            sample_rate: params.sample_rate,
            channels: params.channels.map(|c| c.count()),
            duration: duration_from_codec_params(&params),
            codec: codec_name_from_params(&params),
        };

        Ok((
            Self {
                decoder,
                format,
                track_id,
                time_base: params.time_base,
            },
            info,
        ))
    }

    /// Read packets of the selected track until one decodes into a frame.
    ///
    /// Packets from other tracks are skipped. Per-packet decode errors are
    /// swallowed and reading continues. Returns [`DecodeError::EndOfStream`]
    /// when the container has nothing left to read.
    pub fn read_and_decode_one(&mut self) -> Result<DecodedFrame> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Err(DecodeError::EndOfStream);
                }
                Err(e) => {
                    tracing::debug!("packet read ended: {e}");
                    return Err(DecodeError::EndOfStream);
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(e) => {
                    tracing::debug!(ts = packet.ts(), "skipping undecodable packet: {e}");
                    continue;
                }
            };
            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            return Ok(DecodedFrame {
                samples: sample_buf.samples().to_vec(),
                channels: spec.channels.count(),
                sample_rate: spec.rate,
                timestamp: self.time_base.map(|tb| time_to_seconds(tb.calc_time(packet.ts()))),
            });
        }
    }

    /// Backward-biased seek to `target_seconds`, then flush decoder state.
    ///
    /// On failure the read cursor is wherever the container left it.
    pub fn seek(&mut self, target_seconds: f64) -> Result<()> {
        let time = Time::from(target_seconds.max(0.0));
        self.format
            .seek(
                SeekMode::Coarse,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| DecodeError::SeekFailed(e.to_string()))?;
        self.decoder.reset();
        Ok(())
    }

    /// Current declared duration of the selected track.
    ///
    /// Re-read on every call because some containers fill it in while demuxing.
    pub fn duration(&self) -> Option<f64> {
        self.format
            .tracks()
            .iter()
            .find(|t| t.id == self.track_id)
            .and_then(|t| duration_from_codec_params(&t.codec_params))
    }
}

fn time_to_seconds(time: Time) -> f64 {
    time.seconds as f64 + time.frac
}

/// Best-effort duration in seconds from codec metadata.
///
/// Prefers the track time base; falls back to `n_frames / sample_rate`.
fn duration_from_codec_params(codec_params: &CodecParameters) -> Option<f64> {
    let frames = codec_params.n_frames?;
    if let Some(tb) = codec_params.time_base {
        let secs = time_to_seconds(tb.calc_time(frames));
        if secs > 0.0 {
            return Some(secs);
        }
    }
    let rate = codec_params.sample_rate? as f64;
    if rate == 0.0 {
        return None;
    }
    Some(frames as f64 / rate)
}

/// Best-effort codec label used for logging.
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_OPUS => "OPUS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use symphonia::core::codecs::*;

    #[test]
    fn duration_from_codec_params_handles_zero_rate() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(0);
        params.n_frames = Some(100);
        assert!(duration_from_codec_params(&params).is_none());
    }

    #[test]
    fn duration_from_codec_params_computes_from_rate() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(48_000);
        params.n_frames = Some(96_000);
        assert_eq!(duration_from_codec_params(&params), Some(2.0));
    }

    #[test]
    fn duration_from_codec_params_prefers_time_base() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(48_000);
        params.time_base = Some(TimeBase::new(1, 22_050));
        params.n_frames = Some(220_500);
        let secs = duration_from_codec_params(&params).unwrap();
        assert!((secs - 10.0).abs() < 1e-9);
    }

    #[test]
    fn codec_name_from_params_maps_known_codecs() {
        let mut params = CodecParameters::new();
        params.codec = CODEC_TYPE_FLAC;
        assert_eq!(codec_name_from_params(&params), Some("FLAC".to_string()));
        params.codec = CODEC_TYPE_PCM_S16LE;
        assert_eq!(codec_name_from_params(&params), Some("PCM_S16".to_string()));
    }

    #[test]
    fn codec_name_from_params_unknown_returns_none() {
        let params = CodecParameters::new();
        assert!(codec_name_from_params(&params).is_none());
    }

    #[test]
    fn open_missing_file_is_open_failed() {
        let err = SourceDecoder::open(Path::new("/definitely/not/here.flac"))
            .err()
            .expect("open should fail");
        assert!(matches!(err, DecodeError::OpenFailed { .. }));
    }

    #[test]
    fn decoded_frame_counts_frames() {
        let frame = DecodedFrame {
            samples: vec![0.0; 8],
            channels: 2,
            sample_rate: 44_100,
            timestamp: None,
        };
        assert_eq!(frame.frames(), 4);
    }
}
