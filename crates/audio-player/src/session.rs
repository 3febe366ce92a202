//! Decode session: everything that belongs to the currently loaded track.
//!
//! A session is built whole by [`DecodeSession::open`] and destroyed whole by
//! dropping it. Field order is the teardown order: buffer, then resampler,
//! then codec and demuxer (inside [`SourceDecoder`]).

use std::path::{Path, PathBuf};

use crate::buffer::{Gain, PlaybackBuffer};
use crate::decode::{SourceDecoder, StreamInfo};
use crate::error::{DecodeError, Result};
use crate::pump::SharedPlayback;
use crate::resample::Resampler;

pub struct DecodeSession {
    buffer: PlaybackBuffer,
    resampler: Option<Resampler>,
    source: SourceDecoder,
    path: PathBuf,
    info: StreamInfo,
    chunk_frames: usize,
    tail_flushed: bool,
    ended: bool,
}

impl DecodeSession {
    /// Open `path` and build a session around it. No audio is decoded yet.
    pub fn open(path: &Path, chunk_frames: usize) -> Result<Self> {
        let (source, info) = SourceDecoder::open(path)?;
        tracing::info!(
            path = %path.display(),
            codec = info.codec.as_deref().unwrap_or("unknown"),
            rate_hz = ?info.sample_rate,
            channels = ?info.channels,
            duration_s = ?info.duration,
            "source opened"
        );
        Ok(Self {
            buffer: PlaybackBuffer::new(),
            resampler: None,
            source,
            path: path.to_path_buf(),
            info,
            chunk_frames,
            tail_flushed: false,
            ended: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn buffer_exhausted(&self) -> bool {
        self.buffer.is_exhausted()
    }

    /// Copy buffered output into `out`; see [`PlaybackBuffer::drain_into`].
    pub fn drain_into(&mut self, out: &mut [i16], gain: Gain) -> usize {
        self.buffer.drain_into(out, gain)
    }

    /// Decode until the playback buffer holds fresh output.
    ///
    /// Each decoded frame publishes its timestamp and the stream duration to
    /// `clock`. At end of container the resampler tail is played out once,
    /// after which this keeps returning [`DecodeError::EndOfStream`].
    pub fn refill(&mut self, clock: &SharedPlayback) -> Result<()> {
        if self.ended {
            return Err(DecodeError::EndOfStream);
        }
        loop {
            match self.source.read_and_decode_one() {
                Ok(frame) => {
                    if self.resampler.is_none() {
                        self.resampler = Resampler::from_first_frame(&frame, self.chunk_frames);
                    }
                    let Some(resampler) = self.resampler.as_mut() else {
                        tracing::debug!(rate_hz = frame.sample_rate, "frame without usable format skipped");
                        continue;
                    };
                    let out = resampler.convert(&frame);
                    clock.publish_frame(frame.timestamp, self.source.duration());
                    if !out.is_empty() {
                        self.buffer.replace(out);
                        return Ok(());
                    }
                }
                Err(DecodeError::EndOfStream) => {
                    if !self.tail_flushed {
                        self.tail_flushed = true;
                        if let Some(resampler) = self.resampler.as_mut() {
                            let tail = resampler.flush();
                            if !tail.is_empty() {
                                self.buffer.replace(tail);
                                return Ok(());
                            }
                        }
                    }
                    self.ended = true;
                    return Err(DecodeError::EndOfStream);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Seek the source and drop everything buffered from before the seek.
    pub fn seek(&mut self, target_seconds: f64) -> Result<()> {
        self.source.seek(target_seconds)?;
        self.buffer.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.discard_pending();
        }
        self.tail_flushed = false;
        self.ended = false;
        Ok(())
    }

    /// Best-known duration: live container value, else the one seen at open.
    pub fn duration(&self) -> Option<f64> {
        self.source.duration().or(self.info.duration)
    }
}
