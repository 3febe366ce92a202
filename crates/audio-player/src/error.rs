//! Error taxonomy for the decode/playback engine.
//!
//! Everything here is fatal to the current load at most, never to the process.
//! `EndOfStream` is a control-flow signal consumed by the output pump.

use thiserror::Error;

/// Errors raised by the source decoder, resampler, and output device.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file could not be opened or its container could not be parsed.
    #[error("could not open {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    /// The container has no audio stream.
    #[error("no audio stream found")]
    NoAudioStream,

    /// No decoder is registered for the stream's codec.
    #[error("no decoder available for codec {0}")]
    CodecUnavailable(String),

    /// The decoder rejected the stream parameters.
    #[error("could not open decoder: {0}")]
    CodecOpenFailed(String),

    /// The output device could not be opened with the fixed output format.
    #[error("could not open output device: {0}")]
    DeviceOpenFailed(String),

    /// The container reported an error while seeking.
    #[error("seek failed: {0}")]
    SeekFailed(String),

    /// No more packets in the container.
    #[error("end of stream")]
    EndOfStream,
}

impl DecodeError {
    /// `true` for the normal end-of-stream signal.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, DecodeError::EndOfStream)
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
