//! Local file playback engine.
//!
//! Decodes one track at a time, converts it to interleaved stereo `i16` at
//! 44.1 kHz and feeds a pull-based output device. The [`transport`] drives the
//! session from the control thread; the [`pump`] runs inside the device
//! callback.

pub mod buffer;
pub mod config;
pub mod decode;
pub mod device;
pub mod error;
pub mod playlist;
pub mod pump;
pub mod resample;
pub mod sequencer;
pub mod session;
pub mod transport;

pub use error::DecodeError;
pub use playlist::PlaylistStore;
pub use transport::{Transport, TransportEvent, TransportState};
