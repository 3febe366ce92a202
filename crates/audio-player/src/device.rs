//! Output device selection and the pull-based output stream.
//!
//! Thin wrappers around CPAL for:
//! - listing available output devices
//! - selecting either the default device or a device by substring match
//! - opening a stereo 44.1 kHz stream whose callback is an [`OutputPump`]
//!
//! The transport only sees the [`OutputBackend`] / [`OutputStream`] traits, so
//! it can run against [`NullBackend`] where no sound card is available.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::config::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::error::DecodeError;
use crate::pump::OutputPump;

/// A started-or-paused output stream feeding from a pump.
pub trait OutputStream {
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
}

/// Something that can open an output stream bound to a pump.
pub trait OutputBackend {
    /// Open a stream in the paused state.
    fn open(&self, pump: OutputPump) -> std::result::Result<Box<dyn OutputStream>, DecodeError>;
}

/// CPAL-backed output.
#[derive(Clone, Debug, Default)]
pub struct CpalBackend {
    /// Case-insensitive substring of the device name; default device when `None`.
    pub device: Option<String>,
    /// Requested buffer size in frames.
    pub buffer_frames: Option<u32>,
}

struct CpalOutput {
    stream: cpal::Stream,
}

impl OutputStream for CpalOutput {
    fn play(&mut self) -> Result<()> {
        self.stream.play()?;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.stream.pause()?;
        Ok(())
    }
}

impl OutputBackend for CpalBackend {
    fn open(&self, pump: OutputPump) -> std::result::Result<Box<dyn OutputStream>, DecodeError> {
        let host = cpal::default_host();
        let stream = open_stream(&host, self.device.as_deref(), self.buffer_frames, pump)
            .map_err(|e| DecodeError::DeviceOpenFailed(format!("{e:#}")))?;
        Ok(Box::new(CpalOutput { stream }))
    }
}

fn open_stream(
    host: &cpal::Host,
    needle: Option<&str>,
    buffer_frames: Option<u32>,
    pump: OutputPump,
) -> Result<cpal::Stream> {
    let device = pick_device(host, needle)?;
    let config = pick_output_config(&device)?;
    let mut stream_config: cpal::StreamConfig = config.clone().into();
    if let Some(buf) = pick_buffer_size(&config, buffer_frames) {
        stream_config.buffer_size = buf;
    }
    tracing::info!(
        device = %device.description().map(|d| d.to_string()).unwrap_or_default(),
        sample_format = ?config.sample_format(),
        buffer = ?stream_config.buffer_size,
        "output device opened"
    );

    let stream = build_output_stream(&device, &stream_config, config.sample_format(), pump)?;
    // Some hosts start streams on creation; the transport starts it explicitly.
    stream.pause().context("pause new stream")?;
    Ok(stream)
}

/// Build a CPAL output stream whose callback pulls from `pump`.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    pump: OutputPump,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, pump),
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, pump),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, pump),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, pump),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

/// Type-specialized stream builder for CPAL sample formats.
///
/// The pump always produces `i16`; other device formats are converted per sample.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    pump: OutputPump,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<i16>,
{
    let mut scratch: Vec<i16> = Vec::new();
    let err_fn = |err| tracing::warn!("stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            if scratch.len() < data.len() {
                scratch.resize(data.len(), 0);
            }
            let pcm = &mut scratch[..data.len()];
            pump.fill(pcm);
            for (dst, &src) in data.iter_mut().zip(pcm.iter()) {
                *dst = <T as cpal::Sample>::from_sample::<i16>(src);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Pick a CPAL output device.
///
/// - If `needle` is `Some`, chooses the first output device whose name contains the substring
///   (case-insensitive).
/// - Otherwise, returns the host default output device.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    let mut devices: Vec<cpal::Device> = host
        .output_devices()
        .context("No output devices")?
        .collect();

    if let Some(needle) = needle {
        if let Some(d) = devices.drain(..).find(|d| {
            d.description()
                .ok()
                .map(|n| matches_device_name(&n.name(), needle))
                .unwrap_or(false)
        }) {
            return Ok(d);
        }
        return Err(anyhow!("No output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("No default output device"))
}

/// Pick a stereo configuration that runs at the fixed output rate.
///
/// Among matching configurations the one whose sample format needs the least
/// conversion from `i16` wins.
pub fn pick_output_config(device: &cpal::Device) -> Result<cpal::SupportedStreamConfig> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> =
        device.supported_output_configs()?.collect();
    if ranges.is_empty() {
        return Err(anyhow!("No supported output configs"));
    }

    ranges
        .into_iter()
        .filter(|r| {
            usize::from(r.channels()) == OUTPUT_CHANNELS
                && rate_in_range(r.min_sample_rate(), r.max_sample_rate(), OUTPUT_SAMPLE_RATE)
                && sample_format_rank(r.sample_format()).is_some()
        })
        .min_by_key(|r| sample_format_rank(r.sample_format()))
        .map(|r| r.with_sample_rate(OUTPUT_SAMPLE_RATE))
        .ok_or_else(|| anyhow!("No stereo {OUTPUT_SAMPLE_RATE} Hz output config"))
}

/// Choose a stream buffer size.
///
/// Uses `requested` clamped into the device range; `None` when the device only
/// reports an unknown range or nothing was requested.
pub fn pick_buffer_size(
    config: &cpal::SupportedStreamConfig,
    requested: Option<u32>,
) -> Option<cpal::BufferSize> {
    let requested = requested?;
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            Some(cpal::BufferSize::Fixed(clamp_buffer_frames(requested, *min, *max)))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

fn clamp_buffer_frames(requested: u32, min: u32, max: u32) -> u32 {
    if min > max {
        return min;
    }
    requested.clamp(min, max)
}

fn rate_in_range(min: u32, max: u32, rate: u32) -> bool {
    min <= rate && rate <= max
}

fn sample_format_rank(format: cpal::SampleFormat) -> Option<u8> {
    match format {
        cpal::SampleFormat::I16 => Some(0),
        cpal::SampleFormat::I32 => Some(1),
        cpal::SampleFormat::F32 => Some(2),
        cpal::SampleFormat::U16 => Some(3),
        _ => None,
    }
}

/// Print available output devices to stdout.
///
/// This is intended for CLI UX (`--list-devices`) rather than structured output.
pub fn list_devices(host: &cpal::Host) -> Result<()> {
    let devices = host.output_devices().context("No output devices")?;
    for (i, d) in devices.enumerate() {
        println!("#{i}: {}", d.description()?);
    }
    Ok(())
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}

/// Device-less backend: nothing calls the pump, the caller drives it.
#[derive(Clone, Debug, Default)]
pub struct NullBackend {
    playing: Arc<AtomicBool>,
}

impl NullBackend {
    /// Whether the most recently opened stream is started.
    pub fn is_started(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }
}

struct NullOutput {
    playing: Arc<AtomicBool>,
}

impl OutputStream for NullOutput {
    fn play(&mut self) -> Result<()> {
        self.playing.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.playing.store(false, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for NullOutput {
    fn drop(&mut self) {
        self.playing.store(false, Ordering::Relaxed);
    }
}

impl OutputBackend for NullBackend {
    fn open(&self, _pump: OutputPump) -> std::result::Result<Box<dyn OutputStream>, DecodeError> {
        self.playing.store(false, Ordering::Relaxed);
        Ok(Box::new(NullOutput {
            playing: self.playing.clone(),
        }))
    }
}
