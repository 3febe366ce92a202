#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Write a 16-bit PCM WAV file holding a 440 Hz sine.
pub fn write_sine_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f64) {
    write_wav_with(path, sample_rate, channels, seconds, |t| {
        ((t * 440.0 * std::f64::consts::TAU).sin() * 12_000.0) as i16
    });
}

/// Write a 16-bit PCM WAV file whose sample at time `t` (seconds) is `sample(t)`.
pub fn write_wav_with(
    path: &Path,
    sample_rate: u32,
    channels: u16,
    seconds: f64,
    sample: impl Fn(f64) -> i16,
) {
    let frames = (f64::from(sample_rate) * seconds).round() as u32;
    let block_align = channels * 2;
    let data_len = frames * u32::from(block_align);

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());

    for n in 0..frames {
        let t = f64::from(n) / f64::from(sample_rate);
        let v = sample(t);
        for _ in 0..channels {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
    }
    std::fs::write(path, bytes).unwrap();
}

pub fn sine_file(dir: &Path, name: &str, sample_rate: u32, channels: u16, seconds: f64) -> PathBuf {
    let path = dir.join(name);
    write_sine_wav(&path, sample_rate, channels, seconds);
    path
}

/// Sine for the first half of `seconds`, digital silence after it.
pub fn loud_then_silent_file(dir: &Path, name: &str, sample_rate: u32, seconds: f64) -> PathBuf {
    let path = dir.join(name);
    let half = seconds / 2.0;
    write_wav_with(&path, sample_rate, 1, seconds, |t| {
        if t < half {
            ((t * 440.0 * std::f64::consts::TAU).sin() * 30_000.0) as i16
        } else {
            0
        }
    });
    path
}

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
