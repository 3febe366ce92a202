mod common;

use audio_player::DecodeError;
use audio_player::decode::SourceDecoder;
use audio_player::pump::{OutputPump, SharedPlayback};
use audio_player::session::DecodeSession;

use common::sine_file;

#[test]
fn open_missing_file_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let err = SourceDecoder::open(&dir.path().join("missing.wav")).err().unwrap();
    assert!(matches!(err, DecodeError::OpenFailed { .. }));
}

#[test]
fn open_garbage_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noise.mp3");
    std::fs::write(&path, vec![0x5au8; 4096]).unwrap();
    let err = SourceDecoder::open(&path).err().unwrap();
    assert!(matches!(err, DecodeError::OpenFailed { .. }));
}

#[test]
fn open_reports_stream_info() {
    let dir = tempfile::tempdir().unwrap();
    let path = sine_file(dir.path(), "a.wav", 22_050, 1, 2.0);
    let (_, info) = SourceDecoder::open(&path).unwrap();
    assert_eq!(info.sample_rate, Some(22_050));
    assert_eq!(info.channels, Some(1));
    let duration = info.duration.unwrap();
    assert!((duration - 2.0).abs() < 0.01, "duration {duration}");
}

#[test]
fn decoder_reads_to_end_of_stream() {
    let dir = tempfile::tempdir().unwrap();
    let path = sine_file(dir.path(), "a.wav", 44_100, 2, 0.5);
    let (mut source, _) = SourceDecoder::open(&path).unwrap();
    let mut frames = 0usize;
    loop {
        match source.read_and_decode_one() {
            Ok(frame) => {
                assert_eq!(frame.channels, 2);
                assert_eq!(frame.sample_rate, 44_100);
                frames += frame.frames();
            }
            Err(e) => {
                assert!(e.is_end_of_stream(), "{e}");
                break;
            }
        }
    }
    assert_eq!(frames, 22_050);
    assert!(source.read_and_decode_one().unwrap_err().is_end_of_stream());
}

#[test]
fn seek_lands_near_target() {
    let dir = tempfile::tempdir().unwrap();
    let path = sine_file(dir.path(), "a.wav", 44_100, 1, 4.0);
    let (mut source, _) = SourceDecoder::open(&path).unwrap();
    source.seek(2.5).unwrap();
    let frame = source.read_and_decode_one().unwrap();
    let ts = frame.timestamp.unwrap();
    assert!((ts - 2.5).abs() < 0.25, "timestamp {ts}");
}

#[test]
fn passthrough_session_outputs_stereo_at_source_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = sine_file(dir.path(), "a.wav", 44_100, 1, 1.0);
    let shared = SharedPlayback::new(100.0);
    shared.replace_session(Some(DecodeSession::open(&path, 1024).unwrap()));
    let pump = OutputPump::new(shared.clone());

    let mut total = 0usize;
    let mut chunk = vec![0i16; 2048];
    while !shared.eof() {
        total += pump.fill(&mut chunk);
    }
    assert_eq!(total, 44_100 * 2);
}

#[test]
fn resampled_session_roughly_doubles_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = sine_file(dir.path(), "a.wav", 22_050, 1, 1.0);
    let shared = SharedPlayback::new(100.0);
    shared.replace_session(Some(DecodeSession::open(&path, 1024).unwrap()));
    let pump = OutputPump::new(shared.clone());

    let mut total = 0usize;
    let mut chunk = vec![0i16; 1000];
    while !shared.eof() {
        total += pump.fill(&mut chunk);
    }
    let frames = total / 2;
    assert!(frames.abs_diff(44_100) < 2_048, "frames {frames}");
    assert!(shared.duration() > 0.9);
}

#[test]
fn end_of_stream_zero_fills_the_rest_of_the_request() {
    let dir = tempfile::tempdir().unwrap();
    // 44_100 mono frames = 88_200 stereo samples, not a multiple of the chunk.
    let path = sine_file(dir.path(), "a.wav", 44_100, 1, 1.0);
    let shared = SharedPlayback::new(100.0);
    shared.replace_session(Some(DecodeSession::open(&path, 1024).unwrap()));
    let pump = OutputPump::new(shared.clone());

    let mut chunk = vec![7i16; 2048];
    let mut total = 0usize;
    let written = loop {
        chunk.fill(7);
        let n = pump.fill(&mut chunk);
        total += n;
        if shared.eof() {
            break n;
        }
        assert_eq!(n, chunk.len());
    };
    assert_eq!(written, 88_200 % 2048);
    assert!(chunk[written..].iter().all(|&s| s == 0));
    assert!(chunk[..written].iter().any(|&s| s != 0));
    assert_eq!(total, 88_200);

    chunk.fill(7);
    assert_eq!(pump.fill(&mut chunk), 0);
    assert!(chunk.iter().all(|&s| s == 0));
    assert!(shared.eof());
}
