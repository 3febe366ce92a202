//! Control loop.
//!
//! Runs at ~60 Hz on the main thread: applies queued commands, polls the
//! transport for end of track, and shuts the transport down on quit.

use std::time::{Duration, Instant};

use anyhow::Result;
use audio_player::{Transport, TransportEvent, TransportState};
use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::commands::{ControlCommand, HELP};

const TICK: Duration = Duration::from_millis(16);

/// Drive `transport` until a quit command arrives or every sender is gone.
pub fn run(mut transport: Transport, cmd_rx: Receiver<ControlCommand>) -> Result<()> {
    let mut last_tick = Instant::now();
    loop {
        let timeout = TICK.saturating_sub(last_tick.elapsed());
        match cmd_rx.recv_timeout(timeout) {
            Ok(ControlCommand::Quit) => break,
            Ok(cmd) => apply(&mut transport, cmd),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_tick.elapsed() >= TICK {
            last_tick = Instant::now();
            match transport.poll_end_of_track() {
                Some(TransportEvent::Advanced { next, .. }) => {
                    tracing::info!(path = %next, "now playing");
                }
                Some(TransportEvent::Stopped { finished }) => {
                    tracing::info!(path = %finished, "playback finished");
                }
                None => {}
            }
        }
    }

    tracing::info!("shutting down");
    transport.shutdown()
}

/// Apply one command to the transport.
pub fn apply(transport: &mut Transport, cmd: ControlCommand) {
    match cmd {
        ControlCommand::Play => {
            if transport.state() == TransportState::Idle {
                transport.next();
            } else {
                transport.play();
            }
        }
        ControlCommand::Pause => transport.stop(),
        ControlCommand::Toggle => {
            if transport.state() == TransportState::Idle {
                transport.next();
            } else {
                transport.toggle();
            }
        }
        ControlCommand::Next => {
            if !transport.next() {
                tracing::warn!("no next track");
            }
        }
        ControlCommand::Previous => {
            if !transport.previous() {
                tracing::warn!("no previous track");
            }
        }
        ControlCommand::SeekBy { seconds } => {
            transport.seek_by(seconds);
        }
        ControlCommand::SeekTo { seconds } => {
            transport.seek_to(seconds);
        }
        ControlCommand::SetVolume { percent } => transport.set_volume(percent),
        ControlCommand::ToggleMute => {
            let muted = !transport.muted();
            transport.set_muted(muted);
            tracing::info!(muted, "mute");
        }
        ControlCommand::ToggleShuffle => {
            let shuffle = !transport.shuffle();
            transport.set_shuffle(shuffle);
            tracing::info!(shuffle, "shuffle");
        }
        ControlCommand::Load { path } => {
            let path = path.to_string_lossy().into_owned();
            if transport.load(&path) {
                transport.play();
            }
        }
        ControlCommand::Add { path } => {
            let store = transport.store().clone();
            if store.active_index().is_none() {
                store.create_playlist(None);
            }
            let path = path.to_string_lossy().into_owned();
            if let Some(index) = store.add_track(&path) {
                tracing::info!(path = %path, index, "track added");
            }
            save_store(transport);
        }
        ControlCommand::Remove { index } => {
            if transport.remove_track(index) {
                save_store(transport);
            } else {
                tracing::warn!(index, "no such track");
            }
        }
        ControlCommand::Status => println!("{}", status_line(transport)),
        ControlCommand::Help => println!("{HELP}"),
        ControlCommand::Quit => {}
    }
}

fn save_store(transport: &Transport) {
    if let Err(e) = transport.store().save() {
        tracing::warn!("failed to save playlists: {e:#}");
    }
}

/// One-line summary of the transport for the `status` command.
pub fn status_line(transport: &Transport) -> String {
    let track = transport.current_track().unwrap_or("-");
    let mute = if transport.muted() { " (muted)" } else { "" };
    format!(
        "[{:?}] {} {}/{} vol {:.0}%{} shuffle {}",
        transport.state(),
        track,
        format_clock(transport.current_position()),
        format_clock(transport.total_duration()),
        transport.volume(),
        mute,
        if transport.shuffle() { "on" } else { "off" },
    )
}

/// Format seconds as `m:ss`.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
