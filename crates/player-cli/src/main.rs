//! Player — a terminal front end for the `audio-player` engine.
//!
//! ## Threads
//! - **Control**: the main thread runs a ~60 Hz loop that applies commands and
//!   polls the transport for end of track.
//! - **Input**: a helper thread reads line commands from stdin and forwards
//!   them over a channel.
//! - **Output**: the device callback (or, with `--no-audio`, a clock thread)
//!   pulls samples through the engine's output pump.
//!
//! ## Modes
//! - `run`: resume the last session and wait for commands.
//! - `play`: add files to a playlist and start the first one.
//! - `playlist`: edit the playlist store and exit.

mod cli;
mod commands;
mod config;
mod control;
mod playlists;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use audio_player::config::OUTPUT_SAMPLE_RATE;
use audio_player::device::{self, CpalBackend, NullBackend, OutputBackend};
use audio_player::pump::OutputPump;
use audio_player::{PlaylistStore, Transport};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::commands::ControlCommand;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,player=info,audio_player=info")
        }))
        .init();

    if args.list_devices {
        device::list_devices(&cpal::default_host())?;
        return Ok(());
    }

    let cfg = config::PlayerConfig::load_or_default(args.config.as_deref())?;
    let store_path = cfg.store_path(args.store.as_deref());
    let store = Arc::new(PlaylistStore::open(&store_path)?);
    tracing::info!(path = %store_path.display(), "playlist store");

    let cmd = args.cmd.unwrap_or(cli::Command::Run {
        playlist: None,
        fresh: false,
    });
    if let cli::Command::Playlist { action } = &cmd {
        return playlists::run_action(&store, action);
    }

    let null_backend = NullBackend::default();
    let backend: Box<dyn OutputBackend> = if args.no_audio {
        Box::new(null_backend.clone())
    } else {
        Box::new(CpalBackend {
            device: cfg.device(args.device.as_deref()),
            buffer_frames: cfg.playback.device_buffer_frames,
        })
    };
    let mut transport = Transport::new(backend, store.clone(), cfg.playback.clone());
    transport.set_shuffle(cfg.shuffle);

    let running = Arc::new(AtomicBool::new(true));
    if args.no_audio {
        spawn_null_clock(transport.pump(), null_backend, running.clone());
    }

    match cmd {
        cli::Command::Run { playlist, fresh } => {
            if let Some(name) = playlist.as_deref() {
                if store.activate_by_name(name).is_none() {
                    tracing::warn!(playlist = name, "no such playlist");
                }
            }
            if !fresh && !transport.resume_last_session() {
                tracing::info!("nothing to resume; type `play` or `help`");
            }
        }
        cli::Command::Play { paths, playlist } => {
            playlists::activate_or_create(&store, &playlist);
            let refs = playlists::add_missing(&store, &paths);
            if let Err(e) = store.save() {
                tracing::warn!("failed to save playlists: {e:#}");
            }
            let started = match refs.first() {
                Some(first) if transport.load(first) => {
                    transport.play();
                    true
                }
                _ => false,
            };
            if !started {
                tracing::warn!("could not start playback");
            }
        }
        cli::Command::Playlist { .. } => {}
    }

    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
    let signal_tx = cmd_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = signal_tx.send(ControlCommand::Quit);
    }) {
        tracing::warn!("failed to install ctrl-c handler: {e}");
    }
    commands::spawn_stdin_reader(cmd_tx);

    let result = control::run(transport, cmd_rx);
    running.store(false, Ordering::Relaxed);
    result
}

/// Pull from the pump in real time while the null output is started.
fn spawn_null_clock(pump: OutputPump, backend: NullBackend, running: Arc<AtomicBool>) {
    const PERIOD: Duration = Duration::from_millis(10);
    let frames = (OUTPUT_SAMPLE_RATE / 100) as usize;
    std::thread::spawn(move || {
        let mut buf = vec![0i16; frames * 2];
        while running.load(Ordering::Relaxed) {
            if backend.is_started() {
                pump.fill(&mut buf);
            }
            std::thread::sleep(PERIOD);
        }
    });
}
