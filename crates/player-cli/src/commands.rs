//! Line commands read from stdin.
//!
//! A helper thread reads stdin and forwards parsed commands to the control
//! loop over a channel, so the loop itself never blocks on input.

use std::io::BufRead;
use std::path::PathBuf;

use crossbeam_channel::Sender;

/// Seconds moved by `fwd` / `rew`.
pub const SKIP_SECONDS: f64 = 10.0;

/// Commands accepted by the control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
    SeekBy { seconds: f64 },
    SeekTo { seconds: f64 },
    SetVolume { percent: f32 },
    ToggleMute,
    ToggleShuffle,
    Load { path: PathBuf },
    Add { path: PathBuf },
    Remove { index: usize },
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play | pause | toggle (t)      start, pause, or flip playback
  next (n) | prev (b)            skip within the active playlist
  fwd (f) | rew (r)              seek 10 s forward or back
  seek <seconds>                 seek to an absolute position
  vol <0-100>                    set volume
  mute (m) | shuffle (s)         toggle mute or shuffle
  load <path>                    load and play a file
  add <path> | remove <index>    edit the active playlist
  status (?) | help | quit (q)";

/// Parse one input line.
pub fn parse_command(line: &str) -> Result<ControlCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };
    let cmd = match word.to_ascii_lowercase().as_str() {
        "play" => ControlCommand::Play,
        "pause" | "stop" => ControlCommand::Pause,
        "toggle" | "t" => ControlCommand::Toggle,
        "next" | "n" => ControlCommand::Next,
        "prev" | "previous" | "b" => ControlCommand::Previous,
        "fwd" | "f" => ControlCommand::SeekBy {
            seconds: SKIP_SECONDS,
        },
        "rew" | "r" => ControlCommand::SeekBy {
            seconds: -SKIP_SECONDS,
        },
        "seek" => ControlCommand::SeekTo {
            seconds: parse_arg(rest, "seek <seconds>")?,
        },
        "vol" | "volume" => ControlCommand::SetVolume {
            percent: parse_arg(rest, "vol <0-100>")?,
        },
        "mute" | "m" => ControlCommand::ToggleMute,
        "shuffle" | "s" => ControlCommand::ToggleShuffle,
        "load" => ControlCommand::Load {
            path: path_arg(rest, "load <path>")?,
        },
        "add" => ControlCommand::Add {
            path: path_arg(rest, "add <path>")?,
        },
        "remove" | "rm" => ControlCommand::Remove {
            index: parse_arg(rest, "remove <index>")?,
        },
        "status" | "?" => ControlCommand::Status,
        "help" | "h" => ControlCommand::Help,
        "quit" | "q" | "exit" => ControlCommand::Quit,
        "" => return Err("empty command".to_string()),
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(cmd)
}

fn parse_arg<T: std::str::FromStr>(raw: &str, usage: &str) -> Result<T, String> {
    raw.parse::<T>().map_err(|_| format!("usage: {usage}"))
}

fn path_arg(raw: &str, usage: &str) -> Result<PathBuf, String> {
    let raw = raw.trim_matches('"');
    if raw.is_empty() {
        return Err(format!("usage: {usage}"));
    }
    Ok(PathBuf::from(raw))
}

/// Spawn the stdin reader thread.
pub fn spawn_stdin_reader(cmd_tx: Sender<ControlCommand>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("stdin read error: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&line) {
                Ok(cmd) => {
                    if cmd_tx.send(cmd).is_err() {
                        break;
                    }
                }
                Err(msg) => eprintln!("{msg}"),
            }
        }
        tracing::debug!("stdin closed");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_commands_and_aliases() {
        assert_eq!(parse_command("play"), Ok(ControlCommand::Play));
        assert_eq!(parse_command("  N "), Ok(ControlCommand::Next));
        assert_eq!(parse_command("b"), Ok(ControlCommand::Previous));
        assert_eq!(parse_command("q"), Ok(ControlCommand::Quit));
        assert_eq!(parse_command("t"), Ok(ControlCommand::Toggle));
    }

    #[test]
    fn parses_relative_seeks() {
        assert_eq!(
            parse_command("fwd"),
            Ok(ControlCommand::SeekBy { seconds: 10.0 })
        );
        assert_eq!(
            parse_command("r"),
            Ok(ControlCommand::SeekBy { seconds: -10.0 })
        );
    }

    #[test]
    fn parses_arguments() {
        assert_eq!(
            parse_command("seek 42.5"),
            Ok(ControlCommand::SeekTo { seconds: 42.5 })
        );
        assert_eq!(
            parse_command("vol 30"),
            Ok(ControlCommand::SetVolume { percent: 30.0 })
        );
        assert_eq!(
            parse_command("remove 2"),
            Ok(ControlCommand::Remove { index: 2 })
        );
        assert_eq!(
            parse_command("load \"/music/My Song.flac\""),
            Ok(ControlCommand::Load {
                path: PathBuf::from("/music/My Song.flac")
            })
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command("").is_err());
        assert!(parse_command("dance").is_err());
        assert!(parse_command("seek soon").is_err());
        assert!(parse_command("load").is_err());
        assert!(parse_command("remove -1").is_err());
    }
}
