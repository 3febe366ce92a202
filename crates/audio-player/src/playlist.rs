//! Playlist store.
//!
//! Ordered playlists of track paths with a play count and a resume position
//! per track, plus the last-played file for resuming at startup. Guarded by
//! its own mutex (the playlist lock), separate from the audio lock.
//!
//! Each track is one [`PlaylistEntry`], so path, count and resume position
//! can never get out of step when tracks are added or removed.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One track in a playlist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub path: String,
    /// Natural completions of this track.
    #[serde(default)]
    pub play_count: u32,
    /// Last known position in seconds.
    #[serde(default)]
    pub resume_position: f64,
}

impl PlaylistEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            play_count: 0,
            resume_position: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    #[serde(default)]
    pub entries: Vec<PlaylistEntry>,
}

/// File and position that were playing when the player last shut down.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LastSession {
    pub file: String,
    pub position: f64,
}

/// Read-only snapshot of a playlist handed to the sequencer.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaylistView {
    pub name: String,
    pub tracks: Vec<String>,
    pub play_counts: Vec<u32>,
}

impl PlaylistView {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t == path)
    }
}

impl From<&Playlist> for PlaylistView {
    fn from(p: &Playlist) -> Self {
        Self {
            name: p.name.clone(),
            tracks: p.entries.iter().map(|e| e.path.clone()).collect(),
            play_counts: p.entries.iter().map(|e| e.play_count).collect(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    playlists: Vec<Playlist>,
    #[serde(default)]
    active: Option<usize>,
    #[serde(default)]
    last_session: Option<LastSession>,
}

impl StoreState {
    fn active_playlist(&self) -> Option<&Playlist> {
        self.active.and_then(|i| self.playlists.get(i))
    }

    fn active_playlist_mut(&mut self) -> Option<&mut Playlist> {
        self.active.and_then(|i| self.playlists.get_mut(i))
    }

    fn active_entry_mut(&mut self, path: &str) -> Option<&mut PlaylistEntry> {
        self.active_playlist_mut()?
            .entries
            .iter_mut()
            .find(|e| e.path == path)
    }
}

/// Shared playlist state, optionally backed by a JSON file.
#[derive(Debug)]
pub struct PlaylistStore {
    path: Option<PathBuf>,
    state: Mutex<StoreState>,
}

impl PlaylistStore {
    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Load the store from `path`; a missing file yields an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let mut state = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read playlist store {:?}", path))?;
            serde_json::from_str::<StoreState>(&raw)
                .with_context(|| format!("parse playlist store {:?}", path))?
        } else {
            tracing::warn!(path = %path.display(), "playlist store not found; starting empty");
            StoreState::default()
        };
        if state.active.is_some_and(|i| i >= state.playlists.len()) {
            state.active = None;
        }
        Ok(Self {
            path: Some(path.to_path_buf()),
            state: Mutex::new(state),
        })
    }

    /// Persist to the backing file, if any.
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let raw = {
            let state = self.state();
            serde_json::to_string_pretty(&*state).context("serialize playlist store")?
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;
        }
        std::fs::write(path, raw).with_context(|| format!("write playlist store {:?}", path))?;
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a playlist and make it active. Returns its index.
    ///
    /// Without a name it is called `Playlist N`.
    pub fn create_playlist(&self, name: Option<&str>) -> usize {
        let mut state = self.state();
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => n.to_string(),
            None => format!("Playlist {}", state.playlists.len() + 1),
        };
        state.playlists.push(Playlist {
            name,
            entries: Vec::new(),
        });
        let index = state.playlists.len() - 1;
        state.active = Some(index);
        index
    }

    pub fn rename_playlist(&self, index: usize, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let mut state = self.state();
        match state.playlists.get_mut(index) {
            Some(p) => {
                p.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Delete a playlist, keeping the active index pointing at the same playlist.
    pub fn delete_playlist(&self, index: usize) -> Option<Playlist> {
        let mut state = self.state();
        if index >= state.playlists.len() {
            return None;
        }
        let removed = state.playlists.remove(index);
        state.active = match state.active {
            Some(a) if a == index => None,
            Some(a) if a > index => Some(a - 1),
            other => other,
        };
        Some(removed)
    }

    pub fn set_active(&self, index: usize) -> bool {
        let mut state = self.state();
        if index < state.playlists.len() {
            state.active = Some(index);
            true
        } else {
            false
        }
    }

    pub fn active_index(&self) -> Option<usize> {
        self.state().active
    }

    /// Make the playlist named `name` active. Returns its index.
    pub fn activate_by_name(&self, name: &str) -> Option<usize> {
        let mut state = self.state();
        let index = state.playlists.iter().position(|p| p.name == name)?;
        state.active = Some(index);
        Some(index)
    }

    /// First playlist that contains `path`.
    pub fn find_playlist_containing(&self, path: &str) -> Option<usize> {
        self.state()
            .playlists
            .iter()
            .position(|p| p.entries.iter().any(|e| e.path == path))
    }

    /// Clone of every playlist, for listing.
    pub fn playlists(&self) -> Vec<Playlist> {
        self.state().playlists.clone()
    }

    pub fn active_view(&self) -> Option<PlaylistView> {
        self.state().active_playlist().map(PlaylistView::from)
    }

    /// Append a track to the active playlist. Returns its index.
    pub fn add_track(&self, path: &str) -> Option<usize> {
        let mut state = self.state();
        let playlist = state.active_playlist_mut()?;
        playlist.entries.push(PlaylistEntry::new(path));
        Some(playlist.entries.len() - 1)
    }

    /// Remove the track at `index` from the active playlist.
    pub fn remove_track(&self, index: usize) -> Option<PlaylistEntry> {
        let mut state = self.state();
        let playlist = state.active_playlist_mut()?;
        if index < playlist.entries.len() {
            Some(playlist.entries.remove(index))
        } else {
            None
        }
    }

    /// Count a natural completion of `path` and reset its resume position.
    pub fn record_completion(&self, path: &str) -> bool {
        let mut state = self.state();
        match state.active_entry_mut(path) {
            Some(entry) => {
                entry.play_count = entry.play_count.saturating_add(1);
                entry.resume_position = 0.0;
                true
            }
            None => false,
        }
    }

    pub fn play_count(&self, path: &str) -> Option<u32> {
        self.state()
            .active_playlist()?
            .entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| e.play_count)
    }

    pub fn set_resume_position(&self, path: &str, seconds: f64) -> bool {
        let mut state = self.state();
        match state.active_entry_mut(path) {
            Some(entry) => {
                entry.resume_position = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
                true
            }
            None => false,
        }
    }

    pub fn resume_position(&self, path: &str) -> Option<f64> {
        self.state()
            .active_playlist()?
            .entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| e.resume_position)
    }

    pub fn set_last_session(&self, session: Option<LastSession>) {
        self.state().last_session = session;
    }

    pub fn last_session(&self) -> Option<LastSession> {
        self.state().last_session.clone()
    }
}
