//! `player playlist ...` subcommands.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use audio_player::PlaylistStore;

use crate::cli::PlaylistAction;

/// Apply one playlist action and persist the store.
pub fn run_action(store: &PlaylistStore, action: &PlaylistAction) -> Result<()> {
    match action {
        PlaylistAction::List => {
            print!("{}", render_listing(store));
            return Ok(());
        }
        PlaylistAction::Create { name } => {
            let index = store.create_playlist(name.as_deref());
            println!("created playlist #{index}");
        }
        PlaylistAction::Rename { index, name } => {
            if !store.rename_playlist(*index, name) {
                return Err(anyhow!("cannot rename playlist #{index}"));
            }
        }
        PlaylistAction::Delete { index } => {
            let removed = store
                .delete_playlist(*index)
                .ok_or_else(|| anyhow!("no playlist #{index}"))?;
            println!("deleted {:?}", removed.name);
        }
        PlaylistAction::Add { playlist, paths } => {
            activate_or_create(store, playlist);
            for path in paths {
                store.add_track(&track_ref(path));
            }
        }
        PlaylistAction::Remove { playlist, index } => {
            store
                .activate_by_name(playlist)
                .ok_or_else(|| anyhow!("no playlist named {playlist:?}"))?;
            store
                .remove_track(*index)
                .ok_or_else(|| anyhow!("no track #{index} in {playlist:?}"))?;
        }
    }
    store.save()
}

/// Make `name` the active playlist, creating it if needed. Returns its index.
pub fn activate_or_create(store: &PlaylistStore, name: &str) -> usize {
    store
        .activate_by_name(name)
        .unwrap_or_else(|| store.create_playlist(Some(name)))
}

/// Add `paths` to the active playlist unless already present.
pub fn add_missing(store: &PlaylistStore, paths: &[PathBuf]) -> Vec<String> {
    let mut refs = Vec::with_capacity(paths.len());
    for path in paths {
        let r = track_ref(path);
        let present = store
            .active_view()
            .is_some_and(|v| v.index_of(&r).is_some());
        if !present {
            store.add_track(&r);
        }
        refs.push(r);
    }
    refs
}

/// Absolute path string used as the track reference, when it can be resolved.
fn track_ref(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

fn render_listing(store: &PlaylistStore) -> String {
    let active = store.active_index();
    let mut out = String::new();
    for (i, playlist) in store.playlists().iter().enumerate() {
        let marker = if Some(i) == active { "*" } else { " " };
        out.push_str(&format!("{marker}#{i}: {}\n", playlist.name));
        for (j, entry) in playlist.entries.iter().enumerate() {
            out.push_str(&format!(
                "    {j}: {} (played {}, resume {:.1}s)\n",
                entry.path, entry.play_count, entry.resume_position
            ));
        }
    }
    out
}
