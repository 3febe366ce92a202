//! Track sequencing: which file plays after the current one.
//!
//! Sequential mode walks the active playlist as a ring. Shuffle mode keeps a
//! per-track "played this round" counter and only picks tracks whose counter
//! is still zero; once every track has played the round starts over.
//!
//! Only natural completion advances a track's counter. Selecting a track, or
//! skipping away from it, does not.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::playlist::PlaylistView;

#[derive(Debug)]
struct Round {
    playlist: String,
    tracks: Vec<String>,
    counters: Vec<u32>,
}

impl Round {
    /// Tracks played more often than the least-played one count as already
    /// played this round.
    fn seeded(view: &PlaylistView) -> Self {
        let min = view.play_counts.iter().copied().min().unwrap_or(0);
        let counters = (0..view.len())
            .map(|i| u32::from(view.play_counts.get(i).copied().unwrap_or(min) > min))
            .collect();
        Self {
            playlist: view.name.clone(),
            tracks: view.tracks.clone(),
            counters,
        }
    }

    fn matches(&self, view: &PlaylistView) -> bool {
        self.playlist == view.name && self.tracks == view.tracks
    }
}

pub struct TrackSequencer {
    rng: StdRng,
    round: Option<Round>,
}

impl Default for TrackSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackSequencer {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            round: None,
        }
    }

    /// Deterministic sequencer for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            round: None,
        }
    }

    /// Pick the track that follows `current`.
    ///
    /// Returns `None` only for an empty playlist.
    pub fn select_next(
        &mut self,
        view: &PlaylistView,
        current: Option<&str>,
        shuffle: bool,
    ) -> Option<String> {
        if view.is_empty() {
            return None;
        }
        let current_index = current.and_then(|c| view.index_of(c));
        if !shuffle {
            let next = current_index.map(|i| (i + 1) % view.len()).unwrap_or(0);
            return Some(view.tracks[next].clone());
        }

        let round = self.round_for(view);
        if round.counters.iter().all(|&c| c >= 1) {
            tracing::debug!(playlist = %view.name, "shuffle round complete");
            round.counters.iter_mut().for_each(|c| *c = 0);
        }
        let eligible: Vec<usize> = round
            .counters
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == 0)
            .map(|(i, _)| i)
            .collect();
        let candidates: Vec<usize> = if eligible.len() > 1 {
            eligible
                .into_iter()
                .filter(|&i| Some(i) != current_index)
                .collect()
        } else {
            eligible
        };
        candidates
            .choose(&mut self.rng)
            .map(|&i| view.tracks[i].clone())
    }

    /// Ring predecessor of `current`; the last track when `current` is unknown.
    pub fn select_previous(&self, view: &PlaylistView, current: Option<&str>) -> Option<String> {
        if view.is_empty() {
            return None;
        }
        let n = view.len();
        let prev = match current.and_then(|c| view.index_of(c)) {
            Some(i) => (i + n - 1) % n,
            None => n - 1,
        };
        Some(view.tracks[prev].clone())
    }

    /// Mark `path` as played in the current shuffle round.
    pub fn record_completion(&mut self, view: &PlaylistView, path: &str) {
        let Some(index) = view.index_of(path) else {
            return;
        };
        let round = self.round_for(view);
        if let Some(counter) = round.counters.get_mut(index) {
            *counter = counter.saturating_add(1);
        }
    }

    /// Round state for `view`, reseeded when the playlist or its tracks changed.
    fn round_for(&mut self, view: &PlaylistView) -> &mut Round {
        if !self.round.as_ref().is_some_and(|r| r.matches(view)) {
            self.round = Some(Round::seeded(view));
        }
        self.round.get_or_insert_with(|| Round::seeded(view))
    }
}
