//! The lobby: loaded puzzles, active users, live matches, and the
//! available-match fan-out.
//!
//! Like [`Match`](crate::game::Match), the lobby is a monitor. Its lock is
//! released before match mutators or listener callbacks run, so a callback
//! that queries the lobby (to rebuild the available-match listing) can never
//! deadlock against the thread that notified it.

use std::sync::{Arc, Mutex, MutexGuard};

use log::info;
use thiserror::Error;

use crate::game::{Match, MatchError};
use crate::listeners::ListenerSet;
use crate::puzzle::Puzzle;
use shared::quote;

/// Failures reported to clients as `Fail <reason>` (or, for `ADD_USER`, as
/// the literal reply body).
#[derive(Debug, Error)]
pub enum LobbyError {
    #[error("User ID {0} already in use")]
    UserTaken(String),
    #[error("Match ID {0} already in system")]
    DuplicateMatch(String),
    #[error("Match id {0} is not available in game")]
    UnknownMatch(String),
    #[error("Puzzle id {0} is not available in game")]
    UnknownPuzzle(String),
    #[error(transparent)]
    Match(#[from] MatchError),
}

/// The server-wide registry of puzzles, users, and matches.
#[derive(Default)]
pub struct Lobby {
    state: Mutex<LobbyState>,
    listeners: ListenerSet,
}

#[derive(Default)]
struct LobbyState {
    puzzles: Vec<Arc<Puzzle>>,
    users: Vec<String>,
    matches: Vec<Arc<Match>>,
}

impl Lobby {
    pub fn new() -> Lobby {
        Lobby::default()
    }

    /// Adds a puzzle to the selection. Puzzles are immutable and shared.
    pub fn add_puzzle(&self, puzzle: Puzzle) {
        let mut state = self.lock();
        state.puzzles.push(Arc::new(puzzle));
    }

    /// Registers a user name, failing if it is already taken.
    pub fn add_user(&self, user: &str) -> Result<(), LobbyError> {
        let mut state = self.lock();
        if state.users.iter().any(|u| u == user) {
            return Err(LobbyError::UserTaken(user.to_string()));
        }
        state.users.push(user.to_string());
        info!("user {user} joined");
        Ok(())
    }

    /// One line per puzzle: `<id> "<name>" "<description>"`.
    pub fn puzzle_listing(&self) -> String {
        let state = self.lock();
        state
            .puzzles
            .iter()
            .map(|p| format!("{} {} {}", p.id(), quote(p.name()), quote(p.description())))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One line per match still waiting for a second player:
    /// `<id> "<description>"`. Finalized matches are never listed.
    pub fn available_matches(&self) -> String {
        let state = self.lock();
        state
            .matches
            .iter()
            .filter(|m| !m.is_finalized() && m.players().len() == 1)
            .map(|m| m.summary())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Creates a match with its first player seated and announces the new
    /// opening to available-match listeners. Only one live match per id.
    pub fn new_match(
        &self,
        match_id: &str,
        description: &str,
        puzzle_id: &str,
        user: &str,
    ) -> Result<Arc<Match>, LobbyError> {
        let created = {
            let mut state = self.lock();
            if state.matches.iter().any(|m| m.id() == match_id) {
                return Err(LobbyError::DuplicateMatch(match_id.to_string()));
            }
            let puzzle = state
                .puzzles
                .iter()
                .find(|p| p.id() == puzzle_id)
                .cloned()
                .ok_or_else(|| LobbyError::UnknownPuzzle(puzzle_id.to_string()))?;
            let created = Arc::new(Match::new(match_id, description, puzzle, user)?);
            state.matches.push(Arc::clone(&created));
            created
        };
        info!("match {match_id} created by {user} on puzzle {puzzle_id}");
        self.listeners.notify();
        Ok(created)
    }

    /// Seats `user` as the second player of an existing match. The join
    /// fans out on the match (the waiting player sees the board go live)
    /// and on the lobby (the match leaves the available listing).
    pub fn play_match(&self, user: &str, match_id: &str) -> Result<Arc<Match>, LobbyError> {
        let joined = self.find_match(match_id)?;
        joined.add_player(user)?;
        info!("user {user} joined match {match_id}");
        self.listeners.notify();
        Ok(joined)
    }

    /// Looks up a live match by id.
    pub fn find_match(&self, match_id: &str) -> Result<Arc<Match>, LobbyError> {
        let state = self.lock();
        state
            .matches
            .iter()
            .find(|m| m.id() == match_id)
            .cloned()
            .ok_or_else(|| LobbyError::UnknownMatch(match_id.to_string()))
    }

    /// A player leaves a match, forfeiting it. When the match was still
    /// waiting for a second player, the opening disappears from the
    /// available listing, so lobby listeners are notified too.
    pub fn exit_match(&self, match_id: &str, user: &str) -> Result<(), LobbyError> {
        let exited = self.find_match(match_id)?;
        exited.finalize(user);
        info!("user {user} exited match {match_id}");
        if exited.players().len() == 1 {
            self.listeners.notify();
        }
        Ok(())
    }

    /// Removes a user from the active set. Any match all of whose players
    /// have departed is finalized and dropped from the lobby.
    pub fn quit(&self, user: &str) {
        let abandoned: Vec<Arc<Match>> = {
            let mut state = self.lock();
            state.users.retain(|u| u != user);
            let users = state.users.clone();
            let mut abandoned = Vec::new();
            state.matches.retain(|m| {
                let live = m.players().iter().any(|p| users.contains(p));
                if !live {
                    abandoned.push(Arc::clone(m));
                }
                live
            });
            abandoned
        };
        info!("user {user} quit");
        for gone in abandoned {
            gone.finalize(user);
        }
    }

    /// Registers an available-matches callback; returns a token for
    /// [`unsubscribe`](Lobby::unsubscribe).
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> usize {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: usize) {
        self.listeners.unsubscribe(id);
    }

    fn lock(&self) -> MutexGuard<'_, LobbyState> {
        self.state.lock().unwrap()
    }
}
