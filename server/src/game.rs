//! The match engine: a mutable, thread-safe crossword board with the guess
//! and challenge rules, end-of-game detection, and board-change fan-out.
//!
//! A [`Match`] is a monitor: every public operation takes the board lock for
//! its duration and releases it before any listener callback runs. Cells are
//! immutable values; mutation is always "read cell, compute new cell, write
//! back", and fan-out fires only when some cell or score actually changed.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use log::info;
use thiserror::Error;

use crate::cell::Cell;
use crate::listeners::ListenerSet;
use crate::puzzle::{Entry, Position, Puzzle};
use shared::quote;

/// Bonus awarded for a successful challenge.
const CHALLENGE_SUCCESS_SCORE: i64 = 2;

/// Outcome of a TRY; its `Display` form is the wire feedback string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessOutcome {
    Valid,
    WrongLength,
    SameAsExisting,
    Inconsistent,
}

impl fmt::Display for GuessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GuessOutcome::Valid => "Valid guess",
            GuessOutcome::WrongLength => "Invalid guess, wrong word length",
            GuessOutcome::SameAsExisting => "Invalid guess, same as existing guess",
            GuessOutcome::Inconsistent => "Invalid guess, inconsistent with current board",
        })
    }
}

/// Outcome of a CHALLENGE; its `Display` form is the wire feedback string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    Success,
    TargetAlreadyCorrect,
    BothIncorrect,
    WrongLength,
    MissingGuesses,
    OwnWord,
    AllConfirmed,
    SameAsExisting,
}

impl fmt::Display for ChallengeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChallengeOutcome::Success => "Successful challenge!",
            ChallengeOutcome::TargetAlreadyCorrect => {
                "Failed challenge, target word was already correct"
            }
            ChallengeOutcome::BothIncorrect => {
                "Failed challenge, target word and your guess both incorrect"
            }
            ChallengeOutcome::WrongLength => "Invalid challenge, wrong length",
            ChallengeOutcome::MissingGuesses => {
                "Invalid challenge, not all squares have guesses"
            }
            ChallengeOutcome::OwnWord => "Invalid challenge, you control this word",
            ChallengeOutcome::AllConfirmed => "Invalid challenge, all spaces already confirmed",
            ChallengeOutcome::SameAsExisting => "Invalid challenge, same as existing word",
        })
    }
}

/// Precondition violations on match operations. These surface to clients as
/// `INVALID_REQUEST` (for play commands) or `Fail <reason>` (via the lobby).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("Match already has two players")]
    MatchFull,
    #[error("match already over")]
    MatchOver,
    #[error("Player {0} already in match")]
    DuplicatePlayer(String),
    #[error("word ID {0} not in puzzle")]
    UnknownWord(u32),
    #[error("player {0} not in match")]
    NotSeated(String),
    #[error("match does not have two players yet")]
    NotPlayable,
    #[error("guess contains whitespace")]
    WhitespaceGuess,
    #[error("match id is empty or contains whitespace")]
    BadId,
    #[error("match description is empty")]
    EmptyDescription,
}

/// A live match between one or two players on a fixed puzzle.
#[derive(Debug)]
pub struct Match {
    id: String,
    description: String,
    puzzle: Arc<Puzzle>,
    state: Mutex<BoardState>,
    listeners: ListenerSet,
}

#[derive(Debug)]
struct BoardState {
    /// Seated players in join order, length 1 or 2.
    players: Vec<String>,
    scores: HashMap<String, i64>,
    /// One cell per position of the bounding grid. Keyed by `Position`, so
    /// iteration is row-major.
    board: BTreeMap<Position, Cell>,
    finalized: bool,
}

impl Match {
    /// Creates a match on `puzzle` with its first player seated. The board
    /// covers the puzzle's full bounding grid, gap cells included.
    pub fn new(
        id: &str,
        description: &str,
        puzzle: Arc<Puzzle>,
        player: &str,
    ) -> Result<Match, MatchError> {
        if id.is_empty() || id.chars().any(|c| c.is_whitespace()) {
            return Err(MatchError::BadId);
        }
        if description.is_empty() {
            return Err(MatchError::EmptyDescription);
        }

        let (rows, cols) = puzzle.board_size();
        let mut board = BTreeMap::new();
        for row in 0..rows {
            for col in 0..cols {
                let pos = Position::new(row, col);
                let cell = if puzzle.contains_position(pos) {
                    Cell::blank(puzzle.starts_at(pos))
                } else {
                    Cell::Gap
                };
                board.insert(pos, cell);
            }
        }

        Ok(Match {
            id: id.to_string(),
            description: description.to_string(),
            puzzle,
            state: Mutex::new(BoardState {
                players: vec![player.to_string()],
                scores: HashMap::from([(player.to_string(), 0)]),
                board,
                finalized: false,
            }),
            listeners: ListenerSet::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// One-line listing form: `<id> "<description>"`.
    pub fn summary(&self) -> String {
        format!("{} {}", self.id, quote(&self.description))
    }

    pub fn players(&self) -> Vec<String> {
        self.lock().players.clone()
    }

    /// Whether the match has been finalized. Unlike [`is_finished`] this is
    /// a pure observer.
    ///
    /// [`is_finished`]: Match::is_finished
    pub fn is_finalized(&self) -> bool {
        self.lock().finalized
    }

    /// Registers a board-change callback; returns a token for
    /// [`unsubscribe`](Match::unsubscribe).
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> usize {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: usize) {
        self.listeners.unsubscribe(id);
    }

    /// Seats the second player. Fails if the match is already full, already
    /// over, or the name is already seated. Triggers board fan-out so the
    /// waiting player learns the match has become playable.
    pub fn add_player(&self, player: &str) -> Result<(), MatchError> {
        {
            let mut state = self.lock();
            if state.players.len() != 1 {
                return Err(MatchError::MatchFull);
            }
            if state.finalized {
                return Err(MatchError::MatchOver);
            }
            if state.players.iter().any(|p| p == player) {
                return Err(MatchError::DuplicatePlayer(player.to_string()));
            }
            state.players.push(player.to_string());
            state.scores.insert(player.to_string(), 0);
        }
        self.listeners.notify();
        Ok(())
    }

    /// The given player guesses a word. Returns the feedback outcome, or an
    /// error when a precondition (seated player, playable match, clean
    /// input, known word id) is violated. Fan-out fires iff a cell changed.
    pub fn try_guess(
        &self,
        player: &str,
        word_id: u32,
        raw_guess: &str,
    ) -> Result<GuessOutcome, MatchError> {
        let changed;
        let outcome;
        {
            let mut state = self.lock();
            let (entry, target_index, guess) =
                self.check_play_preconditions(&state, player, word_id, raw_guess)?;

            if entry.len() != guess.len() {
                return Ok(GuessOutcome::WrongLength);
            }

            let positions = entry.positions();
            let mut all_same = true;
            let mut to_clear: Vec<usize> = Vec::new();
            for (i, pos) in positions.iter().enumerate() {
                let cell = &state.board[pos];
                let current = cell.letter();
                all_same = all_same && guess[i] == current;
                if guess[i] == current || !cell.has_guess() {
                    continue;
                }
                if cell.is_confirmed() {
                    return Ok(GuessOutcome::Inconsistent);
                }
                if !cell.consistent_with(guess[i], player) {
                    return Ok(GuessOutcome::Inconsistent);
                }
                // The conflict is only with this player's own crossing
                // words; every other word through this cell gets cleared.
                for (j, other) in self.puzzle.entries().iter().enumerate() {
                    if j != target_index && other.covers(*pos) {
                        to_clear.push(j);
                    }
                }
            }

            if all_same {
                return Ok(GuessOutcome::SameAsExisting);
            }

            let mut board_changed = false;
            let direction = entry.direction();
            for (i, pos) in positions.iter().enumerate() {
                let cell = &state.board[pos];
                let updated = cell.with_guess(guess[i], player, direction);
                if updated != *cell {
                    board_changed = true;
                }
                state.board.insert(*pos, updated);
            }
            board_changed = self.clear_entries(&mut state, &to_clear) || board_changed;

            changed = board_changed;
            outcome = GuessOutcome::Valid;
        }
        if changed {
            self.listeners.notify();
        }
        Ok(outcome)
    }

    /// The given player challenges a word. Check order: length, then
    /// per-cell validity (blanks, own word), then all-confirmed, then
    /// same-as-existing, then correctness resolution.
    pub fn challenge(
        &self,
        player: &str,
        word_id: u32,
        raw_guess: &str,
    ) -> Result<ChallengeOutcome, MatchError> {
        let changed;
        let outcome;
        {
            let mut state = self.lock();
            let (entry, target_index, guess) =
                self.check_play_preconditions(&state, player, word_id, raw_guess)?;

            if entry.len() != guess.len() {
                return Ok(ChallengeOutcome::WrongLength);
            }

            let positions = entry.positions();
            let direction = entry.direction();
            let mut all_confirmed = true;
            let mut all_same = true;
            for (i, pos) in positions.iter().enumerate() {
                let cell = &state.board[pos];
                if !cell.has_guess() {
                    return Ok(ChallengeOutcome::MissingGuesses);
                }
                // Per-word ownership is uniform, so one owned cell means the
                // challenger controls the whole word.
                if cell.owner(direction) == Some(player) {
                    return Ok(ChallengeOutcome::OwnWord);
                }
                all_confirmed = all_confirmed && cell.is_confirmed();
                all_same = all_same && cell.letter() == guess[i];
            }
            if all_confirmed {
                return Ok(ChallengeOutcome::AllConfirmed);
            }
            if all_same {
                return Ok(ChallengeOutcome::SameAsExisting);
            }

            let answer = entry.letters();
            let challenge_correct = guess == answer;
            let current_correct = entry_correct(&state.board, entry);
            // The same-as-existing check above rules out both being true.
            assert!(
                !(challenge_correct && current_correct),
                "identical challenge slipped past the same-word check"
            );

            let mut to_clear: Vec<usize> = Vec::new();
            if current_correct {
                *state.scores.get_mut(player).unwrap() -= 1;
                for pos in &positions {
                    let confirmed = state.board[pos].confirmed();
                    state.board.insert(*pos, confirmed);
                }
                outcome = ChallengeOutcome::TargetAlreadyCorrect;
            } else if challenge_correct {
                *state.scores.get_mut(player).unwrap() += CHALLENGE_SUCCESS_SCORE;
                for (i, pos) in positions.iter().enumerate() {
                    let original = state.board[pos].clone();
                    let updated = original
                        .clear_direction(direction)
                        .with_guess(guess[i], player, direction)
                        .confirmed();
                    state.board.insert(*pos, updated);

                    // A rewritten letter invalidates every other word
                    // through this cell.
                    if original.letter() != guess[i] {
                        for (j, other) in self.puzzle.entries().iter().enumerate() {
                            if j != target_index && other.covers(*pos) {
                                to_clear.push(j);
                            }
                        }
                    }
                }
                outcome = ChallengeOutcome::Success;
            } else {
                *state.scores.get_mut(player).unwrap() -= 1;
                to_clear.push(target_index);
                outcome = ChallengeOutcome::BothIncorrect;
            }

            self.clear_entries(&mut state, &to_clear);
            changed = true;
        }
        if changed {
            self.listeners.notify();
        }
        Ok(outcome)
    }

    /// Whether the match is over. If every word is currently correct and the
    /// match is not yet finalized, this finalizes it (awarding the per-word
    /// points), so this is a mutator despite the name; the original game
    /// engine behaves this way and callers rely on it.
    pub fn is_finished(&self) -> bool {
        let mut state = self.lock();
        if state.finalized {
            return true;
        }
        let all_correct = self
            .puzzle
            .entries()
            .iter()
            .all(|e| entry_correct(&state.board, e));
        if all_correct {
            self.finalize_locked(&mut state, "");
        }
        all_correct
    }

    /// Ends the match. Each correctly guessed word earns its owner one
    /// point; when nobody forfeited, the cells of correct words are
    /// confirmed. A seated forfeiting player has their score zeroed.
    /// Idempotent: a second call changes nothing.
    pub fn finalize(&self, forfeiting_player: &str) {
        {
            let mut state = self.lock();
            if state.finalized {
                return;
            }
            self.finalize_locked(&mut state, forfeiting_player);
        }
        // Without a forfeit the mutation that completed the board has
        // already fanned out; a forfeit is its own change.
        if !forfeiting_player.is_empty() {
            self.listeners.notify();
        }
    }

    fn finalize_locked(&self, state: &mut BoardState, forfeiting_player: &str) {
        state.finalized = true;
        for entry in self.puzzle.entries() {
            if !entry_correct(&state.board, entry) {
                continue;
            }
            let first = &state.board[&entry.positions()[0]];
            if let Some(owner) = first.owner(entry.direction()) {
                let owner = owner.to_string();
                *state.scores.get_mut(&owner).unwrap() += 1;
            }
            if forfeiting_player.is_empty() {
                for pos in entry.positions() {
                    let confirmed = state.board[&pos].confirmed();
                    state.board.insert(pos, confirmed);
                }
            }
        }
        if state.players.iter().any(|p| p == forfeiting_player) {
            state.scores.insert(forfeiting_player.to_string(), 0);
        }
        info!("match {} finalized", self.id);
    }

    /// Renders the board as the given viewer sees it, following the match
    /// view grammar: dimensions, squares in row-major order, scores in join
    /// order, then every clue.
    pub fn view(&self, viewer: &str) -> String {
        let state = self.lock();
        let (rows, cols) = self.puzzle.board_size();
        let mut out = String::new();
        out.push_str(&format!("{rows}x{cols}\n"));

        out.push_str("Squares:\n");
        for cell in state.board.values() {
            out.push_str(&cell.render(viewer));
            out.push('\n');
        }

        out.push_str("Scores:\n");
        for player in &state.players {
            out.push_str(&format!("{} {}\n", player, state.scores[player]));
        }

        out.push_str("Questions:");
        for (i, entry) in self.puzzle.entries().iter().enumerate() {
            out.push_str(&format!("\n{} {}", i + 1, quote(entry.clue())));
        }
        out
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap()
    }

    /// Shared TRY/CHALLENGE preconditions: live match, known word, seated
    /// player, two seats filled, whitespace-free guess. Returns the target
    /// entry, its index, and the uppercased guess letters.
    fn check_play_preconditions<'a>(
        &'a self,
        state: &BoardState,
        player: &str,
        word_id: u32,
        raw_guess: &str,
    ) -> Result<(&'a Entry, usize, Vec<char>), MatchError> {
        if state.finalized {
            return Err(MatchError::MatchOver);
        }
        let entry = self
            .puzzle
            .entry(word_id)
            .ok_or(MatchError::UnknownWord(word_id))?;
        if !state.players.iter().any(|p| p == player) {
            return Err(MatchError::NotSeated(player.to_string()));
        }
        if state.players.len() != 2 {
            return Err(MatchError::NotPlayable);
        }
        if raw_guess.chars().any(|c| c.is_whitespace()) {
            return Err(MatchError::WhitespaceGuess);
        }
        let guess: Vec<char> = raw_guess.to_uppercase().chars().collect();
        Ok((entry, word_id as usize - 1, guess))
    }

    /// Clears the given entries (by index) from the board via
    /// `clear_direction` on each of their cells. Returns whether any cell
    /// changed.
    fn clear_entries(&self, state: &mut BoardState, entry_indices: &[usize]) -> bool {
        let mut changed = false;
        for &index in entry_indices {
            let entry = &self.puzzle.entries()[index];
            for pos in entry.positions() {
                let cell = &state.board[&pos];
                let updated = cell.clear_direction(entry.direction());
                if updated != *cell {
                    changed = true;
                }
                state.board.insert(pos, updated);
            }
        }
        changed
    }
}

/// True when the cells the entry covers spell its answer exactly.
fn entry_correct(board: &BTreeMap<Position, Cell>, entry: &Entry) -> bool {
    entry
        .positions()
        .iter()
        .zip(entry.letters())
        .all(|(pos, letter)| board[pos].letter() == letter)
}
