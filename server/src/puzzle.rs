//! Immutable puzzle solutions: word entries, board geometry, and the
//! consistency check applied before a puzzle is accepted into the lobby.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Orientation of a word on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Across,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Across => "ACROSS",
            Direction::Down => "DOWN",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = PuzzleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACROSS" => Ok(Direction::Across),
            "DOWN" => Ok(Direction::Down),
            _ => Err(PuzzleError::BadDirection(s.to_string())),
        }
    }
}

/// A 0-indexed board coordinate. The derived ordering is (row, col), so a
/// sorted map keyed by `Position` iterates in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Position {
        Position { row, col }
    }
}

/// Why a puzzle or one of its entries was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PuzzleError {
    #[error("puzzle id is empty")]
    EmptyId,
    #[error("puzzle name is empty")]
    EmptyName,
    #[error("answer is empty")]
    EmptyAnswer,
    #[error("answer `{0}` contains whitespace")]
    AnswerWhitespace(String),
    #[error("clue is empty")]
    EmptyClue,
    #[error("clue contains a line break")]
    ClueLineBreak,
    #[error("invalid direction `{0}`")]
    BadDirection(String),
    #[error("words {0} and {1} have the same answer")]
    DuplicateAnswer(u32, u32),
    #[error("words {0} and {1} overlap in the same direction")]
    SameDirectionOverlap(u32, u32),
    #[error("words {0} and {1} cross with different letters")]
    CrossingMismatch(u32, u32),
}

/// The solution for one word: answer, clue, orientation, and start position.
/// The answer is uppercased on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    answer: String,
    clue: String,
    direction: Direction,
    row: usize,
    col: usize,
}

impl Entry {
    /// Creates an entry, rejecting empty answers or clues, whitespace in the
    /// answer, and line breaks in the clue.
    pub fn new(
        answer: &str,
        clue: &str,
        direction: Direction,
        row: usize,
        col: usize,
    ) -> Result<Entry, PuzzleError> {
        if answer.is_empty() {
            return Err(PuzzleError::EmptyAnswer);
        }
        if answer.chars().any(|c| c.is_whitespace()) {
            return Err(PuzzleError::AnswerWhitespace(answer.to_string()));
        }
        if clue.is_empty() {
            return Err(PuzzleError::EmptyClue);
        }
        if clue.contains('\n') || clue.contains('\r') {
            return Err(PuzzleError::ClueLineBreak);
        }
        Ok(Entry {
            answer: answer.to_uppercase(),
            clue: clue.to_string(),
            direction,
            row,
            col,
        })
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn clue(&self) -> &str {
        &self.clue
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }

    /// Number of cells the answer occupies.
    pub fn len(&self) -> usize {
        self.answer.chars().count()
    }

    /// Coordinate on the variable axis of the last cell of the word.
    pub fn end(&self) -> usize {
        let start = match self.direction {
            Direction::Across => self.col,
            Direction::Down => self.row,
        };
        start + self.len() - 1
    }

    /// The cells the word occupies, from its start to its end.
    pub fn positions(&self) -> Vec<Position> {
        match self.direction {
            Direction::Across => (self.col..=self.end())
                .map(|c| Position::new(self.row, c))
                .collect(),
            Direction::Down => (self.row..=self.end())
                .map(|r| Position::new(r, self.col))
                .collect(),
        }
    }

    /// True if the word occupies the given cell.
    pub fn covers(&self, pos: Position) -> bool {
        match self.direction {
            Direction::Across => {
                pos.row == self.row && pos.col >= self.col && pos.col <= self.end()
            }
            Direction::Down => pos.col == self.col && pos.row >= self.row && pos.row <= self.end(),
        }
    }

    /// Uppercase letters of the answer, in board order.
    pub fn letters(&self) -> Vec<char> {
        self.answer.chars().collect()
    }
}

/// An immutable, consistent crossword puzzle. Word ids are 1-based indexes
/// into the entry list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Puzzle {
    id: String,
    name: String,
    description: String,
    entries: Vec<Entry>,
}

impl Puzzle {
    /// Creates a puzzle, verifying the consistency invariant:
    /// - all answers unique (answers are uppercased, so this is
    ///   case-insensitive),
    /// - no two same-direction words share a cell,
    /// - crossing words agree on the letter at their intersection.
    pub fn new(
        id: &str,
        name: &str,
        description: &str,
        entries: Vec<Entry>,
    ) -> Result<Puzzle, PuzzleError> {
        if id.is_empty() {
            return Err(PuzzleError::EmptyId);
        }
        if name.is_empty() {
            return Err(PuzzleError::EmptyName);
        }
        check_consistent(&entries)?;
        Ok(Puzzle {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            entries,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Looks up an entry by its 1-based word id.
    pub fn entry(&self, word_id: u32) -> Option<&Entry> {
        let index = (word_id as usize).checked_sub(1)?;
        self.entries.get(index)
    }

    /// Minimum bounding grid as (rows, cols).
    pub fn board_size(&self) -> (usize, usize) {
        let mut rows = 0;
        let mut cols = 0;
        for entry in &self.entries {
            match entry.direction() {
                Direction::Across => {
                    rows = rows.max(entry.row() + 1);
                    cols = cols.max(entry.end() + 1);
                }
                Direction::Down => {
                    rows = rows.max(entry.end() + 1);
                    cols = cols.max(entry.col() + 1);
                }
            }
        }
        (rows, cols)
    }

    /// True if some word occupies the given cell; a cell outside every word
    /// is a gap on the board.
    pub fn contains_position(&self, pos: Position) -> bool {
        self.entries.iter().any(|e| e.covers(pos))
    }

    /// The `(word id, direction)` tags of every word starting at the given
    /// cell, in entry-list order. At most one ACROSS and one DOWN word can
    /// start on any cell of a consistent puzzle.
    pub fn starts_at(&self, pos: Position) -> Vec<(u32, Direction)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.row() == pos.row && e.col() == pos.col)
            .map(|(i, e)| (i as u32 + 1, e.direction()))
            .collect()
    }
}

fn check_consistent(entries: &[Entry]) -> Result<(), PuzzleError> {
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let (a, b) = (&entries[i], &entries[j]);
            let (id_a, id_b) = (i as u32 + 1, j as u32 + 1);

            if a.answer() == b.answer() {
                return Err(PuzzleError::DuplicateAnswer(id_a, id_b));
            }

            if a.direction() == b.direction() {
                let same_lane = match a.direction() {
                    Direction::Across => a.row() == b.row(),
                    Direction::Down => a.col() == b.col(),
                };
                let (start_a, start_b) = match a.direction() {
                    Direction::Across => (a.col(), b.col()),
                    Direction::Down => (a.row(), b.row()),
                };
                if same_lane && start_b <= a.end() && start_a <= b.end() {
                    return Err(PuzzleError::SameDirectionOverlap(id_a, id_b));
                }
            } else {
                let (across, down) = if a.direction() == Direction::Across {
                    (a, b)
                } else {
                    (b, a)
                };
                // Index of the crossing cell within each word, if they meet.
                let across_index = down.col().wrapping_sub(across.col());
                let down_index = across.row().wrapping_sub(down.row());
                if down.col() >= across.col()
                    && across_index <= across.end() - across.col()
                    && across.row() >= down.row()
                    && down_index <= down.end() - down.row()
                    && across.letters()[across_index] != down.letters()[down_index]
                {
                    return Err(PuzzleError::CrossingMismatch(id_a, id_b));
                }
            }
        }
    }
    Ok(())
}
