//! Immutable board-cell values.
//!
//! A match never mutates a cell in place; every rule change reads a cell,
//! computes a new value, and writes it back. Value equality between the old
//! and new cell is what drives the "did the board change?" signal, so each
//! user-visible change triggers exactly one fan-out.

use crate::puzzle::Direction;

/// The letter slot of a cell with no guess in it.
pub const BLANK: char = ' ';

/// One square of a match board.
///
/// Invariants: a blank cell has no owners and is not confirmed; a confirmed
/// cell has a letter and at least one owner; at most two words (one per
/// direction) start on any cell. Violating a transition precondition is a
/// programmer bug and panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// Not covered by any word; rendered as `EMPTY` and never guessed on.
    Gap,
    Letter {
        letter: char,
        confirmed: bool,
        owner_across: Option<String>,
        owner_down: Option<String>,
        /// `(word id, direction)` of each word starting here, fixed when the
        /// match board is built.
        starts: Vec<(u32, Direction)>,
    },
}

impl Cell {
    /// A blank, unowned letter cell carrying the given start tags.
    pub fn blank(starts: Vec<(u32, Direction)>) -> Cell {
        Cell::Letter {
            letter: BLANK,
            confirmed: false,
            owner_across: None,
            owner_down: None,
            starts,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, Cell::Gap)
    }

    /// Current letter; [`BLANK`] when no guess has been made.
    pub fn letter(&self) -> char {
        match self {
            Cell::Gap => panic!("letter() called on a gap cell"),
            Cell::Letter { letter, .. } => *letter,
        }
    }

    /// True for a non-gap cell holding a letter.
    pub fn has_guess(&self) -> bool {
        match self {
            Cell::Gap => false,
            Cell::Letter { letter, .. } => *letter != BLANK,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        match self {
            Cell::Gap => false,
            Cell::Letter { confirmed, .. } => *confirmed,
        }
    }

    /// The player whose guess set this cell's letter through a word in the
    /// given direction, if any.
    pub fn owner(&self, direction: Direction) -> Option<&str> {
        match self {
            Cell::Gap => panic!("owner() called on a gap cell"),
            Cell::Letter {
                owner_across,
                owner_down,
                ..
            } => match direction {
                Direction::Across => owner_across.as_deref(),
                Direction::Down => owner_down.as_deref(),
            },
        }
    }

    /// A copy of this cell with `letter` guessed by `player` in the given
    /// direction. The cell must not be a gap, and a confirmed cell only
    /// accepts its existing letter.
    pub fn with_guess(&self, letter: char, player: &str, direction: Direction) -> Cell {
        match self {
            Cell::Gap => panic!("with_guess() called on a gap cell"),
            Cell::Letter {
                letter: current,
                confirmed,
                owner_across,
                owner_down,
                starts,
            } => {
                assert!(
                    !confirmed || *current == letter,
                    "new guess on a confirmed cell"
                );
                assert!(!player.is_empty(), "guessing player must be named");
                let (owner_across, owner_down) = match direction {
                    Direction::Across => (Some(player.to_string()), owner_down.clone()),
                    Direction::Down => (owner_across.clone(), Some(player.to_string())),
                };
                Cell::Letter {
                    letter,
                    confirmed: *confirmed,
                    owner_across,
                    owner_down,
                    starts: starts.clone(),
                }
            }
        }
    }

    /// A confirmed copy of this cell. The cell must hold a letter owned by
    /// at least one player.
    pub fn confirmed(&self) -> Cell {
        match self {
            Cell::Gap => panic!("confirmed() called on a gap cell"),
            Cell::Letter {
                letter,
                owner_across,
                owner_down,
                starts,
                ..
            } => {
                assert!(*letter != BLANK, "cannot confirm a blank cell");
                assert!(
                    owner_across.is_some() || owner_down.is_some(),
                    "cannot confirm an unowned cell"
                );
                Cell::Letter {
                    letter: *letter,
                    confirmed: true,
                    owner_across: owner_across.clone(),
                    owner_down: owner_down.clone(),
                    starts: starts.clone(),
                }
            }
        }
    }

    /// A copy with the owner in the given direction removed. When the other
    /// direction is unowned too, the letter reverts to blank. The confirmed
    /// flag is untouched; callers must not clear the direction of a
    /// confirmed word.
    pub fn clear_direction(&self, direction: Direction) -> Cell {
        match self {
            Cell::Gap => panic!("clear_direction() called on a gap cell"),
            Cell::Letter {
                letter,
                confirmed,
                owner_across,
                owner_down,
                starts,
            } => {
                let (owner_across, owner_down, other_owned) = match direction {
                    Direction::Across => (None, owner_down.clone(), owner_down.is_some()),
                    Direction::Down => (owner_across.clone(), None, owner_across.is_some()),
                };
                Cell::Letter {
                    letter: if other_owned { *letter } else { BLANK },
                    confirmed: *confirmed,
                    owner_across,
                    owner_down,
                    starts: starts.clone(),
                }
            }
        }
    }

    /// Whether `player` may legally place `letter` here: the letter matches
    /// the current one, the cell is blank, or every direction that has an
    /// owner is owned by `player`.
    pub fn consistent_with(&self, letter: char, player: &str) -> bool {
        match self {
            Cell::Gap => panic!("consistent_with() called on a gap cell"),
            Cell::Letter {
                letter: current,
                owner_across,
                owner_down,
                ..
            } => {
                if *current == letter || *current == BLANK {
                    return true;
                }
                let mine = |owner: &Option<String>| {
                    owner.as_deref().map_or(true, |name| name == player)
                };
                mine(owner_across) && mine(owner_down)
            }
        }
    }

    /// Viewer-relative wire rendering of the cell:
    /// `EMPTY` for gaps, otherwise `"+"? LETTER (" " ">"? id " " DIR)*`
    /// where `_` stands for a blank letter and `>` marks a start tag whose
    /// direction the viewer owns on this cell.
    pub fn render(&self, viewer: &str) -> String {
        match self {
            Cell::Gap => "EMPTY".to_string(),
            Cell::Letter {
                letter,
                confirmed,
                starts,
                ..
            } => {
                let mut out = String::new();
                if *confirmed {
                    out.push('+');
                }
                out.push(if *letter == BLANK { '_' } else { *letter });
                for (word_id, direction) in starts {
                    out.push(' ');
                    if self.owner(*direction) == Some(viewer) {
                        out.push('>');
                    }
                    out.push_str(&format!("{word_id} {direction}"));
                }
                out
            }
        }
    }
}
