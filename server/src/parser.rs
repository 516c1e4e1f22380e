//! Parser for `.puzzle` files.
//!
//! The grammar, with `//` line comments and free whitespace between tokens:
//!
//! ```text
//! file        ::= ">>" name description entry*
//! entry       ::= "(" wordName "," clue "," direction "," row "," col ")"
//! name        ::= string
//! description ::= string
//! wordName    ::= [a-z-]+
//! direction   ::= "DOWN" | "ACROSS"
//! row, col    ::= [0-9]+
//! string      ::= '"' ( [^"\r\n\\] | '\\' [\\nrt] )* '"'
//! ```
//!
//! A syntactically invalid file, or one whose entries violate the puzzle
//! consistency invariant, is rejected; the caller logs and skips it.

use std::path::Path;

use thiserror::Error;

use crate::puzzle::{Direction, Entry, Puzzle, PuzzleError};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("expected {expected} at offset {offset}")]
    Expected {
        expected: &'static str,
        offset: usize,
    },
    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),
    #[error("invalid escape `\\{0}` in string")]
    BadEscape(char),
    #[error("unexpected trailing input at offset {0}")]
    TrailingInput(usize),
    #[error("file name {0} has no usable stem")]
    BadFileName(String),
    #[error(transparent)]
    Puzzle(#[from] PuzzleError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reads and parses one puzzle file. The puzzle id is the file name without
/// directory or `.puzzle` extension.
pub fn load_puzzle_file(path: &Path) -> Result<Puzzle, ParseError> {
    let id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| ParseError::BadFileName(path.display().to_string()))?;
    let content = std::fs::read_to_string(path)?;
    parse_puzzle(id, &content)
}

/// Parses puzzle file content into a consistent [`Puzzle`].
pub fn parse_puzzle(id: &str, content: &str) -> Result<Puzzle, ParseError> {
    let mut scanner = Scanner::new(content);
    scanner.skip_trivia();
    scanner.expect_literal(">>")?;
    scanner.skip_trivia();
    let name = scanner.parse_string()?;
    scanner.skip_trivia();
    let description = scanner.parse_string()?;

    let mut entries = Vec::new();
    loop {
        scanner.skip_trivia();
        if scanner.at_end() {
            break;
        }
        entries.push(scanner.parse_entry()?);
    }

    Ok(Puzzle::new(id, &name, &description, entries)?)
}

/// Character-level scanner over the file content.
struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn new(input: &str) -> Scanner {
        Scanner {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    /// Skips whitespace (including newlines) and `//` comments.
    fn skip_trivia(&mut self) {
        loop {
            while self.peek().map_or(false, |c| c.is_whitespace()) {
                self.pos += 1;
            }
            if self.peek() == Some('/') && self.chars.get(self.pos + 1) == Some(&'/') {
                while self.peek().map_or(false, |c| c != '\n') {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn expect_literal(&mut self, literal: &'static str) -> Result<(), ParseError> {
        for expected in literal.chars() {
            if self.bump() != Some(expected) {
                return Err(ParseError::Expected {
                    expected: literal,
                    offset: self.pos,
                });
            }
        }
        Ok(())
    }

    fn expect_char(&mut self, expected: &'static str, c: char) -> Result<(), ParseError> {
        self.skip_trivia();
        if self.bump() != Some(c) {
            return Err(ParseError::Expected {
                expected,
                offset: self.pos,
            });
        }
        Ok(())
    }

    /// Parses a double-quoted string, resolving `\\`, `\n`, `\r`, `\t`.
    /// Raw line breaks inside a string are not allowed.
    fn parse_string(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        if self.bump() != Some('"') {
            return Err(ParseError::Expected {
                expected: "string",
                offset: start,
            });
        }
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('\\') => out.push('\\'),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some(other) => return Err(ParseError::BadEscape(other)),
                    None => return Err(ParseError::UnterminatedString(start)),
                },
                Some('\n') | Some('\r') | None => {
                    return Err(ParseError::UnterminatedString(start))
                }
                Some(c) => out.push(c),
            }
        }
    }

    /// Consumes the longest run of characters matching `accept`.
    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !accept(c) {
                break;
            }
            out.push(c);
            self.pos += 1;
        }
        out
    }

    /// Parses a word name: one or more of `[a-z-]`.
    fn parse_word(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let out = self.take_while(|c| c.is_ascii_lowercase() || c == '-');
        if out.is_empty() {
            return Err(ParseError::Expected {
                expected: "word name",
                offset: start,
            });
        }
        Ok(out)
    }

    fn parse_number(&mut self) -> Result<usize, ParseError> {
        let start = self.pos;
        let out = self.take_while(|c| c.is_ascii_digit());
        out.parse().map_err(|_| ParseError::Expected {
            expected: "number",
            offset: start,
        })
    }

    fn parse_direction(&mut self) -> Result<Direction, ParseError> {
        let start = self.pos;
        let out = self.take_while(|c| c.is_ascii_uppercase());
        out.parse().map_err(|_| ParseError::Expected {
            expected: "ACROSS or DOWN",
            offset: start,
        })
    }

    /// Parses `(word, "clue", DIRECTION, row, col)`. Newlines may appear
    /// anywhere between the tokens of an entry.
    fn parse_entry(&mut self) -> Result<Entry, ParseError> {
        self.expect_char("(", '(')?;
        self.skip_trivia();
        let word = self.parse_word()?;
        self.expect_char(",", ',')?;
        self.skip_trivia();
        let clue = self.parse_string()?;
        self.expect_char(",", ',')?;
        self.skip_trivia();
        let direction = self.parse_direction()?;
        self.expect_char(",", ',')?;
        self.skip_trivia();
        let row = self.parse_number()?;
        self.expect_char(",", ',')?;
        self.skip_trivia();
        let col = self.parse_number()?;
        self.expect_char(")", ')')?;
        Ok(Entry::new(&word, &clue, direction, row, col)?)
    }
}
