//! # Shared Protocol Library
//!
//! This crate contains the wire protocol spoken between the crossword game
//! server and its clients. It is the single source of truth for request
//! parsing, response framing, and the string escaping rules used by both
//! sides of the connection.
//!
//! ## Protocol Overview
//!
//! The protocol is line-oriented UTF-8 over TCP (default port 4949).
//!
//! ### Client requests
//! One command per newline-terminated line, with space-separated arguments.
//! The command word is case-insensitive:
//!
//! ```text
//! ADD_USER gzlin
//! NEW_MATCH gzlin match1 minimal "a friendly match"
//! TRY gzlin match1 1 CAT
//! ```
//!
//! ### Server responses
//! Every response (direct reply or asynchronous push) is a framed message:
//!
//! ```text
//! <TYPE> <N>\n
//! <N lines of content, LF-separated>
//! ```
//!
//! `N` may be zero, in which case no content lines follow.
//!
//! ### Quoted strings
//! Names, descriptions, and clues travel inside double quotes with backslash
//! escapes for `\\`, `\n`, `\r`, and `\t`. A raw double quote can never
//! appear inside a quoted string.
//!
//! ## Design Notes
//!
//! Requests and frame types are closed sets, so both are modelled as plain
//! enums with exhaustive matching rather than trait objects. Parsing is
//! strict: a wrong token count, an unknown command, or a non-numeric word id
//! is a [`RequestError`], which the server surfaces as an `INVALID_REQUEST`
//! frame echoing the offending line.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Port the server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 4949;

/// Wraps a string in double quotes, escaping `\`, newline, carriage return,
/// and tab so the result stays on one line.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Errors produced when undoing [`quote`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuoteError {
    #[error("string is not surrounded by double quotes: `{0}`")]
    NotQuoted(String),
    #[error("invalid escape sequence `\\{0}`")]
    BadEscape(char),
    #[error("dangling backslash at end of string")]
    DanglingEscape,
}

/// Strips surrounding double quotes and resolves backslash escapes.
pub fn unquote(s: &str) -> Result<String, QuoteError> {
    let inner = s
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(|| QuoteError::NotQuoted(s.to_string()))?;
    unescape(inner)
}

/// Resolves backslash escapes in the interior of a quoted string.
pub fn unescape(s: &str) -> Result<String, QuoteError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => return Err(QuoteError::BadEscape(other)),
            None => return Err(QuoteError::DanglingEscape),
        }
    }
    Ok(out)
}

/// A client command, one per input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    AddUser {
        user: String,
    },
    GetPuzzles,
    GetMatches,
    NewMatch {
        user: String,
        match_id: String,
        puzzle_id: String,
        description: String,
    },
    PlayMatch {
        user: String,
        match_id: String,
    },
    Try {
        user: String,
        match_id: String,
        word_id: u32,
        word: String,
    },
    Challenge {
        user: String,
        match_id: String,
        word_id: u32,
        word: String,
    },
    ExitMatch {
        user: String,
        match_id: String,
    },
    Quit {
        user: String,
    },
}

/// Why a request line could not be understood.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("empty request line")]
    Empty,
    #[error("unknown request type `{0}`")]
    UnknownType(String),
    #[error("wrong number of arguments for {0}")]
    WrongArgumentCount(&'static str),
    #[error("word id `{0}` is not a number")]
    BadWordId(String),
    #[error("missing quoted description")]
    MissingDescription,
    #[error("malformed description: {0}")]
    BadDescription(#[from] QuoteError),
}

impl Request {
    /// Parses a single request line. The command word is case-insensitive;
    /// arguments are whitespace-separated except for the quoted description
    /// of `NEW_MATCH`, which may contain spaces.
    pub fn parse(line: &str) -> Result<Request, RequestError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let command = tokens.first().ok_or(RequestError::Empty)?.to_uppercase();

        match command.as_str() {
            "ADD_USER" => {
                let [user] = expect_args("ADD_USER", &tokens[1..])?;
                Ok(Request::AddUser { user })
            }
            "GET_PUZZLES" => {
                expect_args::<0>("GET_PUZZLES", &tokens[1..])?;
                Ok(Request::GetPuzzles)
            }
            "GET_MATCHES" => {
                expect_args::<0>("GET_MATCHES", &tokens[1..])?;
                Ok(Request::GetMatches)
            }
            "NEW_MATCH" => {
                // The description is everything between the first and last
                // double quote, so it is cut from the raw line rather than
                // from the token list, then unescaped like any other quoted
                // string in the protocol.
                if tokens.len() < 5 {
                    return Err(RequestError::WrongArgumentCount("NEW_MATCH"));
                }
                let begin = line.find('"').ok_or(RequestError::MissingDescription)?;
                let end = line.rfind('"').ok_or(RequestError::MissingDescription)?;
                if end <= begin {
                    return Err(RequestError::MissingDescription);
                }
                Ok(Request::NewMatch {
                    user: tokens[1].to_string(),
                    match_id: tokens[2].to_string(),
                    puzzle_id: tokens[3].to_string(),
                    description: unescape(&line[begin + 1..end])?,
                })
            }
            "PLAY_MATCH" => {
                let [user, match_id] = expect_args("PLAY_MATCH", &tokens[1..])?;
                Ok(Request::PlayMatch { user, match_id })
            }
            "TRY" => {
                let [user, match_id, word_id, word] = expect_args("TRY", &tokens[1..])?;
                Ok(Request::Try {
                    user,
                    match_id,
                    word_id: parse_word_id(&word_id)?,
                    word,
                })
            }
            "CHALLENGE" => {
                let [user, match_id, word_id, word] = expect_args("CHALLENGE", &tokens[1..])?;
                Ok(Request::Challenge {
                    user,
                    match_id,
                    word_id: parse_word_id(&word_id)?,
                    word,
                })
            }
            "EXIT_MATCH" => {
                let [user, match_id] = expect_args("EXIT_MATCH", &tokens[1..])?;
                Ok(Request::ExitMatch { user, match_id })
            }
            "QUIT" => {
                let [user] = expect_args("QUIT", &tokens[1..])?;
                Ok(Request::Quit { user })
            }
            _ => Err(RequestError::UnknownType(tokens[0].to_string())),
        }
    }

    /// Renders the request as a wire line (without the trailing newline).
    /// This is the encoding a client sends; `parse` reverses it.
    pub fn encode(&self) -> String {
        match self {
            Request::AddUser { user } => format!("ADD_USER {user}"),
            Request::GetPuzzles => "GET_PUZZLES".to_string(),
            Request::GetMatches => "GET_MATCHES".to_string(),
            Request::NewMatch {
                user,
                match_id,
                puzzle_id,
                description,
            } => format!(
                "NEW_MATCH {user} {match_id} {puzzle_id} {}",
                quote(description)
            ),
            Request::PlayMatch { user, match_id } => format!("PLAY_MATCH {user} {match_id}"),
            Request::Try {
                user,
                match_id,
                word_id,
                word,
            } => format!("TRY {user} {match_id} {word_id} {word}"),
            Request::Challenge {
                user,
                match_id,
                word_id,
                word,
            } => format!("CHALLENGE {user} {match_id} {word_id} {word}"),
            Request::ExitMatch { user, match_id } => format!("EXIT_MATCH {user} {match_id}"),
            Request::Quit { user } => format!("QUIT {user}"),
        }
    }
}

fn expect_args<const N: usize>(
    command: &'static str,
    args: &[&str],
) -> Result<[String; N], RequestError> {
    if args.len() != N {
        return Err(RequestError::WrongArgumentCount(command));
    }
    let mut out = std::array::from_fn(|_| String::new());
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.to_string();
    }
    Ok(out)
}

fn parse_word_id(token: &str) -> Result<u32, RequestError> {
    token
        .parse()
        .map_err(|_| RequestError::BadWordId(token.to_string()))
}

/// Message type carried in a response frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    AddUser,
    GetPuzzles,
    GetMatches,
    NewMatch,
    PlayMatch,
    Try,
    Challenge,
    BoardChanged,
    GameOver,
    AvailableMatches,
    InvalidRequest,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::AddUser => "ADD_USER",
            FrameKind::GetPuzzles => "GET_PUZZLES",
            FrameKind::GetMatches => "GET_MATCHES",
            FrameKind::NewMatch => "NEW_MATCH",
            FrameKind::PlayMatch => "PLAY_MATCH",
            FrameKind::Try => "TRY",
            FrameKind::Challenge => "CHALLENGE",
            FrameKind::BoardChanged => "BOARD_CHANGED",
            FrameKind::GameOver => "GAME_OVER",
            FrameKind::AvailableMatches => "AVAILABLE_MATCHES",
            FrameKind::InvalidRequest => "INVALID_REQUEST",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameKind {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADD_USER" => Ok(FrameKind::AddUser),
            "GET_PUZZLES" => Ok(FrameKind::GetPuzzles),
            "GET_MATCHES" => Ok(FrameKind::GetMatches),
            "NEW_MATCH" => Ok(FrameKind::NewMatch),
            "PLAY_MATCH" => Ok(FrameKind::PlayMatch),
            "TRY" => Ok(FrameKind::Try),
            "CHALLENGE" => Ok(FrameKind::Challenge),
            "BOARD_CHANGED" => Ok(FrameKind::BoardChanged),
            "GAME_OVER" => Ok(FrameKind::GameOver),
            "AVAILABLE_MATCHES" => Ok(FrameKind::AvailableMatches),
            "INVALID_REQUEST" => Ok(FrameKind::InvalidRequest),
            _ => Err(FrameError::UnknownKind(s.to_string())),
        }
    }
}

/// Errors produced when decoding a frame header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("unknown frame type `{0}`")]
    UnknownKind(String),
    #[error("malformed frame header `{0}`")]
    MalformedHeader(String),
    #[error("frame line count `{0}` is not a number")]
    BadLineCount(String),
}

/// One framed server response: a type, and a body of zero or more lines.
///
/// The body never ends in a newline; the line count in the header is derived
/// from it. An empty body encodes as zero content lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub body: String,
}

impl Frame {
    pub fn new(kind: FrameKind, body: impl Into<String>) -> Frame {
        Frame {
            kind,
            body: body.into(),
        }
    }

    /// Number of content lines that follow the header on the wire.
    pub fn line_count(&self) -> usize {
        if self.body.is_empty() {
            0
        } else {
            self.body.lines().count()
        }
    }

    /// Full wire encoding of the frame, including the trailing newline of
    /// the last content line.
    pub fn encode(&self) -> String {
        if self.body.is_empty() {
            format!("{} 0\n", self.kind)
        } else {
            format!("{} {}\n{}\n", self.kind, self.line_count(), self.body)
        }
    }

    /// Parses a frame header line into its type and content line count.
    /// The caller then reads that many lines to assemble the body.
    pub fn parse_header(line: &str) -> Result<(FrameKind, usize), FrameError> {
        let mut parts = line.split(' ');
        let kind = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?
            .parse()?;
        let count_token = parts
            .next()
            .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
        if parts.next().is_some() {
            return Err(FrameError::MalformedHeader(line.to_string()));
        }
        let count = count_token
            .parse()
            .map_err(|_| FrameError::BadLineCount(count_token.to_string()))?;
        Ok((kind, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_plain_string() {
        assert_eq!(quote("feline companion"), "\"feline companion\"");
    }

    #[test]
    fn test_quote_escapes_specials() {
        assert_eq!(quote("a\\b\nc\td\r"), "\"a\\\\b\\nc\\td\\r\"");
    }

    #[test]
    fn test_unquote_round_trip() {
        for original in ["", "plain", "tab\there", "multi\nline", "back\\slash"] {
            let quoted = quote(original);
            assert_eq!(unquote(&quoted).unwrap(), original);
        }
    }

    #[test]
    fn test_unquote_rejects_unquoted() {
        assert_eq!(
            unquote("no quotes"),
            Err(QuoteError::NotQuoted("no quotes".to_string()))
        );
    }

    #[test]
    fn test_unescape_rejects_bad_escape() {
        assert_eq!(unescape("oops\\q"), Err(QuoteError::BadEscape('q')));
        assert_eq!(unescape("oops\\"), Err(QuoteError::DanglingEscape));
    }

    #[test]
    fn test_parse_add_user() {
        let request = Request::parse("ADD_USER gzlin").unwrap();
        assert_eq!(
            request,
            Request::AddUser {
                user: "gzlin".to_string()
            }
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Request::parse("get_puzzles").unwrap(), Request::GetPuzzles);
        assert_eq!(Request::parse("Get_Matches").unwrap(), Request::GetMatches);
    }

    #[test]
    fn test_parse_new_match_with_spaced_description() {
        let request =
            Request::parse("NEW_MATCH gzlin match1 minimal \"a friendly match\"").unwrap();
        assert_eq!(
            request,
            Request::NewMatch {
                user: "gzlin".to_string(),
                match_id: "match1".to_string(),
                puzzle_id: "minimal".to_string(),
                description: "a friendly match".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_new_match_unescapes_description() {
        let request =
            Request::parse("NEW_MATCH gzlin match1 minimal \"a\\\\b and a \\t tab\"").unwrap();
        assert_eq!(
            request,
            Request::NewMatch {
                user: "gzlin".to_string(),
                match_id: "match1".to_string(),
                puzzle_id: "minimal".to_string(),
                description: "a\\b and a \t tab".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_new_match_rejects_bad_escape() {
        assert_eq!(
            Request::parse("NEW_MATCH gzlin match1 minimal \"oops \\q\""),
            Err(RequestError::BadDescription(QuoteError::BadEscape('q')))
        );
    }

    #[test]
    fn test_parse_new_match_missing_quotes() {
        assert_eq!(
            Request::parse("NEW_MATCH gzlin match1 minimal description here"),
            Err(RequestError::MissingDescription)
        );
    }

    #[test]
    fn test_parse_try() {
        let request = Request::parse("TRY gzlin match1 1 CAT").unwrap();
        assert_eq!(
            request,
            Request::Try {
                user: "gzlin".to_string(),
                match_id: "match1".to_string(),
                word_id: 1,
                word: "CAT".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_try_bad_word_id() {
        assert_eq!(
            Request::parse("TRY gzlin match1 one CAT"),
            Err(RequestError::BadWordId("one".to_string()))
        );
    }

    #[test]
    fn test_parse_wrong_argument_count() {
        assert_eq!(
            Request::parse("PLAY_MATCH gzlin"),
            Err(RequestError::WrongArgumentCount("PLAY_MATCH"))
        );
        assert_eq!(
            Request::parse("ADD_USER gzlin extra"),
            Err(RequestError::WrongArgumentCount("ADD_USER"))
        );
        assert_eq!(
            Request::parse("QUIT"),
            Err(RequestError::WrongArgumentCount("QUIT"))
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(
            Request::parse("WIBBLE gzlin"),
            Err(RequestError::UnknownType("WIBBLE".to_string()))
        );
    }

    #[test]
    fn test_parse_empty_line() {
        assert_eq!(Request::parse(""), Err(RequestError::Empty));
        assert_eq!(Request::parse("   "), Err(RequestError::Empty));
    }

    #[test]
    fn test_request_encode_parse_round_trip() {
        let requests = vec![
            Request::AddUser {
                user: "gzlin".to_string(),
            },
            Request::GetPuzzles,
            Request::NewMatch {
                user: "gzlin".to_string(),
                match_id: "m1".to_string(),
                puzzle_id: "minimal".to_string(),
                description: "spaces allowed here".to_string(),
            },
            Request::NewMatch {
                user: "gzlin".to_string(),
                match_id: "m2".to_string(),
                puzzle_id: "minimal".to_string(),
                description: "back\\slash and\ttab".to_string(),
            },
            Request::Challenge {
                user: "lconboy".to_string(),
                match_id: "m1".to_string(),
                word_id: 4,
                word: "TAX".to_string(),
            },
            Request::Quit {
                user: "gzlin".to_string(),
            },
        ];
        for request in requests {
            assert_eq!(Request::parse(&request.encode()).unwrap(), request);
        }
    }

    #[test]
    fn test_frame_encode_counts_lines() {
        let frame = Frame::new(FrameKind::GetMatches, "m1 \"first\"\nm2 \"second\"");
        assert_eq!(frame.line_count(), 2);
        assert_eq!(frame.encode(), "GET_MATCHES 2\nm1 \"first\"\nm2 \"second\"\n");
    }

    #[test]
    fn test_frame_encode_empty_body() {
        let frame = Frame::new(FrameKind::GetMatches, "");
        assert_eq!(frame.line_count(), 0);
        assert_eq!(frame.encode(), "GET_MATCHES 0\n");
    }

    #[test]
    fn test_frame_parse_header() {
        assert_eq!(
            Frame::parse_header("BOARD_CHANGED 17").unwrap(),
            (FrameKind::BoardChanged, 17)
        );
        assert_eq!(
            Frame::parse_header("ADD_USER 1").unwrap(),
            (FrameKind::AddUser, 1)
        );
    }

    #[test]
    fn test_frame_parse_header_rejects_garbage() {
        assert!(matches!(
            Frame::parse_header("NOT_A_TYPE 3"),
            Err(FrameError::UnknownKind(_))
        ));
        assert!(matches!(
            Frame::parse_header("TRY"),
            Err(FrameError::MalformedHeader(_))
        ));
        assert!(matches!(
            Frame::parse_header("TRY x"),
            Err(FrameError::BadLineCount(_))
        ));
        assert!(matches!(
            Frame::parse_header("TRY 1 2"),
            Err(FrameError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_frame_kind_display_from_str_round_trip() {
        let kinds = [
            FrameKind::AddUser,
            FrameKind::GetPuzzles,
            FrameKind::GetMatches,
            FrameKind::NewMatch,
            FrameKind::PlayMatch,
            FrameKind::Try,
            FrameKind::Challenge,
            FrameKind::BoardChanged,
            FrameKind::GameOver,
            FrameKind::AvailableMatches,
            FrameKind::InvalidRequest,
        ];
        for kind in kinds {
            assert_eq!(kind.as_str().parse::<FrameKind>().unwrap(), kind);
        }
    }
}
