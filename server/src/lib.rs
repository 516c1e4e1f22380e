//! # Crossword Game Server Library
//!
//! This library implements the authoritative server for a two-player
//! competitive crossword game. The server owns every puzzle definition, the
//! set of active users, all live matches, and the board state of each match.
//! Clients talk to it over the line-oriented protocol defined in the
//! `shared` crate.
//!
//! ## Module Organization
//!
//! - [`puzzle`] -- immutable puzzle solutions: entries, geometry, and the
//!   consistency check that rejects contradictory crosswords.
//! - [`parser`] -- the `.puzzle` file grammar and folder loading.
//! - [`cell`] -- the immutable per-square value type; every rule change is
//!   "read cell, compute new cell, write back".
//! - [`game`] -- the match engine: guess validation, challenge scoring,
//!   end-of-game detection, and board-change fan-out.
//! - [`lobby`] -- the set of puzzles, users, and live matches, plus the
//!   available-match fan-out.
//! - [`listeners`] -- the subscribe/notify registry used by both the lobby
//!   and individual matches.
//! - [`session`] -- one reader task and one writer task per connection,
//!   joined by an outbound queue that enforces the response ordering
//!   discipline.
//! - [`network`] -- the TCP listener and accept loop.
//!
//! ## Concurrency Model
//!
//! Each connection runs a reader task and a writer task. All shared state
//! lives in the [`lobby::Lobby`] or in a [`game::Match`], each guarded by
//! its own lock and used as a monitor. Locks are never held across socket
//! I/O; listener callbacks fire after the owning lock is released and do
//! nothing but enqueue frames onto per-session queues, so the queue is the
//! only synchronization point between producers and the writer.

pub mod cell;
pub mod game;
pub mod listeners;
pub mod lobby;
pub mod network;
pub mod parser;
pub mod puzzle;
pub mod session;
