//! Per-connection session handling.
//!
//! Each accepted socket runs two cooperative tasks joined by an unbounded
//! queue:
//!
//! - the **reader** decodes one command per input line, dispatches it to the
//!   lobby or a match, and enqueues the reply (or an `INVALID_REQUEST` for
//!   anything it cannot understand);
//! - the **writer** drains the queue and emits framed responses, applying
//!   the [`WriterState`] ordering discipline.
//!
//! Listener callbacks registered with the lobby or a match push onto the
//! same queue from whichever task performed the mutation, so the queue is
//! the only synchronization point a session has. Two internal markers keep
//! the client's view causally ordered:
//!
//! - `Hold`, enqueued before a TRY/CHALLENGE dispatch, makes the writer
//!   buffer the `BOARD_CHANGED` push the command provokes until after the
//!   command's own reply has been written;
//! - `Dispose`, enqueued before NEW_MATCH/PLAY_MATCH/EXIT_MATCH dispatch,
//!   suppresses the next `AVAILABLE_MATCHES` push so a client never hears an
//!   echo of its own lobby change.
//!
//! Neither marker is ever transmitted. A `Quit` sentinel shuts the writer
//! down; read errors or EOF tear the session down from the reader side.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::game::Match;
use crate::lobby::Lobby;
use shared::{Frame, FrameKind, Request};

/// Items travelling through a session's outbound queue.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A frame destined for the wire (subject to the ordering discipline).
    Frame(Frame),
    /// Buffer the next `BOARD_CHANGED` until a TRY/CHALLENGE reply passes.
    Hold,
    /// Swallow the next `AVAILABLE_MATCHES` push.
    Dispose,
    /// Close the connection without sending anything further.
    Quit,
}

/// The ordering discipline, as a pure state machine over the sequence of
/// dequeued items. Feeding it an item yields the frames to transmit, in
/// order; `None` means the session is finished.
#[derive(Debug, Default)]
pub struct WriterState {
    holding: bool,
    held: Option<Frame>,
    dispose: bool,
}

impl WriterState {
    pub fn new() -> WriterState {
        WriterState::default()
    }

    pub fn admit(&mut self, item: Outbound) -> Option<Vec<Frame>> {
        match item {
            Outbound::Quit => None,
            Outbound::Hold => {
                self.holding = true;
                Some(Vec::new())
            }
            Outbound::Dispose => {
                self.dispose = true;
                Some(Vec::new())
            }
            Outbound::Frame(frame) => {
                if self.holding && frame.kind == FrameKind::BoardChanged {
                    self.held = Some(frame);
                    return Some(Vec::new());
                }
                if self.dispose && frame.kind == FrameKind::AvailableMatches {
                    self.dispose = false;
                    return Some(Vec::new());
                }
                let mut out = Vec::new();
                match frame.kind {
                    FrameKind::Try | FrameKind::Challenge => {
                        self.holding = false;
                        out.push(frame);
                        if let Some(held) = self.held.take() {
                            out.push(held);
                        }
                    }
                    // Back in the lobby screen; a pending suppression no
                    // longer applies.
                    FrameKind::GetMatches | FrameKind::GetPuzzles => {
                        self.dispose = false;
                        out.push(frame);
                    }
                    _ => out.push(frame),
                }
                Some(out)
            }
        }
    }
}

/// Whether the reader keeps serving this connection.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Serves one client connection to completion. Spawned by the accept loop;
/// returns when the connection is torn down.
pub async fn run(stream: TcpStream, lobby: Arc<Lobby>) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();

    let mut writer = tokio::spawn(write_loop(write_half, rx));

    let mut session = Session {
        lobby,
        tx,
        subscriptions: Vec::new(),
    };
    // A finished writer (write error) cancels the reader; a finished reader
    // (EOF, read error, QUIT) lets the writer drain and exit once the
    // sender is dropped.
    let mut writer_done = false;
    tokio::select! {
        _ = session.read_loop(read_half) => {}
        _ = &mut writer => {
            writer_done = true;
        }
    }
    session.teardown();
    drop(session); // drops the sender; the writer drains and exits

    if !writer_done {
        if let Err(e) = writer.await {
            warn!("writer task for {peer} failed: {e}");
        }
    }
    info!("session with {peer} closed");
}

/// Listener registrations to undo at teardown.
enum Subscription {
    Lobby(usize),
    Match(Arc<Match>, usize),
}

struct Session {
    lobby: Arc<Lobby>,
    tx: UnboundedSender<Outbound>,
    subscriptions: Vec<Subscription>,
}

impl Session {
    async fn read_loop(&mut self, read_half: OwnedReadHalf) {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    debug!("request: {line}");
                    if self.dispatch(&line) == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => break, // EOF, client went away
                Err(e) => {
                    warn!("read error: {e}");
                    break;
                }
            }
        }
    }

    /// Handles one request line: every branch ends with at most one direct
    /// reply on the queue, possibly preceded by an ordering marker.
    fn dispatch(&mut self, line: &str) -> Flow {
        let request = match Request::parse(line) {
            Ok(request) => request,
            Err(e) => {
                debug!("invalid request ({e}): {line}");
                self.reply(Frame::new(FrameKind::InvalidRequest, line));
                return Flow::Continue;
            }
        };

        match request {
            Request::AddUser { user } => match self.lobby.add_user(&user) {
                Ok(()) => {
                    self.watch_lobby();
                    self.reply(Frame::new(FrameKind::AddUser, "Success"));
                }
                Err(e) => self.reply(Frame::new(FrameKind::AddUser, e.to_string())),
            },

            Request::GetPuzzles => {
                self.reply(Frame::new(FrameKind::GetPuzzles, self.lobby.puzzle_listing()));
            }

            Request::GetMatches => {
                self.reply(Frame::new(
                    FrameKind::GetMatches,
                    self.lobby.available_matches(),
                ));
            }

            Request::NewMatch {
                user,
                match_id,
                puzzle_id,
                description,
            } => {
                self.enqueue(Outbound::Dispose);
                match self
                    .lobby
                    .new_match(&match_id, &description, &puzzle_id, &user)
                {
                    Ok(created) => {
                        self.watch_match(&created, &user);
                        self.reply(Frame::new(FrameKind::NewMatch, "Success"));
                    }
                    Err(e) => self.reply(Frame::new(FrameKind::NewMatch, format!("Fail {e}"))),
                }
            }

            Request::PlayMatch { user, match_id } => {
                self.enqueue(Outbound::Dispose);
                match self.lobby.play_match(&user, &match_id) {
                    Ok(joined) => {
                        self.watch_match(&joined, &user);
                        self.reply(Frame::new(FrameKind::BoardChanged, joined.view(&user)));
                    }
                    Err(e) => self.reply(Frame::new(FrameKind::PlayMatch, format!("Fail {e}"))),
                }
            }

            Request::Try {
                user,
                match_id,
                word_id,
                word,
            } => {
                self.enqueue(Outbound::Hold);
                let result = self
                    .lobby
                    .find_match(&match_id)
                    .and_then(|m| Ok(m.try_guess(&user, word_id, &word)?));
                match result {
                    Ok(outcome) => self.reply(Frame::new(FrameKind::Try, outcome.to_string())),
                    Err(e) => {
                        debug!("rejected TRY ({e}): {line}");
                        self.reply(Frame::new(FrameKind::InvalidRequest, line));
                    }
                }
            }

            Request::Challenge {
                user,
                match_id,
                word_id,
                word,
            } => {
                self.enqueue(Outbound::Hold);
                let result = self
                    .lobby
                    .find_match(&match_id)
                    .and_then(|m| Ok(m.challenge(&user, word_id, &word)?));
                match result {
                    Ok(outcome) => {
                        self.reply(Frame::new(FrameKind::Challenge, outcome.to_string()))
                    }
                    Err(e) => {
                        debug!("rejected CHALLENGE ({e}): {line}");
                        self.reply(Frame::new(FrameKind::InvalidRequest, line));
                    }
                }
            }

            Request::ExitMatch { user, match_id } => {
                self.enqueue(Outbound::Dispose);
                // No direct reply; the forfeit fan-out delivers GAME_OVER.
                if let Err(e) = self.lobby.exit_match(&match_id, &user) {
                    debug!("ignored EXIT_MATCH failure: {e}");
                }
            }

            Request::Quit { user } => {
                self.lobby.quit(&user);
                self.enqueue(Outbound::Quit);
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    /// Subscribes this session to available-match changes. The callback
    /// renders the listing at notification time and enqueues it.
    fn watch_lobby(&mut self) {
        let lobby = Arc::clone(&self.lobby);
        let tx = self.tx.clone();
        let id = self.lobby.subscribe(move || {
            let frame = Frame::new(FrameKind::AvailableMatches, lobby.available_matches());
            let _ = tx.send(Outbound::Frame(frame));
        });
        self.subscriptions.push(Subscription::Lobby(id));
    }

    /// Subscribes this session to board changes of a match it entered. Each
    /// notification checks for game over (which finalizes a completed
    /// board) and enqueues the viewer-specific match view.
    fn watch_match(&mut self, watched: &Arc<Match>, user: &str) {
        let observed = Arc::clone(watched);
        let viewer = user.to_string();
        let tx = self.tx.clone();
        let id = watched.subscribe(move || {
            let kind = if observed.is_finished() {
                FrameKind::GameOver
            } else {
                FrameKind::BoardChanged
            };
            let frame = Frame::new(kind, observed.view(&viewer));
            let _ = tx.send(Outbound::Frame(frame));
        });
        self.subscriptions
            .push(Subscription::Match(Arc::clone(watched), id));
    }

    fn reply(&self, frame: Frame) {
        self.enqueue(Outbound::Frame(frame));
    }

    fn enqueue(&self, item: Outbound) {
        // A send error means the writer is gone; the reader will notice the
        // closed socket on its next read.
        let _ = self.tx.send(item);
    }

    /// Unregisters every listener this session installed.
    fn teardown(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            match subscription {
                Subscription::Lobby(id) => self.lobby.unsubscribe(id),
                Subscription::Match(watched, id) => watched.unsubscribe(id),
            }
        }
    }
}

/// Drains the outbound queue onto the socket, applying the ordering
/// discipline. Exits on the `Quit` sentinel, on a write error, or when every
/// sender is gone.
async fn write_loop(write_half: OwnedWriteHalf, mut rx: UnboundedReceiver<Outbound>) {
    let mut writer = BufWriter::new(write_half);
    let mut state = WriterState::new();
    while let Some(item) = rx.recv().await {
        let Some(frames) = state.admit(item) else {
            break;
        };
        for frame in frames {
            if let Err(e) = writer.write_all(frame.encode().as_bytes()).await {
                warn!("write error: {e}");
                return;
            }
        }
        if let Err(e) = writer.flush().await {
            warn!("write error: {e}");
            return;
        }
    }
    let _ = writer.shutdown().await;
}
