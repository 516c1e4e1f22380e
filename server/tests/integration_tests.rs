//! Integration tests driving a real server over TCP sockets.
//!
//! These tests validate the wire protocol end to end: request handling,
//! framed replies, push fan-out between sessions, and the per-connection
//! ordering discipline (a TRY/CHALLENGE reply precedes the board push it
//! causes; a session never hears the echo of its own lobby change).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use server::lobby::Lobby;
use server::network::Server;
use server::parser;
use shared::{Frame, FrameKind};

const MINIMAL_PUZZLE: &str = r#">> "Minimal Puzzle" "A minimal puzzle for testing"
(cat, "feline companion", DOWN, 0, 1)
(mat, "lounging place for feline companion", ACROSS, 1, 0)
(car, "gas powered vehicle", ACROSS, 0, 1)
(tax, "nobody likes April 15", ACROSS, 2, 1)
"#;

/// Boots a server with the minimal puzzle on an ephemeral port.
async fn start_server() -> SocketAddr {
    let lobby = Arc::new(Lobby::new());
    lobby.add_puzzle(parser::parse_puzzle("minimal", MINIMAL_PUZZLE).unwrap());
    let server = Server::bind("127.0.0.1:0", lobby).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

/// A raw protocol client for tests: writes request lines, reads frames.
struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> TestClient {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        TestClient {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    /// Reads one framed response, failing the test after five seconds.
    async fn read_frame(&mut self) -> Frame {
        timeout(Duration::from_secs(5), self.read_frame_inner())
            .await
            .expect("timed out waiting for a frame")
    }

    async fn read_frame_inner(&mut self) -> Frame {
        let mut header = String::new();
        let n = self.reader.read_line(&mut header).await.unwrap();
        assert!(n > 0, "connection closed while expecting a frame");
        let (kind, count) = Frame::parse_header(header.trim_end()).unwrap();
        let mut lines = Vec::with_capacity(count);
        for _ in 0..count {
            let mut line = String::new();
            self.reader.read_line(&mut line).await.unwrap();
            lines.push(line.trim_end_matches('\n').to_string());
        }
        Frame::new(kind, lines.join("\n"))
    }

    /// True once the server has closed the connection.
    async fn closed(&mut self) -> bool {
        let mut line = String::new();
        match timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await {
            Ok(Ok(0)) => true,
            _ => false,
        }
    }
}

const BLANK_TWO_PLAYER_VIEW: &str = "3x4\n\
    Squares:\n\
    EMPTY\n\
    _ 1 DOWN 3 ACROSS\n\
    _\n\
    _\n\
    _ 2 ACROSS\n\
    _\n\
    _\n\
    EMPTY\n\
    EMPTY\n\
    _ 4 ACROSS\n\
    _\n\
    _\n\
    Scores:\n\
    gzlin 0\n\
    lconboy 0\n\
    Questions:\n\
    1 \"feline companion\"\n\
    2 \"lounging place for feline companion\"\n\
    3 \"gas powered vehicle\"\n\
    4 \"nobody likes April 15\"";

/// Runs the common two-player setup: both users added, gzlin hosting match
/// `m1`, lconboy seated. Consumes every frame the setup produces.
async fn seated_match(addr: SocketAddr) -> (TestClient, TestClient) {
    let mut host = TestClient::connect(addr).await;
    let mut guest = TestClient::connect(addr).await;

    host.send("ADD_USER gzlin").await;
    assert_eq!(host.read_frame().await, Frame::new(FrameKind::AddUser, "Success"));
    guest.send("ADD_USER lconboy").await;
    assert_eq!(
        guest.read_frame().await,
        Frame::new(FrameKind::AddUser, "Success")
    );

    host.send("NEW_MATCH gzlin m1 minimal \"a friendly match\"")
        .await;
    assert_eq!(
        host.read_frame().await,
        Frame::new(FrameKind::NewMatch, "Success")
    );
    // The guest hears about the new opening; the host must not.
    assert_eq!(
        guest.read_frame().await,
        Frame::new(FrameKind::AvailableMatches, "m1 \"a friendly match\"")
    );

    guest.send("PLAY_MATCH lconboy m1").await;
    let reply = guest.read_frame().await;
    assert_eq!(reply.kind, FrameKind::BoardChanged);
    assert_eq!(reply.body, BLANK_TWO_PLAYER_VIEW);

    // The host sees the join as a board push, then the match leaving the
    // available listing.
    let push = host.read_frame().await;
    assert_eq!(push.kind, FrameKind::BoardChanged);
    assert_eq!(push.body, BLANK_TWO_PLAYER_VIEW);
    assert_eq!(
        host.read_frame().await,
        Frame::new(FrameKind::AvailableMatches, "")
    );

    (host, guest)
}

mod lobby_protocol {
    use super::*;

    #[tokio::test]
    async fn add_user_and_duplicate() {
        let addr = start_server().await;
        let mut a = TestClient::connect(addr).await;
        a.send("ADD_USER gzlin").await;
        assert_eq!(a.read_frame().await, Frame::new(FrameKind::AddUser, "Success"));

        let mut b = TestClient::connect(addr).await;
        b.send("ADD_USER gzlin").await;
        assert_eq!(
            b.read_frame().await,
            Frame::new(FrameKind::AddUser, "User ID gzlin already in use")
        );
    }

    #[tokio::test]
    async fn get_puzzles_listing() {
        let addr = start_server().await;
        let mut client = TestClient::connect(addr).await;
        client.send("GET_PUZZLES").await;
        assert_eq!(
            client.read_frame().await,
            Frame::new(
                FrameKind::GetPuzzles,
                "minimal \"Minimal Puzzle\" \"A minimal puzzle for testing\""
            )
        );
    }

    #[tokio::test]
    async fn get_matches_empty_has_zero_lines() {
        let addr = start_server().await;
        let mut client = TestClient::connect(addr).await;
        client.send("GET_MATCHES").await;
        assert_eq!(client.read_frame().await, Frame::new(FrameKind::GetMatches, ""));
    }

    #[tokio::test]
    async fn invalid_requests_echo_input() {
        let addr = start_server().await;
        let mut client = TestClient::connect(addr).await;

        client.send("HELLO world").await;
        assert_eq!(
            client.read_frame().await,
            Frame::new(FrameKind::InvalidRequest, "HELLO world")
        );

        // Non-integer word id.
        client.send("TRY gzlin m1 one CAT").await;
        assert_eq!(
            client.read_frame().await,
            Frame::new(FrameKind::InvalidRequest, "TRY gzlin m1 one CAT")
        );

        // Unseated player on a missing match.
        client.send("CHALLENGE nobody ghost 1 CAT").await;
        assert_eq!(
            client.read_frame().await,
            Frame::new(FrameKind::InvalidRequest, "CHALLENGE nobody ghost 1 CAT")
        );
    }

    #[tokio::test]
    async fn new_match_failures_report_reason() {
        let addr = start_server().await;
        let mut client = TestClient::connect(addr).await;
        client.send("ADD_USER gzlin").await;
        client.read_frame().await;

        client.send("NEW_MATCH gzlin m1 nonexistent \"desc\"").await;
        assert_eq!(
            client.read_frame().await,
            Frame::new(
                FrameKind::NewMatch,
                "Fail Puzzle id nonexistent is not available in game"
            )
        );

        client.send("NEW_MATCH gzlin m1 minimal \"desc\"").await;
        assert_eq!(
            client.read_frame().await,
            Frame::new(FrameKind::NewMatch, "Success")
        );
        client.send("NEW_MATCH gzlin m1 minimal \"again\"").await;
        assert_eq!(
            client.read_frame().await,
            Frame::new(FrameKind::NewMatch, "Fail Match ID m1 already in system")
        );
    }

    #[tokio::test]
    async fn play_match_failure_reports_reason() {
        let addr = start_server().await;
        let mut client = TestClient::connect(addr).await;
        client.send("ADD_USER gzlin").await;
        client.read_frame().await;
        client.send("PLAY_MATCH gzlin ghost").await;
        assert_eq!(
            client.read_frame().await,
            Frame::new(
                FrameKind::PlayMatch,
                "Fail Match id ghost is not available in game"
            )
        );
    }

    #[tokio::test]
    async fn quit_closes_the_connection() {
        let addr = start_server().await;
        let mut client = TestClient::connect(addr).await;
        client.send("ADD_USER gzlin").await;
        client.read_frame().await;
        client.send("QUIT gzlin").await;
        assert!(client.closed().await);
    }
}

mod gameplay_protocol {
    use super::*;

    #[tokio::test]
    async fn try_reply_precedes_board_push() {
        let addr = start_server().await;
        let (mut host, mut guest) = seated_match(addr).await;

        host.send("TRY gzlin m1 1 CAT").await;
        // The host's reply comes strictly before the push its own guess
        // caused.
        assert_eq!(
            host.read_frame().await,
            Frame::new(FrameKind::Try, "Valid guess")
        );
        let push = host.read_frame().await;
        assert_eq!(push.kind, FrameKind::BoardChanged);
        assert!(push.body.contains("C >1 DOWN 3 ACROSS"));

        // The opponent receives only the push, with ownership rendered from
        // their own perspective.
        let seen = guest.read_frame().await;
        assert_eq!(seen.kind, FrameKind::BoardChanged);
        assert!(seen.body.contains("C 1 DOWN 3 ACROSS"));
    }

    #[tokio::test]
    async fn rejected_try_produces_no_push() {
        let addr = start_server().await;
        let (mut host, _guest) = seated_match(addr).await;

        host.send("TRY gzlin m1 1 CATOCTOPUS").await;
        assert_eq!(
            host.read_frame().await,
            Frame::new(FrameKind::Try, "Invalid guess, wrong word length")
        );

        // The next frames belong to the following (valid) command; nothing
        // was pushed for the rejected one.
        host.send("TRY gzlin m1 1 CAT").await;
        assert_eq!(
            host.read_frame().await,
            Frame::new(FrameKind::Try, "Valid guess")
        );
        assert_eq!(host.read_frame().await.kind, FrameKind::BoardChanged);
    }

    #[tokio::test]
    async fn challenge_feedback_strings() {
        let addr = start_server().await;
        let (mut host, mut guest) = seated_match(addr).await;

        host.send("TRY gzlin m1 1 CAT").await;
        host.read_frame().await;
        host.read_frame().await;
        guest.read_frame().await;

        // The target word is already correct: challenger loses a point and
        // the word gets confirmed.
        guest.send("CHALLENGE lconboy m1 1 CUT").await;
        assert_eq!(
            guest.read_frame().await,
            Frame::new(
                FrameKind::Challenge,
                "Failed challenge, target word was already correct"
            )
        );
        let push = guest.read_frame().await;
        assert_eq!(push.kind, FrameKind::BoardChanged);
        assert!(push.body.contains("+C 1 DOWN 3 ACROSS"));
        assert!(push.body.contains("lconboy -1"));

        guest.send("CHALLENGE lconboy m1 1 CUT").await;
        assert_eq!(
            guest.read_frame().await,
            Frame::new(
                FrameKind::Challenge,
                "Invalid challenge, all spaces already confirmed"
            )
        );
    }

    #[tokio::test]
    async fn finishing_the_board_pushes_game_over() {
        let addr = start_server().await;
        let (mut host, mut guest) = seated_match(addr).await;

        for command in [
            "TRY gzlin m1 3 CAR",
            "TRY gzlin m1 2 MAT",
            "TRY gzlin m1 1 CAT",
            "TRY gzlin m1 4 TAR",
        ] {
            host.send(command).await;
            assert_eq!(
                host.read_frame().await,
                Frame::new(FrameKind::Try, "Valid guess")
            );
            assert_eq!(host.read_frame().await.kind, FrameKind::BoardChanged);
            assert_eq!(guest.read_frame().await.kind, FrameKind::BoardChanged);
        }

        // The correcting challenge completes the board and finalizes the
        // match: +2 for the challenge, +1 per owned word. The terminal push
        // is enqueued by the mutation itself and is not subject to HOLD
        // (which only buffers BOARD_CHANGED), so it precedes the reply.
        guest.send("CHALLENGE lconboy m1 4 TAX").await;
        let over = guest.read_frame().await;
        assert_eq!(over.kind, FrameKind::GameOver);
        assert!(over.body.contains("gzlin 3"));
        assert!(over.body.contains("lconboy 3"));
        assert_eq!(
            guest.read_frame().await,
            Frame::new(FrameKind::Challenge, "Successful challenge!")
        );

        let host_over = host.read_frame().await;
        assert_eq!(host_over.kind, FrameKind::GameOver);
        assert!(host_over.body.contains("+C >1 DOWN >3 ACROSS"));
    }

    #[tokio::test]
    async fn exit_match_pushes_game_over_to_both() {
        let addr = start_server().await;
        let (mut host, mut guest) = seated_match(addr).await;

        host.send("EXIT_MATCH gzlin m1").await;
        // No direct reply; both sessions get the terminal view.
        let host_over = host.read_frame().await;
        assert_eq!(host_over.kind, FrameKind::GameOver);
        assert!(host_over.body.contains("gzlin 0"));
        assert_eq!(guest.read_frame().await.kind, FrameKind::GameOver);
    }

    #[tokio::test]
    async fn abandoned_host_leaves_listing_on_exit() {
        let addr = start_server().await;
        let mut host = TestClient::connect(addr).await;
        let mut watcher = TestClient::connect(addr).await;

        host.send("ADD_USER gzlin").await;
        host.read_frame().await;
        watcher.send("ADD_USER lconboy").await;
        watcher.read_frame().await;

        host.send("NEW_MATCH gzlin m1 minimal \"short lived\"").await;
        host.read_frame().await;
        assert_eq!(
            watcher.read_frame().await,
            Frame::new(FrameKind::AvailableMatches, "m1 \"short lived\"")
        );

        // Host abandons the match before anyone joined: the opening
        // disappears for the watcher, while the host (who initiated the
        // change) only gets the match's own GAME_OVER.
        host.send("EXIT_MATCH gzlin m1").await;
        assert_eq!(host.read_frame().await.kind, FrameKind::GameOver);
        assert_eq!(
            watcher.read_frame().await,
            Frame::new(FrameKind::AvailableMatches, "")
        );
    }
}
