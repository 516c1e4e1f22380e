//! TCP listener and accept loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::info;
use tokio::net::TcpListener;

use crate::lobby::Lobby;
use crate::session;

/// The listening server: accepts connections forever and spawns a session
/// for each. All sessions share one [`Lobby`].
pub struct Server {
    listener: TcpListener,
    lobby: Arc<Lobby>,
}

impl Server {
    /// Binds the listening socket. Use port 0 to let the OS pick one (handy
    /// in tests); [`local_addr`](Server::local_addr) reports the result.
    pub async fn bind(addr: &str, lobby: Arc<Lobby>) -> io::Result<Server> {
        let listener = TcpListener::bind(addr).await?;
        info!("server listening on {}", listener.local_addr()?);
        Ok(Server { listener, lobby })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the process exits. A failing session never
    /// takes the server down; its error stays contained in its own task.
    pub async fn run(self) -> io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            info!("client connected from {addr}");
            let lobby = Arc::clone(&self.lobby);
            tokio::spawn(session::run(stream, lobby));
        }
    }
}
