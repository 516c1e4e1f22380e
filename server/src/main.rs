//! Crossword game server entry point.
//!
//! Loads every `*.puzzle` file from the folder given on the command line
//! (skipping and logging invalid ones), binds the listening port, and
//! accepts client connections forever.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{info, warn};

use server::lobby::Lobby;
use server::network::Server;
use server::parser;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Folder containing the *.puzzle files to serve
    puzzle_folder: PathBuf,

    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    // Print a message about setting RUST_LOG if not set
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Warning: RUST_LOG environment variable not set. Set it to display logs!");
        eprintln!("Recommended: RUST_LOG=info cargo run");
    }

    let args = Args::parse();
    if !args.puzzle_folder.is_dir() {
        return Err(format!(
            "puzzle folder {} does not exist or is not a directory",
            args.puzzle_folder.display()
        )
        .into());
    }

    // Load puzzles; a bad file is logged and skipped, never fatal.
    let lobby = Arc::new(Lobby::new());
    let mut loaded = 0;
    for dir_entry in std::fs::read_dir(&args.puzzle_folder)? {
        let path = dir_entry?.path();
        if path.extension().map_or(false, |ext| ext == "puzzle") {
            match parser::load_puzzle_file(&path) {
                Ok(puzzle) => {
                    info!("loaded puzzle `{}` from {}", puzzle.id(), path.display());
                    lobby.add_puzzle(puzzle);
                    loaded += 1;
                }
                Err(e) => warn!("skipping invalid puzzle {}: {e}", path.display()),
            }
        }
    }
    info!("{loaded} puzzles loaded");

    let addr = format!("{}:{}", args.host, args.port);
    let game_server = Server::bind(&addr, lobby).await?;
    game_server.run().await?;
    Ok(())
}
