//! Tail an event-stream endpoint from the terminal.
//!
//! Connects to the given URL (default: a local demo server's `/events`),
//! seeds the value with 0, and prints every value as it arrives. Exits when
//! the connection fails.

use crossbeam_channel::unbounded;
use livefeed::{Feed, FeedConfig, HttpOpener};

fn main() -> livefeed::Result<()> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:3000/events".to_string());

    let opener = HttpOpener::new()?;
    let feed = Feed::open(FeedConfig::new(&url).with_seed(0), opener)?;

    // Notifications fire on the reader thread; bridge them over here.
    let (tx, rx) = unbounded::<()>();
    let store = feed.store();
    let _watch = feed.subscribe(move || {
        let _ = tx.send(());
    });

    println!("tailing {url}");
    while rx.recv().is_ok() {
        let snapshot = store.snapshot();
        if let Some(error) = &snapshot.error {
            eprintln!("error: {error}");
            break;
        }
        if let Some(data) = &snapshot.data {
            println!("{data}");
        }
    }
    Ok(())
}
