//! Shared status board.
//!
//! The control loop is single-threaded; other threads (telemetry, a debug
//! console) read the latest published summary from here. The packed status
//! word is mirrored in an atomic so the hot read path takes no lock.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::status::{LinkSummary, StatusWord};

#[derive(Debug, Default)]
pub struct StatusBoard {
    summary: RwLock<LinkSummary>,
    word: AtomicU32,
    publications: AtomicU64,
}

impl StatusBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published summary.
    pub fn publish(&self, summary: &LinkSummary) {
        let word = summary.status_word();
        *self.summary.write() = *summary;
        self.word.store(word.raw(), Ordering::Release);
        self.publications.fetch_add(1, Ordering::Relaxed);
    }

    /// Latest status word without locking.
    #[must_use]
    pub fn status_word(&self) -> StatusWord {
        StatusWord(self.word.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn snapshot(&self) -> LinkSummary {
        *self.summary.read()
    }

    #[must_use]
    pub fn publications(&self) -> u64 {
        self.publications.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LinkState;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn publish_then_read() {
        let board = StatusBoard::new();
        assert_eq!(board.snapshot().state, LinkState::Init);
        let summary = LinkSummary {
            tick: 9,
            state: LinkState::Monitoring,
            current_width: 64,
            ..LinkSummary::default()
        };
        board.publish(&summary);
        assert_eq!(board.snapshot(), summary);
        assert_eq!(board.status_word().state(), Some(LinkState::Monitoring));
        assert_eq!(board.publications(), 1);
    }

    #[test]
    fn concurrent_readers_see_whole_summaries() {
        let board = Arc::new(StatusBoard::new());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let board = Arc::clone(&board);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        let s = board.snapshot();
                        assert_eq!(s.current_width as u64, s.tick);
                    }
                })
            })
            .collect();
        for tick in 0..1_000u64 {
            board.publish(&LinkSummary {
                tick,
                current_width: tick as usize,
                ..LinkSummary::default()
            });
        }
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(board.publications(), 1_000);
    }
}
