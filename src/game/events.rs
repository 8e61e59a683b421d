//! Phase and score change notifications
//!
//! One writer (the session) and any number of readers. Readers subscribe for a
//! `watch::Receiver` and unsubscribe by dropping it. Publishing a value equal
//! to the current one wakes nobody.

use tokio::sync::watch;

use super::session::Phase;

#[derive(Debug)]
pub struct StateBroadcast {
    phase: watch::Sender<Phase>,
    score: watch::Sender<u32>,
}

impl StateBroadcast {
    pub fn new(phase: Phase, score: u32) -> Self {
        let (phase, _) = watch::channel(phase);
        let (score, _) = watch::channel(score);
        Self { phase, score }
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn subscribe_score(&self) -> watch::Receiver<u32> {
        self.score.subscribe()
    }

    /// Returns true when subscribers were notified
    pub fn publish_phase(&self, phase: Phase) -> bool {
        publish(&self.phase, phase)
    }

    /// Returns true when subscribers were notified
    pub fn publish_score(&self, score: u32) -> bool {
        publish(&self.score, score)
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn score(&self) -> u32 {
        *self.score.borrow()
    }

    pub fn subscriber_count(&self) -> usize {
        self.phase.receiver_count() + self.score.receiver_count()
    }
}

impl Default for StateBroadcast {
    fn default() -> Self {
        Self::new(Phase::Ready, 0)
    }
}

fn publish<T: PartialEq>(sender: &watch::Sender<T>, value: T) -> bool {
    sender.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    })
}
