//! Round callback that forwards snapshots to the renderer task.
//!
//! The channel is bounded. When the renderer falls behind, new frames are
//! dropped instead of stalling the round loop, and the snapshot is not
//! even cloned. The final frame is never sent here: the run's result
//! carries it, and `main` draws it once the renderer has drained.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use yardsale_core::runner::RoundCallback;
use yardsale_types::{OligarchReport, WealthSnapshot};

/// Callback that bridges the round driver to the renderer.
pub struct ChannelCallback {
    frames: mpsc::Sender<WealthSnapshot>,
    dropped: u64,
}

impl ChannelCallback {
    /// Create a callback that sends frames on `frames`.
    pub const fn new(frames: mpsc::Sender<WealthSnapshot>) -> Self {
        Self { frames, dropped: 0 }
    }

    /// Frames dropped because the renderer lagged or had stopped.
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    fn forward(&mut self, snapshot: &WealthSnapshot) {
        if self.frames.capacity() == 0 {
            self.dropped = self.dropped.saturating_add(1);
            debug!(round = snapshot.round, "Renderer lagging, frame dropped");
            return;
        }
        match self.frames.try_send(snapshot.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped = self.dropped.saturating_add(1);
            }
            Err(TrySendError::Closed(_)) => {
                if self.dropped == 0 {
                    warn!(round = snapshot.round, "Renderer stopped, frames discarded");
                }
                self.dropped = self.dropped.saturating_add(1);
            }
        }
    }
}

impl RoundCallback for ChannelCallback {
    fn on_round(&mut self, snapshot: &WealthSnapshot) {
        self.forward(snapshot);
    }

    fn on_halt(&mut self, report: &OligarchReport, snapshot: &WealthSnapshot) {
        debug!(agent = %report.agent, round = snapshot.round, "Run halted, final frame left to caller");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snapshot(round: u64) -> WealthSnapshot {
        WealthSnapshot {
            round,
            population: 2,
            total_wealth: 200,
            plays_per_round: 1,
            total_plays: round,
            elapsed_ms: 0,
            wealth: vec![100, 100],
            leader: None,
        }
    }

    #[tokio::test]
    async fn frames_are_forwarded_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut callback = ChannelCallback::new(tx);
        callback.on_round(&snapshot(1));
        callback.on_round(&snapshot(2));
        assert_eq!(rx.recv().await.unwrap().round, 1);
        assert_eq!(rx.recv().await.unwrap().round, 2);
        assert_eq!(callback.dropped(), 0);
    }

    #[tokio::test]
    async fn full_channel_drops_frames() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut callback = ChannelCallback::new(tx);
        callback.on_round(&snapshot(1));
        callback.on_round(&snapshot(2));
        callback.on_round(&snapshot(3));
        assert_eq!(callback.dropped(), 2);
        assert_eq!(rx.recv().await.unwrap().round, 1);
    }

    #[tokio::test]
    async fn halt_does_not_compete_for_a_full_channel() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut callback = ChannelCallback::new(tx);
        callback.on_round(&snapshot(1));
        let report = OligarchReport {
            run_id: uuid::Uuid::nil(),
            agent: yardsale_types::AgentId(0),
            starting_wealth: 100,
            final_wealth: 190,
            total_wealth: 200,
            threshold: 190,
            rounds: 2,
            plays: 2,
            started_at: chrono::Utc::now(),
            elapsed_ms: 0,
        };
        callback.on_halt(&report, &snapshot(2));
        assert_eq!(callback.dropped(), 0);
        drop(callback);
        assert_eq!(rx.recv().await.unwrap().round, 1);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn closed_channel_counts_drops() {
        let (tx, rx) = mpsc::channel(2);
        drop(rx);
        let mut callback = ChannelCallback::new(tx);
        callback.on_round(&snapshot(1));
        assert_eq!(callback.dropped(), 1);
    }
}
