//! Folds decoded events into [`RunState`] and publishes snapshots.
//!
//! The aggregator owns the only mutable `RunState` for a session. After
//! every successful fold it publishes an immutable snapshot on a
//! [`watch`] channel; presentation code reads snapshots, never the live
//! structure. Malformed frames and protocol anomalies are dropped without
//! touching state.

use tokio::sync::watch;

use crate::{
    error::FrameRejected,
    event::Event,
    frame::Frame,
    metrics,
    state::{Phase, RunState},
};

/// What a successfully folded event did to the run state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// A start event announced the batch total.
    Started,
    /// A record outcome was appended.
    Recorded,
    /// The fold brought the processed count up to the announced total.
    /// Fires at most once per session.
    Completed,
}

/// Event aggregator for one upload session.
#[derive(Debug)]
pub struct EventAggregator {
    state: RunState,
    snapshots: watch::Sender<RunState>,
    dropped_frames: u64,
}

impl EventAggregator {
    /// Create an aggregator and the snapshot channel observers subscribe to.
    #[must_use]
    pub fn new() -> (Self, watch::Receiver<RunState>) {
        let state = RunState::new();
        let (snapshots, receiver) = watch::channel(state.clone());
        (
            Self {
                state,
                snapshots,
                dropped_frames: 0,
            },
            receiver,
        )
    }

    /// Current live state. Callers outside the session must prefer
    /// [`subscribe`](Self::subscribe) snapshots.
    #[must_use]
    pub fn state(&self) -> &RunState { &self.state }

    /// Subscribe to state snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RunState> { self.snapshots.subscribe() }

    /// Number of frames dropped as malformed or anomalous.
    #[must_use]
    pub fn dropped_frames(&self) -> u64 { self.dropped_frames }

    /// Consume the aggregator, returning the final state.
    #[must_use]
    pub fn into_state(self) -> RunState { self.state }

    /// Mark the upload request as issued.
    pub fn mark_uploading(&mut self) {
        self.state.set_phase(Phase::Uploading);
        self.publish();
    }

    /// Mark the session as failed and publish the terminal snapshot.
    ///
    /// No-op when the session already reached a terminal phase, so a failure
    /// after completion cannot retract the completed snapshot.
    pub fn mark_failed(&mut self) {
        if self.state.phase().is_terminal() {
            return;
        }
        self.state.set_phase(Phase::Failed);
        self.publish();
    }

    /// Parse one frame's payload and fold the resulting event.
    ///
    /// # Errors
    ///
    /// Returns the [`FrameRejected`] reason when the frame is dropped. Drops
    /// are non-fatal: state is unchanged and subsequent frames keep folding.
    pub fn apply_frame(&mut self, frame: &Frame) -> Result<Applied, FrameRejected> {
        if self.state.phase().is_terminal() {
            return Err(self.drop_frame(FrameRejected::AfterCompletion));
        }

        // The first frame of any kind moves the session into Streaming.
        if matches!(self.state.phase(), Phase::Idle | Phase::Uploading) {
            self.state.set_phase(Phase::Streaming);
            self.publish();
        }

        let event = match Event::parse(frame.payload()) {
            Ok(event) => event,
            Err(rejected) => return Err(self.drop_frame(rejected)),
        };
        self.apply(event)
    }

    /// Fold an already-decoded event into the run state.
    ///
    /// # Errors
    ///
    /// Returns [`FrameRejected::DuplicateStart`] for a repeated start event
    /// and [`FrameRejected::AfterCompletion`] for events in a terminal phase.
    pub fn apply(&mut self, event: Event) -> Result<Applied, FrameRejected> {
        if self.state.phase().is_terminal() {
            return Err(self.drop_frame(FrameRejected::AfterCompletion));
        }

        let applied = match event {
            Event::Start { total } => {
                if self.state.total().is_some() {
                    tracing::warn!(total, "duplicate start event dropped");
                    return Err(self.drop_frame(FrameRejected::DuplicateStart));
                }
                tracing::debug!(total, "batch started");
                self.state.set_total(total);
                if self.completion_reached() {
                    Applied::Completed
                } else {
                    Applied::Started
                }
            }
            Event::Record(outcome) => {
                tracing::debug!(
                    record.index = outcome.index,
                    record.name = %outcome.name,
                    record.success = outcome.success,
                    "record folded"
                );
                self.state.push_outcome(outcome);
                if self.completion_reached() {
                    Applied::Completed
                } else {
                    Applied::Recorded
                }
            }
        };

        if applied == Applied::Completed {
            self.state.set_phase(Phase::Completed);
            tracing::info!(
                processed = self.state.processed().len(),
                errors = self.state.error_count(),
                "batch completed"
            );
        }
        metrics::inc_frames();
        self.publish();
        Ok(applied)
    }

    /// Count equality drives completion; record `index` values are a display
    /// key and play no part here.
    fn completion_reached(&self) -> bool {
        self.state
            .total()
            .is_some_and(|total| self.state.processed().len() as u64 == total)
    }

    fn drop_frame(&mut self, rejected: FrameRejected) -> FrameRejected {
        self.dropped_frames += 1;
        metrics::inc_dropped_frames();
        rejected
    }

    fn publish(&self) {
        // send_replace delivers even when no receiver is currently live.
        drop(self.snapshots.send_replace(self.state.clone()));
    }
}
