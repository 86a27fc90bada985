//! Session-scoped run state and lifecycle phases.

use crate::event::Outcome;

/// Coarse lifecycle stage of an upload session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// No upload has been issued yet.
    #[default]
    Idle,
    /// The upload request has been issued; no frame has arrived.
    Uploading,
    /// Frames are being consumed. The only phase that accepts events.
    Streaming,
    /// The processed count reached the announced total.
    Completed,
    /// The stream failed, was cancelled, or closed before completion.
    Failed,
}

impl Phase {
    /// Whether the session has finished, successfully or not.
    #[must_use]
    pub fn is_terminal(self) -> bool { matches!(self, Phase::Completed | Phase::Failed) }
}

/// Aggregate state of one upload session.
///
/// Mutated only by the aggregator; observers receive cloned snapshots and
/// never a live reference. Progress and the error list are derived from
/// `processed` and `total` on demand, so they cannot desynchronize from
/// their inputs.
#[derive(Clone, Debug, Default)]
pub struct RunState {
    total: Option<u64>,
    processed: Vec<Outcome>,
    phase: Phase,
}

impl RunState {
    /// Fresh state for a new session.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Announced batch size, once a start event has arrived.
    #[must_use]
    pub fn total(&self) -> Option<u64> { self.total }

    /// Outcomes in arrival order. Not necessarily sorted by record index.
    #[must_use]
    pub fn processed(&self) -> &[Outcome] { &self.processed }

    /// Failed outcomes, in the same relative order as `processed`.
    pub fn errors(&self) -> impl Iterator<Item = &Outcome> {
        self.processed.iter().filter(|outcome| !outcome.success)
    }

    /// Number of failed outcomes.
    #[must_use]
    pub fn error_count(&self) -> usize { self.errors().count() }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase { self.phase }

    /// Completion percentage in `[0.0, 100.0]`, always finite.
    ///
    /// Reports `0.0` while `total` is unknown or zero; there is no
    /// denominator to divide by in either case.
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        match self.total {
            Some(total) if total > 0 => {
                #[expect(
                    clippy::cast_precision_loss,
                    reason = "record counts stay far below 2^52"
                )]
                let ratio = self.processed.len() as f64 / total as f64;
                (ratio * 100.0).clamp(0.0, 100.0)
            }
            _ => 0.0,
        }
    }

    pub(crate) fn set_total(&mut self, total: u64) { self.total = Some(total); }

    pub(crate) fn push_outcome(&mut self, outcome: Outcome) { self.processed.push(outcome); }

    pub(crate) fn set_phase(&mut self, phase: Phase) { self.phase = phase; }
}

#[cfg(test)]
mod tests {
    use super::{Phase, RunState};
    use crate::event::Outcome;

    fn outcome(index: u64, success: bool) -> Outcome {
        Outcome {
            index,
            name: format!("fila {index}"),
            success,
            error: (!success).then(|| "bad row".into()),
        }
    }

    #[test]
    fn progress_is_zero_before_total_is_known() {
        let mut state = RunState::new();
        state.push_outcome(outcome(0, true));
        assert!(state.progress_percent().abs() < f64::EPSILON);
    }

    #[test]
    fn progress_is_zero_for_zero_total() {
        let mut state = RunState::new();
        state.set_total(0);
        let percent = state.progress_percent();
        assert!(percent.is_finite());
        assert!(percent.abs() < f64::EPSILON);
    }

    #[test]
    fn progress_is_clamped_and_finite() {
        let mut state = RunState::new();
        state.set_total(2);
        for i in 0..5 {
            state.push_outcome(outcome(i, true));
        }
        assert!((state.progress_percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn errors_are_the_failed_subsequence_in_order() {
        let mut state = RunState::new();
        for (i, success) in [true, false, true, false, false].into_iter().enumerate() {
            state.push_outcome(outcome(i as u64, success));
        }
        let failed: Vec<u64> = state.errors().map(|o| o.index).collect();
        assert_eq!(failed, vec![1, 3, 4]);
        assert_eq!(state.error_count(), 3);
    }

    #[test]
    fn terminal_phases() {
        assert!(Phase::Completed.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(!Phase::Streaming.is_terminal());
        assert!(!Phase::Uploading.is_terminal());
        assert!(!Phase::Idle.is_terminal());
    }
}
