//! Phases of a single job run.

use crate::job::JobStatus;

/// Where a run is. The three working phases all persist as `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Queued,
    Resolving,
    Transferring,
    Delivering,
    Completed,
    Failed,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed | Phase::Cancelled)
    }

    /// Forward-only: each working phase may move to the next one or end the
    /// run as `Failed`/`Cancelled`; only `Delivering` may complete.
    pub fn can_advance_to(self, next: Phase) -> bool {
        match (self, next) {
            (from, Phase::Failed | Phase::Cancelled) => !from.is_terminal(),
            (Phase::Queued, Phase::Resolving)
            | (Phase::Resolving, Phase::Transferring)
            | (Phase::Transferring, Phase::Delivering)
            | (Phase::Delivering, Phase::Completed) => true,
            _ => false,
        }
    }

    pub fn persisted_status(self) -> JobStatus {
        match self {
            Phase::Queued => JobStatus::Queued,
            Phase::Resolving | Phase::Transferring | Phase::Delivering => JobStatus::InProgress,
            Phase::Completed => JobStatus::Completed,
            Phase::Failed => JobStatus::Failed,
            Phase::Cancelled => JobStatus::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Phase; 7] = [
        Phase::Queued,
        Phase::Resolving,
        Phase::Transferring,
        Phase::Delivering,
        Phase::Completed,
        Phase::Failed,
        Phase::Cancelled,
    ];

    #[test]
    fn happy_path_is_allowed() {
        let path = [
            Phase::Queued,
            Phase::Resolving,
            Phase::Transferring,
            Phase::Delivering,
            Phase::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn no_skipping_or_going_back() {
        assert!(!Phase::Queued.can_advance_to(Phase::Transferring));
        assert!(!Phase::Resolving.can_advance_to(Phase::Completed));
        assert!(!Phase::Transferring.can_advance_to(Phase::Resolving));
        assert!(!Phase::Delivering.can_advance_to(Phase::Queued));
    }

    #[test]
    fn terminal_phases_are_final() {
        for from in ALL.into_iter().filter(|p| p.is_terminal()) {
            for to in ALL {
                assert!(!from.can_advance_to(to), "{:?} -> {:?}", from, to);
            }
        }
    }

    #[test]
    fn any_working_phase_can_fail_or_cancel() {
        for from in ALL.into_iter().filter(|p| !p.is_terminal()) {
            assert!(from.can_advance_to(Phase::Failed));
            assert!(from.can_advance_to(Phase::Cancelled));
        }
    }

    #[test]
    fn persisted_statuses() {
        assert_eq!(Phase::Queued.persisted_status(), JobStatus::Queued);
        assert_eq!(Phase::Resolving.persisted_status(), JobStatus::InProgress);
        assert_eq!(Phase::Transferring.persisted_status(), JobStatus::InProgress);
        assert_eq!(Phase::Delivering.persisted_status(), JobStatus::InProgress);
        assert_eq!(Phase::Completed.persisted_status(), JobStatus::Completed);
        assert_eq!(Phase::Failed.persisted_status(), JobStatus::Failed);
        assert_eq!(Phase::Cancelled.persisted_status(), JobStatus::Cancelled);
    }
}
