//! Admission and cancellation bookkeeping for the scheduler.
//!
//! Every admitted job owns a cancellation token from admission until its run
//! returns. The token map doubles as the admitted set: a job id can only be
//! admitted again once its entry is released.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::job::JobId;

#[derive(Default)]
pub struct JobControl {
    jobs: Mutex<HashMap<JobId, CancellationToken>>,
    idle: Notify,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, CancellationToken>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `job_id` and return its token, or `None` if it is already admitted.
    pub fn admit(&self, job_id: JobId) -> Option<CancellationToken> {
        let mut jobs = self.jobs();
        if jobs.contains_key(&job_id) {
            return None;
        }
        let token = CancellationToken::new();
        jobs.insert(job_id, token.clone());
        Some(token)
    }

    pub fn token(&self, job_id: JobId) -> Option<CancellationToken> {
        self.jobs().get(&job_id).cloned()
    }

    /// Trip the job's token. False if the job is not admitted.
    pub fn cancel(&self, job_id: JobId) -> bool {
        match self.jobs().get(&job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for token in self.jobs().values() {
            token.cancel();
        }
    }

    /// Forget `job_id`; wakes `wait_idle` callers when nothing is left.
    pub fn release(&self, job_id: JobId) {
        let empty = {
            let mut jobs = self.jobs();
            jobs.remove(&job_id);
            jobs.is_empty()
        };
        if empty {
            self.idle.notify_waiters();
        }
    }

    pub fn release_all(&self) {
        self.jobs().clear();
        self.idle.notify_waiters();
    }

    pub fn is_admitted(&self, job_id: JobId) -> bool {
        self.jobs().contains_key(&job_id)
    }

    pub fn admitted_count(&self) -> usize {
        self.jobs().len()
    }

    /// Resolves once no job is admitted.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.admitted_count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Protocol line understood by the control socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Cancel(JobId),
}

impl ControlCommand {
    /// Parse `cancel <id>`. Anything else gets an error reply from the listener.
    pub fn parse(line: &str) -> Option<Self> {
        let (verb, arg) = line.trim().split_once(char::is_whitespace)?;
        match verb {
            "cancel" => arg.trim().parse().ok().map(ControlCommand::Cancel),
            _ => None,
        }
    }

    pub fn to_line(self) -> String {
        match self {
            ControlCommand::Cancel(id) => format!("cancel {}\n", id),
        }
    }
}

/// Default path for the control socket (same XDG state dir as the DB).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("sharedl")?.get_state_home();
    Ok(dir.join("control.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn admit_once_until_released() {
        let control = JobControl::new();
        assert!(control.admit(1).is_some());
        assert!(control.admit(1).is_none());
        assert!(control.is_admitted(1));
        control.release(1);
        assert!(!control.is_admitted(1));
        assert!(control.admit(1).is_some());
    }

    #[test]
    fn cancel_trips_the_admitted_token() {
        let control = JobControl::new();
        let token = control.admit(7).unwrap();
        assert!(!control.cancel(8));
        assert!(control.cancel(7));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_all_trips_every_token() {
        let control = JobControl::new();
        let a = control.admit(1).unwrap();
        let b = control.admit(2).unwrap();
        control.cancel_all();
        assert!(a.is_cancelled() && b.is_cancelled());
    }

    #[tokio::test]
    async fn wait_idle_returns_after_last_release() {
        let control = Arc::new(JobControl::new());
        control.admit(1);
        control.admit(2);

        let waiter = tokio::spawn({
            let control = Arc::clone(&control);
            async move { control.wait_idle().await }
        });
        control.release(1);
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        control.release(2);
        waiter.await.unwrap();
    }

    #[test]
    fn parse_commands() {
        assert_eq!(ControlCommand::parse("cancel 12\n"), Some(ControlCommand::Cancel(12)));
        assert_eq!(ControlCommand::parse("  cancel   3 "), Some(ControlCommand::Cancel(3)));
        assert_eq!(ControlCommand::parse("cancel x"), None);
        assert_eq!(ControlCommand::parse("pause 1"), None);
        assert_eq!(ControlCommand::parse("cancel"), None);
        assert_eq!(ControlCommand::Cancel(5).to_line(), "cancel 5\n");
    }
}
