//! Background jobs that have been started but not yet reaped.

use crate::external::Termination;
use nix::unistd::Pid;
use tracing::{debug, warn};

/// A running background process and the line that started it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub pid: Pid,
    pub text: String,
}

/// A job observed to have finished during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub pid: Pid,
    /// 1-based position of the job in the table when the sweep started.
    pub job: usize,
    pub text: String,
    pub termination: Termination,
}

/// Jobs in the order they were started.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Track a just-started background process. Returns its job number.
    pub fn insert(&mut self, pid: Pid, text: impl Into<String>) -> usize {
        let text = text.into();
        debug!(%pid, text = %text, "tracking background job");
        self.jobs.push(Job { pid, text });
        self.jobs.len()
    }

    /// Check every tracked job once, without blocking, and drop the finished ones.
    ///
    /// `poll` returns `Ok(None)` for a process that is still running. A process
    /// that cannot be waited on any more is dropped without a completion.
    pub fn sweep<F>(&mut self, mut poll: F) -> Vec<Completion>
    where
        F: FnMut(Pid) -> nix::Result<Option<Termination>>,
    {
        let mut done = Vec::new();
        let mut position = 0;
        self.jobs.retain(|job| {
            position += 1;
            match poll(job.pid) {
                Ok(None) => true,
                Ok(Some(termination)) => {
                    debug!(pid = %job.pid, job = position, ?termination, "reaped background job");
                    done.push(Completion {
                        pid: job.pid,
                        job: position,
                        text: job.text.clone(),
                        termination,
                    });
                    false
                }
                Err(errno) => {
                    warn!(pid = %job.pid, %errno, "dropping job that can no longer be waited on");
                    false
                }
            }
        });
        done
    }

    /// `(pid, job number, text)` for every tracked job, oldest first.
    ///
    /// The iterator is lazy and can be cloned to walk the table again.
    pub fn list(&self) -> impl Iterator<Item = (Pid, usize, &str)> + Clone + '_ {
        self.jobs
            .iter()
            .enumerate()
            .map(|(i, job)| (job.pid, i + 1, job.text.as_str()))
    }
}
