//! Bounded background job submission.
//!
//! Snapshot extraction is fire-and-forget: `post_message` and `complete`
//! submit a job and return immediately. The queue is bounded and `submit`
//! never blocks; when the queue is full the job is dropped with a warning.
//! Two rapid messages can still race two extractions for the same interview,
//! and the store's last-writer-wins semantics absorb that (accepted
//! limitation).

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::snapshot::SnapshotService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    ExtractSnapshot { interview_id: String },
}

/// Cloneable submission handle for the background worker.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Non-blocking submit. Drops the job (logged) when the queue is full or
    /// the worker is gone; the primary operation must never fail because of a
    /// background extraction.
    pub fn submit(&self, job: Job) {
        if let Err(e) = self.tx.try_send(job) {
            warn!(error = %e, "background job dropped");
        }
    }
}

/// Drain the queue, running snapshot extraction for each job. Failures are
/// logged inside the service and swallowed here.
pub fn spawn_snapshot_worker(
    mut rx: mpsc::Receiver<Job>,
    snapshots: Arc<SnapshotService>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            match job {
                Job::ExtractSnapshot { interview_id } => {
                    snapshots.extract_best_effort(&interview_id).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_delivers_to_receiver() {
        let (queue, mut rx) = JobQueue::bounded(4);
        queue.submit(Job::ExtractSnapshot {
            interview_id: "i1".into(),
        });

        let job = rx.recv().await.unwrap();
        assert_eq!(
            job,
            Job::ExtractSnapshot {
                interview_id: "i1".into()
            }
        );
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let (queue, mut rx) = JobQueue::bounded(1);
        queue.submit(Job::ExtractSnapshot {
            interview_id: "a".into(),
        });
        // Queue is full now; this submit is dropped silently.
        queue.submit(Job::ExtractSnapshot {
            interview_id: "b".into(),
        });

        let first = rx.recv().await.unwrap();
        assert_eq!(
            first,
            Job::ExtractSnapshot {
                interview_id: "a".into()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn submit_after_receiver_dropped_does_not_panic() {
        let (queue, rx) = JobQueue::bounded(1);
        drop(rx);
        queue.submit(Job::ExtractSnapshot {
            interview_id: "x".into(),
        });
    }
}
