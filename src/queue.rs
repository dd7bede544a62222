use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::judge::QuestionFixture;
use crate::model::SourceArtifact;

/// One (student, question) unit of judging work
#[derive(Debug, Clone)]
pub struct JudgeJob {
    pub artifact: SourceArtifact,
    pub fixture: Arc<QuestionFixture>,
}

struct QueueState {
    jobs: VecDeque<JudgeJob>,
    closed: bool,
}

pub struct JobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    pub async fn push(&self, job: JudgeJob) {
        self.state.lock().await.jobs.push_back(job);
        self.notify.notify_one();
    }

    /// Marks the queue as complete; `pop` returns `None` once it is drained
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    pub async fn pop(&self) -> Option<JudgeJob> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if let Some(job) = state.jobs.pop_front() {
                    return Some(job);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Removes every job that was never picked up
    pub async fn drain(&self) -> Vec<JudgeJob> {
        self.state.lock().await.jobs.drain(..).collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.jobs.len()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
