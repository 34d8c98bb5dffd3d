use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::{sync::Notify, time::Instant};

use crate::domain::{ClassificationOutcome, ClassificationRequest};

pub type ResponseCallback = Box<dyn FnOnce(ClassificationOutcome) + Send>;

pub struct QueueEntry {
    pub request: ClassificationRequest,
    pub respond: ResponseCallback,
    pub enqueued_at: Instant,
}

#[derive(Default)]
struct QueueState {
    entries: VecDeque<QueueEntry>,
    closed: bool,
}

pub struct RequestQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// Appends an entry. Once the queue is closed the callback is dropped
    /// without being called.
    pub fn push(&self, request: ClassificationRequest, respond: ResponseCallback) {
        {
            let mut state = self.state.lock();
            if state.closed {
                tracing::debug!(target: "queue", "queue closed; dropping request");
                return;
            }
            state.entries.push_back(QueueEntry {
                request,
                respond,
                enqueued_at: Instant::now(),
            });
        }
        self.notify.notify_one();
    }

    pub fn pop(&self) -> Option<QueueEntry> {
        self.state.lock().entries.pop_front()
    }

    /// Rejects further pushes and drops everything still waiting. Returns the
    /// number of dropped entries.
    pub fn close(&self) -> usize {
        let mut state = self.state.lock();
        state.closed = true;
        let dropped = state.entries.len();
        state.entries.clear();
        dropped
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}
