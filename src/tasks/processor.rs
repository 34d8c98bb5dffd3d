use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::oneshot, task::JoinHandle, time::sleep};

use crate::{
    ai::{ClassificationService, ClassifyError},
    domain::{ClassificationOutcome, ClassificationRequest, QueueSnapshot},
    infrastructure::shutdown::ShutdownListener,
};

use super::queue::{QueueEntry, RequestQueue, ResponseCallback};

#[async_trait]
pub trait RequestSink: Send + Sync {
    fn submit(&self, request: ClassificationRequest, respond: ResponseCallback);

    async fn backend_ready(&self) -> bool;
}

/// Funnels requests through the classification service one at a time, in
/// arrival order, with a fixed pause after every completed call.
pub struct RequestSerializer {
    queue: RequestQueue,
    service: ClassificationService,
    spacing: Duration,
    served: AtomicU64,
}

impl RequestSerializer {
    pub fn start(
        service: ClassificationService,
        spacing: Duration,
        shutdown: ShutdownListener,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let serializer = Arc::new(Self {
            queue: RequestQueue::new(),
            service,
            spacing,
            served: AtomicU64::new(0),
        });
        let worker = serializer.clone();
        let handle = tokio::spawn(async move {
            worker.run_loop(shutdown).await;
        });
        (serializer, handle)
    }

    pub async fn enqueue(&self, request: ClassificationRequest) -> ClassificationOutcome {
        let (tx, rx) = oneshot::channel();
        self.queue.push(
            request,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        rx.await
            .unwrap_or_else(|_| Err(ClassifyError::unavailable("request serializer stopped")))
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            depth: self.queue.len(),
            served: self.served.load(Ordering::Relaxed),
        }
    }

    async fn run_loop(&self, mut shutdown: ShutdownListener) {
        loop {
            if shutdown.is_triggered() {
                break;
            }

            let Some(entry) = self.queue.pop() else {
                tokio::select! {
                    _ = self.queue.wait() => {}
                    _ = shutdown.notified() => break,
                }
                continue;
            };

            self.dispatch(entry).await;

            tokio::select! {
                _ = sleep(self.spacing) => {}
                _ = shutdown.notified() => break,
            }
        }
        let dropped = self.queue.close();
        tracing::info!(
            target: "queue",
            dropped,
            served = self.served.load(Ordering::Relaxed),
            "request serializer stopped"
        );
    }

    async fn dispatch(&self, entry: QueueEntry) {
        let QueueEntry {
            request,
            respond,
            enqueued_at,
        } = entry;
        tracing::debug!(
            target: "queue",
            waited_ms = enqueued_at.elapsed().as_millis() as u64,
            pending = self.queue.len(),
            chars = request.text.chars().count(),
            "dispatching classification"
        );

        let outcome = self.service.evaluate(&request).await;
        if let Err(err) = &outcome {
            tracing::warn!(target: "queue", error = %err, "classification request failed");
        }
        self.served.fetch_add(1, Ordering::Relaxed);
        respond(outcome);
    }
}

#[async_trait]
impl RequestSink for RequestSerializer {
    fn submit(&self, request: ClassificationRequest, respond: ResponseCallback) {
        self.queue.push(request, respond);
    }

    async fn backend_ready(&self) -> bool {
        self.service.status().await.ready
    }
}
