pub mod processor;
pub mod queue;
pub mod scheduler;

pub use processor::{RequestSerializer, RequestSink};
pub use queue::{QueueEntry, RequestQueue, ResponseCallback};
