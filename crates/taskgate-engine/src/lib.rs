pub mod engine;
pub mod queue;

pub use engine::{Continuation, ExecutionEngine, MemoryEngine, TaskResult, TaskStep};
pub use queue::{
    parse_i64_or_zero, Delivery, MemoryQueue, QueueSource, QueueTransit, SentMetadata,
    ATTR_APPROX_FIRST_RECEIVE_TIMESTAMP, ATTR_APPROX_RECEIVE_COUNT, ATTR_SENT_TIMESTAMP,
};
