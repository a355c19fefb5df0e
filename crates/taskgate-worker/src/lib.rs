pub mod consumer;
pub mod dispatcher;
pub mod pipeline;
pub mod util;
pub mod worker_loop;

pub use consumer::{ConsumeError, Consumer, NoopWork, WorkHandler};
pub use dispatcher::{DispatchError, Dispatcher};
pub use pipeline::{Pipeline, PipelineConfig};
pub use worker_loop::worker_loop;
