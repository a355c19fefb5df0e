pub mod clock;
pub mod context;
pub mod envelope;
pub mod error;
pub mod execution;
pub mod ids;
pub mod run;
pub mod timestamps;

pub use context::CallContext;
pub use envelope::{
    clamp_delay_seconds, clamp_payload_bytes, make_padding, ContinuationToken, DispatchReceipt,
    WorkEnvelope, WorkParams, MAX_DELAY_SECONDS, MAX_PAYLOAD_BYTES,
};
pub use error::CoordError;
pub use execution::{ExecutionRecord, ExecutionStatus};
pub use run::{RunRequest, RunResponse, RunStatus};
pub use timestamps::TimestampSet;

pub mod telemetry;
