pub mod memory;
pub mod etcd;
pub mod types;

pub use memory::MemoryStatusStore;
pub use etcd::EtcdStatusStore;
pub use types::{StatusRecord, StatusStore, UpdateOutcome, STATUS_PENDING, STATUS_PROCESSING};
