pub mod queue;
pub mod reorder;
pub mod worker_pool;

pub use queue::{BoundedOrderedQueue, QueueStats};
pub use reorder::ReorderBuffer;
pub use worker_pool::{
    PoolRuntimeSnapshot, WorkerContext, WorkerPool, WorkerPoolHandle, WorkerRuntimeSnapshot,
};
