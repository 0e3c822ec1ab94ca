// Application Layer - Actors and the pool facade

pub mod fetcher;
pub mod manager;
pub mod pool;
pub mod worker;

// Re-exports
pub use fetcher::FetcherHandle;
pub use manager::{Manager, ManagerHandle, ManagerMessage, PoolSnapshot};
pub use pool::WorkerPool;
pub use worker::{shutdown_channel, ProcessorHandle, ProcessorSpawner, ShutdownSender, ShutdownToken};
