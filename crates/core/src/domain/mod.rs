// Domain Layer - Queue weights, rotation, work items, processor identity

pub mod error;
pub mod processor;
pub mod queue;
pub mod rotation;
pub mod work_item;

// Re-exports
pub use error::DomainError;
pub use processor::{ProcessorId, ProcessorState};
pub use queue::{expand_weights, QueueConfig, QueueName};
pub use rotation::QueueRotation;
pub use work_item::WorkItem;
