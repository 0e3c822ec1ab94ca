// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Queue list is empty")]
    EmptyQueueList,

    #[error("Invalid queue name: {0:?}")]
    InvalidQueueName(String),

    #[error("Invalid weight for queue '{queue}': {weight}")]
    InvalidWeight { queue: String, weight: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;
