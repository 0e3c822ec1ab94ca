// Poolkeeper Core - Scheduling, Supervision & Ports
// NO infrastructure dependencies: fetch and process adapters live in infra crates

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use config::PoolConfig;
pub use error::{AppError, Result};
