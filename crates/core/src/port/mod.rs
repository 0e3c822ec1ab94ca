// Port Layer - Interfaces for external collaborators

pub mod fetcher;
pub mod processor;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use fetcher::{FetchError, Fetcher};
pub use processor::{ProcessError, Processor};
pub use time_provider::TimeProvider;
