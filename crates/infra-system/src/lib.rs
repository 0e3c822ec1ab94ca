// Poolkeeper Infrastructure - System Adapters
// Implements: Processor (subprocess per work item)

pub mod subprocess_processor;

pub use subprocess_processor::{CommandSpec, SubprocessProcessor};
