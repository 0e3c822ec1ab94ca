// Poolkeeper Infrastructure - SQLite Adapter
// Implements: Fetcher (claim-and-remove from a queue table)

mod connection;
mod error;
mod migration;
mod queue;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use queue::SqliteQueue;
