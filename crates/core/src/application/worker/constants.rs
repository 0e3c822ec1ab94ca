// Pool constants (no magic values)
use std::time::Duration;

/// Default number of concurrent processors
pub const DEFAULT_CONCURRENCY: usize = 25;

/// Pause before re-issuing a fetch cycle that found no work (100ms)
pub const DEFAULT_EMPTY_QUEUE_DELAY: Duration = Duration::from_millis(100);

/// Default time the daemon waits for busy processors after stop (25s)
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(25);

/// Grace period between SIGTERM and SIGKILL for timed out subprocesses (5 seconds)
pub const GRACEFUL_KILL_TIMEOUT_MS: i64 = 5000;
