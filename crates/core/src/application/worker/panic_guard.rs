// Fault containment for handlers and collaborator calls
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed
    Success(T),
    /// Execution panicked
    Panicked(String),
}

impl<T> PanicGuardResult<T> {
    pub fn is_panicked(&self) -> bool {
        matches!(self, PanicGuardResult::Panicked(_))
    }
}

/// Run a handler body with panic isolation
///
/// A panic is logged with `label` and returned as `PanicGuardResult::Panicked`;
/// it never propagates to the caller. State mutated before the panic stays
/// as it was left.
///
/// # Example
/// ```text
/// let result = execute_guarded("Manager#assign", || self.handle_assign(queue, item));
/// ```
pub fn execute_guarded<F, T>(label: &str, f: F) -> PanicGuardResult<T>
where
    F: FnOnce() -> T,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => PanicGuardResult::Success(result),
        Err(panic_info) => {
            let panic_msg = panic_message(panic_info.as_ref());
            error!(handler = %label, panic_msg = %panic_msg, "{} died", label);
            PanicGuardResult::Panicked(panic_msg)
        }
    }
}

/// Await a future with panic isolation
///
/// Panics raised while polling are caught at each poll, so the caller's task
/// survives a misbehaving collaborator.
pub async fn execute_guarded_async<F, T>(label: &str, future: F) -> PanicGuardResult<T>
where
    F: Future<Output = T>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => PanicGuardResult::Success(result),
        Err(panic_info) => {
            let panic_msg = panic_message(panic_info.as_ref());
            error!(handler = %label, panic_msg = %panic_msg, "{} died", label);
            PanicGuardResult::Panicked(panic_msg)
        }
    }
}

/// Extract a readable message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_success() {
        let result = execute_guarded("test", || 21 * 2);
        assert!(matches!(result, PanicGuardResult::Success(42)));
    }

    #[test]
    fn test_guarded_panic_is_contained() {
        let result: PanicGuardResult<()> = execute_guarded("test", || panic!("boom"));

        match result {
            PanicGuardResult::Panicked(msg) => assert_eq!(msg, "boom"),
            other => panic!("expected panic, got {:?}", other),
        }
    }

    #[test]
    fn test_guarded_formatted_panic_message() {
        let code = 7;
        let result: PanicGuardResult<()> = execute_guarded("test", || panic!("code {}", code));

        match result {
            PanicGuardResult::Panicked(msg) => assert_eq!(msg, "code 7"),
            other => panic!("expected panic, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_guarded_async_success() {
        let result = execute_guarded_async("test", async {
            tokio::task::yield_now().await;
            "done"
        })
        .await;
        assert!(matches!(result, PanicGuardResult::Success("done")));
    }

    #[tokio::test]
    async fn test_guarded_async_panic_after_await() {
        let result: PanicGuardResult<()> = execute_guarded_async("test", async {
            tokio::task::yield_now().await;
            panic!("late failure");
        })
        .await;

        assert!(result.is_panicked());
    }
}
