// Subprocess processor
// Runs the command described by a work item body, one child process per item
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use poolkeeper_core::application::worker::constants::GRACEFUL_KILL_TIMEOUT_MS;
use poolkeeper_core::domain::WorkItem;
use poolkeeper_core::port::{ProcessError, Processor, TimeProvider};

/// Longest stderr excerpt carried in a failure message
const STDERR_EXCERPT_CHARS: usize = 512;

/// How long output pipes may stay open after the child has exited
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Command description expected in a work item body
///
/// ```text
/// {"command": "echo", "args": ["hi"], "env": {"LANG": "C"},
///  "working_dir": "/tmp", "timeout_ms": 5000}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl CommandSpec {
    pub fn from_item(item: &WorkItem) -> Result<Self, ProcessError> {
        serde_json::from_value(item.body.clone())
            .map_err(|e| ProcessError::InvalidBody(format!("item {}: {}", item.id, e)))
    }
}

/// Processor spawning one child process per work item
///
/// Only allowlisted variables from the item's `env` reach the child.
pub struct SubprocessProcessor {
    time_provider: Arc<dyn TimeProvider>,
    env_allowlist: Vec<String>,
    default_timeout_ms: Option<u64>,
}

impl SubprocessProcessor {
    /// Create a new subprocess processor
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for duration tracking
    /// * `env_allowlist` - Item env variables allowed through to the child
    pub fn new(time_provider: Arc<dyn TimeProvider>, env_allowlist: Vec<String>) -> Self {
        Self {
            time_provider,
            env_allowlist,
            default_timeout_ms: None,
        }
    }

    /// Timeout applied when an item does not carry its own
    pub fn with_default_timeout(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = Some(timeout_ms);
        self
    }

    fn filter_env(&self, env: &HashMap<String, String>) -> HashMap<String, String> {
        env.iter()
            .filter(|(k, _)| self.env_allowlist.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<Child, ProcessError> {
        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .envs(self.filter_env(&spec.env))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }
        // Own process group, so a timeout reaches backgrounded grandchildren too
        #[cfg(unix)]
        command.process_group(0);

        command
            .spawn()
            .map_err(|e| ProcessError::Io(format!("spawn '{}' failed: {}", spec.command, e)))
    }

    /// Wait for the child, stopping it once `timeout_ms` is exceeded
    async fn wait(&self, child: &mut Child, timeout_ms: Option<u64>) -> Result<ExitStatus, ProcessError> {
        let Some(limit) = timeout_ms else {
            return child.wait().await.map_err(|e| ProcessError::Io(e.to_string()));
        };

        match timeout(Duration::from_millis(limit), child.wait()).await {
            Ok(status) => status.map_err(|e| ProcessError::Io(e.to_string())),
            Err(_) => {
                self.kill_graceful(child).await;
                Err(ProcessError::Timeout(limit as i64))
            }
        }
    }

    /// SIGTERM to the process group first, SIGKILL if it outlives the grace period
    async fn kill_graceful(&self, child: &mut Child) {
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            let group = Pid::from_raw(pid as i32);
            info!(pid = pid, "Sending SIGTERM to timed out subprocess group");
            if killpg(group, Signal::SIGTERM).is_ok() {
                let grace = Duration::from_millis(GRACEFUL_KILL_TIMEOUT_MS as u64);
                if timeout(grace, child.wait()).await.is_ok() {
                    let _ = killpg(group, Signal::SIGKILL);
                    return;
                }
                warn!(pid = pid, "Subprocess ignored SIGTERM, sending SIGKILL");
                let _ = killpg(group, Signal::SIGKILL);
            }
        }

        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to kill subprocess");
        }
    }
}

#[async_trait]
impl Processor for SubprocessProcessor {
    async fn process(&self, queue: &str, item: &WorkItem) -> Result<(), ProcessError> {
        let spec = CommandSpec::from_item(item)?;
        let timeout_ms = spec.timeout_ms.or(self.default_timeout_ms);
        let start_time = self.time_provider.now_millis();

        info!(
            queue = %queue,
            item_id = %item.id,
            command = %spec.command,
            args = ?spec.args,
            timeout_ms = ?timeout_ms,
            "Starting subprocess"
        );

        let mut child = self.spawn(&spec)?;
        let stdout = child.stdout.take().map(collect_output);
        let stderr = child.stderr.take().map(collect_output);

        let status = self.wait(&mut child, timeout_ms).await;
        let stdout = join_output(stdout).await;
        let stderr = join_output(stderr).await;
        let status = status?;
        let duration_ms = self.time_provider.elapsed_since(start_time);

        if !status.success() {
            warn!(
                item_id = %item.id,
                exit_code = ?status.code(),
                duration_ms = duration_ms,
                stderr = %excerpt(&stderr),
                "Subprocess failed"
            );
            return Err(ProcessError::Failed(format!(
                "exit code {:?}: {}",
                status.code(),
                excerpt(&stderr)
            )));
        }

        debug!(item_id = %item.id, stdout = %excerpt(&stdout), "Subprocess output");
        info!(
            item_id = %item.id,
            duration_ms = duration_ms,
            "Subprocess completed"
        );
        Ok(())
    }
}

fn collect_output<R>(mut pipe: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Collected output, empty if the pipe is still open after the drain timeout
///
/// A background grandchild can keep the pipe open long after the child exited.
async fn join_output(handle: Option<JoinHandle<String>>) -> String {
    let Some(mut handle) = handle else {
        return String::new();
    };
    match timeout(OUTPUT_DRAIN_TIMEOUT, &mut handle).await {
        Ok(output) => output.unwrap_or_default(),
        Err(_) => {
            handle.abort();
            debug!("Output pipe still held after exit, abandoning");
            String::new()
        }
    }
}

fn excerpt(output: &str) -> String {
    output.trim().chars().take(STDERR_EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolkeeper_core::port::time_provider::SystemTimeProvider;
    use std::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    fn processor(allowlist: &[&str]) -> SubprocessProcessor {
        SubprocessProcessor::new(
            Arc::new(SystemTimeProvider),
            allowlist.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn item(body: serde_json::Value) -> WorkItem {
        WorkItem::new_test("item-1", body)
    }

    #[tokio::test]
    async fn test_process_success() {
        let result = processor(&["PATH"])
            .process("default", &item(serde_json::json!({"command": "echo", "args": ["hello"]})))
            .await;

        assert_ok!(result);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failure() {
        let result = processor(&[])
            .process(
                "default",
                &item(serde_json::json!({"command": "sh", "args": ["-c", "echo oops >&2; exit 3"]})),
            )
            .await;

        match result {
            Err(ProcessError::Failed(msg)) => {
                assert!(msg.contains("Some(3)"));
                assert!(msg.contains("oops"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let result = processor(&[])
            .process(
                "default",
                &item(serde_json::json!({"command": "sleep", "args": ["10"], "timeout_ms": 100})),
            )
            .await;

        assert_eq!(result, Err(ProcessError::Timeout(100)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_not_held_by_background_grandchild() {
        let started = Instant::now();
        let result = processor(&[])
            .process(
                "default",
                &item(serde_json::json!({
                    "command": "sh",
                    "args": ["-c", "sleep 4 & sleep 10"],
                    "timeout_ms": 200
                })),
            )
            .await;

        assert_eq!(result, Err(ProcessError::Timeout(200)));
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_not_held_by_background_grandchild() {
        let started = Instant::now();
        let result = processor(&[])
            .process(
                "default",
                &item(serde_json::json!({"command": "sh", "args": ["-c", "sleep 4 & exit 0"]})),
            )
            .await;

        assert_ok!(result);
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_default_timeout_applies() {
        let result = processor(&[])
            .with_default_timeout(100)
            .process("default", &item(serde_json::json!({"command": "sleep", "args": ["10"]})))
            .await;

        assert_eq!(result, Err(ProcessError::Timeout(100)));
    }

    #[tokio::test]
    async fn test_missing_command_is_invalid_body() {
        let result = processor(&[])
            .process("default", &item(serde_json::json!({"args": ["x"]})))
            .await;

        let err = assert_err!(result);
        assert!(matches!(err, ProcessError::InvalidBody(_)));
    }

    #[tokio::test]
    async fn test_unknown_binary_is_io_error() {
        let result = processor(&[])
            .process(
                "default",
                &item(serde_json::json!({"command": "/nonexistent/poolkeeper-test-binary"})),
            )
            .await;

        assert!(matches!(result, Err(ProcessError::Io(_))));
    }

    #[test]
    fn test_env_filtering() {
        let processor = processor(&["ALLOWED_VAR"]);

        let mut env = HashMap::new();
        env.insert("ALLOWED_VAR".to_string(), "value1".to_string());
        env.insert("BLOCKED_VAR".to_string(), "value2".to_string());

        let filtered = processor.filter_env(&env);

        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("ALLOWED_VAR"));
    }

    #[test]
    fn test_command_spec_defaults() {
        let spec = assert_ok!(CommandSpec::from_item(&item(serde_json::json!({"command": "true"}))));

        assert!(spec.args.is_empty());
        assert!(spec.env.is_empty());
        assert_eq!(spec.working_dir, None);
        assert_eq!(spec.timeout_ms, None);
    }
}
