// Shutdown signalling
// Used both to terminate the fetcher and to announce pool shutdown to callers

use tokio::sync::watch;

/// Receiving side of a one-shot, broadcast shutdown signal
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was signalled
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the shutdown signal
    ///
    /// Returns immediately when the signal already fired. Also returns if the
    /// sender was dropped, since nobody can signal anymore.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|signalled| *signalled).await;
    }
}

/// Sending side of the shutdown signal
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Fire the signal; later calls are no-ops
    pub fn shutdown(&self) {
        self.tx.send_if_modified(|signalled| {
            if *signalled {
                false
            } else {
                *signalled = true;
                true
            }
        });
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// Create another token observing this signal
    pub fn subscribe(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}
