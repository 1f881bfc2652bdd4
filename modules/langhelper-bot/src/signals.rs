//! Shutdown signal handling.
//!
//! Unix: SIGINT and SIGTERM. Elsewhere: Ctrl-C.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Exit status used when a second signal forces the process down.
pub const FORCED_EXIT_CODE: i32 = 130;

pub struct ShutdownSignals {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    #[cfg(unix)]
    pub fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next signal and return its name.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        "Ctrl-C"
    }
}

/// Cancel `token` on the first signal; exit immediately on the second.
pub fn spawn_listener(token: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    let signals = ShutdownSignals::register()?;
    Ok(tokio::spawn(listen(signals, token, || {
        std::process::exit(FORCED_EXIT_CODE);
    })))
}

async fn listen<F>(mut signals: ShutdownSignals, token: CancellationToken, force_exit: F)
where
    F: FnOnce(),
{
    let signal = signals.recv().await;
    info!(signal, "Received shutdown signal, stopping");
    token.cancel();

    let signal = signals.recv().await;
    error!(signal, "Received second shutdown signal, exiting now");
    force_exit();
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    fn raise(signal: &str) {
        let status = std::process::Command::new("kill")
            .args([signal, &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());
    }

    // One test sends every signal: handlers are process-wide, so a second
    // listener would see these too.
    #[tokio::test]
    async fn first_signal_cancels_second_forces_exit() {
        let token = CancellationToken::new();
        let (exit_tx, exit_rx) = oneshot::channel();
        let signals = ShutdownSignals::register().unwrap();
        let listener = tokio::spawn(listen(signals, token.clone(), move || {
            let _ = exit_tx.send(());
        }));

        raise("-INT");
        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .expect("SIGINT should cancel the token");

        raise("-TERM");
        tokio::time::timeout(Duration::from_secs(5), exit_rx)
            .await
            .expect("second signal should force the exit")
            .unwrap();
        listener.await.unwrap();
    }
}
