use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::FeedError;

/// Lifecycle of a [`FeedConnector`](super::FeedConnector).
///
/// Idle -> Starting -> Running -> Closed. A failed connect drops Starting
/// back to Idle. Closed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    Idle,
    Starting,
    Running,
    Closed,
}

impl ConnectorState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Closed => "closed",
        }
    }
}

/// Shared state cell. Every transition is a compare-and-set, and waiters
/// are woken through the watch channel.
pub(crate) struct StateCell {
    tx: watch::Sender<ConnectorState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectorState::Idle);
        Self { tx }
    }

    pub fn get(&self) -> ConnectorState {
        *self.tx.borrow()
    }

    /// Idle -> Starting. Exactly one concurrent caller wins.
    pub fn begin_start(&self) -> bool {
        self.compare_and_set(ConnectorState::Idle, ConnectorState::Starting)
    }

    /// Starting -> Running.
    pub fn finish_start(&self) -> bool {
        self.compare_and_set(ConnectorState::Starting, ConnectorState::Running)
    }

    /// Starting -> Idle, after a failed connect.
    pub fn abort_start(&self) -> bool {
        self.compare_and_set(ConnectorState::Starting, ConnectorState::Idle)
    }

    /// Running -> Closed.
    pub fn close(&self) -> bool {
        self.compare_and_set(ConnectorState::Running, ConnectorState::Closed)
    }

    fn compare_and_set(&self, from: ConnectorState, to: ConnectorState) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Wait until Running. Cancellation wins over every other outcome,
    /// including a feed that is already running.
    pub async fn wait_until_running(&self, cancel: &CancellationToken) -> Result<(), FeedError> {
        let mut rx = self.tx.subscribe();
        let reached = async move {
            rx.wait_for(|s| matches!(s, ConnectorState::Running | ConnectorState::Closed))
                .await
                .map(|state| *state)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FeedError::Cancelled),
            state = reached => match state {
                Ok(ConnectorState::Running) => Ok(()),
                _ => Err(FeedError::Closed),
            },
        }
    }
}
