use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::FeedError;
use crate::feed::event::InboundEvent;
use crate::feed::source::{CommandSpec, FeedSource};
use crate::feed::state::{ConnectorState, StateCell};

/// Pause before re-polling after a failed fetch.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Receiving end of the feed. Closes once the feed is closed and drained.
pub type EventStream = mpsc::Receiver<InboundEvent>;

/// Owns the connection to the upstream update source.
///
/// Shared between the supervisor (which drives [`start`](Self::start)) and
/// the consumers that wait on it. All methods take `&self`.
pub struct FeedConnector {
    source: Arc<dyn FeedSource>,
    fetch_limit: u32,
    retry_delay: Duration,
    state: StateCell,
    stream: Mutex<Option<EventStream>>,
    stop: CancellationToken,
}

impl FeedConnector {
    pub fn new(source: Arc<dyn FeedSource>, fetch_limit: u32) -> Self {
        Self {
            source,
            fetch_limit: fetch_limit.max(1),
            retry_delay: DEFAULT_RETRY_DELAY,
            state: StateCell::new(),
            stream: Mutex::new(None),
            stop: CancellationToken::new(),
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn state(&self) -> ConnectorState {
        self.state.get()
    }

    pub fn is_started(&self) -> bool {
        self.state.get() == ConnectorState::Running
    }

    /// Connect, start polling, then block until `cancel` fires (or the feed
    /// is closed some other way), and close.
    ///
    /// Only one caller ever connects. Calls made while another start is in
    /// flight, or after the feed is running or closed, log a warning and
    /// return `Ok(())` straight away.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<(), FeedError> {
        match self.state.get() {
            ConnectorState::Running => {
                warn!("Feed already started");
                return Ok(());
            }
            ConnectorState::Closed => {
                warn!("Feed already closed, not restarting");
                return Ok(());
            }
            ConnectorState::Idle | ConnectorState::Starting => {}
        }
        if !self.state.begin_start() {
            warn!("Feed start already in progress");
            return Ok(());
        }

        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FeedError::Cancelled),
            identity = self.source.connect() => identity,
        };
        let identity = match connected {
            Ok(identity) => identity,
            Err(e) => {
                self.state.abort_start();
                if !matches!(e, FeedError::Cancelled) {
                    error!(error = %e, "Failed to connect feed");
                }
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(self.fetch_limit as usize);
        if let Ok(mut slot) = self.stream.lock() {
            *slot = Some(rx);
        }
        let producer = tokio::spawn(poll_updates(
            self.source.clone(),
            tx,
            self.stop.clone(),
            self.fetch_limit,
            self.retry_delay,
        ));
        self.state.finish_start();

        info!(
            bot_id = identity.id,
            bot_username = identity.username.as_deref().unwrap_or(""),
            "Feed started"
        );

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = self.stop.cancelled() => {}
        }

        // A direct close() has already moved the state and stopped polling.
        let closed = if self.stop.is_cancelled() {
            Ok(())
        } else {
            self.close()
        };
        if let Err(e) = producer.await {
            warn!(error = %e, "Feed producer did not exit cleanly");
        }
        closed
    }

    /// Block until the feed is running. Fails with `Cancelled` if `cancel`
    /// fires first (or already has), and with `Closed` if the feed closes
    /// without ever being observed running.
    pub async fn block_till_started(&self, cancel: &CancellationToken) -> Result<(), FeedError> {
        self.state.wait_until_running(cancel).await
    }

    /// Take the event stream. There is one consumer per feed: the first call
    /// after a successful start gets the stream, every other call gets `None`.
    /// A stream taken after close still yields whatever was buffered.
    pub fn event_stream(&self) -> Option<EventStream> {
        self.stream.lock().ok()?.take()
    }

    /// Stop polling and move to Closed. Closing a feed that is not running,
    /// or is already closed, only logs a warning.
    pub fn close(&self) -> Result<(), FeedError> {
        match self.state.get() {
            state @ (ConnectorState::Idle | ConnectorState::Starting) => {
                warn!(state = state.as_str(), "Feed not running yet, nothing to close");
                return Ok(());
            }
            ConnectorState::Closed => {
                warn!("Feed already closed");
                return Ok(());
            }
            ConnectorState::Running => {}
        }
        if !self.state.close() {
            warn!("Feed already closed");
            return Ok(());
        }

        self.stop.cancel();
        info!("Feed closed");
        Ok(())
    }

    /// Advertise the supported commands to chat clients.
    pub async fn set_available_commands(&self, commands: &[CommandSpec]) -> Result<(), FeedError> {
        if !self.is_started() {
            return Err(FeedError::NotStarted);
        }
        self.source.register_commands(commands).await?;
        debug!(count = commands.len(), "Registered commands");
        Ok(())
    }
}

/// Long-poll loop. Each fetch confirms everything below the new offset.
/// Ends when the feed is stopped or the consumer drops the stream.
async fn poll_updates(
    source: Arc<dyn FeedSource>,
    tx: mpsc::Sender<InboundEvent>,
    stop: CancellationToken,
    limit: u32,
    retry_delay: Duration,
) {
    let mut offset = 0i64;

    loop {
        let fetched = tokio::select! {
            _ = stop.cancelled() => break,
            fetched = source.fetch(offset, limit) => fetched,
        };

        match fetched {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    tokio::select! {
                        _ = stop.cancelled() => return,
                        sent = tx.send(update.event) => {
                            if sent.is_err() {
                                debug!("Event stream dropped, stopping producer");
                                return;
                            }
                        }
                    }
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    retry_in_secs = retry_delay.as_secs_f64(),
                    "Failed to fetch updates"
                );
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(retry_delay) => {}
                }
            }
        }
    }

    debug!("Feed producer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::event::InboundMessage;
    use crate::fixtures::ScriptedFeed;
    use langhelper_common::ChatId;

    fn text(chat: i64, body: &str) -> InboundEvent {
        InboundEvent::TextMessage(InboundMessage::text(ChatId(chat), body))
    }

    async fn running(source: Arc<ScriptedFeed>) -> (Arc<FeedConnector>, CancellationToken) {
        let feed = Arc::new(FeedConnector::new(source, 10));
        let cancel = CancellationToken::new();
        {
            let feed = feed.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { feed.start(&cancel).await });
        }
        feed.block_till_started(&cancel).await.unwrap();
        (feed, cancel)
    }

    #[tokio::test]
    async fn concurrent_starts_connect_once() {
        let source = Arc::new(ScriptedFeed::new());
        let feed = Arc::new(FeedConnector::new(source.clone(), 10));
        let cancel = CancellationToken::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let feed = feed.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move { feed.start(&cancel).await }));
        }

        feed.block_till_started(&cancel).await.unwrap();
        cancel.cancel();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(source.connect_count(), 1);
        assert_eq!(feed.state(), ConnectorState::Closed);
    }

    #[tokio::test]
    async fn failed_connect_returns_to_idle() {
        let source = Arc::new(ScriptedFeed::new());
        source.fail_connects(1);
        let feed = FeedConnector::new(source.clone(), 10);
        let cancel = CancellationToken::new();

        let err = feed.start(&cancel).await.unwrap_err();
        assert!(matches!(err, FeedError::Connection(_)));
        assert_eq!(feed.state(), ConnectorState::Idle);
        assert!(feed.event_stream().is_none());
    }

    #[tokio::test]
    async fn events_arrive_in_order_and_offset_advances() {
        let source = Arc::new(ScriptedFeed::new());
        source.push(vec![text(1, "a"), text(1, "b")]);
        source.push(vec![text(2, "c")]);

        let (feed, cancel) = running(source.clone()).await;
        let mut stream = feed.event_stream().unwrap();

        for expected in ["a", "b", "c"] {
            let event = stream.recv().await.unwrap();
            let message = event.into_message().unwrap();
            assert_eq!(message.text.as_deref(), Some(expected));
        }

        cancel.cancel();
        assert!(stream.recv().await.is_none());

        // Ids 1 and 2 came in the first batch, so the next poll asks from 3.
        let offsets = source.offsets();
        assert_eq!(&offsets[..2], &[0, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_errors_are_retried() {
        let source = Arc::new(ScriptedFeed::new());
        source.push_error(FeedError::Fetch("502 Bad Gateway".into()));
        source.push(vec![text(1, "after retry")]);

        let (feed, cancel) = running(source).await;
        let mut stream = feed.event_stream().unwrap();

        let message = stream.recv().await.unwrap().into_message().unwrap();
        assert_eq!(message.text.as_deref(), Some("after retry"));
        cancel.cancel();
    }

    #[tokio::test]
    async fn stream_has_a_single_consumer() {
        let (feed, cancel) = running(Arc::new(ScriptedFeed::new())).await;
        assert!(feed.event_stream().is_some());
        assert!(feed.event_stream().is_none());
        cancel.cancel();
    }

    #[tokio::test]
    async fn close_twice_is_a_no_op() {
        let (feed, _cancel) = running(Arc::new(ScriptedFeed::new())).await;
        assert!(feed.close().is_ok());
        assert!(feed.close().is_ok());
        assert_eq!(feed.state(), ConnectorState::Closed);
    }

    #[tokio::test]
    async fn direct_close_ends_start_without_cancel() {
        let source = Arc::new(ScriptedFeed::new());
        let feed = Arc::new(FeedConnector::new(source, 10));
        let cancel = CancellationToken::new();
        let started = {
            let feed = feed.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { feed.start(&cancel).await })
        };
        feed.block_till_started(&cancel).await.unwrap();
        let mut stream = feed.event_stream().unwrap();

        feed.close().unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), started)
            .await
            .expect("start should return once the feed is closed")
            .unwrap();
        assert!(result.is_ok());
        assert!(!cancel.is_cancelled());
        assert_eq!(feed.state(), ConnectorState::Closed);
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn close_before_start_is_a_no_op() {
        let feed = FeedConnector::new(Arc::new(ScriptedFeed::new()), 10);
        assert!(feed.close().is_ok());
        assert_eq!(feed.state(), ConnectorState::Idle);
    }

    #[tokio::test]
    async fn start_after_close_does_not_reconnect() {
        let source = Arc::new(ScriptedFeed::new());
        let (feed, cancel) = running(source.clone()).await;
        cancel.cancel();
        feed.close().unwrap();

        assert!(feed.start(&CancellationToken::new()).await.is_ok());
        assert_eq!(source.connect_count(), 1);
        assert_eq!(feed.state(), ConnectorState::Closed);
    }

    #[tokio::test]
    async fn commands_need_a_running_feed() {
        let source = Arc::new(ScriptedFeed::new());
        let feed = FeedConnector::new(source.clone(), 10);
        let commands = [CommandSpec {
            trigger: "/random",
            description: "Get a random word",
        }];

        let err = feed.set_available_commands(&commands).await.unwrap_err();
        assert!(matches!(err, FeedError::NotStarted));

        let (feed, cancel) = running(source.clone()).await;
        feed.set_available_commands(&commands).await.unwrap();
        assert_eq!(source.registered_commands(), vec!["/random".to_string()]);
        cancel.cancel();
    }

    #[tokio::test]
    async fn block_till_started_honors_prior_cancellation() {
        let feed = FeedConnector::new(Arc::new(ScriptedFeed::new()), 10);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = feed.block_till_started(&cancel).await.unwrap_err();
        assert!(matches!(err, FeedError::Cancelled));
    }
}
