//! Shared wiring for bot integration tests: scripted feed, in-memory store,
//! recording delivery.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use langhelper_bot::dispatch::{Dispatcher, Handlers};
use langhelper_bot::feed::{FeedConnector, InboundEvent, InboundMessage};
use langhelper_bot::fixtures::{RecordingDelivery, ScriptedFeed};
use langhelper_bot::{DispatchError, FeedError};
use langhelper_common::ChatId;
use langhelper_store::MemoryStore;

pub struct TestBot {
    pub source: Arc<ScriptedFeed>,
    pub feed: Arc<FeedConnector>,
    pub store: Arc<MemoryStore>,
    pub delivery: Arc<RecordingDelivery>,
    pub dispatcher: Arc<Dispatcher>,
    pub cancel: CancellationToken,
}

impl TestBot {
    pub fn new() -> Self {
        let source = Arc::new(ScriptedFeed::new());
        let feed = Arc::new(
            FeedConnector::new(source.clone(), 10).with_retry_delay(Duration::from_millis(10)),
        );
        let store = Arc::new(MemoryStore::new());
        let delivery = RecordingDelivery::new();
        let handlers = Handlers::new(store.clone(), delivery.clone());
        let dispatcher = Arc::new(Dispatcher::new(feed.clone(), handlers));

        Self {
            source,
            feed,
            store,
            delivery,
            dispatcher,
            cancel: CancellationToken::new(),
        }
    }

    pub fn handlers(&self) -> Handlers {
        Handlers::new(self.store.clone(), self.delivery.clone())
    }

    /// Start the feed only, and wait until it is running.
    pub async fn start_feed(&self) -> JoinHandle<Result<(), FeedError>> {
        let feed = self.feed.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move { feed.start(&cancel).await });
        self.feed
            .block_till_started(&self.cancel)
            .await
            .expect("feed should start");
        handle
    }

    pub fn spawn_dispatcher(&self) -> JoinHandle<Result<(), DispatchError>> {
        let dispatcher = self.dispatcher.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move { dispatcher.run(cancel).await })
    }

    /// Feed plus dispatch loop, both running.
    pub async fn start(
        &self,
    ) -> (
        JoinHandle<Result<(), FeedError>>,
        JoinHandle<Result<(), DispatchError>>,
    ) {
        let feed = self.start_feed().await;
        let dispatch = self.spawn_dispatcher();
        (feed, dispatch)
    }

    /// Wait until `n` successful sends have been recorded.
    pub async fn wait_for_sent(&self, n: usize) {
        wait_until(|| self.delivery.sent().len() >= n).await;
    }
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

pub fn text(chat: i64, body: &str) -> InboundEvent {
    InboundEvent::TextMessage(InboundMessage::text(ChatId(chat), body))
}

pub fn photo(chat: i64, caption: &str, attachment_ref: &str) -> InboundEvent {
    InboundEvent::TextMessage(InboundMessage::attachment(
        ChatId(chat),
        caption,
        attachment_ref,
    ))
}

pub fn button(chat: i64, data: &str) -> InboundEvent {
    InboundEvent::CallbackQuery {
        data: Some(data.to_string()),
        message: Some(InboundMessage::text(ChatId(chat), "")),
    }
}
