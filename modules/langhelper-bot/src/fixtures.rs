//! Scripted feed, recording delivery and in-memory snapshot for tests.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use langhelper_common::ChatId;

use crate::delivery::{Deliver, ReplyAction};
use crate::error::{DeliveryError, FeedError};
use crate::export::SnapshotSource;
use crate::feed::{CommandSpec, FeedIdentity, FeedSource, FeedUpdate, InboundEvent};

type Batch = Result<Vec<FeedUpdate>, FeedError>;

/// Feed source that replays pushed batches, one per fetch. Once the script
/// runs dry, fetches hang like an idle long poll.
pub struct ScriptedFeed {
    tx: mpsc::UnboundedSender<Batch>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Batch>>,
    next_update_id: AtomicI64,
    connects: AtomicUsize,
    connect_failures: AtomicUsize,
    reject_commands: AtomicBool,
    cancel_on_register: Mutex<Option<CancellationToken>>,
    offsets: Mutex<Vec<i64>>,
    commands: Mutex<Vec<String>>,
}

impl Default for ScriptedFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedFeed {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            next_update_id: AtomicI64::new(1),
            connects: AtomicUsize::new(0),
            connect_failures: AtomicUsize::new(0),
            reject_commands: AtomicBool::new(false),
            cancel_on_register: Mutex::new(None),
            offsets: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Queue one batch; update ids are assigned in push order.
    pub fn push(&self, events: Vec<InboundEvent>) {
        let batch = events
            .into_iter()
            .map(|event| FeedUpdate {
                update_id: self.next_update_id.fetch_add(1, Ordering::SeqCst),
                event,
            })
            .collect();
        let _ = self.tx.send(Ok(batch));
    }

    pub fn push_error(&self, err: FeedError) {
        let _ = self.tx.send(Err(err));
    }

    /// Fail the next `n` connects.
    pub fn fail_connects(&self, n: usize) {
        self.connect_failures.store(n, Ordering::SeqCst);
    }

    pub fn reject_commands(&self) {
        self.reject_commands.store(true, Ordering::SeqCst);
    }

    /// Fire `token` when commands are registered, i.e. right after a
    /// consumer has seen the feed running.
    pub fn cancel_on_register(&self, token: CancellationToken) {
        *self.cancel_on_register.lock().unwrap() = Some(token);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Offsets passed to each fetch, in call order.
    pub fn offsets(&self) -> Vec<i64> {
        self.offsets.lock().unwrap().clone()
    }

    pub fn registered_commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn connect(&self) -> Result<FeedIdentity, FeedError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(FeedError::Connection("401 Unauthorized".into()));
        }
        Ok(FeedIdentity {
            id: 1,
            username: Some("langhelper_test_bot".into()),
        })
    }

    async fn fetch(&self, offset: i64, _limit: u32) -> Result<Vec<FeedUpdate>, FeedError> {
        self.offsets.lock().unwrap().push(offset);
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(batch) => batch,
            None => std::future::pending().await,
        }
    }

    async fn register_commands(&self, commands: &[CommandSpec]) -> Result<(), FeedError> {
        if self.reject_commands.load(Ordering::SeqCst) {
            return Err(FeedError::Registration("400 Bad Request".into()));
        }
        *self.commands.lock().unwrap() = commands.iter().map(|c| c.trigger.to_string()).collect();
        if let Some(token) = self.cancel_on_register.lock().unwrap().take() {
            token.cancel();
        }
        Ok(())
    }
}

/// Something handed to a [`RecordingDelivery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat_id: ChatId,
        text: String,
        actions: Vec<ReplyAction>,
    },
    Attachment {
        chat_id: ChatId,
        attachment_ref: String,
        caption: String,
    },
    Document {
        chat_id: ChatId,
        name: String,
        bytes: Vec<u8>,
    },
}

impl Sent {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Text { chat_id, .. }
            | Self::Attachment { chat_id, .. }
            | Self::Document { chat_id, .. } => *chat_id,
        }
    }
}

/// Delivery that records successful sends. Can be told to fail the next
/// few calls, or to panic on anything addressed to one chat.
#[derive(Default)]
pub struct RecordingDelivery {
    sent: Mutex<Vec<Sent>>,
    attempts: AtomicU32,
    failures_left: AtomicU32,
    panic_for: Mutex<Option<ChatId>>,
}

impl RecordingDelivery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `n` calls.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn panic_for(&self, chat_id: ChatId) {
        *self.panic_for.lock().unwrap() = Some(chat_id);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: ChatId) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| s.chat_id() == chat_id)
            .collect()
    }

    /// Calls made, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn record(&self, sent: Sent) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if *self.panic_for.lock().unwrap() == Some(sent.chat_id()) {
            panic!("delivery to chat {} blew up", sent.chat_id());
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DeliveryError("503 Service Unavailable".into()));
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

#[async_trait]
impl Deliver for RecordingDelivery {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        actions: &[ReplyAction],
    ) -> Result<(), DeliveryError> {
        self.record(Sent::Text {
            chat_id,
            text: text.to_string(),
            actions: actions.to_vec(),
        })
    }

    async fn send_attachment_with_caption(
        &self,
        chat_id: ChatId,
        attachment_ref: &str,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        self.record(Sent::Attachment {
            chat_id,
            attachment_ref: attachment_ref.to_string(),
            caption: caption.to_string(),
        })
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        name: &str,
        bytes: &[u8],
    ) -> Result<(), DeliveryError> {
        self.record(Sent::Document {
            chat_id,
            name: name.to_string(),
            bytes: bytes.to_vec(),
        })
    }
}

/// Snapshot source backed by a byte buffer, or one that always fails.
pub struct StaticSnapshot {
    bytes: Option<Vec<u8>>,
    reads: AtomicUsize,
}

impl StaticSnapshot {
    pub fn new(bytes: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            bytes: Some(bytes.to_vec()),
            reads: AtomicUsize::new(0),
        })
    }

    pub fn unreadable() -> Arc<Self> {
        Arc::new(Self {
            bytes: None,
            reads: AtomicUsize::new(0),
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for StaticSnapshot {
    async fn read_snapshot(&self) -> std::io::Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.bytes.clone().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "database file missing")
        })
    }
}
