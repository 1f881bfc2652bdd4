use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::dispatch::command::{classify, Command, COMMANDS};
use crate::dispatch::handlers::Handlers;
use crate::error::{DispatchError, FeedError};
use crate::feed::{FeedConnector, InboundEvent};

/// Sequential consumer of the feed. Events are handled one at a time, in
/// arrival order; a failing or panicking handler only costs its own event.
pub struct Dispatcher {
    feed: Arc<FeedConnector>,
    handlers: Handlers,
}

impl Dispatcher {
    pub fn new(feed: Arc<FeedConnector>, handlers: Handlers) -> Self {
        Self { feed, handlers }
    }

    /// Wait for the feed, register commands, then handle events until the
    /// feed closes or `cancel` fires. Events already buffered at
    /// cancellation are still handled.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), DispatchError> {
        match AssertUnwindSafe(self.run_inner(&cancel)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(&*panic);
                error!(panic = message.as_str(), "Dispatch loop panicked");
                Err(DispatchError::Panicked(message))
            }
        }
    }

    async fn run_inner(&self, cancel: &CancellationToken) -> Result<(), DispatchError> {
        if let Err(e) = self.feed.block_till_started(cancel).await {
            if !matches!(e, FeedError::Cancelled) {
                error!(error = %e, "Feed never started");
            }
            return Err(e.into());
        }

        if let Err(e) = self.feed.set_available_commands(COMMANDS).await {
            error!(error = %e, "Failed to set available commands");
            return Err(e.into());
        }

        let mut stream = self.feed.event_stream().ok_or(DispatchError::StreamTaken)?;
        info!("Dispatch loop started");

        let mut handled = 0u64;
        loop {
            tokio::select! {
                biased;
                event = stream.recv() => match event {
                    Some(event) => {
                        self.dispatch(event).await;
                        handled += 1;
                    }
                    None => break,
                },
                _ = cancel.cancelled() => {
                    stream.close();
                    while let Some(event) = stream.recv().await {
                        self.dispatch(event).await;
                        handled += 1;
                    }
                    break;
                }
            }
        }

        info!(handled, "Dispatch loop stopped");
        Ok(())
    }

    async fn dispatch(&self, event: InboundEvent) {
        let chat_id = event.chat_id().map(|c| c.0);
        let handled = AssertUnwindSafe(self.handle_event(event)).catch_unwind().await;
        if let Err(panic) = handled {
            error!(
                chat_id,
                panic = panic_message(&*panic).as_str(),
                "Recovered from panic while handling event"
            );
        }
    }

    async fn handle_event(&self, event: InboundEvent) {
        let message = match event.into_message() {
            Ok(message) => message,
            Err(event) => {
                warn!(kind = event.kind(), event = ?event, "Unhandled update");
                return;
            }
        };

        let chat_id = message.chat_id;
        let command = classify(&message);
        let result = match &command {
            Command::Start => self.handlers.handle_start(chat_id).await,
            Command::Random => self.handlers.handle_random(chat_id).await,
            Command::Lookup { text } => self.handlers.handle_lookup(text, chat_id).await,
            Command::Insert {
                caption,
                attachment_ref,
            } => self.handlers.handle_insert(caption, attachment_ref).await,
            Command::Skip => {
                trace!(chat_id = chat_id.0, "Nothing to do for message");
                return;
            }
        };

        if let Err(e) = result {
            error!(
                chat_id = chat_id.0,
                command = command.name(),
                error = %e,
                "Command failed"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
