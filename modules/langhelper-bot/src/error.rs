use thiserror::Error;

use langhelper_store::StoreError;

/// Failures of the inbound feed and its lifecycle.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to connect to the bot API: {0}")]
    Connection(String),

    #[error("feed is not started")]
    NotStarted,

    #[error("failed to set available commands: {0}")]
    Registration(String),

    #[error("failed to fetch updates: {0}")]
    Fetch(String),

    #[error("feed closed before it was running")]
    Closed,

    #[error("cancelled while waiting for the feed")]
    Cancelled,
}

#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Per-command failures. Logged by the dispatch loop, never fatal to it.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("malformed command {0:?}: expected `<command> <word>`")]
    MalformedCommand(String),

    #[error("malformed caption: expected the word and its meaning on separate lines")]
    MalformedCaption,

    #[error("word not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("event stream was already taken by another consumer")]
    StreamTaken,

    #[error("dispatch loop panicked: {0}")]
    Panicked(String),
}

/// True when the error only reports that shutdown began before the task got going.
pub fn is_cancellation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<FeedError>() {
        Some(FeedError::Cancelled) => true,
        Some(_) => false,
        None => matches!(
            err.downcast_ref::<DispatchError>(),
            Some(DispatchError::Feed(FeedError::Cancelled))
        ),
    }
}
