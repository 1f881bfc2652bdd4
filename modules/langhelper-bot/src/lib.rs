//! Telegram vocabulary bot.
//!
//! A [`FeedConnector`](feed::FeedConnector) long-polls the Bot API, a
//! [`Dispatcher`](dispatch::Dispatcher) routes each update to a command
//! handler, and an optional [`Exporter`](export::Exporter) mails the
//! database to an admin chat. The [`Supervisor`](supervisor::Supervisor)
//! runs all three under one cancellation token.

pub mod cli;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod feed;
pub mod signals;
pub mod supervisor;
pub mod telegram;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use error::{DeliveryError, DispatchError, FeedError, HandlerError};
