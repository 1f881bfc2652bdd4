//! Inbound update feed: connection lifecycle and the single-consumer event stream.

pub mod connector;
pub mod event;
pub mod source;
pub mod state;

pub use connector::{EventStream, FeedConnector, DEFAULT_RETRY_DELAY};
pub use event::{InboundEvent, InboundMessage};
pub use source::{CommandSpec, FeedIdentity, FeedSource, FeedUpdate};
pub use state::ConnectorState;
