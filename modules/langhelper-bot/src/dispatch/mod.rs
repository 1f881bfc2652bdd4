//! Routes inbound events to command handlers.

pub mod command;
pub mod dispatcher;
pub mod handlers;

pub use command::{classify, Command, COMMANDS};
pub use dispatcher::Dispatcher;
pub use handlers::Handlers;
