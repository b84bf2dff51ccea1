pub mod config;
pub mod error;
pub mod fsutil;
pub mod ids;
pub mod observability;

pub use error::{Error, ErrorKind, Result};
pub use ids::{new_message_id, AgentId, MessageId};
