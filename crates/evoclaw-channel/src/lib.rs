//! Message/Response wire types, the `Channel` transport contract, and the
//! HTTP/WS channel adapters that bridge external transports into the
//! orchestrator's inbox.

mod channel;
mod context;
mod http;
mod message;
mod sse;
mod stream;
mod ws;

pub use channel::{Channel, MessageStream};
pub use context::{race, shutdown_pair, CancelReason, Context};
pub use http::HttpChannel;
pub use message::{Message, Response};
pub use sse::json_event;
pub use ws::{InFrame, OutFrame, WsChannel};
