//! Bus-facing side of the bridge.

pub mod bus_client;
pub mod handler;
pub mod listener;
pub mod publisher;
pub mod translator;

pub use bus_client::BusClient;
pub use handler::RpcHandler;
pub use listener::{declare_topology, RequestListener};
pub use publisher::{ReplyPublisher, ERROR_STATUS_HEADER, ERROR_TYPE_HEADER};
pub use translator::{ExceptionToReplyTranslator, HandlerError};
