//! Local HTTP front end speaking the chat-completions protocol.

mod handlers;
mod router;

pub use router::{BridgeState, bridge_router};
