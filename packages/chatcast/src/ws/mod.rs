//! Realtime sessions
//!
//! Clients connect at `/ws/{client_id}`. Every text frame is echoed to its
//! sender and fanned out to all registered sessions; a closing session is
//! announced to the rest.

mod broadcaster;
mod protocol;
mod registry;
mod session;

pub use broadcaster::Broadcaster;
pub use protocol::{SubmitPayload, SubmitResponse};
pub use registry::ConnectionRegistry;
pub use session::handle_session;
