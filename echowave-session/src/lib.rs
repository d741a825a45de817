//! Peer-session orchestration for mesh voice calls.
//!
//! The [`SessionOrchestrator`] turns signaling events from a rendezvous
//! server into a set of live [`PeerLink`]s, and the
//! [`ConversationController`] drives one orchestrator per call attempt.

mod conversation;
mod session;
mod signaling;
mod transport;

pub use conversation::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;
