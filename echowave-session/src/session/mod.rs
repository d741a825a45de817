mod error;
mod membership;
mod orchestrator;
mod peer_link;
mod session_config;
mod session_event;

pub use error::*;
pub use membership::*;
pub use orchestrator::*;
pub use peer_link::*;
pub use session_config::*;
pub use session_event::*;
