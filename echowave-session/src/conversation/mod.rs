mod capture;
mod controller;
mod conversation_event;
mod summarizer;

pub use capture::*;
pub use controller::*;
pub use conversation_event::*;
pub use summarizer::*;
