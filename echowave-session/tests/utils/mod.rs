#![allow(dead_code)]

pub mod mock_signaling;

pub use mock_capture::*;
pub use mock_connector::*;
pub use mock_signaling::*;
pub use session_helpers::*;
