mod signal_channel;
mod ws_channel;

pub use signal_channel::*;
pub use ws_channel::*;
