mod connection_wrapper;
mod link_event;
mod media_connection;
mod transport_config;

pub use connection_wrapper::*;
pub use link_event::*;
pub use media_connection::*;
pub use transport_config::*;
