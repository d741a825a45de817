use echowave_core::IceServerConfig;
use echowave_core::utils::default_stun_urls;

/// ICE configuration handed to every peer connection.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::stun(default_stun_urls())],
        }
    }
}
