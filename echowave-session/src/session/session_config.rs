use crate::session::membership::MembershipProtocol;
use crate::transport::TransportConfig;
use echowave_core::IceServerConfig;
use echowave_core::utils::default_stun_urls;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub signaling_url: String,
    pub ice_servers: Vec<IceServerConfig>,
    pub membership: MembershipProtocol,
    /// In random mode, stay in Connecting until the server pairs us.
    pub require_partner: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://127.0.0.1:3000/ws".to_owned(),
            ice_servers: vec![IceServerConfig::stun(default_stun_urls())],
            membership: MembershipProtocol::default(),
            require_partner: true,
        }
    }
}

impl SessionConfig {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            ice_servers: self.ice_servers.clone(),
        }
    }
}
