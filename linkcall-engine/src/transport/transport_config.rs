use linkcall_core::IceServerConfig;
use linkcall_core::utils::DEFAULT_CANDIDATE_POOL_SIZE;
use serde::Deserialize;

/// ICE settings applied to every peer connection the factory builds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
    pub candidate_pool_size: u8,
    /// Gather loopback candidates too. Useful when both peers share a host.
    pub include_loopback: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::default_stun()],
            candidate_pool_size: DEFAULT_CANDIDATE_POOL_SIZE,
            include_loopback: false,
        }
    }
}

impl TransportConfig {
    /// No STUN/TURN servers; host candidates only.
    pub fn local_only() -> Self {
        Self {
            ice_servers: Vec::new(),
            candidate_pool_size: 0,
            include_loopback: true,
        }
    }
}
