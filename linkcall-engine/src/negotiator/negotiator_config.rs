use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NegotiatorConfig {
    /// Origin used to build join links, e.g. `https://call.example.com`.
    pub origin: String,
    /// Abandon an attempt that has not reached `Connected` after this long.
    pub negotiation_timeout_ms: Option<u64>,
    /// How many out-of-order remote candidates are held while waiting for a gap to fill.
    pub reorder_window: usize,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:5173".to_owned(),
            negotiation_timeout_ms: None,
            reorder_window: 64,
        }
    }
}

impl NegotiatorConfig {
    pub fn negotiation_timeout(&self) -> Option<Duration> {
        self.negotiation_timeout_ms.map(Duration::from_millis)
    }
}
