use serde::{Deserialize, Serialize};

/// One discovered network path hint. Never interpreted by the engine, only
/// carried from one transport to the other.
///
/// Field names follow the `RTCIceCandidateInit` JSON produced by browsers and
/// by webrtc-rs (`candidate.to_json()`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
    #[serde(default)]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
            username_fragment: None,
        }
    }
}

/// A single append to a per-role candidate sequence.
///
/// `seq` is assigned by the only writer of that sequence, starting at zero,
/// so readers can restore append order when the store reorders deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub seq: u64,
    pub candidate: IceCandidate,
}
