use anyhow::{Context, Result, bail};
use linkcall_core::{CandidateRecord, IceCandidate};
use linkcall_engine::{MemorySignalingChannel, NegotiatorConfig, NegotiatorEvent, NegotiatorHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::Level;

use super::mock_transport::MockTransportFactory;

/// Timeout for state transitions (ms).
pub const STATE_TIMEOUT_MS: u64 = 2000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn state_timeout() -> Duration {
    Duration::from_millis(STATE_TIMEOUT_MS)
}

pub fn spawn_negotiator(
    signaling: &MemorySignalingChannel,
    transports: &MockTransportFactory,
) -> NegotiatorHandle {
    spawn_negotiator_with(NegotiatorConfig::default(), signaling, transports)
}

pub fn spawn_negotiator_with(
    config: NegotiatorConfig,
    signaling: &MemorySignalingChannel,
    transports: &MockTransportFactory,
) -> NegotiatorHandle {
    NegotiatorHandle::spawn(
        config,
        Arc::new(signaling.clone()),
        Arc::new(transports.clone()),
    )
}

/// A host candidate with a recognisable port.
pub fn candidate(port: u16) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:1 1 udp 2130706431 192.0.2.1 {} typ host", port),
        sdp_mid: Some("0".to_owned()),
        sdp_mline_index: Some(0),
        username_fragment: None,
    }
}

pub fn record(seq: u64, port: u16) -> CandidateRecord {
    CandidateRecord {
        seq,
        candidate: candidate(port),
    }
}

/// Poll `condition` until it holds or the timeout expires.
pub async fn wait_until(timeout_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait for the first event matching `predicate`.
pub async fn wait_for_event(
    events: &mut broadcast::Receiver<NegotiatorEvent>,
    timeout_ms: u64,
    predicate: impl Fn(&NegotiatorEvent) -> bool,
) -> Result<NegotiatorEvent> {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Ok(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => bail!("Event channel closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_millis(timeout_ms), wait)
        .await
        .context("Timeout waiting for negotiator event")?
}

/// Let the negotiator loops drain whatever is queued.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
