use linkcall_core::ConnectionPhase;
use linkcall_engine::{CallState, MemorySignalingChannel, NegotiationError, PeerTransport};

use crate::integration::CallPair;
use crate::utils::{MockTransportFactory, init_tracing, spawn_negotiator, state_timeout};

#[tokio::test]
async fn test_hangup_twice_closes_once() {
    init_tracing();

    let pair = CallPair::new();
    let link = pair.negotiate().await;

    pair.caller.hangup().await.expect("hangup failed");
    pair.caller.hangup().await.expect("second hangup failed");

    assert_eq!(pair.caller.state(), CallState::Idle);
    assert_eq!(pair.caller_transport().close_count(), 1);
    assert_eq!(pair.signaling.listener_count(link.session_id()), 1);
}

#[tokio::test]
async fn test_hangup_when_idle_is_noop() {
    init_tracing();

    let signaling = MemorySignalingChannel::new();
    let transports = MockTransportFactory::new();
    let negotiator = spawn_negotiator(&signaling, &transports);

    negotiator.hangup().await.expect("hangup failed");

    assert_eq!(negotiator.state(), CallState::Idle);
    assert_eq!(transports.created_count(), 0);
    assert_eq!(signaling.session_count(), 0);
}

#[tokio::test]
async fn test_shutdown_closes_transport() {
    init_tracing();

    let pair = CallPair::new();
    pair.negotiate().await;

    pair.caller.shutdown().await;

    assert!(pair.caller.wait_for_state(CallState::Closed, state_timeout()).await);
    assert_eq!(pair.caller_transport().close_count(), 1);
    assert_eq!(
        pair.caller.start_call().await.unwrap_err(),
        NegotiationError::EngineClosed
    );
}

#[tokio::test]
async fn test_disconnect_then_hangup_closes_once() {
    init_tracing();

    let pair = CallPair::new();
    pair.connect().await;

    pair.caller_transport().emit_phase(ConnectionPhase::Disconnected);
    assert!(pair.caller.wait_for_state(CallState::Idle, state_timeout()).await);
    pair.caller.hangup().await.expect("hangup failed");

    assert_eq!(pair.caller_transport().close_count(), 1);
}

#[tokio::test]
async fn test_mock_counts_every_close() {
    let transports = MockTransportFactory::new();
    let signaling = MemorySignalingChannel::new();
    let caller = spawn_negotiator(&signaling, &transports);
    caller.start_call().await.expect("start_call failed");

    let transport = transports.last();
    transport.close().await.expect("close failed");
    transport.close().await.expect("close failed");

    assert_eq!(transport.close_count(), 2);
    caller.hangup().await.expect("hangup failed");
    assert_eq!(transport.close_count(), 3);
}
