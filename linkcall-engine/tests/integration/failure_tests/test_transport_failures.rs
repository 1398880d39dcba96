use linkcall_core::{ConnectionPhase, SessionField};
use linkcall_engine::{
    CallState, MemorySignalingChannel, NegotiationError, NegotiatorEvent, TransportError,
};

use crate::integration::CallPair;
use crate::utils::{
    MockTransportFactory, STATE_TIMEOUT_MS, init_tracing, spawn_negotiator, state_timeout,
    wait_for_event,
};

#[tokio::test]
async fn test_rejected_offer_tears_down_callee() {
    init_tracing();

    let signaling = MemorySignalingChannel::new();
    let caller_transports = MockTransportFactory::new();
    let callee_transports = MockTransportFactory::rejecting_remote();
    let caller = spawn_negotiator(&signaling, &caller_transports);
    let callee = spawn_negotiator(&signaling, &callee_transports);

    let link = caller.start_call().await.expect("start_call failed");
    let err = callee
        .join_call(link.session_id().clone())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        NegotiationError::TransportFailure(TransportError::Rejected(_))
    ));
    assert_eq!(callee.state(), CallState::Idle);
    assert_eq!(callee_transports.last().close_count(), 1);
    assert_eq!(signaling.write_count(link.session_id(), SessionField::Answer), 0);
    // Only the caller still listens.
    assert_eq!(signaling.listener_count(link.session_id()), 2);
}

#[tokio::test]
async fn test_transport_unavailable() {
    init_tracing();

    let signaling = MemorySignalingChannel::new();
    let transports = MockTransportFactory::failing();
    let caller = spawn_negotiator(&signaling, &transports);

    let err = caller.start_call().await.unwrap_err();

    assert!(matches!(
        err,
        NegotiationError::TransportFailure(TransportError::Internal(_))
    ));
    assert_eq!(caller.state(), CallState::Idle);
    assert!(caller.can_start());
}

#[tokio::test]
async fn test_connectivity_failure_before_connected() {
    init_tracing();

    let pair = CallPair::new();
    pair.negotiate().await;
    let mut events = pair.caller.subscribe_events();

    pair.caller_transport().emit_phase(ConnectionPhase::Failed);

    let failed = wait_for_event(&mut events, STATE_TIMEOUT_MS, |event| {
        matches!(
            event,
            NegotiatorEvent::AttemptFailed(_) | NegotiatorEvent::Disconnected
        )
    })
    .await
    .expect("failure should be reported");
    assert!(matches!(
        failed,
        NegotiatorEvent::AttemptFailed(NegotiationError::TransportFailure(
            TransportError::ConnectionFailed
        ))
    ));

    assert!(pair.caller.wait_for_state(CallState::Idle, state_timeout()).await);
    assert_eq!(pair.caller_transport().close_count(), 1);
}

#[tokio::test]
async fn test_failure_after_connected_is_a_disconnect() {
    init_tracing();

    let pair = CallPair::new();
    pair.connect().await;
    let mut events = pair.callee.subscribe_events();

    pair.callee_transport().emit_phase(ConnectionPhase::Failed);

    let event = wait_for_event(&mut events, STATE_TIMEOUT_MS, |event| {
        matches!(
            event,
            NegotiatorEvent::AttemptFailed(_) | NegotiatorEvent::Disconnected
        )
    })
    .await
    .expect("drop should be reported");
    assert!(matches!(event, NegotiatorEvent::Disconnected));
    assert_eq!(pair.callee.state(), CallState::Idle);
}
