use linkcall_core::NegotiationRole;
use linkcall_engine::{
    CallState, MemorySignalingChannel, NegotiationError, NegotiatorEvent,
};

use crate::integration::CallPair;
use crate::utils::{
    MockTransportFactory, STATE_TIMEOUT_MS, candidate, init_tracing, spawn_negotiator,
    state_timeout, wait_for_event,
};

#[tokio::test]
async fn test_start_with_store_unavailable() {
    init_tracing();

    let signaling = MemorySignalingChannel::new();
    signaling.set_available(false);
    let transports = MockTransportFactory::new();
    let caller = spawn_negotiator(&signaling, &transports);

    let err = caller.start_call().await.unwrap_err();

    assert!(matches!(err, NegotiationError::StoreUnavailable(_)));
    assert_eq!(caller.state(), CallState::Idle);
    assert_eq!(transports.created_count(), 0);
    assert_eq!(signaling.session_count(), 0);

    // Recovers once the store is back.
    signaling.set_available(true);
    caller.start_call().await.expect("start_call failed");
    assert_eq!(caller.state(), CallState::RemoteDescriptionPending);
}

#[tokio::test]
async fn test_candidate_publish_failure_aborts() {
    init_tracing();

    let pair = CallPair::new();
    let link = pair.negotiate().await;
    let mut events = pair.caller.subscribe_events();

    pair.signaling.set_available(false);
    pair.caller_transport().emit_local_candidate(candidate(5000));

    let failed = wait_for_event(&mut events, STATE_TIMEOUT_MS, |event| {
        matches!(event, NegotiatorEvent::AttemptFailed(_))
    })
    .await
    .expect("attempt should fail");
    assert!(matches!(
        failed,
        NegotiatorEvent::AttemptFailed(NegotiationError::StoreUnavailable(_))
    ));

    assert!(pair.caller.wait_for_state(CallState::Idle, state_timeout()).await);
    assert_eq!(pair.caller_transport().close_count(), 1);
    assert!(
        pair.signaling
            .candidates(link.session_id(), NegotiationRole::Caller)
            .is_empty()
    );
}
