use std::sync::Arc;

use linkcall_core::SessionField;
use linkcall_engine::{
    CallState, MemorySignalingChannel, NegotiationError, NegotiatorConfig, NegotiatorHandle,
};

use crate::integration::CallPair;
use crate::utils::{
    MockTransportFactory, StalledSignalingChannel, init_tracing, settle, state_timeout,
};

#[tokio::test]
async fn test_hangup_while_offer_write_stalls() {
    init_tracing();

    let signaling = MemorySignalingChannel::new();
    let transports = MockTransportFactory::new();
    let caller = NegotiatorHandle::spawn(
        NegotiatorConfig::default(),
        Arc::new(StalledSignalingChannel::new(signaling.clone(), SessionField::Offer)),
        Arc::new(transports.clone()),
    );

    let pending = tokio::spawn({
        let caller = caller.clone();
        async move { caller.start_call().await }
    });
    assert!(
        caller
            .wait_for_state(CallState::LocalDescriptionReady, state_timeout())
            .await
    );

    tokio::time::timeout(state_timeout(), caller.hangup())
        .await
        .expect("hangup blocked behind the stalled write")
        .expect("hangup failed");

    assert_eq!(caller.state(), CallState::Idle);
    assert!(caller.can_start());
    assert_eq!(transports.last().close_count(), 1);

    let result = tokio::time::timeout(state_timeout(), pending)
        .await
        .expect("start_call never answered")
        .expect("start_call task panicked");
    assert_eq!(result.unwrap_err(), NegotiationError::AttemptCancelled);
}

#[tokio::test]
async fn test_callee_hangup_while_answer_write_stalls() {
    init_tracing();

    let pair = CallPair::new();
    let link = pair.caller.start_call().await.expect("start_call failed");

    let callee_transports = MockTransportFactory::new();
    let callee = NegotiatorHandle::spawn(
        NegotiatorConfig::default(),
        Arc::new(StalledSignalingChannel::new(
            pair.signaling.clone(),
            SessionField::Answer,
        )),
        Arc::new(callee_transports.clone()),
    );

    let pending = tokio::spawn({
        let callee = callee.clone();
        let session_id = link.session_id().clone();
        async move { callee.join_call(session_id).await }
    });
    assert!(
        callee
            .wait_for_state(CallState::LocalDescriptionReady, state_timeout())
            .await
    );

    tokio::time::timeout(state_timeout(), callee.hangup())
        .await
        .expect("hangup blocked behind the stalled write")
        .expect("hangup failed");

    let result = tokio::time::timeout(state_timeout(), pending)
        .await
        .expect("join_call never answered")
        .expect("join_call task panicked");
    assert_eq!(result.unwrap_err(), NegotiationError::AttemptCancelled);

    let transport = callee_transports.last();
    assert_eq!(transport.close_count(), 1);
    settle().await;
    assert!(transport.violations().is_empty());
    assert_eq!(callee.state(), CallState::Idle);
}
