use linkcall_core::{ConnectionPhase, NegotiationRole, SdpType};
use linkcall_engine::{CallState, NegotiatorEvent};

use crate::integration::{CallPair, role_count};
use crate::utils::{
    STATE_TIMEOUT_MS, TransportCall, candidate, init_tracing, state_timeout, wait_for_event,
    wait_until,
};

#[tokio::test]
async fn test_call_connects() {
    init_tracing();

    let pair = CallPair::new();
    let mut caller_events = pair.caller.subscribe_events();

    let link = pair.caller.start_call().await.expect("start_call failed");
    assert_eq!(pair.caller.state(), CallState::RemoteDescriptionPending);
    assert!(link.to_string().starts_with("http://localhost:5173?token="));

    let announced = wait_for_event(&mut caller_events, STATE_TIMEOUT_MS, |event| {
        matches!(event, NegotiatorEvent::JoinLinkReady(_))
    })
    .await
    .expect("join link should be announced");
    assert!(matches!(announced, NegotiatorEvent::JoinLinkReady(ref l) if *l == link));

    pair.callee
        .join_call(link.session_id().clone())
        .await
        .expect("join_call failed");
    assert_eq!(pair.callee.state(), CallState::Negotiating);
    assert!(
        pair.caller
            .wait_for_state(CallState::Negotiating, state_timeout())
            .await
    );

    let caller_transport = pair.caller_transport();
    let callee_transport = pair.callee_transport();

    // Two candidates each way, interleaved, must arrive in writer order.
    caller_transport.emit_local_candidate(candidate(5000));
    callee_transport.emit_local_candidate(candidate(6000));
    caller_transport.emit_local_candidate(candidate(5001));
    callee_transport.emit_local_candidate(candidate(6001));

    assert!(wait_until(STATE_TIMEOUT_MS, || callee_transport.added_candidates().len() == 2).await);
    assert!(wait_until(STATE_TIMEOUT_MS, || caller_transport.added_candidates().len() == 2).await);
    assert_eq!(
        callee_transport.added_candidates(),
        vec![candidate(5000), candidate(5001)]
    );
    assert_eq!(
        caller_transport.added_candidates(),
        vec![candidate(6000), candidate(6001)]
    );

    let published: Vec<u64> = pair
        .signaling
        .candidates(link.session_id(), NegotiationRole::Caller)
        .iter()
        .map(|record| record.seq)
        .collect();
    assert_eq!(published, vec![0, 1]);
    assert_eq!(role_count(&pair, &link, NegotiationRole::Callee), 2);

    caller_transport.emit_phase(ConnectionPhase::Connected);
    callee_transport.emit_phase(ConnectionPhase::Connected);

    assert!(pair.caller.wait_for_state(CallState::Connected, state_timeout()).await);
    assert!(pair.callee.wait_for_state(CallState::Connected, state_timeout()).await);

    assert_eq!(
        caller_transport.calls(),
        vec![
            TransportCall::CreateOffer,
            TransportCall::SetLocal(SdpType::Offer),
            TransportCall::SetRemote(SdpType::Answer),
            TransportCall::AddCandidate(candidate(6000)),
            TransportCall::AddCandidate(candidate(6001)),
        ]
    );
    assert_eq!(
        callee_transport.calls(),
        vec![
            TransportCall::SetRemote(SdpType::Offer),
            TransportCall::CreateAnswer,
            TransportCall::SetLocal(SdpType::Answer),
            TransportCall::AddCandidate(candidate(5000)),
            TransportCall::AddCandidate(candidate(5001)),
        ]
    );
    assert!(caller_transport.violations().is_empty());
    assert!(callee_transport.violations().is_empty());
}

#[tokio::test]
async fn test_late_candidates_after_connected() {
    init_tracing();

    let pair = CallPair::new();
    pair.connect().await;

    // Trickle keeps going after the link is up.
    pair.caller_transport().emit_local_candidate(candidate(5001));

    let callee_transport = pair.callee_transport();
    assert!(wait_until(STATE_TIMEOUT_MS, || callee_transport.added_candidates() == vec![candidate(5001)]).await);
    assert_eq!(pair.callee.state(), CallState::Connected);
}
