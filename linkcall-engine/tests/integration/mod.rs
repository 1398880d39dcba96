
use std::sync::Arc;

use linkcall_core::{JoinLink, NegotiationRole};
use linkcall_engine::{CallState, MemorySignalingChannel, NegotiatorHandle};

use crate::utils::{MockTransport, MockTransportFactory, spawn_negotiator, state_timeout};

/// Two negotiators sharing one store, each with its own transports.
pub struct CallPair {
    pub signaling: MemorySignalingChannel,
    pub caller: NegotiatorHandle,
    pub callee: NegotiatorHandle,
    pub caller_transports: MockTransportFactory,
    pub callee_transports: MockTransportFactory,
}

impl CallPair {
    pub fn new() -> Self {
        let signaling = MemorySignalingChannel::new();
        let caller_transports = MockTransportFactory::new();
        let callee_transports = MockTransportFactory::new();

        Self {
            caller: spawn_negotiator(&signaling, &caller_transports),
            callee: spawn_negotiator(&signaling, &callee_transports),
            signaling,
            caller_transports,
            callee_transports,
        }
    }

    pub fn caller_transport(&self) -> Arc<MockTransport> {
        self.caller_transports.last()
    }

    pub fn callee_transport(&self) -> Arc<MockTransport> {
        self.callee_transports.last()
    }

    /// Run both flows until each side has applied the other's description.
    pub async fn negotiate(&self) -> JoinLink {
        let link = self.caller.start_call().await.expect("start_call failed");
        self.callee
            .join_call(link.session_id().clone())
            .await
            .expect("join_call failed");

        assert!(
            self.caller
                .wait_for_state(CallState::Negotiating, state_timeout())
                .await,
            "caller never saw the answer"
        );
        assert_eq!(self.callee.state(), CallState::Negotiating);
        link
    }

    /// Negotiate, then report the link up on both transports.
    pub async fn connect(&self) -> JoinLink {
        let link = self.negotiate().await;

        self.caller_transport()
            .emit_phase(linkcall_core::ConnectionPhase::Connected);
        self.callee_transport()
            .emit_phase(linkcall_core::ConnectionPhase::Connected);

        assert!(
            self.caller
                .wait_for_state(CallState::Connected, state_timeout())
                .await
        );
        assert!(
            self.callee
                .wait_for_state(CallState::Connected, state_timeout())
                .await
        );
        link
    }
}

pub fn role_count(pair: &CallPair, link: &JoinLink, role: NegotiationRole) -> usize {
    pair.signaling.candidates(link.session_id(), role).len()
}
