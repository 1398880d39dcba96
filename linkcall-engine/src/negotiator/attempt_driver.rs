use crate::error::NegotiationError;
use crate::negotiator::CallState;
use crate::negotiator::signal_event::SignalEvent;
use crate::signaling::{CandidateHandler, SessionHandler, SignalingChannel, Subscription};
use crate::transport::{PeerTransport, PeerTransportFactory, TransportEvent};
use linkcall_core::{
    CallSession, CandidateRecord, ConnectionPhase, IceCandidate, JoinLink, NegotiationRole,
    SessionDescription, SessionField, SessionId,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Which flow a driver runs before it starts serving [`AttemptOp`]s.
pub(crate) enum Flow {
    Caller { origin: String },
    Callee(SessionId),
}

/// I/O the negotiator loop hands to the driver once the flow is done.
/// Applied strictly in send order.
#[derive(Debug)]
pub(crate) enum AttemptOp {
    ApplyAnswer(SessionDescription),
    AddCandidates(Vec<IceCandidate>),
    Publish(CandidateRecord),
}

/// Progress reported back to the negotiator loop.
pub(crate) enum DriverEvent {
    StateReached(CallState),
    SessionReady {
        session_id: SessionId,
        link: Option<JoinLink>,
    },
    TransportReady(Arc<dyn PeerTransport>),
    Subscribed(Subscription),
    RemoteDescriptionApplied,
    FlowFinished(Result<(), NegotiationError>),
    OpFailed(NegotiationError),
}

/// Performs every store and transport call of one attempt on its own task,
/// so the negotiator loop never waits on I/O. Aborted on teardown.
pub(crate) struct AttemptDriver {
    generation: u64,
    role: NegotiationRole,
    signaling: Arc<dyn SignalingChannel>,
    transports: Arc<dyn PeerTransportFactory>,
    driver_tx: mpsc::UnboundedSender<(u64, DriverEvent)>,
    signal_tx: mpsc::UnboundedSender<(u64, SignalEvent)>,
    transport_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    ops_rx: mpsc::UnboundedReceiver<AttemptOp>,
}

impl AttemptDriver {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        generation: u64,
        role: NegotiationRole,
        signaling: Arc<dyn SignalingChannel>,
        transports: Arc<dyn PeerTransportFactory>,
        driver_tx: mpsc::UnboundedSender<(u64, DriverEvent)>,
        signal_tx: mpsc::UnboundedSender<(u64, SignalEvent)>,
        transport_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
        ops_rx: mpsc::UnboundedReceiver<AttemptOp>,
    ) -> Self {
        Self {
            generation,
            role,
            signaling,
            transports,
            driver_tx,
            signal_tx,
            transport_tx,
            ops_rx,
        }
    }

    pub(crate) async fn run(mut self, flow: Flow) {
        let result = match flow {
            Flow::Caller { origin } => self.run_caller_flow(&origin).await,
            Flow::Callee(session_id) => self.run_callee_flow(session_id).await,
        };

        let (session_id, transport) = match result {
            Ok(ready) => {
                self.report(DriverEvent::FlowFinished(Ok(())));
                ready
            }
            Err(err) => {
                self.report(DriverEvent::FlowFinished(Err(err)));
                return;
            }
        };

        while let Some(op) = self.ops_rx.recv().await {
            if let Err(err) = self.apply(op, &session_id, &transport).await {
                self.report(DriverEvent::OpFailed(err));
                return;
            }
        }
    }

    async fn run_caller_flow(
        &self,
        origin: &str,
    ) -> Result<(SessionId, Arc<dyn PeerTransport>), NegotiationError> {
        let session_id = self.signaling.create_session().await?;
        info!("Session {} created", session_id);
        let link = JoinLink::new(origin, session_id.clone())?;
        self.report(DriverEvent::SessionReady {
            session_id: session_id.clone(),
            link: Some(link),
        });

        let transport = self.create_transport().await?;

        let offer = transport.create_offer().await?;
        transport.set_local_description(offer.clone()).await?;
        self.report(DriverEvent::StateReached(CallState::LocalDescriptionReady));

        self.publish_description(&session_id, offer).await?;
        self.report(DriverEvent::StateReached(CallState::RemoteDescriptionPending));

        let subscription = self
            .signaling
            .subscribe_session(&session_id, self.session_handler())
            .await?;
        self.report(DriverEvent::Subscribed(subscription));

        let subscription = self
            .signaling
            .subscribe_candidates(&session_id, self.role.opposite(), self.candidate_handler())
            .await?;
        self.report(DriverEvent::Subscribed(subscription));

        Ok((session_id, transport))
    }

    async fn run_callee_flow(
        &self,
        session_id: SessionId,
    ) -> Result<(SessionId, Arc<dyn PeerTransport>), NegotiationError> {
        let session = self.signaling.get_session(&session_id).await?;
        let Some(offer) = session.field(SessionField::Offer).cloned() else {
            return Err(NegotiationError::CallerNotReady(session_id));
        };
        info!("Joining session {}", session_id);
        self.report(DriverEvent::SessionReady {
            session_id: session_id.clone(),
            link: None,
        });

        let transport = self.create_transport().await?;

        transport.set_remote_description(offer).await?;
        self.report(DriverEvent::RemoteDescriptionApplied);

        let answer = transport.create_answer().await?;
        transport.set_local_description(answer.clone()).await?;
        self.report(DriverEvent::StateReached(CallState::LocalDescriptionReady));

        self.publish_description(&session_id, answer).await?;
        self.report(DriverEvent::StateReached(CallState::Negotiating));

        let subscription = self
            .signaling
            .subscribe_candidates(&session_id, self.role.opposite(), self.candidate_handler())
            .await?;
        self.report(DriverEvent::Subscribed(subscription));

        Ok((session_id, transport))
    }

    async fn apply(
        &self,
        op: AttemptOp,
        session_id: &SessionId,
        transport: &Arc<dyn PeerTransport>,
    ) -> Result<(), NegotiationError> {
        match op {
            AttemptOp::ApplyAnswer(answer) => {
                transport.set_remote_description(answer).await?;
                self.report(DriverEvent::RemoteDescriptionApplied);
            }

            AttemptOp::AddCandidates(candidates) => {
                for candidate in candidates {
                    debug!("Adding remote candidate: {}", candidate.candidate);
                    transport.add_remote_candidate(candidate).await?;
                }
            }

            AttemptOp::Publish(record) => {
                debug!(
                    "Publishing local candidate seq {} to {}",
                    record.seq,
                    self.role.candidate_collection()
                );
                self.signaling
                    .append_candidate(session_id, self.role, record)
                    .await?;
            }
        }
        Ok(())
    }

    /// Builds the transport and wires its callbacks into the loop before any
    /// description exists, so no local candidate can be missed.
    async fn create_transport(&self) -> Result<Arc<dyn PeerTransport>, NegotiationError> {
        let transport = self.transports.create(self.role).await?;
        self.report(DriverEvent::TransportReady(transport.clone()));

        let (generation, tx) = (self.generation, self.transport_tx.clone());
        transport.on_local_candidate(Box::new(move |candidate: IceCandidate| {
            let _ = tx.send((generation, TransportEvent::LocalCandidate(candidate)));
        }));

        let (generation, tx) = (self.generation, self.transport_tx.clone());
        transport.on_connection_phase_change(Box::new(move |phase: ConnectionPhase| {
            let _ = tx.send((generation, TransportEvent::PhaseChanged(phase)));
        }));

        Ok(transport)
    }

    async fn publish_description(
        &self,
        session_id: &SessionId,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let field = self.role.published_field();
        match field {
            SessionField::Offer => self.signaling.set_offer(session_id, description).await?,
            SessionField::Answer => self.signaling.set_answer(session_id, description).await?,
        }
        debug!("{} published to session {}", field, session_id);
        Ok(())
    }

    fn session_handler(&self) -> SessionHandler {
        let (generation, tx) = (self.generation, self.signal_tx.clone());
        Box::new(move |session: CallSession| {
            let _ = tx.send((generation, SignalEvent::SessionChanged(session)));
        })
    }

    fn candidate_handler(&self) -> CandidateHandler {
        let (generation, tx) = (self.generation, self.signal_tx.clone());
        Box::new(move |record: CandidateRecord| {
            let _ = tx.send((generation, SignalEvent::CandidateAdded(record)));
        })
    }

    fn report(&self, event: DriverEvent) {
        let _ = self.driver_tx.send((self.generation, event));
    }
}
