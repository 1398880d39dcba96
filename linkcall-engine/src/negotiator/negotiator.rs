use crate::error::{NegotiationError, TransportError};
use crate::negotiator::attempt_driver::{AttemptDriver, AttemptOp, DriverEvent, Flow};
use crate::negotiator::candidate_queue::RemoteCandidateQueue;
use crate::negotiator::signal_event::SignalEvent;
use crate::negotiator::{
    CallState, NegotiatorCommand, NegotiatorConfig, NegotiatorEvent, NegotiatorHandle,
};
use crate::signaling::{SignalingChannel, Subscription};
use crate::transport::{PeerTransport, PeerTransportFactory, TransportEvent};
use linkcall_core::{
    CallSession, CandidateRecord, ConnectionPhase, IceCandidate, JoinLink, NegotiationRole,
    SessionId,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// The command waiting for its attempt's flow to finish.
enum PendingReply {
    Start(oneshot::Sender<Result<JoinLink, NegotiationError>>),
    Join(oneshot::Sender<Result<(), NegotiationError>>),
}

impl PendingReply {
    fn fail(self, err: NegotiationError) {
        match self {
            PendingReply::Start(reply) => {
                let _ = reply.send(Err(err));
            }
            PendingReply::Join(reply) => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

/// Everything owned by one call attempt. Dropped as a unit on teardown.
struct CallAttempt {
    role: NegotiationRole,
    session_id: Option<SessionId>,
    link: Option<JoinLink>,
    transport: Option<Arc<dyn PeerTransport>>,
    subscriptions: Vec<Subscription>,
    driver: JoinHandle<()>,
    ops_tx: mpsc::UnboundedSender<AttemptOp>,
    reply: Option<PendingReply>,
    answer_requested: bool,
    remote_description_set: bool,
    remote_candidates: RemoteCandidateQueue,
    next_local_seq: u64,
    deadline: Option<Instant>,
}

impl CallAttempt {
    fn send_op(&self, op: AttemptOp) {
        // The driver only stops after reporting a failure, which tears the attempt down.
        let _ = self.ops_tx.send(op);
    }
}

/// Drives the caller or callee flow for one call at a time.
///
/// The loop (see [`CallSessionNegotiator::run`]) only updates state. Store
/// and transport I/O runs on a per-attempt driver task, and every callback is
/// tagged with the attempt generation, so hangup and the negotiation deadline
/// take effect in any state and nothing from a torn-down attempt is applied.
pub struct CallSessionNegotiator {
    config: NegotiatorConfig,
    signaling: Arc<dyn SignalingChannel>,
    transports: Arc<dyn PeerTransportFactory>,
    command_rx: mpsc::Receiver<NegotiatorCommand>,
    driver_tx: mpsc::UnboundedSender<(u64, DriverEvent)>,
    driver_rx: mpsc::UnboundedReceiver<(u64, DriverEvent)>,
    signal_tx: mpsc::UnboundedSender<(u64, SignalEvent)>,
    signal_rx: mpsc::UnboundedReceiver<(u64, SignalEvent)>,
    transport_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    transport_rx: mpsc::UnboundedReceiver<(u64, TransportEvent)>,
    state_tx: watch::Sender<CallState>,
    event_tx: broadcast::Sender<NegotiatorEvent>,
    generation: u64,
    attempt: Option<CallAttempt>,
}

impl CallSessionNegotiator {
    pub fn new(
        config: NegotiatorConfig,
        signaling: Arc<dyn SignalingChannel>,
        transports: Arc<dyn PeerTransportFactory>,
    ) -> (Self, NegotiatorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (driver_tx, driver_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(CallState::Idle);
        let (event_tx, _) = broadcast::channel(64);

        let handle = NegotiatorHandle::new(command_tx, state_rx, event_tx.clone());

        let negotiator = Self {
            config,
            signaling,
            transports,
            command_rx,
            driver_tx,
            driver_rx,
            signal_tx,
            signal_rx,
            transport_tx,
            transport_rx,
            state_tx,
            event_tx,
            generation: 0,
            attempt: None,
        };

        (negotiator, handle)
    }

    pub async fn run(mut self) {
        info!("Negotiator event loop started");

        loop {
            let deadline = self.attempt.as_ref().and_then(|attempt| attempt.deadline);

            tokio::select! {
                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        info!("All negotiator handles dropped");
                        break;
                    };
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }

                Some((generation, evt)) = self.driver_rx.recv() => {
                    if generation == self.generation {
                        self.handle_driver_event(evt).await;
                    } else {
                        discard_stale(evt);
                    }
                }

                Some((generation, evt)) = self.signal_rx.recv() => {
                    if generation == self.generation {
                        self.handle_signal_event(evt);
                    } else {
                        debug!("Dropping signaling event from a finished attempt");
                    }
                }

                Some((generation, evt)) = self.transport_rx.recv() => {
                    if generation == self.generation {
                        self.handle_transport_event(evt).await;
                    } else {
                        debug!("Dropping transport event from a finished attempt");
                    }
                }

                _ = wait_until(deadline) => self.handle_deadline().await,
            }
        }

        self.teardown(NegotiationError::EngineClosed).await;
        self.set_state(CallState::Closed);
        info!("Negotiator event loop finished");
    }

    /// Returns false when the loop should stop.
    async fn handle_command(&mut self, cmd: NegotiatorCommand) -> bool {
        match cmd {
            NegotiatorCommand::StartCall { reply } => match self.ensure_idle() {
                Ok(()) => {
                    let flow = Flow::Caller {
                        origin: self.config.origin.clone(),
                    };
                    self.begin_attempt(NegotiationRole::Caller, flow, PendingReply::Start(reply));
                }
                Err(err) => {
                    let _ = reply.send(Err(err));
                }
            },

            NegotiatorCommand::JoinCall { session_id, reply } => match self.ensure_idle() {
                Ok(()) => {
                    let flow = Flow::Callee(session_id);
                    self.begin_attempt(NegotiationRole::Callee, flow, PendingReply::Join(reply));
                }
                Err(err) => {
                    let _ = reply.send(Err(err));
                }
            },

            NegotiatorCommand::Hangup { reply } => {
                info!("Hangup requested");
                self.teardown(NegotiationError::AttemptCancelled).await;
                let _ = reply.send(());
            }

            NegotiatorCommand::Shutdown => {
                info!("Negotiator shutdown requested");
                return false;
            }
        }
        true
    }

    fn begin_attempt(&mut self, role: NegotiationRole, flow: Flow, reply: PendingReply) {
        self.generation += 1;
        self.set_state(CallState::RoleSelected(role));

        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let driver = AttemptDriver::new(
            self.generation,
            role,
            self.signaling.clone(),
            self.transports.clone(),
            self.driver_tx.clone(),
            self.signal_tx.clone(),
            self.transport_tx.clone(),
            ops_rx,
        );
        let driver = tokio::spawn(driver.run(flow));

        self.attempt = Some(CallAttempt {
            role,
            session_id: None,
            link: None,
            transport: None,
            subscriptions: Vec::new(),
            driver,
            ops_tx,
            reply: Some(reply),
            answer_requested: false,
            remote_description_set: false,
            remote_candidates: RemoteCandidateQueue::new(self.config.reorder_window),
            next_local_seq: 0,
            deadline: self
                .config
                .negotiation_timeout()
                .map(|timeout| Instant::now() + timeout),
        });
    }

    async fn handle_driver_event(&mut self, event: DriverEvent) {
        let Some(attempt) = self.attempt.as_mut() else {
            discard_stale(event);
            return;
        };

        match event {
            DriverEvent::StateReached(state) => {
                if self.state() != CallState::Connected {
                    self.set_state(state);
                }
            }

            DriverEvent::SessionReady { session_id, link } => {
                attempt.session_id = Some(session_id);
                attempt.link = link;
            }

            DriverEvent::TransportReady(transport) => attempt.transport = Some(transport),

            DriverEvent::Subscribed(subscription) => attempt.subscriptions.push(subscription),

            DriverEvent::RemoteDescriptionApplied => {
                attempt.remote_description_set = true;
                let role = attempt.role;
                if let Some(session_id) = &attempt.session_id {
                    debug!("Remote description set for session {}", session_id);
                }
                self.flush_remote_candidates();
                if role == NegotiationRole::Caller && self.state() != CallState::Connected {
                    self.set_state(CallState::Negotiating);
                }
            }

            DriverEvent::FlowFinished(Ok(())) => self.finish_flow(),

            DriverEvent::FlowFinished(Err(err)) | DriverEvent::OpFailed(err) => {
                self.fail_attempt(err).await;
            }
        }
    }

    fn finish_flow(&mut self) {
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };

        match attempt.reply.take() {
            Some(PendingReply::Start(reply)) => {
                let Some(link) = attempt.link.clone() else {
                    return;
                };
                info!("Call offered, join link: {}", link);
                self.emit(NegotiatorEvent::JoinLinkReady(link.clone()));
                let _ = reply.send(Ok(link));
            }
            Some(PendingReply::Join(reply)) => {
                let _ = reply.send(Ok(()));
            }
            None => {}
        }
    }

    fn handle_signal_event(&mut self, event: SignalEvent) {
        match event {
            SignalEvent::SessionChanged(session) => self.on_session_changed(session),
            SignalEvent::CandidateAdded(record) => self.on_remote_candidate(record),
        }
    }

    fn on_session_changed(&mut self, session: CallSession) {
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        // Only the caller waits on the record, and only for the first answer.
        if attempt.role != NegotiationRole::Caller || attempt.answer_requested {
            return;
        }
        let Some(answer) = session.answer else {
            return;
        };

        info!("Answer received on session {}", session.id);
        attempt.answer_requested = true;
        attempt.send_op(AttemptOp::ApplyAnswer(answer));
    }

    fn on_remote_candidate(&mut self, record: CandidateRecord) {
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };

        let seq = record.seq;
        if !attempt.remote_candidates.accept(record) {
            debug!("Remote candidate seq {} already seen", seq);
            return;
        }

        if !attempt.remote_description_set {
            debug!(
                "Remote description not set yet, queuing candidate ({} queued)",
                attempt.remote_candidates.queued()
            );
            return;
        }

        self.flush_remote_candidates();
    }

    fn flush_remote_candidates(&mut self) {
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        if !attempt.remote_description_set {
            return;
        }

        let ready = attempt.remote_candidates.drain_ready();
        if !ready.is_empty() {
            attempt.send_op(AttemptOp::AddCandidates(ready));
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::LocalCandidate(candidate) => self.publish_local_candidate(candidate),
            TransportEvent::PhaseChanged(phase) => self.on_phase_changed(phase).await,
        }
    }

    fn publish_local_candidate(&mut self, candidate: IceCandidate) {
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };

        let record = CandidateRecord {
            seq: attempt.next_local_seq,
            candidate,
        };
        attempt.next_local_seq += 1;
        attempt.send_op(AttemptOp::Publish(record));
    }

    async fn on_phase_changed(&mut self, phase: ConnectionPhase) {
        match phase {
            ConnectionPhase::Connected => {
                let Some(attempt) = self.attempt.as_mut() else {
                    return;
                };
                attempt.deadline = None;
                if self.state() != CallState::Connected {
                    info!("Call connected");
                    self.set_state(CallState::Connected);
                }
            }

            ConnectionPhase::Failed if self.state() != CallState::Connected => {
                self.fail_attempt(TransportError::ConnectionFailed.into())
                    .await;
            }

            ConnectionPhase::Disconnected | ConnectionPhase::Failed => {
                if self.attempt.is_none() {
                    return;
                }
                warn!("Peer connection lost, tearing the call down");
                self.teardown(NegotiationError::AttemptCancelled).await;
                self.emit(NegotiatorEvent::Disconnected);
            }

            ConnectionPhase::Idle | ConnectionPhase::Negotiating => {
                debug!("Transport phase: {:?}", phase);
            }
        }
    }

    async fn handle_deadline(&mut self) {
        if self.state() == CallState::Connected {
            if let Some(attempt) = self.attempt.as_mut() {
                attempt.deadline = None;
            }
            return;
        }

        warn!("Negotiation did not complete before the deadline");
        self.fail_attempt(NegotiationError::NegotiationTimedOut).await;
    }

    fn ensure_idle(&self) -> Result<(), NegotiationError> {
        match self.state() {
            CallState::Idle => Ok(()),
            CallState::Closed => Err(NegotiationError::EngineClosed),
            state => Err(NegotiationError::AttemptInProgress(state)),
        }
    }

    async fn fail_attempt(&mut self, err: NegotiationError) {
        match &err {
            NegotiationError::AlreadySet { session, field } => {
                error!(
                    "Internal consistency failure: {} written twice on session {}",
                    field, session
                );
            }
            other => warn!("Call attempt failed: {}", other),
        }

        self.teardown(err.clone()).await;
        self.emit(NegotiatorEvent::AttemptFailed(err));
    }

    /// Stop the driver, unsubscribe, close the transport and return to
    /// `Idle`. A command still waiting on the flow is answered with `reason`.
    /// Idempotent.
    async fn teardown(&mut self, reason: NegotiationError) {
        self.generation += 1;

        let Some(mut attempt) = self.attempt.take() else {
            if self.state().is_active() {
                self.set_state(CallState::Idle);
            }
            return;
        };

        match &attempt.session_id {
            Some(session_id) => info!(
                "Tearing down {} attempt on session {}",
                attempt.role, session_id
            ),
            None => info!("Tearing down {} attempt before its session", attempt.role),
        }

        attempt.driver.abort();
        for subscription in attempt.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        if let Some(transport) = attempt.transport.take() {
            if let Err(e) = transport.close().await {
                warn!("Failed to close transport: {}", e);
            }
        }

        self.set_state(CallState::Idle);

        if let Some(reply) = attempt.reply.take() {
            reply.fail(reason);
        }
    }

    fn state(&self) -> CallState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: CallState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!("Call state {:?} -> {:?}", previous, state);
            self.emit(NegotiatorEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: NegotiatorEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }
}

/// Release what a finished attempt's driver handed over too late.
fn discard_stale(event: DriverEvent) {
    match event {
        DriverEvent::TransportReady(transport) => {
            debug!("Closing transport created by a finished attempt");
            tokio::spawn(async move {
                let _ = transport.close().await;
            });
        }
        DriverEvent::Subscribed(subscription) => subscription.unsubscribe(),
        _ => debug!("Dropping driver event from a finished attempt"),
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
