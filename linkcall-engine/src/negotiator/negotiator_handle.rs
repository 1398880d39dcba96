use crate::error::NegotiationError;
use crate::negotiator::{
    CallSessionNegotiator, CallState, NegotiatorCommand, NegotiatorConfig, NegotiatorEvent,
};
use crate::signaling::SignalingChannel;
use crate::transport::PeerTransportFactory;
use linkcall_core::{JoinLink, SessionId, StartupRole};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info};

/// Cloneable front end to a running [`CallSessionNegotiator`].
#[derive(Clone)]
pub struct NegotiatorHandle {
    command_tx: mpsc::Sender<NegotiatorCommand>,
    state_rx: watch::Receiver<CallState>,
    event_tx: broadcast::Sender<NegotiatorEvent>,
}

impl NegotiatorHandle {
    pub(crate) fn new(
        command_tx: mpsc::Sender<NegotiatorCommand>,
        state_rx: watch::Receiver<CallState>,
        event_tx: broadcast::Sender<NegotiatorEvent>,
    ) -> Self {
        Self {
            command_tx,
            state_rx,
            event_tx,
        }
    }

    /// Build a negotiator and run it on the current tokio runtime.
    pub fn spawn(
        config: NegotiatorConfig,
        signaling: Arc<dyn SignalingChannel>,
        transports: Arc<dyn PeerTransportFactory>,
    ) -> Self {
        let (negotiator, handle) = CallSessionNegotiator::new(config, signaling, transports);

        tokio::spawn(async move {
            negotiator.run().await;
        });

        handle
    }

    /// Create a session, publish the offer and return the link to share.
    pub async fn start_call(&self) -> Result<JoinLink, NegotiationError> {
        let (reply, rx) = oneshot::channel();
        self.send(NegotiatorCommand::StartCall { reply }).await?;
        rx.await.map_err(|_| NegotiationError::EngineClosed)?
    }

    /// Answer the offer stored under `session_id`.
    pub async fn join_call(&self, session_id: SessionId) -> Result<(), NegotiationError> {
        let (reply, rx) = oneshot::channel();
        self.send(NegotiatorCommand::JoinCall { session_id, reply })
            .await?;
        rx.await.map_err(|_| NegotiationError::EngineClosed)?
    }

    /// Act on the role derived from the launch URL: join when a token was
    /// present, otherwise stay idle until [`start_call`](Self::start_call).
    pub async fn launch(&self, role: StartupRole) -> Result<(), NegotiationError> {
        match role {
            StartupRole::Callee(session_id) => {
                info!("Launched with join token, answering session {}", session_id);
                self.join_call(session_id).await
            }
            StartupRole::AwaitCaller => {
                debug!("Launched without join token, waiting for start_call");
                Ok(())
            }
        }
    }

    pub async fn hangup(&self) -> Result<(), NegotiationError> {
        let (reply, rx) = oneshot::channel();
        self.send(NegotiatorCommand::Hangup { reply }).await?;
        rx.await.map_err(|_| NegotiationError::EngineClosed)
    }

    /// Tear down any attempt and stop the negotiator loop.
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(NegotiatorCommand::Shutdown).await;
    }

    pub fn state(&self) -> CallState {
        *self.state_rx.borrow()
    }

    /// Whether a new attempt may start right now.
    pub fn can_start(&self) -> bool {
        self.state() == CallState::Idle
    }

    pub fn watch_state(&self) -> watch::Receiver<CallState> {
        self.state_rx.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<NegotiatorEvent> {
        self.event_tx.subscribe()
    }

    /// Wait until the negotiator reaches `target`. Returns false on timeout
    /// or if the negotiator stopped first.
    pub async fn wait_for_state(&self, target: CallState, timeout: Duration) -> bool {
        let mut rx = self.state_rx.clone();
        let reached = tokio::time::timeout(timeout, rx.wait_for(|state| *state == target)).await;
        matches!(reached, Ok(Ok(_)))
    }

    async fn send(&self, cmd: NegotiatorCommand) -> Result<(), NegotiationError> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| NegotiationError::EngineClosed)
    }
}
