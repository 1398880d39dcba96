use crate::error::SignalingError;
use crate::signaling::{CandidateHandler, SessionHandler, SignalingChannel, Subscription};
use async_trait::async_trait;
use dashmap::DashMap;
use linkcall_core::{
    CallSession, CandidateRecord, NegotiationRole, SessionDescription, SessionField, SessionId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

struct SessionEntry {
    session: CallSession,
    offer_candidates: Vec<CandidateRecord>,
    answer_candidates: Vec<CandidateRecord>,
}

impl SessionEntry {
    fn candidates(&self, role: NegotiationRole) -> &Vec<CandidateRecord> {
        match role {
            NegotiationRole::Caller => &self.offer_candidates,
            NegotiationRole::Callee => &self.answer_candidates,
        }
    }

    fn candidates_mut(&mut self, role: NegotiationRole) -> &mut Vec<CandidateRecord> {
        match role {
            NegotiationRole::Caller => &mut self.offer_candidates,
            NegotiationRole::Callee => &mut self.answer_candidates,
        }
    }
}

enum Listener {
    Session(Arc<dyn Fn(CallSession) + Send + Sync>),
    Candidates(NegotiationRole, Arc<dyn Fn(CandidateRecord) + Send + Sync>),
}

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    by_session: HashMap<SessionId, Vec<(u64, Listener)>>,
}

impl ListenerRegistry {
    fn insert(&mut self, session_id: &SessionId, listener: Listener) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.by_session
            .entry(session_id.clone())
            .or_default()
            .push((id, listener));
        id
    }

    fn remove(&mut self, session_id: &SessionId, listener_id: u64) {
        if let Some(listeners) = self.by_session.get_mut(session_id) {
            listeners.retain(|(id, _)| *id != listener_id);
            if listeners.is_empty() {
                self.by_session.remove(session_id);
            }
        }
    }

    fn notify_session(&self, session: &CallSession) {
        let Some(listeners) = self.by_session.get(&session.id) else {
            return;
        };
        for (_, listener) in listeners {
            if let Listener::Session(handler) = listener {
                handler(session.clone());
            }
        }
    }

    fn notify_candidate(&self, session_id: &SessionId, role: NegotiationRole, record: &CandidateRecord) {
        let Some(listeners) = self.by_session.get(session_id) else {
            return;
        };
        for (_, listener) in listeners {
            if let Listener::Candidates(listened, handler) = listener {
                if *listened == role {
                    handler(record.clone());
                }
            }
        }
    }
}

struct MemoryInner {
    sessions: DashMap<SessionId, SessionEntry>,
    // Held while a write is applied and fanned out, so delivery order matches
    // write order and unsubscribe waits for in-flight deliveries.
    listeners: Mutex<ListenerRegistry>,
    available: AtomicBool,
    writes: DashMap<(SessionId, SessionField), usize>,
}

/// In-process [`SignalingChannel`] used by tests and the demo binary.
///
/// Handlers run synchronously on the writer's task, in store order.
#[derive(Clone)]
pub struct MemorySignalingChannel {
    inner: Arc<MemoryInner>,
}

impl Default for MemorySignalingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySignalingChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                sessions: DashMap::new(),
                listeners: Mutex::new(ListenerRegistry::default()),
                available: AtomicBool::new(true),
                writes: DashMap::new(),
            }),
        }
    }

    /// Simulate losing (or regaining) the connection to the backing store.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Deliver the current record to every session subscriber again, the way
    /// a store does after reconnecting.
    pub fn redeliver_session(&self, session_id: &SessionId) {
        let registry = self.inner.lock_listeners();
        if let Some(entry) = self.inner.sessions.get(session_id) {
            let session = entry.session.clone();
            drop(entry);
            registry.notify_session(&session);
        }
    }

    /// Number of live subscriptions on a session (record and candidates).
    pub fn listener_count(&self, session_id: &SessionId) -> usize {
        self.inner
            .lock_listeners()
            .by_session
            .get(session_id)
            .map_or(0, Vec::len)
    }

    /// Number of successful writes to one slot of a session.
    pub fn write_count(&self, session_id: &SessionId, field: SessionField) -> usize {
        self.inner
            .writes
            .get(&(session_id.clone(), field))
            .map_or(0, |count| *count)
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Snapshot of a candidate sequence, in append order.
    pub fn candidates(&self, session_id: &SessionId, role: NegotiationRole) -> Vec<CandidateRecord> {
        self.inner
            .sessions
            .get(session_id)
            .map(|entry| entry.candidates(role).clone())
            .unwrap_or_default()
    }

    fn set_field(
        &self,
        session_id: &SessionId,
        description: SessionDescription,
        field: SessionField,
    ) -> Result<(), SignalingError> {
        self.inner.check_available()?;

        let registry = self.inner.lock_listeners();
        let session = {
            let mut entry = self
                .inner
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| SignalingError::NotFound(session_id.clone()))?;

            if entry.session.field(field).is_some() {
                return Err(SignalingError::AlreadySet {
                    session: session_id.clone(),
                    field,
                });
            }
            match field {
                SessionField::Offer => entry.session.offer = Some(description),
                SessionField::Answer => entry.session.answer = Some(description),
            }
            entry.session.clone()
        };

        *self
            .inner
            .writes
            .entry((session_id.clone(), field))
            .or_insert(0) += 1;

        debug!("Session {} {} written", session_id, field);
        registry.notify_session(&session);
        Ok(())
    }
}

impl MemoryInner {
    fn check_available(&self) -> Result<(), SignalingError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SignalingError::StoreUnavailable(
                "memory store marked unavailable".to_owned(),
            ))
        }
    }

    fn lock_listeners(&self) -> MutexGuard<'_, ListenerRegistry> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unsubscriber(self: &Arc<Self>, session_id: SessionId, listener_id: u64) -> Subscription {
        let inner: Weak<MemoryInner> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.lock_listeners().remove(&session_id, listener_id);
                debug!("Listener {} on session {} removed", listener_id, session_id);
            }
        })
    }
}

#[async_trait]
impl SignalingChannel for MemorySignalingChannel {
    async fn create_session(&self) -> Result<SessionId, SignalingError> {
        self.inner.check_available()?;

        let session_id = SessionId::generate();
        self.inner.sessions.insert(
            session_id.clone(),
            SessionEntry {
                session: CallSession::new(session_id.clone()),
                offer_candidates: Vec::new(),
                answer_candidates: Vec::new(),
            },
        );

        debug!("Session {} created", session_id);
        Ok(session_id)
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<CallSession, SignalingError> {
        self.inner.check_available()?;

        self.inner
            .sessions
            .get(session_id)
            .map(|entry| entry.session.clone())
            .ok_or_else(|| SignalingError::NotFound(session_id.clone()))
    }

    async fn set_offer(
        &self,
        session_id: &SessionId,
        offer: SessionDescription,
    ) -> Result<(), SignalingError> {
        self.set_field(session_id, offer, SessionField::Offer)
    }

    async fn set_answer(
        &self,
        session_id: &SessionId,
        answer: SessionDescription,
    ) -> Result<(), SignalingError> {
        self.set_field(session_id, answer, SessionField::Answer)
    }

    async fn append_candidate(
        &self,
        session_id: &SessionId,
        role: NegotiationRole,
        record: CandidateRecord,
    ) -> Result<(), SignalingError> {
        self.inner.check_available()?;

        let registry = self.inner.lock_listeners();
        {
            let mut entry = self
                .inner
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| SignalingError::NotFound(session_id.clone()))?;
            entry.candidates_mut(role).push(record.clone());
        }

        debug!(
            "Session {} {} appended seq {}",
            session_id,
            role.candidate_collection(),
            record.seq
        );
        registry.notify_candidate(session_id, role, &record);
        Ok(())
    }

    async fn subscribe_session(
        &self,
        session_id: &SessionId,
        on_change: SessionHandler,
    ) -> Result<Subscription, SignalingError> {
        self.inner.check_available()?;

        let handler: Arc<dyn Fn(CallSession) + Send + Sync> = Arc::from(on_change);
        let mut registry = self.inner.lock_listeners();
        let current = self
            .inner
            .sessions
            .get(session_id)
            .map(|entry| entry.session.clone())
            .ok_or_else(|| SignalingError::NotFound(session_id.clone()))?;

        let listener_id = registry.insert(session_id, Listener::Session(handler.clone()));
        handler(current);
        drop(registry);

        Ok(self.inner.unsubscriber(session_id.clone(), listener_id))
    }

    async fn subscribe_candidates(
        &self,
        session_id: &SessionId,
        role: NegotiationRole,
        on_added: CandidateHandler,
    ) -> Result<Subscription, SignalingError> {
        self.inner.check_available()?;

        let handler: Arc<dyn Fn(CandidateRecord) + Send + Sync> = Arc::from(on_added);
        let mut registry = self.inner.lock_listeners();
        let existing = self
            .inner
            .sessions
            .get(session_id)
            .map(|entry| entry.candidates(role).clone())
            .ok_or_else(|| SignalingError::NotFound(session_id.clone()))?;

        let listener_id = registry.insert(session_id, Listener::Candidates(role, handler.clone()));
        for record in existing {
            handler(record);
        }
        drop(registry);

        Ok(self.inner.unsubscriber(session_id.clone(), listener_id))
    }
}
