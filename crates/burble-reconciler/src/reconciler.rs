//! The session reconciler: single writer of call lifecycle state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use burble_core::events::WidgetEvent;
use burble_core::types::{ConversationId, EndReason, JoinTarget, SessionStatus};
use burble_gateway::{EndCallRequest, Gateway, StartCallRequest};
use burble_session::{RemoteSession, SessionEvent, StatusMachine};
use burble_store::StateStore;

use crate::error::ReconcilerError;

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Identity the reconciler acts under: which tenant and which agent the
/// widget belongs to.
#[derive(Clone, Debug)]
pub struct AgentIdentity {
    pub agent_code: String,
    pub schema_name: String,
}

impl AgentIdentity {
    pub fn new(agent_code: impl Into<String>, schema_name: impl Into<String>) -> Self {
        Self {
            agent_code: agent_code.into(),
            schema_name: schema_name.into(),
        }
    }
}

/// Mediates between the gateway, the remote session, and the persistent
/// client state.
///
/// The reconciler owns the published session status. Remote status reports
/// flow in through [`Reconciler::on_remote_status_changed`] and are validated
/// against the lifecycle state machine before being republished; everything
/// the transport reports out of order is dropped.
///
/// All mutating operations take `op_lock` first, so concurrent starts, ends,
/// and remote disconnects serialize instead of interleaving.
pub struct Reconciler {
    gateway: Arc<dyn Gateway>,
    session: Arc<dyn RemoteSession>,
    store: Arc<StateStore>,
    identity: AgentIdentity,
    status: StatusMachine,
    conversation_id: Mutex<Option<ConversationId>>,
    /// One reconnect attempt per process lifetime.
    reconnect_attempted: AtomicBool,
    /// Set while a locally initiated teardown is running, so the remote's
    /// own disconnect reports during it do not trigger a second teardown.
    closing: AtomicBool,
    op_lock: tokio::sync::Mutex<()>,
    event_tx: broadcast::Sender<WidgetEvent>,
}

impl Reconciler {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        session: Arc<dyn RemoteSession>,
        store: Arc<StateStore>,
        identity: AgentIdentity,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            gateway,
            session,
            store,
            identity,
            status: StatusMachine::new(),
            conversation_id: Mutex::new(None),
            reconnect_attempted: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            op_lock: tokio::sync::Mutex::new(()),
            event_tx,
        }
    }

    /// The published session status.
    pub fn status(&self) -> SessionStatus {
        self.status.current()
    }

    /// Subscribe to widget events.
    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.event_tx.subscribe()
    }

    /// Begin a new call segment.
    ///
    /// Requests a call from the gateway, persists the issued identifier, and
    /// joins the remote session. If the persistent state still holds a call
    /// identifier, it is sent as `prior_call_id` so the backend threads the
    /// new segment into the existing conversation.
    ///
    /// On gateway failure nothing is persisted and the status rolls back to
    /// `Disconnected`.
    pub async fn start_new_call(
        &self,
        form: Option<burble_core::types::FormFields>,
    ) -> Result<JoinTarget, ReconcilerError> {
        let _guard = self.op_lock.lock().await;

        // Entering Connecting is only valid from Disconnected, which rejects
        // a second start while a call is active or settling.
        self.status
            .transition(SessionStatus::Connecting)
            .map_err(|_| ReconcilerError::AlreadyActive(self.status.current()))?;

        let mut req = StartCallRequest::new(
            self.identity.agent_code.clone(),
            self.identity.schema_name.clone(),
        );
        if let Some(prior) = self.store.call_id() {
            req = req.resuming(prior);
        }
        if let Some(form) = form {
            req = req.with_form(form);
        }

        let resp = match self.gateway.start_call(req).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "start-call failed; rolling back");
                self.status.force(SessionStatus::Disconnected);
                self.emit(WidgetEvent::GatewayFailed {
                    operation: "start-call".to_string(),
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(e.into());
            }
        };

        self.store.record_call(resp.call_id.clone())?;
        *self
            .conversation_id
            .lock()
            .expect("conversation id mutex poisoned") = Some(resp.call_session_id.clone());

        info!(call_id = %resp.call_id, conversation_id = %resp.call_session_id, "Call started");

        // A join failure is not fatal here: the call exists on the backend
        // and the transport will report its own status as it settles.
        if let Err(e) = self.session.join(&resp.join_url).await {
            warn!(error = %e, "Session join failed after start");
        }

        self.emit(WidgetEvent::CallStarted {
            call_id: resp.call_id,
            conversation_id: resp.call_session_id,
            timestamp: Utc::now(),
        });

        Ok(resp.join_url)
    }

    /// Resume a persisted call after a restart, if one is pending.
    ///
    /// Runs at most once per process lifetime. Returns `Ok(false)` when there
    /// is nothing to resume. The speaker is muted before joining so the
    /// resumed agent does not start talking over a page that just reloaded.
    ///
    /// On gateway failure the persisted state is kept, so a later attempt
    /// (next restart) can still resume.
    pub async fn reconnect_if_pending(&self) -> Result<bool, ReconcilerError> {
        if self.reconnect_attempted.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }

        let _guard = self.op_lock.lock().await;

        let Some(prior) = self.store.call_id() else {
            return Ok(false);
        };
        if self.status.current() != SessionStatus::Disconnected {
            return Ok(false);
        }

        info!(prior_call_id = %prior, "Resuming persisted call");
        self.status
            .transition(SessionStatus::Connecting)
            .map_err(|_| ReconcilerError::AlreadyActive(self.status.current()))?;

        self.session.mute_speaker().await;

        let req = StartCallRequest::new(
            self.identity.agent_code.clone(),
            self.identity.schema_name.clone(),
        )
        .resuming(prior.clone());

        let resp = match self.gateway.start_call(req).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "Resume failed; keeping persisted state");
                self.status.force(SessionStatus::Disconnected);
                self.emit(WidgetEvent::GatewayFailed {
                    operation: "start-call".to_string(),
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(e.into());
            }
        };

        self.store.record_call(resp.call_id.clone())?;
        *self
            .conversation_id
            .lock()
            .expect("conversation id mutex poisoned") = Some(resp.call_session_id.clone());

        if let Err(e) = self.session.join(&resp.join_url).await {
            warn!(error = %e, "Session join failed after resume");
        }

        self.emit(WidgetEvent::CallResumed {
            call_id: resp.call_id,
            prior_call_id: prior,
            timestamp: Utc::now(),
        });

        Ok(true)
    }

    /// End the active call and settle the conversation.
    pub async fn end_call(&self, reason: EndReason) -> Result<(), ReconcilerError> {
        let _guard = self.op_lock.lock().await;
        if self.status.current() == SessionStatus::Disconnected {
            return Err(ReconcilerError::NotActive);
        }

        self.closing.store(true, Ordering::SeqCst);
        let result = self.teardown(reason).await;
        self.closing.store(false, Ordering::SeqCst);
        result
    }

    /// Shared teardown path. Caller must hold `op_lock`.
    ///
    /// If a refresh is pending, the conversation is deliberately left open:
    /// no end request is sent and the persisted identifiers are kept, so the
    /// reloaded process can resume the call.
    async fn teardown(&self, reason: EndReason) -> Result<(), ReconcilerError> {
        if let Err(e) = self.session.leave().await {
            debug!(error = %e, "Session leave during teardown");
        }
        self.status.force(SessionStatus::Disconnecting);

        if self.store.refresh_pending() {
            debug!("Refresh pending; leaving conversation open for resume");
            self.status.force(SessionStatus::Disconnected);
            return Ok(());
        }

        let conversation = self
            .conversation_id
            .lock()
            .expect("conversation id mutex poisoned")
            .take();
        let segments = self.store.call_session_ids();

        match conversation {
            Some(conversation_id) => {
                let req = EndCallRequest {
                    call_session_id: conversation_id,
                    schema_name: self.identity.schema_name.clone(),
                    prior_call_ids: segments.clone(),
                };
                // The local call is over either way; a failed settle must not
                // leave stale identifiers behind to be resumed later.
                if let Err(e) = self.gateway.end_call_session(req).await {
                    warn!(error = %e, "end-call-session failed; clearing local state anyway");
                    self.emit(WidgetEvent::GatewayFailed {
                        operation: "end-call-session".to_string(),
                        message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
            None => {
                debug!("No conversation id at teardown; skipping end request");
            }
        }

        self.store.clear()?;
        self.status.force(SessionStatus::Disconnected);

        info!(reason = %reason, segments = segments.len(), "Call ended");
        self.emit(WidgetEvent::CallEnded {
            reason,
            segments: segments.len(),
            timestamp: Utc::now(),
        });

        Ok(())
    }

    /// Apply a status reported by the remote transport.
    ///
    /// A remote-initiated disconnect runs the full teardown (settling the
    /// conversation with the gateway) unless a local end is already doing so.
    /// Any report that is not a valid transition from the published status is
    /// dropped.
    pub async fn on_remote_status_changed(&self, reported: SessionStatus) {
        if reported == self.status.current() {
            return;
        }

        let remote_ended = matches!(
            reported,
            SessionStatus::Disconnecting | SessionStatus::Disconnected
        );
        if remote_ended && !self.closing.load(Ordering::SeqCst) {
            let _guard = self.op_lock.lock().await;
            if self.status.current() == SessionStatus::Disconnected {
                return;
            }
            info!(reported = %reported, "Remote ended the session");
            if let Err(e) = self.teardown(EndReason::Remote).await {
                warn!(error = %e, "Teardown after remote disconnect failed");
            }
            return;
        }

        match self.status.transition(reported) {
            Ok(from) => {
                self.emit(WidgetEvent::StatusChanged {
                    from,
                    to: reported,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                debug!(error = %e, "Dropping out-of-order remote status");
            }
        }
    }

    /// Send a chat message over the live session.
    pub async fn send_text(&self, text: &str) -> Result<(), ReconcilerError> {
        if !self.status.current().is_live() {
            return Err(ReconcilerError::NotActive);
        }
        self.session.send_text(text).await?;
        Ok(())
    }

    /// Mark that the host page is about to unload; teardown will keep the
    /// conversation resumable instead of ending it.
    pub fn begin_unload(&self) -> Result<(), ReconcilerError> {
        self.store.set_refreshing()?;
        Ok(())
    }

    /// Mark that the host page finished loading.
    pub fn finish_load(&self) -> Result<(), ReconcilerError> {
        self.store.clear_refreshing()?;
        Ok(())
    }

    /// Whether persisted conversation state exists.
    pub fn has_persisted_call(&self) -> bool {
        self.store.call_id().is_some()
    }

    pub async fn mute_speaker(&self) {
        self.session.mute_speaker().await;
    }

    pub async fn unmute_speaker(&self) {
        self.session.unmute_speaker().await;
    }

    pub fn is_speaker_muted(&self) -> bool {
        self.session.is_speaker_muted()
    }

    /// Spawn the pump that forwards session events into the reconciler.
    ///
    /// Status reports go through [`Reconciler::on_remote_status_changed`];
    /// transcript and data payloads are republished as widget events.
    pub fn run_event_pump(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut rx = this.session.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(SessionEvent::StatusChanged(status)) => {
                        this.on_remote_status_changed(status).await;
                    }
                    Ok(SessionEvent::TranscriptUpdated(text)) => {
                        this.emit(WidgetEvent::TranscriptUpdated {
                            text,
                            timestamp: Utc::now(),
                        });
                    }
                    Ok(SessionEvent::DataReceived(payload)) => {
                        this.emit(WidgetEvent::DataReceived {
                            payload,
                            timestamp: Utc::now(),
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event pump lagged behind the session");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn emit(&self, event: WidgetEvent) {
        // No receivers is fine; events are best-effort notifications.
        let _ = self.event_tx.send(event);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use tokio::sync::broadcast::error::TryRecvError;

    use burble_core::types::{CallId, FormFields, WidgetTheme};
    use burble_gateway::{GatewayError, StartCallResponse};
    use burble_session::SessionError;

    struct MockGateway {
        fail_start: AtomicBool,
        fail_end: AtomicBool,
        call_counter: AtomicUsize,
        start_requests: Mutex<Vec<serde_json::Value>>,
        end_requests: Mutex<Vec<serde_json::Value>>,
    }

    impl MockGateway {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fail_start: AtomicBool::new(false),
                fail_end: AtomicBool::new(false),
                call_counter: AtomicUsize::new(0),
                start_requests: Mutex::new(Vec::new()),
                end_requests: Mutex::new(Vec::new()),
            })
        }

        fn start_requests(&self) -> Vec<serde_json::Value> {
            self.start_requests.lock().unwrap().clone()
        }

        fn end_requests(&self) -> Vec<serde_json::Value> {
            self.end_requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Gateway for MockGateway {
        async fn start_call(
            &self,
            req: StartCallRequest,
        ) -> Result<StartCallResponse, GatewayError> {
            self.start_requests
                .lock()
                .unwrap()
                .push(serde_json::to_value(&req).unwrap());
            if self.fail_start.load(Ordering::SeqCst) {
                return Err(GatewayError::Status {
                    operation: "start-call",
                    status: 503,
                });
            }
            let n = self.call_counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(StartCallResponse {
                call_id: CallId::new(format!("call-{n}")),
                join_url: JoinTarget::new(format!("wss://media.test/room/{n}")),
                call_session_id: ConversationId::new("conv-1"),
            })
        }

        async fn end_call_session(&self, req: EndCallRequest) -> Result<(), GatewayError> {
            self.end_requests
                .lock()
                .unwrap()
                .push(serde_json::to_value(&req).unwrap());
            if self.fail_end.load(Ordering::SeqCst) {
                return Err(GatewayError::Status {
                    operation: "end-call-session",
                    status: 500,
                });
            }
            Ok(())
        }

        async fn widget_settings(
            &self,
            _schema: &str,
            _agent: &str,
        ) -> Result<WidgetTheme, GatewayError> {
            Ok(WidgetTheme::default())
        }
    }

    /// Records the order of operations so tests can assert sequencing, like
    /// mute-before-join on resume.
    struct FakeSession {
        ops: Mutex<Vec<String>>,
        muted: AtomicBool,
        event_tx: broadcast::Sender<SessionEvent>,
    }

    impl FakeSession {
        fn new() -> Arc<Self> {
            let (event_tx, _) = broadcast::channel(16);
            Arc::new(Self {
                ops: Mutex::new(Vec::new()),
                muted: AtomicBool::new(false),
                event_tx,
            })
        }

        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }

        fn record(&self, op: impl Into<String>) {
            self.ops.lock().unwrap().push(op.into());
        }
    }

    #[async_trait]
    impl RemoteSession for FakeSession {
        async fn join(&self, target: &JoinTarget) -> Result<(), SessionError> {
            self.record(format!("join:{target}"));
            Ok(())
        }

        async fn leave(&self) -> Result<(), SessionError> {
            self.record("leave");
            Ok(())
        }

        async fn mute_speaker(&self) {
            self.record("mute");
            self.muted.store(true, Ordering::SeqCst);
        }

        async fn unmute_speaker(&self) {
            self.record("unmute");
            self.muted.store(false, Ordering::SeqCst);
        }

        fn is_speaker_muted(&self) -> bool {
            self.muted.load(Ordering::SeqCst)
        }

        async fn send_text(&self, text: &str) -> Result<(), SessionError> {
            self.record(format!("send:{text}"));
            Ok(())
        }

        fn status(&self) -> SessionStatus {
            SessionStatus::Disconnected
        }

        fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
            self.event_tx.subscribe()
        }
    }

    struct Fixture {
        gateway: Arc<MockGateway>,
        session: Arc<FakeSession>,
        store: Arc<StateStore>,
        reconciler: Arc<Reconciler>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StateStore::open(dir.path().join("state.json")).unwrap());
        let gateway = MockGateway::new();
        let session = FakeSession::new();
        let reconciler = Arc::new(Reconciler::new(
            gateway.clone(),
            session.clone(),
            store.clone(),
            AgentIdentity::new("agent-7", "acme"),
        ));
        Fixture {
            gateway,
            session,
            store,
            reconciler,
            _dir: dir,
        }
    }

    fn drain(rx: &mut broadcast::Receiver<WidgetEvent>) -> Vec<WidgetEvent> {
        let mut out = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => out.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
        out
    }

    #[tokio::test]
    async fn test_start_persists_and_joins() {
        let f = fixture();
        let mut rx = f.reconciler.subscribe();

        let target = f.reconciler.start_new_call(None).await.unwrap();
        assert_eq!(target.as_str(), "wss://media.test/room/1");

        assert_eq!(f.store.call_id(), Some(CallId::new("call-1")));
        assert_eq!(f.store.call_session_ids(), vec![CallId::new("call-1")]);
        assert_eq!(f.reconciler.status(), SessionStatus::Connecting);
        assert_eq!(f.session.ops(), vec!["join:wss://media.test/room/1"]);

        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [WidgetEvent::CallStarted { call_id, .. }] if call_id == &CallId::new("call-1")
        ));
    }

    #[tokio::test]
    async fn test_start_sends_form_fields() {
        let f = fixture();
        let mut form = FormFields::new();
        form.insert("name".to_string(), "Ada".to_string());
        f.reconciler.start_new_call(Some(form)).await.unwrap();

        let reqs = f.gateway.start_requests();
        assert_eq!(reqs[0]["custom_form_fields"]["name"], "Ada");
        assert!(reqs[0].get("prior_call_id").is_none());
    }

    #[tokio::test]
    async fn test_second_start_rejected_while_active() {
        let f = fixture();
        f.reconciler.start_new_call(None).await.unwrap();

        let err = f.reconciler.start_new_call(None).await.unwrap_err();
        assert!(matches!(err, ReconcilerError::AlreadyActive(_)));
        // Only the first start reached the gateway.
        assert_eq!(f.gateway.start_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_start_failure_rolls_back() {
        let f = fixture();
        f.gateway.fail_start.store(true, Ordering::SeqCst);
        let mut rx = f.reconciler.subscribe();

        let err = f.reconciler.start_new_call(None).await.unwrap_err();
        assert!(matches!(err, ReconcilerError::Gateway(_)));

        assert!(f.store.is_empty());
        assert_eq!(f.reconciler.status(), SessionStatus::Disconnected);
        assert!(f.session.ops().is_empty());

        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [WidgetEvent::GatewayFailed { operation, .. }] if operation == "start-call"
        ));

        // The rollback leaves the reconciler startable again.
        f.gateway.fail_start.store(false, Ordering::SeqCst);
        f.reconciler.start_new_call(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_start_threads_prior_call_into_conversation() {
        let f = fixture();
        f.store.record_call(CallId::new("old-call")).unwrap();

        f.reconciler.start_new_call(None).await.unwrap();

        let reqs = f.gateway.start_requests();
        assert_eq!(reqs[0]["prior_call_id"], "old-call");
        assert_eq!(
            f.store.call_session_ids(),
            vec![CallId::new("old-call"), CallId::new("call-1")]
        );
    }

    #[tokio::test]
    async fn test_reconnect_resumes_persisted_call_muted() {
        let f = fixture();
        f.store.record_call(CallId::new("old-call")).unwrap();
        let mut rx = f.reconciler.subscribe();

        let resumed = f.reconciler.reconnect_if_pending().await.unwrap();
        assert!(resumed);

        let reqs = f.gateway.start_requests();
        assert_eq!(reqs[0]["prior_call_id"], "old-call");

        // Speaker muted before the join, not after.
        assert_eq!(
            f.session.ops(),
            vec!["mute", "join:wss://media.test/room/1"]
        );
        assert!(f.reconciler.is_speaker_muted());

        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [WidgetEvent::CallResumed { call_id, prior_call_id, .. }]
                if call_id == &CallId::new("call-1") && prior_call_id == &CallId::new("old-call")
        ));
    }

    #[tokio::test]
    async fn test_reconnect_without_state_is_noop() {
        let f = fixture();
        let resumed = f.reconciler.reconnect_if_pending().await.unwrap();
        assert!(!resumed);
        assert!(f.gateway.start_requests().is_empty());
        assert_eq!(f.reconciler.status(), SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_runs_at_most_once() {
        let f = fixture();
        f.store.record_call(CallId::new("old-call")).unwrap();

        assert!(f.reconciler.reconnect_if_pending().await.unwrap());
        assert!(!f.reconciler.reconnect_if_pending().await.unwrap());
        assert_eq!(f.gateway.start_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_failure_keeps_persisted_state() {
        let f = fixture();
        f.store.record_call(CallId::new("old-call")).unwrap();
        f.gateway.fail_start.store(true, Ordering::SeqCst);

        let err = f.reconciler.reconnect_if_pending().await.unwrap_err();
        assert!(matches!(err, ReconcilerError::Gateway(_)));

        assert_eq!(f.store.call_id(), Some(CallId::new("old-call")));
        assert_eq!(f.reconciler.status(), SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_end_call_settles_all_segments_and_clears() {
        let f = fixture();
        f.store.record_call(CallId::new("old-call")).unwrap();
        f.reconciler.start_new_call(None).await.unwrap();
        let mut rx = f.reconciler.subscribe();

        f.reconciler.end_call(EndReason::UserClosed).await.unwrap();

        let ends = f.gateway.end_requests();
        assert_eq!(ends.len(), 1);
        assert_eq!(ends[0]["call_session_id"], "conv-1");
        assert_eq!(ends[0]["schema_name"], "acme");
        assert_eq!(
            ends[0]["prior_call_ids"],
            serde_json::json!(["old-call", "call-1"])
        );

        assert!(f.store.is_empty());
        assert_eq!(f.reconciler.status(), SessionStatus::Disconnected);
        assert!(f.session.ops().contains(&"leave".to_string()));

        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [WidgetEvent::CallEnded { reason: EndReason::UserClosed, segments: 2, .. }]
        ));
    }

    #[tokio::test]
    async fn test_end_call_without_active_call_errors() {
        let f = fixture();
        let err = f.reconciler.end_call(EndReason::UserClosed).await.unwrap_err();
        assert!(matches!(err, ReconcilerError::NotActive));
        assert!(f.gateway.end_requests().is_empty());
    }

    #[tokio::test]
    async fn test_end_gateway_failure_still_clears_state() {
        let f = fixture();
        f.reconciler.start_new_call(None).await.unwrap();
        f.gateway.fail_end.store(true, Ordering::SeqCst);
        let mut rx = f.reconciler.subscribe();

        f.reconciler.end_call(EndReason::UserToggledOff).await.unwrap();

        assert!(f.store.is_empty());
        assert_eq!(f.reconciler.status(), SessionStatus::Disconnected);

        let events = drain(&mut rx);
        assert!(matches!(
            &events[0],
            WidgetEvent::GatewayFailed { operation, .. } if operation == "end-call-session"
        ));
        assert!(matches!(
            &events[1],
            WidgetEvent::CallEnded { reason: EndReason::UserToggledOff, .. }
        ));
    }

    #[tokio::test]
    async fn test_refresh_pending_keeps_conversation_open() {
        let f = fixture();
        f.reconciler.start_new_call(None).await.unwrap();
        f.reconciler.begin_unload().unwrap();

        f.reconciler.end_call(EndReason::Remote).await.unwrap();

        // No end request, identifiers kept for the reloaded process.
        assert!(f.gateway.end_requests().is_empty());
        assert_eq!(f.store.call_id(), Some(CallId::new("call-1")));
        assert_eq!(f.reconciler.status(), SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_remote_status_flows_through_validated() {
        let f = fixture();
        f.reconciler.start_new_call(None).await.unwrap();
        let mut rx = f.reconciler.subscribe();

        f.reconciler
            .on_remote_status_changed(SessionStatus::Connected)
            .await;
        f.reconciler
            .on_remote_status_changed(SessionStatus::Listening)
            .await;
        assert_eq!(f.reconciler.status(), SessionStatus::Listening);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            WidgetEvent::StatusChanged {
                from: SessionStatus::Connecting,
                to: SessionStatus::Connected,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_out_of_order_remote_status_dropped() {
        let f = fixture();
        let mut rx = f.reconciler.subscribe();

        // Speaking while disconnected is not a valid transition.
        f.reconciler
            .on_remote_status_changed(SessionStatus::Speaking)
            .await;
        assert_eq!(f.reconciler.status(), SessionStatus::Disconnected);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_remote_disconnect_triggers_full_teardown() {
        let f = fixture();
        f.reconciler.start_new_call(None).await.unwrap();
        f.reconciler
            .on_remote_status_changed(SessionStatus::Connected)
            .await;
        let mut rx = f.reconciler.subscribe();

        f.reconciler
            .on_remote_status_changed(SessionStatus::Disconnecting)
            .await;

        assert_eq!(f.gateway.end_requests().len(), 1);
        assert!(f.store.is_empty());
        assert_eq!(f.reconciler.status(), SessionStatus::Disconnected);

        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [WidgetEvent::CallEnded { reason: EndReason::Remote, .. }]
        ));
    }

    #[tokio::test]
    async fn test_remote_disconnect_when_idle_is_ignored() {
        let f = fixture();
        f.reconciler
            .on_remote_status_changed(SessionStatus::Disconnected)
            .await;
        assert!(f.gateway.end_requests().is_empty());
        assert_eq!(f.reconciler.status(), SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_send_text_requires_live_session() {
        let f = fixture();
        let err = f.reconciler.send_text("hello").await.unwrap_err();
        assert!(matches!(err, ReconcilerError::NotActive));

        f.reconciler.start_new_call(None).await.unwrap();
        // Still only connecting, not live.
        let err = f.reconciler.send_text("hello").await.unwrap_err();
        assert!(matches!(err, ReconcilerError::NotActive));

        f.reconciler
            .on_remote_status_changed(SessionStatus::Connected)
            .await;
        f.reconciler.send_text("hello").await.unwrap();
        assert!(f.session.ops().contains(&"send:hello".to_string()));
    }

    #[tokio::test]
    async fn test_finish_load_clears_refresh_flag() {
        let f = fixture();
        f.reconciler.begin_unload().unwrap();
        assert!(f.store.refresh_pending());
        f.reconciler.finish_load().unwrap();
        assert!(!f.store.refresh_pending());
    }

    #[tokio::test]
    async fn test_event_pump_forwards_session_events() {
        let f = fixture();
        f.reconciler.start_new_call(None).await.unwrap();
        let mut rx = f.reconciler.subscribe();
        let pump = f.reconciler.run_event_pump();

        f.session
            .event_tx
            .send(SessionEvent::StatusChanged(SessionStatus::Connected))
            .unwrap();
        f.session
            .event_tx
            .send(SessionEvent::TranscriptUpdated("hi there".to_string()))
            .unwrap();

        let first = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            first,
            WidgetEvent::StatusChanged {
                to: SessionStatus::Connected,
                ..
            }
        ));

        let second = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            second,
            WidgetEvent::TranscriptUpdated { text, .. } if text == "hi there"
        ));

        pump.abort();
    }
}
