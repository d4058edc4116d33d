//! # Subscription state machine
//!
//! The core entity of the harness. A [`Subscription`] layers protocol
//! semantics (RFC 6665 subscription state, presence snapshots, refer
//! progress) on top of the waitable queue and the correlation rules.
//!
//! Threading contract: the transport delivery thread only ever touches a
//! subscription through [`Subscription::enqueue_notify`],
//! [`Subscription::offer_response`] and the error log. All state
//! mutation happens on the test thread that calls
//! [`Subscription::process_notify`] /
//! [`Subscription::process_subscribe_response`]. At most one waiter at a
//! time per subscription is a caller responsibility.

pub mod presence;
pub mod refer;
pub mod state;

pub use presence::PresenceState;
pub use refer::{ReferFragment, ReferState};
pub use state::{ExpiryTimer, SubscriptionStatus};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::events::{ResponseTracker, WaitQueue};
use crate::presence::pidf;
use crate::presence::{PresenceDeviceInfo, PresenceExtension, PresenceNote, PresenceSnapshot};
use crate::sip::headers::{parse_sipfrag_cseq, EventHeader, SubscriptionStateHeader};
use crate::sip::message::{SipRequest, SipResponse, StatusCode};
use crate::sip::transport::SipTransport;

/// Termination reason pre-set on one-shot presence fetches
pub const FETCH_TERMINATION_REASON: &str = "Presence fetch";

/// Event package a subscription belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Presence,
    Refer,
    Conference,
}

impl EventType {
    /// The Event header package name for this type
    pub fn package_name(&self) -> &'static str {
        match self {
            EventType::Presence => "presence",
            EventType::Refer => "refer",
            EventType::Conference => "conference",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.package_name())
    }
}

/// Unique address of a subscription: `(dialog id, event type, event id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub dialog_id: String,
    pub event_type: EventType,
    pub event_id: Option<String>,
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.event_id {
            Some(id) => write!(f, "{}/{};id={}", self.dialog_id, self.event_type, id),
            None => write!(f, "{}/{}", self.dialog_id, self.event_type),
        }
    }
}

/// Kind-specific half of a subscription
pub enum SubscriptionKind {
    Presence(PresenceState),
    Refer(ReferState),
}

struct StateFields {
    status: SubscriptionStatus,
    expiry: Option<ExpiryTimer>,
    granted_expires: Option<u32>,
    termination_reason: Option<String>,
}

/// One event subscription held by the harness
///
/// Created when the test issues a SUBSCRIBE, REFER, or one-shot fetch;
/// mutated by response processing and each correlated NOTIFY; never
/// destroyed by the engine itself (retirement is a registry concern).
pub struct Subscription {
    key: SubscriptionKey,
    target: String,
    kind: SubscriptionKind,
    requested_expires: u32,
    is_fetch: bool,
    initial_cseq: u32,
    state: Mutex<StateFields>,
    notify_queue: WaitQueue<SipRequest>,
    requests: Mutex<Vec<SipRequest>>,
    responses: ResponseTracker,
    errors: Mutex<Vec<String>>,
    last_notify_response: Mutex<Option<SipResponse>>,
    transport: Arc<dyn SipTransport>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("target", &self.target)
            .field("requested_expires", &self.requested_expires)
            .field("is_fetch", &self.is_fetch)
            .field("initial_cseq", &self.initial_cseq)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    fn new(
        key: SubscriptionKey,
        target: String,
        kind: SubscriptionKind,
        requested_expires: u32,
        is_fetch: bool,
        initial_cseq: u32,
        transport: Arc<dyn SipTransport>,
    ) -> Self {
        let (status, termination_reason) = if is_fetch {
            // Fetch subscriptions are terminated before any response is
            // even processed; a later terminal NOTIFY may override the
            // reason.
            (
                SubscriptionStatus::Terminated,
                Some(FETCH_TERMINATION_REASON.to_string()),
            )
        } else {
            (SubscriptionStatus::Pending, None)
        };

        Subscription {
            key,
            target,
            kind,
            requested_expires,
            is_fetch,
            initial_cseq,
            state: Mutex::new(StateFields {
                status,
                expiry: None,
                granted_expires: None,
                termination_reason,
            }),
            notify_queue: WaitQueue::new(),
            requests: Mutex::new(Vec::new()),
            responses: ResponseTracker::new(),
            errors: Mutex::new(Vec::new()),
            last_notify_response: Mutex::new(None),
            transport,
        }
    }

    /// A presence subscription awaiting its SUBSCRIBE response
    pub fn presence(
        target: impl Into<String>,
        dialog_id: impl Into<String>,
        event_id: Option<String>,
        requested_expires: u32,
        initial_cseq: u32,
        transport: Arc<dyn SipTransport>,
    ) -> Self {
        let key = SubscriptionKey {
            dialog_id: dialog_id.into(),
            event_type: EventType::Presence,
            event_id,
        };
        Self::new(
            key,
            target.into(),
            SubscriptionKind::Presence(PresenceState::new()),
            requested_expires,
            false,
            initial_cseq,
            transport,
        )
    }

    /// A one-shot presence fetch (requested expiry 0, pre-terminated)
    pub fn fetch(
        target: impl Into<String>,
        dialog_id: impl Into<String>,
        event_id: Option<String>,
        initial_cseq: u32,
        transport: Arc<dyn SipTransport>,
    ) -> Self {
        let key = SubscriptionKey {
            dialog_id: dialog_id.into(),
            event_type: EventType::Presence,
            event_id,
        };
        Self::new(
            key,
            target.into(),
            SubscriptionKind::Presence(PresenceState::new()),
            0,
            true,
            initial_cseq,
            transport,
        )
    }

    /// The implicit subscription created by an outgoing REFER
    pub fn refer(
        refer_to: impl Into<String>,
        dialog_id: impl Into<String>,
        event_id: Option<String>,
        initial_cseq: u32,
        transport: Arc<dyn SipTransport>,
    ) -> Self {
        let key = SubscriptionKey {
            dialog_id: dialog_id.into(),
            event_type: EventType::Refer,
            event_id,
        };
        Self::new(
            key,
            refer_to.into(),
            SubscriptionKind::Refer(ReferState::new()),
            0,
            false,
            initial_cseq,
            transport,
        )
    }

    // --- identity ---

    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    pub fn dialog_id(&self) -> &str {
        &self.key.dialog_id
    }

    pub fn event_type(&self) -> EventType {
        self.key.event_type
    }

    pub fn event_id(&self) -> Option<&str> {
        self.key.event_id.as_deref()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_fetch(&self) -> bool {
        self.is_fetch
    }

    /// CSeq of the request that created this subscription, used to route
    /// responses back to it
    pub fn initial_cseq(&self) -> u32 {
        self.initial_cseq
    }

    // --- state introspection ---

    pub fn status(&self) -> SubscriptionStatus {
        self.state.lock().status
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().status.is_terminated()
    }

    pub fn termination_reason(&self) -> Option<String> {
        self.state.lock().termination_reason.clone()
    }

    /// The expiry currently in force, in seconds
    pub fn expiry_secs(&self) -> u32 {
        self.state
            .lock()
            .granted_expires
            .unwrap_or(self.requested_expires)
    }

    /// Seconds left before expiry, recomputed against the receipt instant
    pub fn time_left_secs(&self) -> u32 {
        self.state
            .lock()
            .expiry
            .map(|t| t.time_left_secs())
            .unwrap_or(0)
    }

    // --- delivery-thread entry points (non-blocking) ---

    /// Record and queue an inbound NOTIFY for the waiting test thread
    pub(crate) fn enqueue_notify(&self, request: SipRequest) {
        self.requests.lock().push(request.clone());
        self.notify_queue.push(request);
    }

    /// Hand a received SUBSCRIBE/REFER response to the consumer side
    pub(crate) fn offer_response(&self, response: SipResponse) {
        self.responses.offer(response);
    }

    /// Append a diagnostic entry to the event error log
    pub(crate) fn log_event_error(&self, message: String) {
        warn!(subscription = %self.key, "{}", message);
        self.errors.lock().push(message);
    }

    // --- histories (copy-on-read) ---

    pub fn all_requests(&self) -> Vec<SipRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<SipRequest> {
        self.requests.lock().last().cloned()
    }

    pub fn all_responses(&self) -> Vec<SipResponse> {
        self.responses.all()
    }

    pub fn last_response(&self) -> Option<SipResponse> {
        self.responses.last()
    }

    /// The response `process_notify` last decided should be sent
    pub fn last_notify_response(&self) -> Option<SipResponse> {
        self.last_notify_response.lock().clone()
    }

    // --- error log ---

    pub fn event_errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// Explicit caller-driven reset of the error log
    pub fn clear_event_errors(&self) {
        self.errors.lock().clear();
    }

    // --- subscribe/refer response processing ---

    /// Append a received response to the history and apply its semantics
    ///
    /// Provisional responses are only recorded. A final 2xx activates the
    /// subscription and starts the expiry timer from the granted value; a
    /// final failure terminates it with the reason phrase. Fetches keep
    /// their pre-set termination state either way.
    pub fn record_subscribe_response(&self, response: &SipResponse) {
        self.responses.note(response.clone());
        if !response.status.is_final() {
            return;
        }

        let mut state = self.state.lock();
        if response.status.is_success() {
            let granted = response.expires.unwrap_or(self.requested_expires);
            state.granted_expires = Some(granted);
            if self.is_fetch {
                return;
            }
            if state.status.can_advance_to(SubscriptionStatus::Active) {
                state.status = SubscriptionStatus::Active;
                state.expiry = Some(ExpiryTimer::new(granted));
            }
        } else if !self.is_fetch && state.status.can_advance_to(SubscriptionStatus::Terminated) {
            state.status = SubscriptionStatus::Terminated;
            state.termination_reason = Some(response.status.reason_phrase().to_string());
        }
    }

    /// Wait for the SUBSCRIBE/REFER transaction to settle
    ///
    /// Drains every queued response for the transaction, applying
    /// [`Self::record_subscribe_response`] to each, and returns `true`
    /// once a final response has been seen. Returns `false` on timeout
    /// with no terminal response.
    pub fn process_subscribe_response(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(response) = self.responses.wait_next(remaining) else {
                return false;
            };
            self.record_subscribe_response(&response);
            if response.status.is_final() {
                // Retransmitted finals may still be queued behind it.
                while let Some(extra) = self.responses.try_next() {
                    self.record_subscribe_response(&extra);
                }
                return true;
            }
        }
    }

    // --- notify processing ---

    /// Block until a correlated NOTIFY arrives, or the timeout elapses
    pub fn wait_notify(&self, timeout: Duration) -> Option<SipRequest> {
        self.notify_queue.wait_next(timeout)
    }

    /// Process one inbound NOTIFY and build the response to send back
    ///
    /// Validates the event id (defensively; the correlator already did),
    /// applies the Subscription-State header, and parses the body. On any
    /// validation or parse failure the response is 400-class, an error is
    /// recorded, and neither state nor snapshot is touched. The engine
    /// never transmits the response itself; see [`Self::reply_to_notify`].
    pub fn process_notify(&self, request: &SipRequest) -> SipResponse {
        // 1. Defensive event-id validation.
        match request.event.as_deref().map(EventHeader::from_header_value) {
            Some(Ok(event)) => {
                if !self.event_matches(&event) {
                    self.log_event_error(format!(
                        "orphan NOTIFY: event {} does not belong to subscription {}",
                        event, self.key
                    ));
                    return self.remember_reply(SipResponse::for_request(
                        request,
                        StatusCode::CallOrTransactionDoesNotExist,
                    ));
                }
            }
            Some(Err(e)) => {
                self.log_event_error(format!("NOTIFY with unreadable Event header: {}", e));
                return self.remember_reply(SipResponse::for_request(request, StatusCode::BadRequest));
            }
            None => {
                self.log_event_error("NOTIFY without Event header".to_string());
                return self.remember_reply(SipResponse::for_request(request, StatusCode::BadRequest));
            }
        }

        // 2. Subscription-State header.
        let state_header = match request.subscription_state.as_deref() {
            Some(raw) => match SubscriptionStateHeader::from_header_value(raw) {
                Ok(header) => header,
                Err(e) => {
                    self.log_event_error(format!("bad Subscription-State header: {}", e));
                    return self
                        .remember_reply(SipResponse::for_request(request, StatusCode::BadRequest));
                }
            },
            None => {
                self.log_event_error("NOTIFY without Subscription-State header".to_string());
                return self.remember_reply(SipResponse::for_request(request, StatusCode::BadRequest));
            }
        };

        // A declared expiry beyond what was granted is a protocol
        // violation; reject before mutating anything.
        if let SubscriptionStateHeader::Active {
            expires: Some(declared),
        } = &state_header
        {
            if let Some(granted) = self.state.lock().granted_expires {
                if *declared > granted {
                    self.log_event_error(format!(
                        "NOTIFY declares expiry {}s beyond granted {}s",
                        declared, granted
                    ));
                    return self
                        .remember_reply(SipResponse::for_request(request, StatusCode::BadRequest));
                }
            }
        }

        // 3. Body, still before any mutation.
        enum ParsedBody {
            Nothing,
            Snapshot(PresenceSnapshot),
            Fragment(Option<(u32, String)>),
        }

        let parsed = match &self.kind {
            SubscriptionKind::Presence(_) => {
                if request.body.is_empty() {
                    ParsedBody::Nothing
                } else {
                    match pidf::parse(&request.body) {
                        Ok(snapshot) => ParsedBody::Snapshot(snapshot),
                        Err(e) => {
                            self.log_event_error(e.to_string());
                            return self.remember_reply(SipResponse::for_request(
                                request,
                                StatusCode::BadRequest,
                            ));
                        }
                    }
                }
            }
            SubscriptionKind::Refer(_) => ParsedBody::Fragment(parse_sipfrag_cseq(&request.body)),
        };

        // 4. Commit. State transitions honor the monotonic table; a
        //    terminal reason always overwrites the previous one.
        {
            let mut state = self.state.lock();
            match &state_header {
                SubscriptionStateHeader::Active { expires } => {
                    if state.status.can_advance_to(SubscriptionStatus::Active) {
                        state.status = SubscriptionStatus::Active;
                        if let Some(secs) = expires {
                            state.expiry = Some(ExpiryTimer::new(*secs));
                        }
                    }
                }
                SubscriptionStateHeader::Pending => {
                    // Pending never moves a subscription backward.
                }
                SubscriptionStateHeader::Terminated { reason } => {
                    if state.status.can_advance_to(SubscriptionStatus::Terminated) {
                        state.status = SubscriptionStatus::Terminated;
                    }
                    state.termination_reason = reason.clone();
                    state.expiry = None;
                }
            }
        }

        match parsed {
            ParsedBody::Snapshot(snapshot) => {
                if let SubscriptionKind::Presence(presence) = &self.kind {
                    presence.replace(snapshot);
                }
            }
            ParsedBody::Fragment(fragment) => {
                if let SubscriptionKind::Refer(refer) = &self.kind {
                    refer.observe(fragment);
                }
            }
            ParsedBody::Nothing => {}
        }

        debug!(
            subscription = %self.key,
            state = %state_header.to_header_value(),
            "processed NOTIFY"
        );
        self.remember_reply(SipResponse::for_request(request, StatusCode::Ok))
    }

    /// Transmit a locally built NOTIFY response through the collaborator
    pub fn reply_to_notify(&self, request: &SipRequest, response: &SipResponse) -> bool {
        match self.transport.send_response(request, response) {
            Ok(()) => true,
            Err(e) => {
                warn!(subscription = %self.key, "failed to send NOTIFY reply: {}", e);
                false
            }
        }
    }

    // --- presence accessors (empty for refer subscriptions) ---

    pub fn presence_devices(&self) -> HashMap<String, PresenceDeviceInfo> {
        match &self.kind {
            SubscriptionKind::Presence(presence) => presence.devices(),
            SubscriptionKind::Refer(_) => HashMap::new(),
        }
    }

    pub fn presence_notes(&self) -> Vec<PresenceNote> {
        match &self.kind {
            SubscriptionKind::Presence(presence) => presence.notes(),
            SubscriptionKind::Refer(_) => Vec::new(),
        }
    }

    pub fn presence_extensions(&self) -> Vec<PresenceExtension> {
        match &self.kind {
            SubscriptionKind::Presence(presence) => presence.extensions(),
            SubscriptionKind::Refer(_) => Vec::new(),
        }
    }

    /// Full presence snapshot, empty for refer subscriptions
    pub fn presence_snapshot(&self) -> PresenceSnapshot {
        match &self.kind {
            SubscriptionKind::Presence(presence) => presence.snapshot(),
            SubscriptionKind::Refer(_) => PresenceSnapshot::new(),
        }
    }

    // --- refer accessors ---

    /// Last sipfrag fragment observed by a refer subscription
    pub fn last_refer_fragment(&self) -> Option<ReferFragment> {
        match &self.kind {
            SubscriptionKind::Refer(refer) => refer.last_fragment(),
            SubscriptionKind::Presence(_) => None,
        }
    }

    /// Whether an inbound Event header addresses this subscription
    ///
    /// Presence requires event-id equality, with both sides absent also
    /// matching. Refer only constrains the id when the subscription
    /// carries one.
    pub fn event_matches(&self, event: &EventHeader) -> bool {
        if !event.is_package(self.key.event_type.package_name()) {
            return false;
        }
        match self.key.event_type {
            EventType::Presence => event.id.as_deref() == self.event_id(),
            EventType::Refer => match self.event_id() {
                Some(id) => event.id.as_deref() == Some(id),
                None => true,
            },
            EventType::Conference => true,
        }
    }

    fn remember_reply(&self, response: SipResponse) -> SipResponse {
        *self.last_notify_response.lock() = Some(response.clone());
        response
    }
}
