//! In-process transport.
//!
//! A broker holding per-endpoint bounded delivery queues. Publishers and
//! subscriber endpoints rendezvous on fully qualified topic names; the
//! first participant on a topic pins its message type and later mismatches
//! are rejected. Content filters are evaluated here, before delivery, by
//! decoding the JSON wire payload and comparing one field against the
//! filter's right-hand side.

use super::{EndpointRequest, Sample, Transport, TransportError, TransportResult};
use crate::filter::ContentFilterOptions;
use crate::types::{EndpointId, Gid, LoanToken, MessageInfo, QosProfile, Timestamp, TopicMessage};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle to an in-process publisher. Only the test/demo surface of this
/// transport; the subscription core never sees it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublisherId(pub u64);

impl fmt::Debug for PublisherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublisherId({})", self.0)
    }
}

struct Endpoint {
    topic: String,
    qos: QosProfile,
    loaning_enabled: bool,
    /// None = never configured for filtering. Some(empty) = configured,
    /// currently cleared.
    filter: Option<ContentFilterOptions>,
    sender: Sender<Sample>,
    receiver: Receiver<Sample>,
}

struct PublisherState {
    topic: String,
    gid: Gid,
}

/// Production in-process transport.
pub struct MemoryTransport {
    endpoints: RwLock<HashMap<EndpointId, Endpoint>>,
    publishers: RwLock<HashMap<PublisherId, PublisherState>>,
    /// topic -> pinned type name.
    topics: RwLock<HashMap<String, String>>,
    /// Outstanding loans: the transport retains the sample for the loan
    /// window.
    loans: Mutex<HashMap<LoanToken, (EndpointId, Sample)>>,
    next_id: AtomicU64,
    loan_supported: bool,
    filter_supported: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            endpoints: RwLock::new(HashMap::new()),
            publishers: RwLock::new(HashMap::new()),
            topics: RwLock::new(HashMap::new()),
            loans: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            loan_supported: true,
            filter_supported: true,
        }
    }

    /// A transport that reports `Unsupported` for all loan operations.
    pub fn without_loan_support() -> Self {
        Self {
            loan_supported: false,
            ..Self::new()
        }
    }

    /// A transport that reports `Unsupported` for all filter operations.
    pub fn without_filter_support() -> Self {
        Self {
            filter_supported: false,
            ..Self::new()
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Pin or check the topic's message type.
    fn register_topic_type(&self, topic: &str, type_name: &str) -> TransportResult<()> {
        let mut topics = self.topics.write();
        match topics.get(topic) {
            Some(existing) if existing != type_name => Err(TransportError::Error(format!(
                "type mismatch on topic '{}': '{}' vs '{}'",
                topic, existing, type_name
            ))),
            Some(_) => Ok(()),
            None => {
                topics.insert(topic.to_string(), type_name.to_string());
                Ok(())
            }
        }
    }

    // --- Publisher side (used by tests and demos) ---

    /// Register a publisher on `topic`.
    pub fn create_publisher(&self, topic: &str, type_name: &str) -> TransportResult<PublisherId> {
        self.register_topic_type(topic, type_name)?;
        let id = PublisherId(self.next_id());
        self.publishers.write().insert(
            id,
            PublisherState {
                topic: topic.to_string(),
                gid: Gid::from_u64(id.0),
            },
        );
        Ok(id)
    }

    /// Remove a publisher.
    pub fn destroy_publisher(&self, publisher: PublisherId) -> TransportResult<()> {
        self.publishers
            .write()
            .remove(&publisher)
            .map(|_| ())
            .ok_or_else(|| TransportError::Error("unknown publisher".to_string()))
    }

    /// Publish wire bytes to every matching endpoint on the publisher's
    /// topic. Filtered-out endpoints never see the sample.
    pub fn publish(&self, publisher: PublisherId, payload: &[u8]) -> TransportResult<()> {
        let (topic, gid) = {
            let publishers = self.publishers.read();
            let state = publishers
                .get(&publisher)
                .ok_or_else(|| TransportError::Error("unknown publisher".to_string()))?;
            (state.topic.clone(), state.gid)
        };
        let source_timestamp = Timestamp::now();

        let endpoints = self.endpoints.read();
        for endpoint in endpoints.values() {
            if endpoint.topic != topic {
                continue;
            }
            if let Some(filter) = &endpoint.filter {
                if !filter.is_empty() && !filter_matches(filter, payload) {
                    continue;
                }
            }
            let sample = Sample {
                payload: payload.to_vec(),
                info: MessageInfo {
                    source_timestamp,
                    received_timestamp: Timestamp::now(),
                    publisher_gid: gid,
                },
            };
            deliver(endpoint, sample);
        }
        Ok(())
    }

    /// Serialize `message` to wire format and publish it.
    pub fn publish_message<M: TopicMessage>(
        &self,
        publisher: PublisherId,
        message: &M,
    ) -> TransportResult<()> {
        let payload = serde_json::to_vec(message)
            .map_err(|e| TransportError::Error(format!("encode failed: {}", e)))?;
        self.publish(publisher, &payload)
    }

    /// Number of loans currently outstanding across all endpoints.
    pub fn outstanding_loans(&self) -> usize {
        self.loans.lock().len()
    }

    fn with_endpoint<T>(
        &self,
        endpoint: EndpointId,
        f: impl FnOnce(&Endpoint) -> TransportResult<T>,
    ) -> TransportResult<T> {
        let endpoints = self.endpoints.read();
        match endpoints.get(&endpoint) {
            Some(state) => f(state),
            None => Err(TransportError::Error("unknown endpoint".to_string())),
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Deliver with keep-last eviction: a full queue drops its oldest sample.
fn deliver(endpoint: &Endpoint, sample: Sample) {
    let mut sample = sample;
    loop {
        match endpoint.sender.try_send(sample) {
            Ok(()) => return,
            Err(TrySendError::Full(rejected)) => {
                let _ = endpoint.receiver.try_recv();
                sample = rejected;
            }
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}

impl Transport for MemoryTransport {
    fn create_endpoint(&self, request: EndpointRequest) -> TransportResult<EndpointId> {
        // Filter checks come first: a rejected request must not pin the
        // topic's type for later participants.
        if let Some(filter) = &request.filter {
            if !filter.is_empty() {
                if !self.filter_supported {
                    return Err(TransportError::Unsupported);
                }
                validate_expression(filter)?;
            }
        }

        self.register_topic_type(&request.topic, &request.type_name)?;

        let (sender, receiver) = match request.qos.history {
            crate::types::HistoryPolicy::KeepLast => bounded(request.qos.depth.max(1)),
            crate::types::HistoryPolicy::KeepAll => unbounded(),
        };

        let id = EndpointId(self.next_id());
        let filter = request.filter.filter(|f| !f.is_empty());
        self.endpoints.write().insert(
            id,
            Endpoint {
                topic: request.topic,
                qos: request.qos,
                loaning_enabled: request.loaning_enabled,
                filter,
                sender,
                receiver,
            },
        );
        Ok(id)
    }

    fn destroy_endpoint(&self, endpoint: EndpointId) -> TransportResult<()> {
        let removed = self.endpoints.write().remove(&endpoint);
        if removed.is_none() {
            return Err(TransportError::Error("unknown endpoint".to_string()));
        }
        self.loans.lock().retain(|_, entry| entry.0 != endpoint);
        Ok(())
    }

    fn take_one(&self, endpoint: EndpointId) -> TransportResult<Option<Sample>> {
        let receiver = self.with_endpoint(endpoint, |e| Ok(e.receiver.clone()))?;
        Ok(receiver.try_recv().ok())
    }

    fn take_serialized(&self, endpoint: EndpointId) -> TransportResult<Option<Sample>> {
        // Same buffered samples; the caller decides the representation.
        self.take_one(endpoint)
    }

    fn take_sequence(&self, endpoint: EndpointId, count: usize) -> TransportResult<Vec<Sample>> {
        let receiver = self.with_endpoint(endpoint, |e| Ok(e.receiver.clone()))?;
        let mut taken = Vec::new();
        while taken.len() < count {
            match receiver.try_recv() {
                Ok(sample) => taken.push(sample),
                Err(_) => break,
            }
        }
        Ok(taken)
    }

    fn loan(&self, endpoint: EndpointId) -> TransportResult<Option<(LoanToken, Sample)>> {
        let (receiver, loaning) =
            self.with_endpoint(endpoint, |e| Ok((e.receiver.clone(), e.loaning_enabled)))?;
        if !self.loan_supported || !loaning {
            return Err(TransportError::Unsupported);
        }
        match receiver.try_recv() {
            Ok(sample) => {
                let token = LoanToken(self.next_id());
                self.loans
                    .lock()
                    .insert(token, (endpoint, sample.clone()));
                Ok(Some((token, sample)))
            }
            Err(_) => Ok(None),
        }
    }

    fn return_loan(&self, endpoint: EndpointId, token: LoanToken) -> TransportResult<()> {
        if !self.loan_supported {
            return Err(TransportError::Unsupported);
        }
        let mut loans = self.loans.lock();
        match loans.get(&token) {
            Some((owner, _)) if *owner == endpoint => {
                loans.remove(&token);
                Ok(())
            }
            Some(_) => Err(TransportError::Error(
                "loan does not belong to this endpoint".to_string(),
            )),
            None => Err(TransportError::Error(
                "unknown or already returned loan".to_string(),
            )),
        }
    }

    fn set_filter(
        &self,
        endpoint: EndpointId,
        options: &ContentFilterOptions,
    ) -> TransportResult<()> {
        if !self.filter_supported {
            return Err(TransportError::Unsupported);
        }
        if !options.is_empty() {
            validate_expression(options)?;
        }
        let mut endpoints = self.endpoints.write();
        let state = endpoints
            .get_mut(&endpoint)
            .ok_or_else(|| TransportError::Error("unknown endpoint".to_string()))?;
        state.filter = Some(options.clone());
        Ok(())
    }

    fn get_filter(&self, endpoint: EndpointId) -> TransportResult<ContentFilterOptions> {
        self.with_endpoint(endpoint, |e| {
            e.filter.clone().ok_or(TransportError::Unsupported)
        })
    }

    fn count_matched_publishers(&self, endpoint: EndpointId) -> TransportResult<usize> {
        let topic = self.with_endpoint(endpoint, |e| Ok(e.topic.clone()))?;
        let publishers = self.publishers.read();
        Ok(publishers.values().filter(|p| p.topic == topic).count())
    }

    fn get_actual_qos(&self, endpoint: EndpointId) -> TransportResult<QosProfile> {
        // No negotiation in-process; actual == requested.
        self.with_endpoint(endpoint, |e| Ok(e.qos.clone()))
    }

    fn can_loan(&self, endpoint: EndpointId) -> bool {
        self.loan_supported
            && self
                .with_endpoint(endpoint, |e| Ok(e.loaning_enabled))
                .unwrap_or(false)
    }
}

/// Check that an expression is something the evaluator can run:
/// `field = rhs` with at most one `%n` placeholder per parameter.
fn validate_expression(filter: &ContentFilterOptions) -> TransportResult<()> {
    let expression = filter.expression();
    let Some((field, rhs)) = expression.split_once('=') else {
        return Err(TransportError::Error(format!(
            "unparseable filter expression '{}'",
            expression
        )));
    };
    if field.trim().is_empty() || rhs.trim().is_empty() {
        return Err(TransportError::Error(format!(
            "unparseable filter expression '{}'",
            expression
        )));
    }
    if let Some(index) = placeholder_index(rhs.trim()) {
        if index >= filter.parameters().len() {
            return Err(TransportError::Error(format!(
                "filter placeholder %{} has no parameter",
                index
            )));
        }
    }
    Ok(())
}

fn placeholder_index(rhs: &str) -> Option<usize> {
    rhs.strip_prefix('%').and_then(|digits| digits.parse().ok())
}

/// Evaluate `field = rhs` against a JSON payload. Non-object payloads and
/// missing fields never match.
fn filter_matches(filter: &ContentFilterOptions, payload: &[u8]) -> bool {
    let Some((field, rhs)) = filter.expression().split_once('=') else {
        return false;
    };
    let field = field.trim();
    let mut rhs = rhs.trim().to_string();
    if let Some(index) = placeholder_index(&rhs) {
        match filter.parameters().get(index) {
            Some(parameter) => rhs = parameter.trim().to_string(),
            None => return false,
        }
    }

    let Ok(value) = serde_json::from_slice::<Value>(payload) else {
        return false;
    };
    let Some(actual) = value.get(field) else {
        return false;
    };

    match actual {
        Value::String(s) => {
            let unquoted = rhs.trim_matches('\'');
            s == unquoted
        }
        Value::Number(n) => match (n.as_f64(), rhs.parse::<f64>()) {
            (Some(a), Ok(b)) => a == b,
            _ => false,
        },
        Value::Bool(b) => rhs == b.to_string(),
        _ => false,
    }
}
