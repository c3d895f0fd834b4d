//! Scripted transport double for tests.
//!
//! Each capability method pops the next scripted result for that method,
//! falling back to a benign default (`Ok`, nothing buffered). Create and
//! destroy calls are counted so tests can assert that a failed init never
//! leaks an endpoint.

use super::{EndpointRequest, Sample, Transport, TransportError, TransportResult};
use crate::filter::ContentFilterOptions;
use crate::types::{EndpointId, LoanToken, QosProfile};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Default)]
struct MockState {
    create_results: VecDeque<TransportResult<()>>,
    destroy_results: VecDeque<TransportResult<()>>,
    qos_results: VecDeque<TransportResult<QosProfile>>,
    take_results: VecDeque<TransportResult<Option<Sample>>>,
    take_serialized_results: VecDeque<TransportResult<Option<Sample>>>,
    take_sequence_results: VecDeque<TransportResult<Vec<Sample>>>,
    loan_results: VecDeque<TransportResult<Option<Sample>>>,
    return_loan_results: VecDeque<TransportResult<()>>,
    set_filter_results: VecDeque<TransportResult<()>>,
    get_filter_results: VecDeque<TransportResult<ContentFilterOptions>>,
    count_results: VecDeque<TransportResult<usize>>,

    endpoints: HashMap<EndpointId, EndpointRequest>,
    applied_filter: Option<ContentFilterOptions>,
    next_id: u64,
    created: usize,
    destroyed: usize,
}

/// Test double implementing [`Transport`] with per-call scripting.
pub struct MockTransport {
    state: Mutex<MockState>,
    can_loan: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_id: 1,
                ..MockState::default()
            }),
            can_loan: true,
        }
    }

    /// A mock whose loan-capability predicate reports false.
    pub fn without_loan_capability() -> Self {
        Self {
            can_loan: false,
            ..Self::new()
        }
    }

    // --- Scripting ---

    pub fn script_create_endpoint(&self, result: TransportResult<()>) {
        self.state.lock().create_results.push_back(result);
    }

    pub fn script_destroy_endpoint(&self, result: TransportResult<()>) {
        self.state.lock().destroy_results.push_back(result);
    }

    pub fn script_actual_qos(&self, result: TransportResult<QosProfile>) {
        self.state.lock().qos_results.push_back(result);
    }

    pub fn script_take(&self, result: TransportResult<Option<Sample>>) {
        self.state.lock().take_results.push_back(result);
    }

    pub fn script_take_serialized(&self, result: TransportResult<Option<Sample>>) {
        self.state.lock().take_serialized_results.push_back(result);
    }

    pub fn script_take_sequence(&self, result: TransportResult<Vec<Sample>>) {
        self.state.lock().take_sequence_results.push_back(result);
    }

    pub fn script_loan(&self, result: TransportResult<Option<Sample>>) {
        self.state.lock().loan_results.push_back(result);
    }

    pub fn script_return_loan(&self, result: TransportResult<()>) {
        self.state.lock().return_loan_results.push_back(result);
    }

    pub fn script_set_filter(&self, result: TransportResult<()>) {
        self.state.lock().set_filter_results.push_back(result);
    }

    pub fn script_get_filter(&self, result: TransportResult<ContentFilterOptions>) {
        self.state.lock().get_filter_results.push_back(result);
    }

    pub fn script_publisher_count(&self, result: TransportResult<usize>) {
        self.state.lock().count_results.push_back(result);
    }

    // --- Accounting ---

    /// Endpoints successfully created so far.
    pub fn create_calls(&self) -> usize {
        self.state.lock().created
    }

    /// Destroy calls made so far (regardless of their scripted result).
    pub fn destroy_calls(&self) -> usize {
        self.state.lock().destroyed
    }

    /// Endpoints currently alive (created minus destroyed).
    pub fn live_endpoints(&self) -> usize {
        self.state.lock().endpoints.len()
    }

    /// The request the given endpoint was created with.
    pub fn endpoint_request(&self, endpoint: EndpointId) -> Option<EndpointRequest> {
        self.state.lock().endpoints.get(&endpoint).cloned()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn create_endpoint(&self, request: EndpointRequest) -> TransportResult<EndpointId> {
        let mut state = self.state.lock();
        if let Some(result) = state.create_results.pop_front() {
            result?;
        }
        let id = EndpointId(state.next_id);
        state.next_id += 1;
        state.created += 1;
        if let Some(filter) = request.filter.as_ref().filter(|f| !f.is_empty()) {
            state.applied_filter = Some(filter.clone());
        }
        state.endpoints.insert(id, request);
        Ok(id)
    }

    fn destroy_endpoint(&self, endpoint: EndpointId) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.destroyed += 1;
        state.endpoints.remove(&endpoint);
        state.destroy_results.pop_front().unwrap_or(Ok(()))
    }

    fn take_one(&self, _endpoint: EndpointId) -> TransportResult<Option<Sample>> {
        self.state.lock().take_results.pop_front().unwrap_or(Ok(None))
    }

    fn take_serialized(&self, _endpoint: EndpointId) -> TransportResult<Option<Sample>> {
        self.state
            .lock()
            .take_serialized_results
            .pop_front()
            .unwrap_or(Ok(None))
    }

    fn take_sequence(&self, _endpoint: EndpointId, _count: usize) -> TransportResult<Vec<Sample>> {
        // Scripted results pass through verbatim, over-long ones included,
        // so tests can simulate a transport that ignores `count`.
        self.state
            .lock()
            .take_sequence_results
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn loan(&self, _endpoint: EndpointId) -> TransportResult<Option<(LoanToken, Sample)>> {
        let mut state = self.state.lock();
        let result = state.loan_results.pop_front().unwrap_or(Ok(None));
        result.map(|maybe| {
            maybe.map(|sample| {
                let token = LoanToken(state.next_id);
                state.next_id += 1;
                (token, sample)
            })
        })
    }

    fn return_loan(&self, _endpoint: EndpointId, _token: LoanToken) -> TransportResult<()> {
        self.state
            .lock()
            .return_loan_results
            .pop_front()
            .unwrap_or(Ok(()))
    }

    fn set_filter(
        &self,
        _endpoint: EndpointId,
        options: &ContentFilterOptions,
    ) -> TransportResult<()> {
        let mut state = self.state.lock();
        let result = state.set_filter_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            state.applied_filter = Some(options.clone());
        }
        result
    }

    fn get_filter(&self, _endpoint: EndpointId) -> TransportResult<ContentFilterOptions> {
        let mut state = self.state.lock();
        if let Some(result) = state.get_filter_results.pop_front() {
            return result;
        }
        state.applied_filter.clone().ok_or(TransportError::Unsupported)
    }

    fn count_matched_publishers(&self, _endpoint: EndpointId) -> TransportResult<usize> {
        self.state.lock().count_results.pop_front().unwrap_or(Ok(0))
    }

    fn get_actual_qos(&self, endpoint: EndpointId) -> TransportResult<QosProfile> {
        let mut state = self.state.lock();
        if let Some(result) = state.qos_results.pop_front() {
            return result;
        }
        state
            .endpoints
            .get(&endpoint)
            .map(|request| request.qos.clone())
            .ok_or_else(|| TransportError::Error("unknown endpoint".to_string()))
    }

    fn can_loan(&self, _endpoint: EndpointId) -> bool {
        self.can_loan
    }
}
