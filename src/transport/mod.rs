//! Transport capability boundary.
//!
//! The subscription core consumes the transport through the [`Transport`]
//! trait and never implements the wire layer itself. Two implementations
//! ship with the crate: [`memory::MemoryTransport`], an in-process broker,
//! and [`mock::MockTransport`], a scripted test double for driving error
//! paths and fault injection.
//!
//! Every fallible method returns [`TransportError`] on failure; the
//! "nothing buffered right now" outcome of a poll is `Ok(None)`, not an
//! error.

pub mod memory;
pub mod mock;

use crate::filter::ContentFilterOptions;
use crate::types::{EndpointId, LoanToken, MessageInfo, QosProfile};
use thiserror::Error;

/// Failure taxonomy at the transport boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport does not implement this capability.
    #[error("unsupported by transport")]
    Unsupported,

    /// Allocation failure inside the transport.
    #[error("transport allocation failed")]
    BadAlloc,

    /// Anything else; the message travels verbatim to the caller.
    #[error("{0}")]
    Error(String),
}

/// Result alias for transport calls.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// One buffered message: wire bytes plus delivery metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub payload: Vec<u8>,
    pub info: MessageInfo,
}

/// Everything the transport needs to create a receive endpoint.
#[derive(Clone, Debug)]
pub struct EndpointRequest {
    /// Fully qualified, already-validated topic name.
    pub topic: String,
    /// Message type compatibility descriptor.
    pub type_name: String,
    /// Requested QoS; the negotiated profile may differ.
    pub qos: QosProfile,
    /// Whether the endpoint participates in zero-copy loans.
    pub loaning_enabled: bool,
    /// Filter to apply from the first delivery onward.
    pub filter: Option<ContentFilterOptions>,
}

/// The capability contract a subscription requires from its transport.
///
/// All methods are non-blocking; take-style methods poll whatever is
/// currently buffered and return immediately. Implementations must allow
/// concurrent polling of one endpoint from multiple threads.
pub trait Transport: Send + Sync {
    /// Create a receive endpoint. The returned handle is exclusively owned
    /// by the caller until [`Transport::destroy_endpoint`].
    fn create_endpoint(&self, request: EndpointRequest) -> TransportResult<EndpointId>;

    /// Destroy an endpoint. Outstanding loans for it are dropped.
    fn destroy_endpoint(&self, endpoint: EndpointId) -> TransportResult<()>;

    /// Poll one message for in-place decoding. `Ok(None)` when nothing is
    /// buffered.
    fn take_one(&self, endpoint: EndpointId) -> TransportResult<Option<Sample>>;

    /// Poll one message in wire format.
    fn take_serialized(&self, endpoint: EndpointId) -> TransportResult<Option<Sample>>;

    /// Poll up to `count` messages. A short read (including zero) is Ok.
    fn take_sequence(&self, endpoint: EndpointId, count: usize) -> TransportResult<Vec<Sample>>;

    /// Poll one message as a loan. The transport retains ownership; the
    /// token must come back through [`Transport::return_loan`] exactly
    /// once.
    fn loan(&self, endpoint: EndpointId) -> TransportResult<Option<(LoanToken, Sample)>>;

    /// Return a loaned message to the transport.
    fn return_loan(&self, endpoint: EndpointId, token: LoanToken) -> TransportResult<()>;

    /// Replace (non-empty expression) or clear (empty expression) the
    /// endpoint's content filter.
    fn set_filter(
        &self,
        endpoint: EndpointId,
        options: &ContentFilterOptions,
    ) -> TransportResult<()>;

    /// The currently applied filter. `Unsupported` when the endpoint was
    /// never configured for filtering.
    fn get_filter(&self, endpoint: EndpointId) -> TransportResult<ContentFilterOptions>;

    /// Number of publishers currently matched with this endpoint.
    fn count_matched_publishers(&self, endpoint: EndpointId) -> TransportResult<usize>;

    /// The negotiated QoS profile.
    fn get_actual_qos(&self, endpoint: EndpointId) -> TransportResult<QosProfile>;

    /// Whether this endpoint can serve zero-copy loans.
    fn can_loan(&self, endpoint: EndpointId) -> bool;
}
