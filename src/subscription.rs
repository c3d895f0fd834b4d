//! The subscription entity.
//!
//! A `Subscription<M>` owns one transport endpoint and retrieves messages
//! from it in four modes: decoded in place, serialized bytes, batched
//! sequence, and zero-copy loan. Construction is two-phase: a zero-valued
//! instance from [`Subscription::new`] becomes live through
//! [`Subscription::init`] and is torn down by [`Subscription::fini`].
//!
//! Lifecycle is a strict `Uninitialized -> Initialized -> Finalized`
//! progression; a finalized subscription can never be re-initialized, a
//! fresh instance must be used.
//!
//! Take operations borrow `&self` and are as concurrency-safe as the
//! transport's polling; `init` and `fini` take `&mut self` and must not
//! race takes on the same instance.

use crate::error::{Result, SubscriptionError};
use crate::filter::ContentFilterOptions;
use crate::naming::expand_topic_name;
use crate::node::{Node, NodeId};
use crate::options::SubscriptionOptions;
use crate::transport::{EndpointRequest, Transport};
use crate::types::{
    EndpointId, InfoSequence, LoanToken, MessageInfo, MessageSequence, QosProfile,
    SerializedMessage, TopicMessage,
};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// Explicit lifecycle tag. Replaces the all-zero-memory sentinel with a
/// state every public operation matches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Uninitialized,
    Initialized,
    Finalized,
}

/// A typed receive endpoint on one topic.
pub struct Subscription<M: TopicMessage> {
    state: State,
    endpoint: Option<EndpointId>,
    transport: Option<Arc<dyn Transport>>,
    node_id: Option<NodeId>,
    topic_name: Option<String>,
    actual_qos: Option<QosProfile>,
    options: Option<SubscriptionOptions>,
    /// Local cache of "a filter is currently applied". The authoritative
    /// state lives in the transport; `get_content_filter` re-queries it.
    cft_enabled: bool,
    _message: PhantomData<fn() -> M>,
}

/// A message borrowed from the transport's buffer.
///
/// The transport retains ownership for the loan window; this guard must be
/// consumed by [`Subscription::return_loaned`] exactly once. Dropping it
/// without returning leaks the transport-side sample and logs a warning.
#[derive(Debug)]
pub struct LoanedMessage<M> {
    message: M,
    info: MessageInfo,
    endpoint: EndpointId,
    token: LoanToken,
    returned: bool,
}

impl<M> LoanedMessage<M> {
    /// Delivery metadata for the loaned message.
    pub fn info(&self) -> &MessageInfo {
        &self.info
    }
}

impl<M> std::ops::Deref for LoanedMessage<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.message
    }
}

impl<M> Drop for LoanedMessage<M> {
    fn drop(&mut self) {
        if !self.returned {
            warn!(
                endpoint = self.endpoint.0,
                token = self.token.0,
                "loaned message dropped without being returned"
            );
        }
    }
}

impl<M: TopicMessage> Subscription<M> {
    /// The zero-valued, uninitialized subscription.
    pub fn new() -> Self {
        Self {
            state: State::Uninitialized,
            endpoint: None,
            transport: None,
            node_id: None,
            topic_name: None,
            actual_qos: None,
            options: None,
            cft_enabled: false,
            _message: PhantomData,
        }
    }

    // --- Lifecycle ---

    /// Initialize against `node`, expanding and validating `topic`,
    /// creating a transport endpoint and caching the negotiated QoS.
    ///
    /// Every failure rolls back whatever was created so far; on error the
    /// subscription is exactly as it was before the call.
    pub fn init(
        &mut self,
        node: &Node,
        topic: &str,
        options: SubscriptionOptions,
    ) -> Result<()> {
        match self.state {
            State::Uninitialized => {}
            State::Initialized => return Err(SubscriptionError::AlreadyInitialized),
            // A finalized instance stays dead; callers start over with a
            // fresh zero-valued one.
            State::Finalized => return Err(SubscriptionError::SubscriptionInvalid),
        }
        if !node.is_valid() {
            return Err(SubscriptionError::NodeInvalid);
        }
        let transport = node
            .transport()
            .ok_or(SubscriptionError::NodeInvalid)?
            .clone();

        let topic_name = expand_topic_name(topic, node.name(), node.namespace())?;

        let endpoint = transport
            .create_endpoint(EndpointRequest {
                topic: topic_name.clone(),
                type_name: M::type_name().to_string(),
                qos: options.qos.clone(),
                loaning_enabled: !options.disable_loaned_message,
                filter: options.content_filter.clone(),
            })
            .map_err(SubscriptionError::from)?;

        let actual_qos = match transport.get_actual_qos(endpoint) {
            Ok(qos) => qos,
            Err(error) => {
                // The endpoint from the previous step must not leak.
                if let Err(destroy_error) = transport.destroy_endpoint(endpoint) {
                    warn!(
                        topic = %topic_name,
                        error = %destroy_error,
                        "endpoint destroy failed during init rollback"
                    );
                }
                return Err(SubscriptionError::from(error));
            }
        };

        let cft_enabled = match options.content_filter.as_ref() {
            Some(filter) if !filter.is_empty() => transport.get_filter(endpoint).is_ok(),
            _ => false,
        };

        debug!(topic = %topic_name, endpoint = endpoint.0, "subscription initialized");

        self.endpoint = Some(endpoint);
        self.transport = Some(transport);
        self.node_id = Some(node.id());
        self.topic_name = Some(topic_name);
        self.actual_qos = Some(actual_qos);
        self.options = Some(options);
        self.cft_enabled = cft_enabled;
        self.state = State::Initialized;
        Ok(())
    }

    /// Finalize the subscription, destroying its endpoint.
    ///
    /// Finalization always completes: even when the transport's destroy
    /// call fails, the handle is cleared and the state forced to
    /// `Finalized`. The returned error is advisory, for logging, not a
    /// signal to retry.
    pub fn fini(&mut self, node: &Node) -> Result<()> {
        if !node.is_valid() {
            return Err(SubscriptionError::NodeInvalid);
        }
        if let Some(init_node) = self.node_id {
            if init_node != node.id() {
                return Err(SubscriptionError::NodeInvalid);
            }
        }

        let result = match (self.state, self.endpoint.take(), self.transport.take()) {
            (State::Initialized, Some(endpoint), Some(transport)) => transport
                .destroy_endpoint(endpoint)
                .map_err(SubscriptionError::from),
            _ => Ok(()),
        };

        if let Err(error) = &result {
            warn!(error = %error, "transport destroy failed; finalizing anyway");
        } else {
            debug!(topic = self.topic_name.as_deref(), "subscription finalized");
        }

        self.state = State::Finalized;
        self.cft_enabled = false;
        result
    }

    /// True iff the subscription is initialized with a live endpoint.
    pub fn is_valid(&self) -> bool {
        let valid = self.state == State::Initialized && self.endpoint.is_some();
        if !valid {
            debug!(state = ?self.state, "validity query on non-initialized subscription");
        }
        valid
    }

    fn live_endpoint(&self) -> Result<(EndpointId, &Arc<dyn Transport>)> {
        match (self.state, self.endpoint, self.transport.as_ref()) {
            (State::Initialized, Some(endpoint), Some(transport)) => Ok((endpoint, transport)),
            _ => Err(SubscriptionError::SubscriptionInvalid),
        }
    }

    // --- Take protocols ---

    /// Take one message, decoding it into the caller's pre-allocated
    /// `message`. Populates `info` with delivery metadata when requested.
    ///
    /// Returns [`SubscriptionError::TakeFailed`] when nothing is buffered;
    /// that is the expected empty-poll outcome, not a fault.
    pub fn take(&self, message: &mut M, info: Option<&mut MessageInfo>) -> Result<()> {
        let (endpoint, transport) = self.live_endpoint()?;
        let sample = transport
            .take_one(endpoint)
            .map_err(SubscriptionError::from)?
            .ok_or(SubscriptionError::TakeFailed)?;
        *message = serde_json::from_slice(&sample.payload)?;
        if let Some(info) = info {
            *info = sample.info;
        }
        Ok(())
    }

    /// Take one message in wire format, growing `buffer` as needed.
    pub fn take_serialized(
        &self,
        buffer: &mut SerializedMessage,
        info: Option<&mut MessageInfo>,
    ) -> Result<()> {
        let (endpoint, transport) = self.live_endpoint()?;
        let sample = transport
            .take_serialized(endpoint)
            .map_err(SubscriptionError::from)?
            .ok_or(SubscriptionError::TakeFailed)?;
        buffer.fill(&sample.payload);
        if let Some(info) = info {
            *info = sample.info;
        }
        Ok(())
    }

    /// Take up to `count` messages into two pre-allocated buffers of
    /// equal capacity.
    ///
    /// Both sequences' lengths are set to the number actually taken; a
    /// short read, including zero, is success. Unused slots are left
    /// untouched. Capacity mismatch between the buffers, or a `count`
    /// exceeding them, is rejected up front with both lengths at zero.
    pub fn take_sequence(
        &self,
        count: usize,
        messages: &mut MessageSequence<M>,
        infos: &mut InfoSequence,
    ) -> Result<()> {
        let (endpoint, transport) = self.live_endpoint()?;
        messages.reset();
        infos.reset();

        if messages.capacity() != infos.capacity() {
            return Err(SubscriptionError::InvalidArgument(format!(
                "message capacity {} != info capacity {}",
                messages.capacity(),
                infos.capacity()
            )));
        }
        if count > messages.capacity() {
            return Err(SubscriptionError::InvalidArgument(format!(
                "requested {} exceeds buffer capacity {}",
                count,
                messages.capacity()
            )));
        }

        let mut samples = transport
            .take_sequence(endpoint, count)
            .map_err(SubscriptionError::from)?;
        // A transport returning more than asked must not overrun the
        // caller's buffers.
        samples.truncate(count);
        for (index, sample) in samples.iter().enumerate() {
            *messages.slot_mut(index) = serde_json::from_slice(&sample.payload)?;
            *infos.slot_mut(index) = sample.info;
        }
        messages.set_len(samples.len());
        infos.set_len(samples.len());
        Ok(())
    }

    /// Take one message as a zero-copy loan.
    ///
    /// The returned guard borrows the transport's buffer and must be given
    /// back through [`Subscription::return_loaned`]. A second loan can be
    /// taken while one is outstanding; each guard is returned
    /// independently.
    pub fn take_loaned(&self) -> Result<LoanedMessage<M>> {
        let (endpoint, transport) = self.live_endpoint()?;
        let (token, sample) = transport
            .loan(endpoint)
            .map_err(SubscriptionError::from)?
            .ok_or(SubscriptionError::TakeFailed)?;
        let message = serde_json::from_slice(&sample.payload)?;
        Ok(LoanedMessage {
            message,
            info: sample.info,
            endpoint,
            token,
            returned: false,
        })
    }

    /// Return a loaned message to the transport.
    ///
    /// `Unsupported` and transport errors pass through unchanged; a
    /// loan-return failure is diagnostic, not a core condition.
    pub fn return_loaned(&self, mut loan: LoanedMessage<M>) -> Result<()> {
        let (endpoint, transport) = self.live_endpoint()?;
        if loan.endpoint != endpoint {
            // The guard drops un-returned here; its leak warning fires and
            // the transport keeps holding the sample.
            return Err(SubscriptionError::InvalidArgument(
                "loan was not taken from this subscription".to_string(),
            ));
        }
        // The transport takes over from here; suppress the leak warning
        // even when its return call fails.
        loan.returned = true;
        transport
            .return_loan(endpoint, loan.token)
            .map_err(SubscriptionError::from)
    }

    // --- Content filter sub-protocol ---

    /// Set or replace the content filter. An empty expression clears
    /// filtering.
    ///
    /// Application is synchronous locally; propagation to already-matched
    /// peers is the transport's concern and may lag.
    pub fn set_content_filter(&mut self, options: &ContentFilterOptions) -> Result<()> {
        let (endpoint, transport) = self.live_endpoint()?;
        transport
            .set_filter(endpoint, options)
            .map_err(SubscriptionError::from)?;
        self.cft_enabled = !options.is_empty();
        debug!(
            enabled = self.cft_enabled,
            expression = options.expression(),
            "content filter updated"
        );
        Ok(())
    }

    /// The currently applied filter, re-queried from the transport.
    ///
    /// `Unsupported` when the subscription was never configured for
    /// filtering.
    pub fn get_content_filter(&self) -> Result<ContentFilterOptions> {
        let (endpoint, transport) = self.live_endpoint()?;
        transport.get_filter(endpoint).map_err(SubscriptionError::from)
    }

    // --- Diagnostic accessors ---
    //
    // All of these answer with a sentinel (None / false) on a
    // non-initialized subscription, never mutate state, and never block.

    /// The QoS profile actually negotiated at init.
    pub fn actual_qos(&self) -> Option<&QosProfile> {
        if !self.is_valid() {
            return None;
        }
        self.actual_qos.as_ref()
    }

    /// Whether this subscription can serve zero-copy loans.
    pub fn can_loan_messages(&self) -> bool {
        match self.live_endpoint() {
            Ok((endpoint, transport)) => {
                let disabled = self
                    .options
                    .as_ref()
                    .map(|o| o.disable_loaned_message)
                    .unwrap_or(false);
                !disabled && transport.can_loan(endpoint)
            }
            Err(_) => false,
        }
    }

    /// The transport endpoint handle.
    pub fn transport_handle(&self) -> Option<EndpointId> {
        if !self.is_valid() {
            return None;
        }
        self.endpoint
    }

    /// The fully qualified topic name resolved at init.
    pub fn topic_name(&self) -> Option<&str> {
        if !self.is_valid() {
            return None;
        }
        self.topic_name.as_deref()
    }

    /// The options this subscription was initialized with.
    pub fn options(&self) -> Option<&SubscriptionOptions> {
        if !self.is_valid() {
            return None;
        }
        self.options.as_ref()
    }

    /// Number of publishers currently matched with this subscription.
    pub fn publisher_count(&self) -> Result<usize> {
        let (endpoint, transport) = self.live_endpoint()?;
        transport
            .count_matched_publishers(endpoint)
            .map_err(SubscriptionError::from)
    }

    /// Whether a content filter is currently applied (local cache; see
    /// [`Subscription::get_content_filter`] for the authoritative state).
    pub fn is_cft_enabled(&self) -> bool {
        self.state == State::Initialized && self.cft_enabled
    }
}

impl<M: TopicMessage> Default for Subscription<M> {
    fn default() -> Self {
        Self::new()
    }
}
