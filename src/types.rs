//! Core types for the subscription core.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Handle to a transport endpoint.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(pub u64);

impl fmt::Debug for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointId({})", self.0)
    }
}

/// Token identifying an outstanding loaned message.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoanToken(pub u64);

impl fmt::Debug for LoanToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoanToken({})", self.0)
    }
}

/// Nanoseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_nanos() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Globally unique identifier of a publishing endpoint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Gid(pub [u8; 16]);

impl fmt::Debug for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gid(")?;
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "...)")
    }
}

impl Gid {
    /// Build a gid from a counter value. Used by in-process transports
    /// that have no wire-level identity.
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&value.to_be_bytes());
        Gid(bytes)
    }
}

/// History policy: how many samples the transport buffers per topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryPolicy {
    /// Keep up to `depth` most recent samples, evicting the oldest.
    KeepLast,
    /// Keep everything the transport can hold.
    KeepAll,
}

/// Reliability policy negotiated with publishers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReliabilityPolicy {
    Reliable,
    BestEffort,
}

/// Durability policy for late-joining subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurabilityPolicy {
    Volatile,
    TransientLocal,
}

/// Quality-of-service profile. Opaque to the subscription core; it is
/// passed through to the transport and the negotiated ("actual") profile
/// is cached after init.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosProfile {
    pub history: HistoryPolicy,
    pub depth: usize,
    pub reliability: ReliabilityPolicy,
    pub durability: DurabilityPolicy,
}

impl Default for QosProfile {
    fn default() -> Self {
        Self {
            history: HistoryPolicy::KeepLast,
            depth: 10,
            reliability: ReliabilityPolicy::Reliable,
            durability: DurabilityPolicy::Volatile,
        }
    }
}

/// Delivery metadata attached to a taken message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageInfo {
    /// When the publisher handed the message to its transport.
    pub source_timestamp: Timestamp,
    /// When the subscriber's transport buffered the message.
    pub received_timestamp: Timestamp,
    /// Identity of the publishing endpoint.
    pub publisher_gid: Gid,
}

/// A message type that can flow through a subscription.
///
/// The type name is the compatibility descriptor the transport compares at
/// endpoint creation; encoding and decoding go through serde.
pub trait TopicMessage:
    Serialize + DeserializeOwned + Clone + Default + Send + 'static
{
    /// Fully qualified message type name, e.g. `"test_msgs/BasicTypes"`.
    fn type_name() -> &'static str;
}

/// Growable buffer holding one message in wire format.
///
/// Pre-allocate with [`SerializedMessage::with_capacity`]; a take grows the
/// buffer as needed and updates its length.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SerializedMessage {
    data: Vec<u8>,
}

impl SerializedMessage {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// The wire bytes of the last taken message.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replace the contents with `bytes`, growing the buffer if needed.
    pub(crate) fn fill(&mut self, bytes: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
    }
}

/// Fixed-capacity output buffer for a batch take.
///
/// All `capacity` slots are allocated up front; after a take, the first
/// [`MessageSequence::len`] slots hold taken messages and the remaining
/// slots are left untouched.
#[derive(Clone, Debug)]
pub struct MessageSequence<M> {
    slots: Vec<M>,
    size: usize,
}

impl<M: Default + Clone> MessageSequence<M> {
    /// Allocate `capacity` default-valued slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![M::default(); capacity],
            size: 0,
        }
    }
}

impl<M> MessageSequence<M> {
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of messages taken by the last successful batch take.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The taken messages (first `len()` slots).
    pub fn as_slice(&self) -> &[M] {
        &self.slots[..self.size]
    }

    pub(crate) fn reset(&mut self) {
        self.size = 0;
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut M {
        &mut self.slots[index]
    }

    pub(crate) fn set_len(&mut self, size: usize) {
        debug_assert!(size <= self.slots.len());
        self.size = size;
    }
}

/// Fixed-capacity output buffer for batch-take delivery metadata.
///
/// Paired with a [`MessageSequence`] of equal capacity; the two `size`
/// fields always agree after a successful take.
#[derive(Clone, Debug)]
pub struct InfoSequence {
    slots: Vec<MessageInfo>,
    size: usize,
}

impl InfoSequence {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![MessageInfo::default(); capacity],
            size: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn as_slice(&self) -> &[MessageInfo] {
        &self.slots[..self.size]
    }

    pub(crate) fn reset(&mut self) {
        self.size = 0;
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut MessageInfo {
        &mut self.slots[index]
    }

    pub(crate) fn set_len(&mut self, size: usize) {
        debug_assert!(size <= self.slots.len());
        self.size = size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gid_from_u64_roundtrip_prefix() {
        let gid = Gid::from_u64(0xDEAD_BEEF);
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&gid.0[..8]);
        assert_eq!(u64::from_be_bytes(prefix), 0xDEAD_BEEF);
    }

    #[test]
    fn test_serialized_message_fill_grows() {
        let mut buf = SerializedMessage::with_capacity(2);
        buf.fill(b"0123456789");
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.as_bytes(), b"0123456789");
        buf.fill(b"ab");
        assert_eq!(buf.as_bytes(), b"ab");
    }

    #[test]
    fn test_message_sequence_untouched_slots() {
        let mut seq: MessageSequence<String> = MessageSequence::with_capacity(3);
        *seq.slot_mut(0) = "taken".to_string();
        seq.set_len(1);
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.capacity(), 3);
        assert_eq!(seq.as_slice(), &["taken".to_string()]);
    }

    #[test]
    fn test_qos_default_profile() {
        let qos = QosProfile::default();
        assert_eq!(qos.history, HistoryPolicy::KeepLast);
        assert_eq!(qos.depth, 10);
        assert_eq!(qos.reliability, ReliabilityPolicy::Reliable);
    }
}
