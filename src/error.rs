//! Error types for the subscription core.

use thiserror::Error;

/// Main error type for subscription operations.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Caller contract violation: null-equivalent argument, mismatched
    /// buffer capacities, over-capacity request.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The subscription is not initialized (or already finalized).
    #[error("Subscription is invalid")]
    SubscriptionInvalid,

    /// The node is not initialized, already finalized, or is not the node
    /// the subscription was initialized against.
    #[error("Node is invalid")]
    NodeInvalid,

    /// The topic name failed expansion or validation.
    #[error("Topic name invalid: {0}")]
    TopicNameInvalid(String),

    /// `init` was called on an already-initialized subscription.
    #[error("Subscription already initialized")]
    AlreadyInitialized,

    /// Allocation failure reported by the transport.
    #[error("Allocation failed")]
    BadAlloc,

    /// The transport does not implement the requested capability.
    /// A feature query result, not a defect.
    #[error("Operation unsupported by transport")]
    Unsupported,

    /// Nothing was buffered at the time of the poll. An expected outcome,
    /// not a fault.
    #[error("Take failed: no message available")]
    TakeFailed,

    /// Message encode/decode failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Opaque transport-level failure. The transport's message is
    /// preserved verbatim for diagnostics.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<crate::transport::TransportError> for SubscriptionError {
    fn from(e: crate::transport::TransportError) -> Self {
        use crate::transport::TransportError;
        match e {
            TransportError::Unsupported => SubscriptionError::Unsupported,
            TransportError::BadAlloc => SubscriptionError::BadAlloc,
            TransportError::Error(message) => SubscriptionError::Transport(message),
        }
    }
}

impl From<serde_json::Error> for SubscriptionError {
    fn from(e: serde_json::Error) -> Self {
        SubscriptionError::Serialization(e.to_string())
    }
}

/// Result type for subscription operations.
pub type Result<T> = std::result::Result<T, SubscriptionError>;
