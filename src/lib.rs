//! # Courier
//!
//! The subscription side of a topic-based publish-subscribe client.
//!
//! ## Core Concepts
//!
//! - **Subscription**: A typed receive endpoint on one topic, with a
//!   strict `Uninitialized -> Initialized -> Finalized` lifecycle
//! - **Takes**: Four non-blocking retrieval modes: decoded in place,
//!   serialized bytes, batched sequence, and zero-copy loan
//! - **Content filters**: Server-side expressions that narrow which
//!   messages the transport delivers
//! - **Transport**: A capability trait behind which the wire layer lives;
//!   an in-process broker and a scripted mock ship with the crate
//!
//! ## Example
//!
//! ```
//! use courier::{
//!     MemoryTransport, Node, Subscription, SubscriptionOptions, TopicMessage,
//! };
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Clone, Debug, Default, Serialize, Deserialize)]
//! struct Strings {
//!     string_value: String,
//! }
//!
//! impl TopicMessage for Strings {
//!     fn type_name() -> &'static str {
//!         "test_msgs/Strings"
//!     }
//! }
//!
//! # fn main() -> courier::Result<()> {
//! let transport = Arc::new(MemoryTransport::new());
//! let node = Node::new("listener", "/", transport.clone())?;
//!
//! let mut subscription: Subscription<Strings> = Subscription::new();
//! subscription.init(&node, "chatter", SubscriptionOptions::default())?;
//!
//! let publisher = transport.create_publisher("/chatter", "test_msgs/Strings")?;
//! transport.publish_message(publisher, &Strings { string_value: "hi".into() })?;
//!
//! let mut message = Strings::default();
//! subscription.take(&mut message, None)?;
//! assert_eq!(message.string_value, "hi");
//!
//! subscription.fini(&node)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod filter;
pub mod naming;
pub mod node;
pub mod options;
pub mod subscription;
pub mod transport;
pub mod types;

// Re-exports
pub use error::{Result, SubscriptionError};
pub use filter::ContentFilterOptions;
pub use naming::expand_topic_name;
pub use node::{Node, NodeId};
pub use options::{resolve_loan_disable, SubscriptionOptions, DISABLE_LOANED_MESSAGES_ENV};
pub use subscription::{LoanedMessage, Subscription};
pub use transport::memory::{MemoryTransport, PublisherId};
pub use transport::mock::MockTransport;
pub use transport::{EndpointRequest, Sample, Transport, TransportError, TransportResult};
pub use types::*;
