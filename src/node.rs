//! Node collaborator.
//!
//! A node is the identity a subscription is created under: it supplies the
//! name and namespace used for topic expansion and the transport handle
//! endpoints are created against. Subscriptions hold a non-owning reference
//! to their node; the node must outlive them.

use crate::error::{Result, SubscriptionError};
use crate::transport::Transport;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a node instance within the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeState {
    Initialized,
    Finalized,
}

/// A live node handle.
pub struct Node {
    id: NodeId,
    name: String,
    namespace: String,
    transport: Arc<dyn Transport>,
    state: NodeState,
}

impl Node {
    /// Create a node with the given name under `namespace` (must be
    /// fully qualified, e.g. `"/"` or `"/robot1"`).
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let name = name.into();
        let namespace = namespace.into();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(SubscriptionError::InvalidArgument(format!(
                "invalid node name '{}'",
                name
            )));
        }
        if !namespace.starts_with('/') {
            return Err(SubscriptionError::InvalidArgument(format!(
                "namespace '{}' is not fully qualified",
                namespace
            )));
        }
        Ok(Self {
            id: NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)),
            name,
            namespace,
            transport,
            state: NodeState::Initialized,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// True until the node is finalized.
    pub fn is_valid(&self) -> bool {
        self.state == NodeState::Initialized
    }

    /// The transport handle, or None once finalized (callers treat a
    /// missing handle as a node-validity failure).
    pub fn transport(&self) -> Option<&Arc<dyn Transport>> {
        match self.state {
            NodeState::Initialized => Some(&self.transport),
            NodeState::Finalized => None,
        }
    }

    /// Finalize the node. Subscriptions created under it must already have
    /// been finalized; this handle only flips its own validity.
    pub fn fini(&mut self) {
        self.state = NodeState::Finalized;
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[test]
    fn test_node_lifecycle() {
        let transport: Arc<dyn Transport> = Arc::new(MockTransport::new());
        let mut node = Node::new("listener", "/", transport).unwrap();
        assert!(node.is_valid());
        assert!(node.transport().is_some());

        node.fini();
        assert!(!node.is_valid());
        assert!(node.transport().is_none());
    }

    #[test]
    fn test_node_ids_unique() {
        let transport: Arc<dyn Transport> = Arc::new(MockTransport::new());
        let a = Node::new("a", "/", Arc::clone(&transport)).unwrap();
        let b = Node::new("b", "/", transport).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_bad_node_arguments() {
        let transport: Arc<dyn Transport> = Arc::new(MockTransport::new());
        assert!(Node::new("spaced name", "/", Arc::clone(&transport)).is_err());
        assert!(Node::new("ok", "relative", transport).is_err());
    }
}
