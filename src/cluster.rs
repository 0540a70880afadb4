//! Cluster routing
//!
//! Spreads keys over several connections by hash tag.
//!
//! ## Routing
//! ```text
//!   "user{42}"  ──hash tag──▶ "42" ──crc32──▶ slot % nodes ──▶ node
//! ```
//! Keys sharing a hash tag always land on the same node, so everything
//! stored for one primary key travels in one round trip.

use std::sync::Arc;

use crate::backend::Connection;
use crate::error::{PipeError, Result};

/// A fixed set of nodes addressed by key
#[derive(Clone)]
pub struct Cluster {
    nodes: Vec<Arc<dyn Connection>>,
}

impl Cluster {
    /// Create a cluster over the given nodes (at least one)
    pub fn new(nodes: Vec<Arc<dyn Connection>>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(PipeError::Config("a cluster needs at least one node".to_string()));
        }
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[Arc<dyn Connection>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node index for a key
    pub fn slot_for(&self, key: &[u8]) -> usize {
        crc32fast::hash(hash_tag(key)) as usize % self.nodes.len()
    }

    /// Node responsible for a key
    pub fn node_for(&self, key: &[u8]) -> &Arc<dyn Connection> {
        &self.nodes[self.slot_for(key)]
    }
}

/// The part of a key that decides its node
///
/// Text between the first `{` and the next `}`, when non-empty;
/// otherwise the whole key.
pub fn hash_tag(key: &[u8]) -> &[u8] {
    if let Some(open) = key.iter().position(|&b| b == b'{') {
        if let Some(len) = key[open + 1..].iter().position(|&b| b == b'}') {
            if len > 0 {
                return &key[open + 1..open + 1 + len];
            }
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_tag_extraction() {
        assert_eq!(hash_tag(b"user{42}"), b"42");
        assert_eq!(hash_tag(b"{a}b{c}"), b"a");
        assert_eq!(hash_tag(b"plain"), b"plain");
        assert_eq!(hash_tag(b"empty{}tag"), b"empty{}tag");
        assert_eq!(hash_tag(b"open{only"), b"open{only");
    }
}
