//! # Lazy Queue
//!
//! Singly linked FIFO with two ways out:
//!
//! ```text
//!  head                    claim                       tail
//!   │                        │                           │
//!   ▼                        ▼                           ▼
//! [del] ──> [del] ──> [ key ] ──> [ key ] ──> ... ──> [ key ]
//!  └─ claimed, still linked ─┘└──────── unclaimed ──────────┘
//! ```
//!
//! - [`LazyQueue::claim`] (any participant): marks the node under the claim
//!   cursor deleted, takes its key and advances the cursor. Nothing is
//!   unlinked, so a thief only writes one node and the cursor.
//! - [`LazyQueue::dequeue`] (the owner): unlinks the claimed prefix, then
//!   pops the first unclaimed node.
//!
//! Claims always advance from the front, so claimed nodes form a prefix of
//! the list and the claim cursor is exactly the first unclaimed node.

use crate::arena::{NodeArena, NodeRef};

struct Node<K> {
    key: Option<K>,
    next: Option<NodeRef>,
    deleted: bool,
}

/// FIFO queue supporting non-destructive claims.
pub struct LazyQueue<K> {
    nodes: NodeArena<Node<K>>,
    head: Option<NodeRef>,
    tail: Option<NodeRef>,
    claim: Option<NodeRef>,
    unclaimed: usize,
}

impl<K> LazyQueue<K> {
    /// Creates an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: NodeArena::new(),
            head: None,
            tail: None,
            claim: None,
            unclaimed: 0,
        }
    }

    /// Appends `key`.
    pub fn enqueue(&mut self, key: K) {
        let node = self.nodes.insert(Node {
            key: Some(key),
            next: None,
            deleted: false,
        });

        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(node),
            None => self.head = Some(node),
        }
        self.tail = Some(node);

        // Everything before the new node may already be claimed.
        if self.claim.is_none() {
            self.claim = Some(node);
        }
        self.unclaimed += 1;
    }

    /// Unlinks claimed nodes at the front, then pops the first unclaimed key.
    pub fn dequeue(&mut self) -> Option<K> {
        self.compact();

        let head = self.head?;
        let node = self.nodes.remove(head)?;
        self.head = node.next;
        if self.head.is_none() {
            self.tail = None;
        }
        self.claim = self.head;
        self.unclaimed -= 1;
        node.key
    }

    /// Claims the first unclaimed key without unlinking its node.
    pub fn claim(&mut self) -> Option<K> {
        let current = self.claim?;
        let node = &mut self.nodes[current];
        node.deleted = true;
        let key = node.key.take();
        self.claim = node.next;
        self.unclaimed -= 1;
        key
    }

    /// Whether no unclaimed key remains. Claimed nodes still linked do not
    /// count.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claim.is_none()
    }

    /// Number of unclaimed keys.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.unclaimed
    }

    /// Number of linked nodes, claimed ones included.
    #[inline]
    #[must_use]
    pub fn linked(&self) -> usize {
        self.nodes.len()
    }

    fn compact(&mut self) {
        while let Some(head) = self.head {
            if !self.nodes[head].deleted {
                break;
            }
            self.head = self.nodes.remove(head).and_then(|node| node.next);
        }
        if self.head.is_none() {
            self.tail = None;
        }
    }
}

impl<K> Default for LazyQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}
