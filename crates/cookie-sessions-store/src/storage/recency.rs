//! Doubly-linked recency list backed by a slot arena.
//!
//! Front is the most recently used node, back the least recently used.
//! All operations are O(1). A [`NodeRef`] stays valid until its node is
//! removed; after that the slot may be reused by a later push.

/// Handle to a node in a [`RecencyList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef(usize);

struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Recency-ordered list.
pub struct RecencyList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for RecencyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecencyList<T> {
    /// Create an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Number of nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the list is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Most recently used node.
    #[must_use]
    pub fn front(&self) -> Option<NodeRef> {
        self.head.map(NodeRef)
    }

    /// Least recently used node.
    #[must_use]
    pub fn back(&self) -> Option<NodeRef> {
        self.tail.map(NodeRef)
    }

    /// Insert `value` at the front.
    pub fn push_front(&mut self, value: T) -> NodeRef {
        let node = Some(Node {
            value,
            prev: None,
            next: None,
        });
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = node;
                idx
            }
            None => {
                self.slots.push(node);
                self.slots.len() - 1
            }
        };
        self.link_front(idx);
        self.len += 1;
        NodeRef(idx)
    }

    /// Move `node` to the front.
    pub fn move_to_front(&mut self, node: NodeRef) {
        if self.head == Some(node.0) || self.node(node.0).is_none() {
            return;
        }
        self.unlink(node.0);
        self.link_front(node.0);
    }

    /// Remove `node`, returning its value.
    pub fn remove(&mut self, node: NodeRef) -> Option<T> {
        self.node(node.0)?;
        self.unlink(node.0);
        let removed = self.slots.get_mut(node.0)?.take()?;
        self.free.push(node.0);
        self.len -= 1;
        Some(removed.value)
    }

    /// Value stored at `node`.
    #[must_use]
    pub fn get(&self, node: NodeRef) -> Option<&T> {
        self.node(node.0).map(|n| &n.value)
    }

    /// Mutable value stored at `node`.
    pub fn get_mut(&mut self, node: NodeRef) -> Option<&mut T> {
        self.node_mut(node.0).map(|n| &mut n.value)
    }

    /// Iterate from front (most recent) to back (least recent).
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            next: self.head,
        }
    }

    fn node(&self, idx: usize) -> Option<&Node<T>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<T>> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    fn unlink(&mut self, idx: usize) {
        let Some(node) = self.node_mut(idx) else {
            return;
        };
        let (prev, next) = (node.prev.take(), node.next.take());

        match prev {
            Some(p) => {
                if let Some(prev_node) = self.node_mut(p) {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(next_node) = self.node_mut(n) {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn link_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => {
                if let Some(head_node) = self.node_mut(h) {
                    head_node.prev = Some(idx);
                }
            }
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }
}

/// Front-to-back iterator over a [`RecencyList`].
pub struct Iter<'a, T> {
    list: &'a RecencyList<T>,
    next: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.node(self.next?)?;
        self.next = node.next;
        Some(&node.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(list: &RecencyList<&'static str>) -> Vec<&'static str> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_push_front_orders_most_recent_first() {
        let mut list = RecencyList::new();
        list.push_front("a");
        list.push_front("b");
        list.push_front("c");
        assert_eq!(collect(&list), vec!["c", "b", "a"]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(list.back().unwrap()), Some(&"a"));
        assert_eq!(list.get(list.front().unwrap()), Some(&"c"));
    }

    #[test]
    fn test_move_to_front() {
        let mut list = RecencyList::new();
        let a = list.push_front("a");
        let b = list.push_front("b");
        list.push_front("c");

        list.move_to_front(b);
        assert_eq!(collect(&list), vec!["b", "c", "a"]);

        list.move_to_front(a);
        assert_eq!(collect(&list), vec!["a", "b", "c"]);
        assert_eq!(list.get(list.back().unwrap()), Some(&"c"));

        // Already at the front.
        list.move_to_front(a);
        assert_eq!(collect(&list), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_head_middle_tail() {
        let mut list = RecencyList::new();
        let a = list.push_front("a");
        let b = list.push_front("b");
        let c = list.push_front("c");
        let d = list.push_front("d");

        assert_eq!(list.remove(b), Some("b"));
        assert_eq!(collect(&list), vec!["d", "c", "a"]);

        assert_eq!(list.remove(d), Some("d"));
        assert_eq!(collect(&list), vec!["c", "a"]);

        assert_eq!(list.remove(a), Some("a"));
        assert_eq!(collect(&list), vec!["c"]);
        assert_eq!(list.front(), list.back());

        assert_eq!(list.remove(c), Some("c"));
        assert!(list.is_empty());
        assert_eq!(list.front(), None);
        assert_eq!(list.back(), None);

        assert_eq!(list.remove(c), None);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut list = RecencyList::new();
        let a = list.push_front("a");
        list.push_front("b");
        list.remove(a);
        let c = list.push_front("c");
        assert_eq!(c, a);
        assert_eq!(collect(&list), vec!["c", "b"]);
        assert_eq!(list.slots.len(), 2);
    }

    #[test]
    fn test_get_mut() {
        let mut list = RecencyList::new();
        let node = list.push_front(1);
        *list.get_mut(node).unwrap() += 41;
        assert_eq!(list.get(node), Some(&42));
    }
}
