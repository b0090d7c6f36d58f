//! Ready-made node types for [`crate::containers::HashTable`].
//!
//! `SetNode<K>` is the unordered-set entry; `MapNode<K, V>` adds a value.
//! Any key with a [`TableKey`] impl works: integers, `&'static str`
//! (pointer-compared first), or `String` for keys the node should own.

use crate::containers::hash_table::{Node, TableKey};

/// Unordered-set entry: a key, its cached hash, and the embedded link.
pub struct SetNode<K: TableKey> {
    next: *mut SetNode<K>,
    key: K,
    hash: u32,
}

impl<K: TableKey> SetNode<K> {
    pub fn new(key: K) -> Self {
        let hash = key.hash();
        Self {
            next: std::ptr::null_mut(),
            key,
            hash,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: TableKey> Node for SetNode<K> {
    type Key = K;

    fn new(key: K) -> Self {
        SetNode::new(key)
    }

    fn key(&self) -> &K {
        &self.key
    }

    fn hash(&self) -> u32 {
        self.hash
    }

    fn next(&self) -> *mut Self {
        self.next
    }

    fn next_slot(&mut self) -> &mut *mut Self {
        &mut self.next
    }
}

/// Unordered-map entry. `V` must default-construct so `insert_unique` can
/// make an empty slot for a new key; use [`MapNode::with_value`] when the
/// value is known up front.
pub struct MapNode<K: TableKey, V> {
    next: *mut MapNode<K, V>,
    key: K,
    hash: u32,
    value: V,
}

impl<K: TableKey, V> MapNode<K, V> {
    pub fn with_value(key: K, value: V) -> Self {
        let hash = key.hash();
        Self {
            next: std::ptr::null_mut(),
            key,
            hash,
            value,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }
}

impl<K: TableKey, V: Default> Node for MapNode<K, V> {
    type Key = K;

    fn new(key: K) -> Self {
        Self::with_value(key, V::default())
    }

    fn key(&self) -> &K {
        &self.key
    }

    fn hash(&self) -> u32 {
        self.hash
    }

    fn next(&self) -> *mut Self {
        self.next
    }

    fn next_slot(&mut self) -> &mut *mut Self {
        &mut self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_node_caches_hash() {
        let node = SetNode::new(77u32);
        assert_eq!(node.hash(), 77u32.hash());
        assert_eq!(*Node::key(&node), 77);
        assert!(node.next().is_null());
    }

    #[test]
    fn test_owned_string_keys() {
        let a = SetNode::new(String::from("teapot"));
        let b = SetNode::new(String::from("teapot"));
        assert_eq!(a.hash(), b.hash());
        assert!(Node::key(&a).matches(Node::key(&b)));
    }

    #[test]
    fn test_static_str_pointer_fast_path() {
        const NAME: &str = "identity";
        let a = SetNode::new(NAME);
        // Same literal pointer, must match without a byte compare.
        assert!(Node::key(&a).matches(&NAME));
    }

    #[test]
    fn test_map_node_with_value() {
        let mut node = MapNode::with_value(5u32, vec![1, 2]);
        node.value_mut().push(3);
        assert_eq!(node.value(), &[1, 2, 3]);
    }
}
