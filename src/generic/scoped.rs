/*!
Scoped containers with push/pop frame semantics.

A [ScopedMap] (and a [ScopedSet]) records, per frame, which keys were inserted.
[push](ScopedMap::push) opens a frame; [pop](ScopedMap::pop) removes every insertion made since the matching push.

The [bridge](crate::bridge) keeps its variable maps and its set of definitional variables in these containers, so that the boolean backend and the symbolic layer stay aligned across incremental solves.
*/

use std::collections::HashMap;
use std::hash::Hash;

/// A map which can forget insertions by frame.
///
/// Insertions never overwrite: a key is bound at most once per lifetime of its frame stack.
#[derive(Clone, Debug)]
pub struct ScopedMap<K, V> {
    map: HashMap<K, V>,
    inserted: Vec<K>,
    frames: Vec<usize>,
}

impl<K: Eq + Hash + Clone, V> Default for ScopedMap<K, V> {
    fn default() -> Self {
        ScopedMap {
            map: HashMap::default(),
            inserted: Vec::default(),
            frames: Vec::default(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> ScopedMap<K, V> {
    pub fn insert(&mut self, key: K, value: V) {
        if self.map.insert(key.clone(), value).is_none() {
            self.inserted.push(key);
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Opens a frame.
    pub fn push(&mut self) {
        self.frames.push(self.inserted.len());
    }

    /// Closes the most recent frame, removing every key inserted within it.
    ///
    /// Without an open frame, a no-op.
    pub fn pop(&mut self) {
        if let Some(mark) = self.frames.pop() {
            for key in self.inserted.split_off(mark) {
                self.map.remove(&key);
            }
        }
    }
}

/// A set which can forget insertions by frame.
#[derive(Clone, Debug)]
pub struct ScopedSet<K> {
    inner: ScopedMap<K, ()>,
}

impl<K: Eq + Hash + Clone> Default for ScopedSet<K> {
    fn default() -> Self {
        ScopedSet {
            inner: ScopedMap::default(),
        }
    }
}

impl<K: Eq + Hash + Clone> ScopedSet<K> {
    pub fn insert(&mut self, key: K) {
        self.inner.insert(key, ());
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn push(&mut self) {
        self.inner.push();
    }

    pub fn pop(&mut self) {
        self.inner.pop();
    }
}

#[cfg(test)]
mod scoped_tests {
    use super::*;

    #[test]
    fn pop_forgets_the_frame() {
        let mut map = ScopedMap::default();

        map.insert("base", 0);
        map.push();
        map.insert("frame", 1);

        assert!(map.contains_key(&"frame"));

        map.pop();

        assert!(!map.contains_key(&"frame"));
        assert_eq!(map.get(&"base"), Some(&0));
    }

    #[test]
    fn frames_nest() {
        let mut set = ScopedSet::default();

        set.push();
        set.insert(1);
        set.push();
        set.insert(2);

        set.pop();
        assert!(set.contains(&1));
        assert!(!set.contains(&2));

        set.pop();
        assert!(!set.contains(&1));
    }
}
