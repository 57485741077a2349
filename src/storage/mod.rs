//! In-memory item store
//!
//! [`ItemStore`] keeps every distinct item exactly once, ordered newest first
//! with undated items trailing. The order is restored on every write so a
//! reader never has to sort and never observes a half-sorted sequence.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::Item;

/// Identity set and sorted sequence, always updated together
#[derive(Debug, Default)]
struct Inner {
    seen: HashSet<String>,
    sorted: Vec<Item>,
}

impl Inner {
    /// Append if the identity is new. Does not sort.
    fn push_if_absent(&mut self, item: Item) -> bool {
        if self.seen.contains(item.id()) {
            return false;
        }
        self.seen.insert(item.link.clone());
        self.sorted.push(item);
        true
    }

    fn sort(&mut self) {
        // Stable, so undated items keep their insertion order.
        self.sorted.sort_by(Item::cmp_recency);
    }
}

/// Thread-safe deduplicating store ordered by publication time
///
/// The first copy of an identity wins; later duplicates are dropped.
#[derive(Debug, Default)]
pub struct ItemStore {
    inner: RwLock<Inner>,
}

impl ItemStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    // A panic inside a writer cannot leave `Inner` inconsistent (push and
    // insert happen before any sort), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a single item if its identity is not present yet.
    ///
    /// Returns `true` when the item was inserted.
    pub fn add_one(&self, item: Item) -> bool {
        let mut inner = self.write();
        let inserted = inner.push_if_absent(item);
        if inserted {
            inner.sort();
        }
        inserted
    }

    /// Insert every item whose identity is not present yet, then sort once.
    ///
    /// Duplicates inside `items` are resolved the same way: first one wins.
    /// Returns the number of items inserted.
    pub fn add_many<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = Item>,
    {
        let mut inner = self.write();
        let mut inserted = 0;
        for item in items {
            if inner.push_if_absent(item) {
                inserted += 1;
            }
        }
        if inserted > 0 {
            inner.sort();
        }

        tracing::debug!(inserted, total = inner.sorted.len(), "Items added to store");
        inserted
    }

    /// Copy of the `n` most recent items (all of them if `n` exceeds the count)
    pub fn get_recent(&self, n: usize) -> Vec<Item> {
        let inner = self.read();
        let end = n.min(inner.sorted.len());
        inner.sorted[..end].to_vec()
    }

    /// Number of distinct items
    pub fn count(&self) -> usize {
        self.read().sorted.len()
    }

    /// True when nothing has been stored yet
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Check whether an identity is already stored
    pub fn contains(&self, link: &str) -> bool {
        self.read().seen.contains(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(link: &str, secs: Option<i64>) -> Item {
        Item::new(link, secs.and_then(|s| Utc.timestamp_opt(s, 0).single()))
    }

    fn links(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.link.as_str()).collect()
    }

    #[test]
    fn test_recent_scenario() {
        let store = ItemStore::new();
        store.add_many(vec![
            item("A", Some(10)),
            item("B", Some(5)),
            item("C", None),
        ]);

        assert_eq!(links(&store.get_recent(2)), vec!["A", "B"]);
        assert_eq!(links(&store.get_recent(10)), vec!["A", "B", "C"]);
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn test_get_recent_zero_is_empty() {
        let store = ItemStore::new();
        store.add_one(item("A", Some(1)));
        assert!(store.get_recent(0).is_empty());
    }

    #[test]
    fn test_first_copy_wins() {
        let store = ItemStore::new();
        assert!(store.add_one(item("A", Some(1)).with_title("first")));
        assert!(!store.add_one(item("A", Some(99)).with_title("second")));

        let recent = store.get_recent(1);
        assert_eq!(recent[0].title, "first");
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_add_many_dedups_within_batch() {
        let store = ItemStore::new();
        let inserted = store.add_many(vec![
            item("A", Some(1)),
            item("A", Some(2)),
            item("B", None),
        ]);
        assert_eq!(inserted, 2);
        assert_eq!(store.count(), 2);
        assert!(store.contains("A"));
        assert!(!store.contains("Z"));
    }

    #[test]
    fn test_add_one_keeps_order() {
        let store = ItemStore::new();
        store.add_one(item("old", Some(1)));
        store.add_one(item("undated", None));
        store.add_one(item("new", Some(3)));
        assert_eq!(links(&store.get_recent(3)), vec!["new", "old", "undated"]);
    }

    #[test]
    fn test_returned_items_are_copies() {
        let store = ItemStore::new();
        store.add_many(vec![item("A", Some(2)), item("B", Some(1))]);

        let mut recent = store.get_recent(2);
        recent[0].title = "mutated".into();
        recent.clear();

        let again = store.get_recent(2);
        assert_eq!(links(&again), vec!["A", "B"]);
        assert_eq!(again[0].title, "");
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        use std::sync::Arc;

        let store = Arc::new(ItemStore::new());
        let mut handles = Vec::new();

        for writer in 0..4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for batch in 0..25 {
                    let items = (0..4)
                        .map(|i| item(&format!("{}", (batch * 4 + i) % 50), Some(writer * 100 + i)))
                        .collect::<Vec<_>>();
                    store.add_many(items);
                }
            }));
        }

        for _ in 0..2 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    let recent = store.get_recent(20);
                    assert!(recent
                        .windows(2)
                        .all(|w| w[0].cmp_recency(&w[1]) != std::cmp::Ordering::Greater));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.count(), 50);
    }
}
