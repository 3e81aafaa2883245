//! Append-only term/ID vocabulary.

use dashmap::DashMap;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

/// Integer ID assigned to a term. IDs start at 1 and are never reused.
pub type TermId = u32;

/// Bidirectional term ↔ ID mapping.
///
/// IDs are assigned monotonically on first sight and never reassigned or
/// removed. Safe for concurrent writers: two threads racing on the same
/// unseen term observe a single ID.
#[derive(Debug)]
pub struct Vocabulary {
    ids: DashMap<String, TermId>,
    terms: DashMap<TermId, String>,
    next_id: AtomicU32,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

impl Vocabulary {
    pub fn new() -> Self {
        Self {
            ids: DashMap::new(),
            terms: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Return the ID for `term`, assigning the next unused ID if unseen.
    pub fn get_or_create_id(&self, term: &str) -> TermId {
        if let Some(id) = self.ids.get(term) {
            return *id;
        }
        // The entry guard holds the shard lock, so only one racer assigns.
        *self.ids.entry(term.to_string()).or_insert_with(|| {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.terms.insert(id, term.to_string());
            id
        })
    }

    /// Read-only lookup; unseen terms get no ID.
    pub fn lookup_id(&self, term: &str) -> Option<TermId> {
        self.ids.get(term).map(|id| *id)
    }

    /// Reverse lookup.
    pub fn term(&self, id: TermId) -> Option<String> {
        self.terms.get(&id).map(|t| t.clone())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ordered snapshot for persistence.
    pub fn to_map(&self) -> BTreeMap<String, TermId> {
        self.ids
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Rebuild from a persisted snapshot.
    ///
    /// Rejects snapshots that are not a bijection or that use ID 0.
    pub fn from_map(map: BTreeMap<String, TermId>) -> Result<Self, String> {
        let mut seen = HashSet::with_capacity(map.len());
        let mut max_id = 0;
        for (term, &id) in &map {
            if id == 0 {
                return Err(format!("term {term:?} has reserved id 0"));
            }
            if !seen.insert(id) {
                return Err(format!("id {id} is assigned to more than one term"));
            }
            max_id = max_id.max(id);
        }

        let next_id = max_id
            .checked_add(1)
            .ok_or_else(|| format!("id {max_id} leaves no room for new terms"))?;

        let vocab = Self {
            ids: DashMap::with_capacity(map.len()),
            terms: DashMap::with_capacity(map.len()),
            next_id: AtomicU32::new(next_id),
        };
        for (term, id) in map {
            vocab.terms.insert(id, term.clone());
            vocab.ids.insert(term, id);
        }
        Ok(vocab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_monotonic_and_stable() {
        let vocab = Vocabulary::new();
        assert_eq!(vocab.get_or_create_id("kant"), 1);
        assert_eq!(vocab.get_or_create_id("hegel"), 2);
        assert_eq!(vocab.get_or_create_id("kant"), 1);
        assert_eq!(vocab.lookup_id("hegel"), Some(2));
        assert_eq!(vocab.lookup_id("marx"), None);
        assert_eq!(vocab.term(2).as_deref(), Some("hegel"));
        assert_eq!(vocab.len(), 2);
    }

    #[test]
    fn test_from_map_continues_numbering() {
        let map = BTreeMap::from([("being".to_string(), 3), ("time".to_string(), 7)]);
        let vocab = Vocabulary::from_map(map).unwrap();
        assert_eq!(vocab.get_or_create_id("time"), 7);
        assert_eq!(vocab.get_or_create_id("nothingness"), 8);
    }

    #[test]
    fn test_from_map_rejects_duplicate_ids() {
        let map = BTreeMap::from([("being".to_string(), 3), ("time".to_string(), 3)]);
        assert!(Vocabulary::from_map(map).is_err());

        let map = BTreeMap::from([("being".to_string(), 0)]);
        assert!(Vocabulary::from_map(map).is_err());
    }

    #[test]
    fn test_from_map_rejects_exhausted_ids() {
        let map = BTreeMap::from([("being".to_string(), TermId::MAX)]);
        let err = Vocabulary::from_map(map).err().unwrap();
        assert!(err.contains("no room"), "{err}");
    }

    #[test]
    fn test_concurrent_get_or_create_assigns_once() {
        let vocab = Arc::new(Vocabulary::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let vocab = Arc::clone(&vocab);
                std::thread::spawn(move || {
                    (0..200)
                        .map(|i| vocab.get_or_create_id(&format!("term{}", i % 50)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<Vec<TermId>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for r in &results[1..] {
            assert_eq!(r, &results[0]);
        }
        assert_eq!(vocab.len(), 50);
        let ids: HashSet<_> = vocab.to_map().into_values().collect();
        assert_eq!(ids.len(), 50);
    }
}
