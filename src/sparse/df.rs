//! Document frequency table.

use super::vocab::TermId;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-term document frequencies plus the indexed document count `N`.
#[derive(Debug, Default)]
pub struct DocumentFrequencies {
    counts: DashMap<TermId, u32>,
    documents: AtomicU64,
}

impl DocumentFrequencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one document containing `term_ids`.
    ///
    /// Each ID is counted once regardless of how often the term occurs, and
    /// the document count grows by one.
    pub fn record_document(&self, term_ids: &BTreeSet<TermId>) {
        for &id in term_ids {
            *self.counts.entry(id).or_insert(0) += 1;
        }
        self.documents.fetch_add(1, Ordering::SeqCst);
    }

    /// Document frequency of `term_id`, 0 if never seen.
    pub fn get(&self, term_id: TermId) -> u32 {
        self.counts.get(&term_id).map(|c| *c).unwrap_or(0)
    }

    /// Total number of recorded documents (`N`).
    pub fn document_count(&self) -> u64 {
        self.documents.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<TermId, u32> {
        self.counts
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    /// Rebuild from persisted counts.
    ///
    /// Every count must be between 1 and `document_count`.
    pub fn from_parts(document_count: u64, counts: BTreeMap<TermId, u32>) -> Result<Self, String> {
        if let Some((id, count)) = counts
            .iter()
            .find(|&(_, &c)| c == 0 || u64::from(c) > document_count)
        {
            return Err(format!(
                "term id {id} has frequency {count} outside 1..={document_count}"
            ));
        }
        Ok(Self {
            counts: counts.into_iter().collect(),
            documents: AtomicU64::new(document_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_document_counts_once_per_document() {
        let df = DocumentFrequencies::new();
        df.record_document(&BTreeSet::from([1, 2]));
        df.record_document(&BTreeSet::from([2, 3]));

        assert_eq!(df.get(1), 1);
        assert_eq!(df.get(2), 2);
        assert_eq!(df.get(3), 1);
        assert_eq!(df.get(99), 0);
        assert_eq!(df.document_count(), 2);
    }

    #[test]
    fn test_concurrent_record_document_loses_nothing() {
        let df = Arc::new(DocumentFrequencies::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let df = Arc::clone(&df);
                std::thread::spawn(move || {
                    for i in 0..250u32 {
                        // Term 1 is in every document, term 2 in every other
                        let mut ids = BTreeSet::from([1, 100 + t]);
                        if i % 2 == 0 {
                            ids.insert(2);
                        }
                        df.record_document(&ids);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(df.document_count(), 2000);
        assert_eq!(df.get(1), 2000);
        assert_eq!(df.get(2), 1000);
        for t in 0..8 {
            assert_eq!(df.get(100 + t), 250);
        }
    }

    #[test]
    fn test_from_parts_validates_counts() {
        assert!(DocumentFrequencies::from_parts(1, BTreeMap::from([(1, 2)])).is_err());
        assert!(DocumentFrequencies::from_parts(1, BTreeMap::from([(1, 0)])).is_err());

        let df = DocumentFrequencies::from_parts(3, BTreeMap::from([(1, 2)])).unwrap();
        assert_eq!(df.get(1), 2);
        assert_eq!(df.document_count(), 3);
    }
}
