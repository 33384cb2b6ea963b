//! The inverted index itself: plain data structures with no locking of
//! their own, mirroring the storage crate's index layer — the caller
//! (`FtsIndex`) owns the lock that guards an instance.

use std::collections::{HashMap, HashSet};

use graphdb_api::NodeId;

use crate::tokenizer::tokenize;

/// `term -> positions` for a single indexed document, plus the reverse
/// `term -> set of documents` mapping needed for AND-intersection and
/// document-frequency lookups. Kept as two views over the same facts so
/// removal (`UpdateNode`) never has to scan every term in the index.
#[derive(Default)]
pub struct InvertedIndex {
    doc_terms: HashMap<NodeId, HashMap<String, Vec<usize>>>,
    postings: HashMap<String, HashSet<NodeId>>,
    labels: Vec<String>,
    property_keys: Vec<String>,
}

impl InvertedIndex {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn property_keys(&self) -> &[String] {
        &self.property_keys
    }

    pub fn set_config(&mut self, labels: Vec<String>, property_keys: Vec<String>) {
        self.labels = labels;
        self.property_keys = property_keys;
    }

    pub fn doc_count(&self) -> usize {
        self.doc_terms.len()
    }

    pub fn clear(&mut self) {
        self.doc_terms.clear();
        self.postings.clear();
    }

    /// Concatenates `property_keys` into a single document body. Shared by
    /// the build step and by `UpdateNode` so both tokenize identically.
    pub fn document_text(node: &graphdb_api::Node, property_keys: &[String]) -> String {
        property_keys
            .iter()
            .filter_map(|key| node.properties.get(key))
            .filter_map(|value| value.as_str().ok())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn insert_document(&mut self, node: NodeId, text: &str) {
        self.remove_document(node);
        let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, term) in tokenize(text).into_iter().enumerate() {
            positions.entry(term).or_default().push(position);
        }
        for term in positions.keys() {
            self.postings.entry(term.clone()).or_default().insert(node);
        }
        self.doc_terms.insert(node, positions);
    }

    pub fn remove_document(&mut self, node: NodeId) {
        let Some(terms) = self.doc_terms.remove(&node) else {
            return;
        };
        for term in terms.keys() {
            if let Some(set) = self.postings.get_mut(term) {
                set.remove(&node);
                if set.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
    }

    pub fn contains_document(&self, node: NodeId) -> bool {
        self.doc_terms.contains_key(&node)
    }

    pub fn postings(&self, term: &str) -> Option<&HashSet<NodeId>> {
        self.postings.get(term)
    }

    pub fn indexed_terms(&self) -> impl Iterator<Item = &String> {
        self.postings.keys()
    }

    pub fn positions(&self, node: NodeId, term: &str) -> Option<&[usize]> {
        self.doc_terms.get(&node).and_then(|terms| terms.get(term)).map(Vec::as_slice)
    }

    pub fn term_frequency(&self, node: NodeId, term: &str) -> usize {
        self.positions(node, term).map(<[usize]>::len).unwrap_or(0)
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map(HashSet::len).unwrap_or(0)
    }

    /// `idf(t) = ln((N+1)/(df(t)+1))`, per the scoring formula.
    pub fn inverse_document_frequency(&self, term: &str) -> f64 {
        let n = self.doc_count() as f64;
        let df = self.document_frequency(term) as f64;
        ((n + 1.0) / (df + 1.0)).ln()
    }

    /// `score(d) = Σ tf(t,d) · (1 + idf(t))` over the given terms.
    pub fn score(&self, node: NodeId, terms: &[String]) -> f64 {
        terms
            .iter()
            .map(|term| self.term_frequency(node, term) as f64 * (1.0 + self.inverse_document_frequency(term)))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup_postings() {
        let mut idx = InvertedIndex::default();
        idx.insert_document(1, "software engineer");
        idx.insert_document(2, "data scientist");
        idx.insert_document(3, "software architect");
        assert_eq!(idx.document_frequency("software"), 2);
        assert_eq!(idx.postings("software").unwrap().len(), 2);
        assert_eq!(idx.term_frequency(1, "software"), 1);
    }

    #[test]
    fn remove_document_drops_empty_postings() {
        let mut idx = InvertedIndex::default();
        idx.insert_document(1, "alpha beta");
        idx.remove_document(1);
        assert!(idx.postings("alpha").is_none());
        assert_eq!(idx.doc_count(), 0);
    }

    #[test]
    fn reinsert_replaces_prior_terms() {
        let mut idx = InvertedIndex::default();
        idx.insert_document(1, "alpha beta");
        idx.insert_document(1, "gamma");
        assert!(idx.postings("alpha").is_none());
        assert_eq!(idx.postings("gamma").unwrap().len(), 1);
    }

    #[test]
    fn positions_track_word_offsets() {
        let mut idx = InvertedIndex::default();
        idx.insert_document(1, "new york city is amazing");
        assert_eq!(idx.positions(1, "new"), Some(&[0][..]));
        assert_eq!(idx.positions(1, "city"), Some(&[2][..]));
    }
}
