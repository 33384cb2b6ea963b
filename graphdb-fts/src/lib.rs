//! Full-text index over string-typed node properties: an inverted index
//! with TF-IDF scoring, phrase search, fuzzy search, boolean queries, and
//! per-property restriction.
//!
//! The index holds its own reader-writer lock, independent of whatever
//! lock the store uses. Building or updating the index follows a strict
//! two-phase rule: collect the node set and text from the store first
//! (while holding no lock of our own), then mutate index state under our
//! own write lock. The index never calls back into the store while
//! holding that write lock, so the store-calls-index / index-calls-store
//! deadlock the source once hit can't recur here.
//!
//! ```ignore
//! let fts = FtsIndex::new();
//! fts.build_index(&backend, &["Person".into()], &["name".into(), "description".into()])?;
//! let hits = fts.search("software")?;
//! ```

pub mod boolean;
pub mod error;
pub mod index;
pub mod levenshtein;
pub mod tokenizer;

pub use error::{FtsError, Result};

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use boolean::BooleanExpr;
use graphdb_api::{GraphBackend, NodeId};
use index::InvertedIndex;
use tokenizer::tokenize;

/// A node matched by a query, with its TF-IDF score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredHit {
    pub node_id: NodeId,
    pub score: f64,
}

fn ranked(mut hits: Vec<ScoredHit>) -> Vec<ScoredHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    hits
}

pub struct FtsIndex {
    inner: RwLock<InvertedIndex>,
}

impl Default for FtsIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl FtsIndex {
    pub fn new() -> Self {
        FtsIndex { inner: RwLock::new(InvertedIndex::default()) }
    }

    /// Rebuilds the index from scratch over every node carrying any of
    /// `labels`, concatenating the string-typed `property_keys`.
    pub fn build_index(
        &self,
        backend: &dyn GraphBackend,
        labels: &[String],
        property_keys: &[String],
    ) -> Result<()> {
        // Phase 1: collect node ids + document text through the store's own
        // locking, holding none of our own.
        let mut seen = HashSet::new();
        let mut documents = Vec::new();
        for label in labels {
            for node in backend.find_nodes_by_label(label) {
                if seen.insert(node.id) {
                    let text = InvertedIndex::document_text(&node, property_keys);
                    documents.push((node.id, text));
                }
            }
        }
        documents.sort_by_key(|(id, _)| *id);

        // Phase 2: mutate index state under our own lock only.
        let mut index = self.inner.write().expect("fts index lock poisoned");
        index.clear();
        index.set_config(labels.to_vec(), property_keys.to_vec());
        for (node_id, text) in documents {
            index.insert_document(node_id, &text);
        }
        Ok(())
    }

    /// Re-indexes a single node after it changed: drops its old postings,
    /// then re-reads it and re-indexes if it still carries a configured
    /// label. A node that no longer exists or no longer matches is simply
    /// removed.
    pub fn update_node(&self, backend: &dyn GraphBackend, id: NodeId) -> Result<()> {
        let (labels, property_keys) = {
            let index = self.inner.read().expect("fts index lock poisoned");
            (index.labels().to_vec(), index.property_keys().to_vec())
        };

        let reindexed = match backend.get_node(id) {
            Ok(node) if labels.iter().any(|label| node.has_label(label)) => {
                Some(InvertedIndex::document_text(&node, &property_keys))
            }
            _ => None,
        };

        let mut index = self.inner.write().expect("fts index lock poisoned");
        index.remove_document(id);
        if let Some(text) = reindexed {
            index.insert_document(id, &text);
        }
        Ok(())
    }

    /// Tokenizes `q`, intersects posting lists (AND), scores with TF-IDF,
    /// sorts descending (ties broken by ascending node id).
    pub fn search(&self, q: &str) -> Result<Vec<ScoredHit>> {
        let terms = unique_terms(&tokenize(q));
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let index = self.inner.read().expect("fts index lock poisoned");
        let Some(candidates) = intersect_postings(&index, &terms) else {
            return Ok(Vec::new());
        };
        Ok(ranked(
            candidates.into_iter().map(|node_id| ScoredHit { node_id, score: index.score(node_id, &terms) }).collect(),
        ))
    }

    /// AND-filters on the phrase's tokens, then keeps only documents where
    /// the tokens occur at consecutive positions in that order.
    pub fn search_phrase(&self, q: &str) -> Result<Vec<ScoredHit>> {
        let phrase = tokenize(q);
        if phrase.is_empty() {
            return Ok(Vec::new());
        }
        let unique = unique_terms(&phrase);
        let index = self.inner.read().expect("fts index lock poisoned");
        let Some(candidates) = intersect_postings(&index, &unique) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for node_id in candidates {
            if contains_phrase(&index, node_id, &phrase) {
                hits.push(ScoredHit { node_id, score: index.score(node_id, &unique) });
            }
        }
        Ok(ranked(hits))
    }

    /// Evaluates a shallow `AND`/`OR`/`NOT` expression over single terms.
    pub fn search_boolean(&self, q: &str) -> Result<Vec<ScoredHit>> {
        let expr = boolean::parse(q)?;
        let index = self.inner.read().expect("fts index lock poisoned");
        let scores = eval_boolean(&index, &expr);
        Ok(ranked(scores.into_iter().map(|(node_id, score)| ScoredHit { node_id, score }).collect()))
    }

    /// Finds every indexed term within Levenshtein distance `max_edit` of
    /// any token of `q` and unions their posting lists.
    pub fn search_fuzzy(&self, q: &str, max_edit: usize) -> Result<Vec<ScoredHit>> {
        let query_terms = tokenize(q);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }
        let index = self.inner.read().expect("fts index lock poisoned");
        let mut matched_terms = Vec::new();
        for indexed_term in index.indexed_terms() {
            if query_terms.iter().any(|q| levenshtein::edit_distance(q, indexed_term) <= max_edit) {
                matched_terms.push(indexed_term.clone());
            }
        }

        let mut scores: HashMap<NodeId, f64> = HashMap::new();
        for term in &matched_terms {
            if let Some(postings) = index.postings(term) {
                for &node_id in postings {
                    *scores.entry(node_id).or_insert(0.0) += index.score(node_id, std::slice::from_ref(term));
                }
            }
        }
        Ok(ranked(scores.into_iter().map(|(node_id, score)| ScoredHit { node_id, score }).collect()))
    }

    /// Restricts `Search(q)` to documents where the match is re-confirmed
    /// inside the single named property, by reading the node back from the
    /// store.
    pub fn search_in_property(&self, backend: &dyn GraphBackend, key: &str, q: &str) -> Result<Vec<ScoredHit>> {
        let hits = self.search(q)?;
        let terms = unique_terms(&tokenize(q));
        let mut kept = Vec::new();
        for hit in hits {
            let node = backend.get_node(hit.node_id)?;
            let Some(value) = node.properties.get(key) else { continue };
            let Ok(text) = value.as_str() else { continue };
            let property_terms: HashSet<String> = tokenize(text).into_iter().collect();
            if terms.iter().all(|term| property_terms.contains(term)) {
                kept.push(hit);
            }
        }
        Ok(kept)
    }
}

fn unique_terms(tokens: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut terms = Vec::new();
    for token in tokens {
        if seen.insert(token.clone()) {
            terms.push(token.clone());
        }
    }
    terms
}

/// Intersects the posting lists of every term. `None` (as opposed to an
/// empty set) means at least one term isn't indexed at all, so the AND
/// query has no matches — distinguished only to avoid treating "no terms
/// at all" the same as "all posting lists empty".
fn intersect_postings(index: &InvertedIndex, terms: &[String]) -> Option<HashSet<NodeId>> {
    let mut candidates: Option<HashSet<NodeId>> = None;
    for term in terms {
        let postings = index.postings(term)?.clone();
        candidates = Some(match candidates {
            Some(existing) => existing.intersection(&postings).copied().collect(),
            None => postings,
        });
    }
    candidates
}

fn contains_phrase(index: &InvertedIndex, node: NodeId, phrase: &[String]) -> bool {
    let Some(first_positions) = index.positions(node, &phrase[0]) else { return false };
    'candidate: for &start in first_positions {
        for (offset, term) in phrase.iter().enumerate().skip(1) {
            let Some(positions) = index.positions(node, term) else { continue 'candidate };
            if !positions.contains(&(start + offset)) {
                continue 'candidate;
            }
        }
        return true;
    }
    false
}

fn eval_boolean(index: &InvertedIndex, expr: &BooleanExpr) -> HashMap<NodeId, f64> {
    match expr {
        BooleanExpr::Term(term) => {
            let terms = vec![term.clone()];
            index
                .postings(term)
                .map(|set| set.iter().map(|&id| (id, index.score(id, &terms))).collect())
                .unwrap_or_default()
        }
        BooleanExpr::And(left, right) => {
            let left = eval_boolean(index, left);
            let right = eval_boolean(index, right);
            left.into_iter()
                .filter_map(|(id, score)| right.get(&id).map(|right_score| (id, score + right_score)))
                .collect()
        }
        BooleanExpr::Or(left, right) => {
            let mut combined = eval_boolean(index, left);
            for (id, score) in eval_boolean(index, right) {
                *combined.entry(id).or_insert(0.0) += score;
            }
            combined
        }
        BooleanExpr::Not(left, right) => {
            let mut left = eval_boolean(index, left);
            let right = eval_boolean(index, right);
            left.retain(|id, _| !right.contains_key(id));
            left
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphdb_api::GraphWriter;
    use graphdb_storage::{Config, Engine};

    fn backend_with(docs: &[(&str, &[(&str, &str)])]) -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(&Config::new(dir.path())).unwrap();
        for (label, props) in docs {
            let properties = props
                .iter()
                .map(|(k, v)| (k.to_string(), graphdb_api::Value::String(v.to_string())))
                .collect();
            engine.create_node(vec![label.to_string()], properties).unwrap();
        }
        (dir, engine)
    }

    #[test]
    fn search_returns_documents_containing_all_terms_ranked_by_tfidf() {
        let (_dir, backend) = backend_with(&[
            ("Person", &[("name", "Alice Johnson"), ("description", "Software engineer")]),
            ("Person", &[("name", "Bob Smith"), ("description", "Data scientist")]),
            ("Person", &[("name", "Charlie Brown"), ("description", "Software architect")]),
        ]);
        let fts = FtsIndex::new();
        fts.build_index(&backend, &["Person".into()], &["name".into(), "description".into()]).unwrap();

        let hits = fts.search("software").unwrap();
        let ids: HashSet<NodeId> = hits.iter().map(|h| h.node_id).collect();
        assert_eq!(ids, HashSet::from([1, 3]));
    }

    #[test]
    fn search_phrase_requires_adjacency() {
        let (_dir, backend) = backend_with(&[
            ("Doc", &[("body", "New York City is amazing")]),
            ("Doc", &[("body", "York is a city")]),
            ("Doc", &[("body", "I live in New York")]),
        ]);
        let fts = FtsIndex::new();
        fts.build_index(&backend, &["Doc".into()], &["body".into()]).unwrap();

        let hits = fts.search_phrase("New York").unwrap();
        let ids: HashSet<NodeId> = hits.iter().map(|h| h.node_id).collect();
        assert_eq!(ids, HashSet::from([1, 3]));
    }

    #[test]
    fn search_fuzzy_matches_within_edit_distance() {
        let (_dir, backend) = backend_with(&[("Doc", &[("body", "Laptop Computer")]), ("Doc", &[("body", "Desktop Computer")])]);
        let fts = FtsIndex::new();
        fts.build_index(&backend, &["Doc".into()], &["body".into()]).unwrap();

        let hits = fts.search_fuzzy("compter", 2).unwrap();
        let ids: HashSet<NodeId> = hits.iter().map(|h| h.node_id).collect();
        assert_eq!(ids, HashSet::from([1, 2]));
    }

    #[test]
    fn boolean_and_or_not_match_set_algebra() {
        let (_dir, backend) = backend_with(&[
            ("Doc", &[("body", "alpha beta")]),
            ("Doc", &[("body", "alpha")]),
            ("Doc", &[("body", "beta")]),
        ]);
        let fts = FtsIndex::new();
        fts.build_index(&backend, &["Doc".into()], &["body".into()]).unwrap();

        let and_ids: HashSet<NodeId> = fts.search_boolean("alpha AND beta").unwrap().into_iter().map(|h| h.node_id).collect();
        let search_a: HashSet<NodeId> = fts.search("alpha").unwrap().into_iter().map(|h| h.node_id).collect();
        let search_b: HashSet<NodeId> = fts.search("beta").unwrap().into_iter().map(|h| h.node_id).collect();
        assert_eq!(and_ids, &search_a & &search_b);

        let or_ids: HashSet<NodeId> = fts.search_boolean("alpha OR beta").unwrap().into_iter().map(|h| h.node_id).collect();
        assert_eq!(or_ids, &search_a | &search_b);

        let not_ids: HashSet<NodeId> = fts.search_boolean("alpha NOT beta").unwrap().into_iter().map(|h| h.node_id).collect();
        assert_eq!(not_ids, &search_a - &search_b);
    }

    #[test]
    fn update_node_reindexes_after_change() {
        let (_dir, backend) = backend_with(&[("Doc", &[("body", "alpha")])]);
        let fts = FtsIndex::new();
        fts.build_index(&backend, &["Doc".into()], &["body".into()]).unwrap();
        assert_eq!(fts.search("alpha").unwrap().len(), 1);

        let mut changes = std::collections::BTreeMap::new();
        changes.insert("body".to_string(), Some(graphdb_api::Value::String("gamma".into())));
        backend.update_node(1, changes).unwrap();
        fts.update_node(&backend, 1).unwrap();

        assert!(fts.search("alpha").unwrap().is_empty());
        assert_eq!(fts.search("gamma").unwrap().len(), 1);
    }

    #[test]
    fn search_in_property_rechecks_the_named_property() {
        let (_dir, backend) = backend_with(&[("Doc", &[("title", "rust"), ("body", "unrelated text")])]);
        let fts = FtsIndex::new();
        fts.build_index(&backend, &["Doc".into()], &["title".into(), "body".into()]).unwrap();

        assert_eq!(fts.search_in_property(&backend, "title", "rust").unwrap().len(), 1);
        assert!(fts.search_in_property(&backend, "body", "rust").unwrap().is_empty());
    }
}
