//! Arena-style in-memory directed graph.
//!
//! Nodes are keyed by canonical id; edges carry typed [`CitationData`]
//! payloads. Adjacency is held both ways so predecessor and successor
//! queries are plain map lookups. Edge maps are ordered so iteration (and
//! therefore persistence) is deterministic.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::model::{CanonicalArticle, CitationData};

#[derive(Debug, Default)]
pub struct CitationGraph {
    nodes: HashMap<String, CanonicalArticle>,
    out_edges: HashMap<String, BTreeMap<String, CitationData>>,
    in_edges: HashMap<String, BTreeSet<String>>,
}

impl CitationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Nodes ────────────────────────────────────────────────────────────────

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&CanonicalArticle> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CanonicalArticle> {
        self.nodes.get_mut(id)
    }

    /// Insert a node, replacing nothing: the caller is responsible for
    /// merging before insert when the id already exists.
    pub fn insert(&mut self, article: CanonicalArticle) {
        self.nodes.insert(article.id.clone(), article);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CanonicalArticle> {
        self.nodes.values()
    }

    // ── Edges ────────────────────────────────────────────────────────────────

    /// Add or merge a directed edge. Both endpoints must already exist;
    /// callers enforce that precondition. Returns true if the edge was new
    /// or its payload changed.
    pub fn upsert_edge(&mut self, citing: &str, cited: &str, data: CitationData) -> bool {
        let out = self.out_edges.entry(citing.to_string()).or_default();
        let changed = match out.get_mut(cited) {
            Some(existing) => existing.merge(&data),
            None => {
                out.insert(cited.to_string(), data);
                true
            }
        };
        self.in_edges
            .entry(cited.to_string())
            .or_default()
            .insert(citing.to_string());
        changed
    }

    pub fn edge(&self, citing: &str, cited: &str) -> Option<&CitationData> {
        self.out_edges.get(citing).and_then(|m| m.get(cited))
    }

    pub fn edge_count(&self) -> usize {
        self.out_edges.values().map(BTreeMap::len).sum()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &CitationData)> {
        self.out_edges.iter().flat_map(|(citing, targets)| {
            targets
                .iter()
                .map(move |(cited, data)| (citing.as_str(), cited.as_str(), data))
        })
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Articles cited by `id` (successors).
    pub fn successors(&self, id: &str) -> Vec<&CanonicalArticle> {
        self.out_edges
            .get(id)
            .map(|targets| targets.keys().filter_map(|t| self.nodes.get(t)).collect())
            .unwrap_or_default()
    }

    /// Articles citing `id` (predecessors).
    pub fn predecessors(&self, id: &str) -> Vec<&CanonicalArticle> {
        self.in_edges
            .get(id)
            .map(|sources| sources.iter().filter_map(|s| self.nodes.get(s)).collect())
            .unwrap_or_default()
    }

    /// Node ids within `depth` hops of `id`, following edges in either
    /// direction. The start node is not included.
    pub fn neighborhood(&self, id: &str, depth: usize) -> Vec<String> {
        if depth == 0 || !self.nodes.contains_key(id) {
            return Vec::new();
        }

        let mut visited: HashSet<&str> = HashSet::from([id]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(id, 0)]);
        let mut reached: Vec<String> = Vec::new();

        while let Some((current, dist)) = queue.pop_front() {
            if dist == depth {
                continue;
            }
            let forward = self
                .out_edges
                .get(current)
                .into_iter()
                .flat_map(|m| m.keys().map(String::as_str));
            let backward = self
                .in_edges
                .get(current)
                .into_iter()
                .flat_map(|s| s.iter().map(String::as_str));

            for next in forward.chain(backward) {
                if visited.insert(next) {
                    reached.push(next.to_string());
                    queue.push_back((next, dist + 1));
                }
            }
        }

        reached.sort();
        reached
    }

    /// Case-insensitive substring match over title and authors.
    pub fn search(&self, query: &str) -> Vec<&CanonicalArticle> {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<&CanonicalArticle> = self
            .nodes
            .values()
            .filter(|article| {
                article.title.to_lowercase().contains(&needle)
                    || article
                        .authors
                        .iter()
                        .any(|a| a.to_lowercase().contains(&needle))
            })
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArticleMetadata;

    fn article(id: &str, title: &str, authors: &[&str]) -> CanonicalArticle {
        CanonicalArticle::new(
            id,
            ArticleMetadata {
                title: title.to_string(),
                authors: authors.iter().map(|a| a.to_string()).collect(),
                ..Default::default()
            },
        )
    }

    fn diamond() -> CitationGraph {
        // a → b → d, a → c → d
        let mut g = CitationGraph::new();
        for (id, title) in [("a", "Alpha"), ("b", "Beta"), ("c", "Gamma"), ("d", "Delta")] {
            g.insert(article(id, title, &[]));
        }
        g.upsert_edge("a", "b", CitationData::default());
        g.upsert_edge("a", "c", CitationData::default());
        g.upsert_edge("b", "d", CitationData::default());
        g.upsert_edge("c", "d", CitationData::default());
        g
    }

    #[test]
    fn test_successors_and_predecessors() {
        let g = diamond();
        let cited: Vec<&str> = g.successors("a").iter().map(|a| a.id.as_str()).collect();
        assert_eq!(cited.len(), 2);
        assert!(cited.contains(&"b") && cited.contains(&"c"));

        let citing: Vec<&str> = g.predecessors("d").iter().map(|a| a.id.as_str()).collect();
        assert_eq!(citing.len(), 2);
        assert!(citing.contains(&"b") && citing.contains(&"c"));
    }

    #[test]
    fn test_neighborhood_is_depth_bounded() {
        let g = diamond();
        assert_eq!(g.neighborhood("a", 1), vec!["b", "c"]);
        assert_eq!(g.neighborhood("a", 2), vec!["b", "c", "d"]);
        // Bidirectional: from d, depth 1 reaches its citers only
        assert_eq!(g.neighborhood("d", 1), vec!["b", "c"]);
        assert_eq!(g.neighborhood("d", 0), Vec::<String>::new());
    }

    #[test]
    fn test_neighborhood_of_unknown_node_is_empty() {
        let g = diamond();
        assert!(g.neighborhood("nope", 3).is_empty());
    }

    #[test]
    fn test_edge_merge_on_reinsert() {
        let mut g = diamond();
        let changed = g.upsert_edge(
            "a",
            "b",
            CitationData { year: Some(2019), ..Default::default() },
        );
        assert!(changed);
        assert_eq!(g.edge("a", "b").unwrap().year, Some(2019));
        assert_eq!(g.edge_count(), 4);

        // Re-adding with no new information is a no-op
        let changed = g.upsert_edge("a", "b", CitationData::default());
        assert!(!changed);
    }

    #[test]
    fn test_search_matches_title_and_authors() {
        let mut g = CitationGraph::new();
        g.insert(article("x", "Sparse Transformers", &["Child, R."]));
        g.insert(article("y", "Dense Retrieval", &["Karpukhin, V."]));

        assert_eq!(g.search("transform").len(), 1);
        assert_eq!(g.search("KARPUKHIN").len(), 1);
        assert!(g.search("").is_empty());
        assert!(g.search("quantum").is_empty());
    }
}
