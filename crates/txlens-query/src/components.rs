//! Connected components over an undirected view of a node/edge set.
//!
//! Union-find with path compression. Direction is ignored on purpose:
//! a cluster is a group of transactions linked by payments either way.

/// One connected component, members sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub members: Vec<String>,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Group `nodes` into connected components under `edges`.
///
/// Edges referencing ids outside `nodes` are ignored. Components are
/// returned largest first; ties break on the smallest member id, so the
/// output order is fully deterministic.
pub fn connected_components(nodes: &[String], edges: &[(String, String)]) -> Vec<Cluster> {
    let index: std::collections::HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut uf = UnionFind::new(nodes.len());
    for (from, to) in edges {
        if let (Some(&a), Some(&b)) = (index.get(from.as_str()), index.get(to.as_str())) {
            uf.union(a, b);
        }
    }

    let mut groups: std::collections::HashMap<usize, Vec<String>> =
        std::collections::HashMap::new();
    for (i, id) in nodes.iter().enumerate() {
        groups.entry(uf.find(i)).or_default().push(id.clone());
    }

    let mut clusters: Vec<Cluster> = groups
        .into_values()
        .map(|mut members| {
            members.sort();
            Cluster { members }
        })
        .collect();
    clusters.sort_by(|a, b| {
        b.size()
            .cmp(&a.size())
            .then_with(|| a.members[0].cmp(&b.members[0]))
    });
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn links(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_isolated_nodes_are_singletons() {
        let clusters = connected_components(&ids(&["a", "b"]), &[]);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec!["a"]);
        assert_eq!(clusters[1].members, vec!["b"]);
    }

    #[test]
    fn test_direction_is_ignored() {
        // a -> b and c -> b: one component of three.
        let clusters = connected_components(
            &ids(&["a", "b", "c"]),
            &links(&[("a", "b"), ("c", "b")]),
        );
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_largest_first_then_smallest_member() {
        let clusters = connected_components(
            &ids(&["a", "b", "x", "y", "m", "n"]),
            &links(&[("a", "b"), ("x", "y"), ("m", "n")]),
        );
        // All size 2; order falls back to the smallest member.
        let firsts: Vec<&str> = clusters.iter().map(|c| c.members[0].as_str()).collect();
        assert_eq!(firsts, vec!["a", "m", "x"]);
    }

    #[test]
    fn test_edges_to_foreign_nodes_are_ignored() {
        let clusters = connected_components(&ids(&["a", "b"]), &links(&[("a", "zzz")]));
        assert_eq!(clusters.len(), 2);
    }
}
