//! K-shortest directed paths by hop count.
//!
//! Breadth-first search over partial simple paths: the queue pops in
//! non-decreasing length, so the first `k` arrivals at the target are
//! the k shortest. Deterministic because adjacency lists are sorted.

use std::collections::{HashMap, VecDeque};

/// One path from source to target, cheapest-first in the result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHit {
    pub hops: usize,
    pub nodes: Vec<String>,
}

/// Up to `k` shortest simple paths from `from` to `to`, every edge
/// weighing one hop. Paths longer than `max_hops` are not explored.
pub fn k_shortest_paths(
    edges: &[(String, String)],
    from: &str,
    to: &str,
    k: usize,
    max_hops: usize,
) -> Vec<PathHit> {
    if k == 0 {
        return Vec::new();
    }
    if from == to {
        return vec![PathHit {
            hops: 0,
            nodes: vec![from.to_string()],
        }];
    }

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for (a, b) in edges {
        adjacency.entry(a.as_str()).or_default().push(b.as_str());
    }
    for targets in adjacency.values_mut() {
        targets.sort();
        targets.dedup();
    }

    let mut hits: Vec<PathHit> = Vec::new();
    let mut queue: VecDeque<Vec<&str>> = VecDeque::from([vec![from]]);
    while let Some(path) = queue.pop_front() {
        if path.len() - 1 >= max_hops {
            continue;
        }
        let Some(nexts) = adjacency.get(path[path.len() - 1]) else {
            continue;
        };
        for &next in nexts {
            // Simple paths only; revisiting a node cannot shorten anything.
            if path.contains(&next) {
                continue;
            }
            let mut extended = path.clone();
            extended.push(next);
            if next == to {
                hits.push(PathHit {
                    hops: extended.len() - 1,
                    nodes: extended.iter().map(|s| s.to_string()).collect(),
                });
                if hits.len() >= k {
                    return hits;
                }
            } else {
                queue.push_back(extended);
            }
        }
    }
    hits
}
