//! Cycle search using Tarjan's Strongly Connected Components algorithm

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};

/// Find one representative cycle
///
/// Picks the cyclic SCC holding the lowest node index and returns the
/// shortest closed walk from that node back to itself, e.g. `[a, b, c, a]`.
/// A self-loop comes back as `[a, a]`.
pub(crate) fn find_cycle<N, E>(graph: &DiGraph<N, E>) -> Option<Vec<NodeIndex>> {
    let component = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || has_self_loop(graph, scc[0]))
        .min_by_key(|scc| scc.iter().map(|idx| idx.index()).min())?;

    let start = *component.iter().min_by_key(|idx| idx.index())?;
    let members: HashSet<NodeIndex> = component.into_iter().collect();
    closed_walk(graph, start, &members)
}

/// Shortest path `from -> ... -> to`, if one exists
pub(crate) fn path_between<N, E>(
    graph: &DiGraph<N, E>,
    from: NodeIndex,
    to: NodeIndex,
) -> Option<Vec<NodeIndex>> {
    if from == to {
        return Some(vec![from]);
    }

    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    let mut visited = HashSet::from([from]);

    while let Some(current) = queue.pop_front() {
        for next in sorted_successors(graph, current) {
            if !visited.insert(next) {
                continue;
            }
            parent.insert(next, current);
            if next == to {
                return Some(unwind(&parent, from, to));
            }
            queue.push_back(next);
        }
    }
    None
}

fn closed_walk<N, E>(
    graph: &DiGraph<N, E>,
    start: NodeIndex,
    members: &HashSet<NodeIndex>,
) -> Option<Vec<NodeIndex>> {
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    let mut visited = HashSet::from([start]);

    while let Some(current) = queue.pop_front() {
        for next in sorted_successors(graph, current) {
            if !members.contains(&next) {
                continue;
            }
            if next == start {
                let mut path = unwind(&parent, start, current);
                path.push(start);
                return Some(path);
            }
            if visited.insert(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }
    None
}

fn unwind(
    parent: &HashMap<NodeIndex, NodeIndex>,
    from: NodeIndex,
    to: NodeIndex,
) -> Vec<NodeIndex> {
    let mut path = vec![to];
    let mut current = to;
    while current != from {
        current = parent[&current];
        path.push(current);
    }
    path.reverse();
    path
}

// petgraph yields neighbors newest-edge first; sort for payload-order walks.
fn sorted_successors<N, E>(graph: &DiGraph<N, E>, node: NodeIndex) -> Vec<NodeIndex> {
    let mut next: Vec<NodeIndex> = graph.neighbors(node).collect();
    next.sort();
    next.dedup();
    next
}

fn has_self_loop<N, E>(graph: &DiGraph<N, E>, node: NodeIndex) -> bool {
    graph.find_edge(node, node).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(n: usize, edges: &[(usize, usize)]) -> DiGraph<usize, ()> {
        let mut graph = DiGraph::new();
        let nodes: Vec<_> = (0..n).map(|i| graph.add_node(i)).collect();
        for &(a, b) in edges {
            graph.add_edge(nodes[a], nodes[b], ());
        }
        graph
    }

    fn indices(path: &[NodeIndex]) -> Vec<usize> {
        path.iter().map(|n| n.index()).collect()
    }

    #[test]
    fn test_no_cycle_simple_chain() {
        let graph = graph_with(3, &[(0, 1), (1, 2)]);
        assert!(find_cycle(&graph).is_none());
    }

    #[test]
    fn test_detects_three_cycle() {
        let graph = graph_with(3, &[(0, 1), (1, 2), (2, 0)]);
        assert_eq!(indices(&find_cycle(&graph).unwrap()), vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let graph = graph_with(2, &[(0, 1), (1, 1)]);
        assert_eq!(indices(&find_cycle(&graph).unwrap()), vec![1, 1]);
    }

    #[test]
    fn test_picks_cycle_with_lowest_node() {
        // Two disjoint cycles: 3<->4 and 1->2->1
        let graph = graph_with(5, &[(3, 4), (4, 3), (0, 1), (1, 2), (2, 1)]);
        assert_eq!(indices(&find_cycle(&graph).unwrap()), vec![1, 2, 1]);
    }

    #[test]
    fn test_cycle_ignores_tail_outside_component() {
        let graph = graph_with(4, &[(0, 1), (1, 2), (2, 3), (3, 1)]);
        assert_eq!(indices(&find_cycle(&graph).unwrap()), vec![1, 2, 3, 1]);
    }

    #[test]
    fn test_path_between() {
        let graph = graph_with(4, &[(0, 1), (1, 2), (0, 3), (3, 2)]);
        let path = path_between(&graph, NodeIndex::new(0), NodeIndex::new(2)).unwrap();
        assert_eq!(indices(&path), vec![0, 1, 2]);
        assert!(path_between(&graph, NodeIndex::new(2), NodeIndex::new(0)).is_none());
    }
}
