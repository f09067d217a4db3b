// src/dag/graph.rs

use petgraph::algo::{has_path_connecting, DfsSpace};
use petgraph::graphmap::DiGraphMap;

/// Would admitting `candidate` with the given dependencies close a cycle?
///
/// `edges` is the stored (task, dependency) edge set, which is acyclic by
/// induction: every previously admitted task was checked the same way. A
/// new cycle is therefore only possible through the candidate itself, so
/// it suffices to test whether the candidate is reachable from any of its
/// declared dependencies (or depends directly on itself).
///
/// The reachability walk is iterative (petgraph keeps an explicit visit
/// stack), so graph depth is bounded by memory rather than call stack.
pub fn would_create_cycle(
    edges: &[(String, String)],
    candidate: &str,
    dependencies: &[String],
) -> bool {
    if dependencies.iter().any(|dep| dep == candidate) {
        return true;
    }

    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for (task, dep) in edges {
        graph.add_edge(task.as_str(), dep.as_str(), ());
    }

    let mut space = DfsSpace::new(&graph);
    dependencies.iter().any(|dep| {
        graph.contains_node(dep.as_str())
            && graph.contains_node(candidate)
            && has_path_connecting(&graph, dep.as_str(), candidate, Some(&mut space))
    })
}
