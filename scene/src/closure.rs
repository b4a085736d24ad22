//! Dependency closure over the scene graph.
//!
//! One-hop neighbors come from wire inputs and from `[node.attr]` references
//! in attribute values. The closure expands a frontier until an iteration
//! discovers nothing new, so cycles terminate with each member visited once.

use hashbrown::HashSet;
use thiserror::Error;

use crate::expr;
use crate::graph::{Graph, NodeId};

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum Direction {
    Upstream,
    Downstream,
    #[default]
    Both,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClosureError {
    #[error("closure requires at least one root node")]
    EmptyRoots,
    #[error("closure root {root} does not exist in the graph")]
    UnknownRoot { root: NodeId },
    #[error("node {node} references unknown node {reference}")]
    UnknownReference { node: String, reference: String },
}

fn upstream_of(graph: &Graph, id: NodeId, out: &mut HashSet<NodeId>) -> Result<(), ClosureError> {
    // ids can outlive their nodes mid-traversal; stale ones contribute nothing
    let Some(node) = graph.by_id(id) else {
        return Ok(());
    };

    for binding in node.inputs.iter() {
        if let Some(source) = binding.as_source() {
            out.insert(source);
        }
    }

    for value in node.attrs.values() {
        for (name, _) in expr::reference_names(value) {
            let target = graph
                .by_name(name)
                .ok_or_else(|| ClosureError::UnknownReference {
                    node: node.name.clone(),
                    reference: name.to_string(),
                })?;
            out.insert(target.id);
        }
    }

    Ok(())
}

/// One-hop dependency neighbors of `ids` in the given direction.
pub fn neighbors_of(
    graph: &Graph,
    ids: &HashSet<NodeId>,
    direction: Direction,
) -> Result<HashSet<NodeId>, ClosureError> {
    let mut neighbors = HashSet::new();

    if matches!(direction, Direction::Upstream | Direction::Both) {
        for &id in ids.iter() {
            upstream_of(graph, id, &mut neighbors)?;
        }
    }

    if matches!(direction, Direction::Downstream | Direction::Both) {
        let mut upstream = HashSet::new();
        for node in graph.nodes() {
            upstream.clear();
            upstream_of(graph, node.id, &mut upstream)?;
            if upstream.iter().any(|up| ids.contains(up)) {
                neighbors.insert(node.id);
            }
        }
    }

    Ok(neighbors)
}

/// Transitive dependency closure of `roots`.
///
/// Fixed point under re-application: `closure(closure(r)) == closure(r)`.
pub fn closure(
    graph: &Graph,
    roots: &HashSet<NodeId>,
    direction: Direction,
) -> Result<HashSet<NodeId>, ClosureError> {
    if roots.is_empty() {
        return Err(ClosureError::EmptyRoots);
    }
    for &root in roots.iter() {
        if graph.by_id(root).is_none() {
            return Err(ClosureError::UnknownRoot { root });
        }
    }

    let mut all: HashSet<NodeId> = roots.clone();
    let mut seen: HashSet<NodeId> = HashSet::with_capacity(graph.nodes().len());

    loop {
        let frontier: HashSet<NodeId> = all.difference(&seen).copied().collect();
        if frontier.is_empty() {
            break;
        }

        let found = neighbors_of(graph, &frontier, direction)?;
        seen.extend(frontier);
        all.extend(found);
    }

    tracing::debug!(
        roots = roots.len(),
        nodes = all.len(),
        "dependency closure expanded"
    );

    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{test_scene, Binding, Node, FILE_ATTR};

    fn ids(graph: &Graph, names: &[&str]) -> HashSet<NodeId> {
        names
            .iter()
            .map(|name| graph.by_name(name).unwrap().id)
            .collect()
    }

    #[test]
    fn upstream_closure_of_output() -> anyhow::Result<()> {
        let graph = test_scene();
        let roots = ids(&graph, &["comp"]);

        let result = closure(&graph, &roots, Direction::Upstream)?;

        assert_eq!(result, ids(&graph, &["comp", "merge", "plateA"]));

        Ok(())
    }

    #[test]
    fn downstream_closure_of_plate() -> anyhow::Result<()> {
        let graph = test_scene();
        let roots = ids(&graph, &["plateA"]);

        let result = closure(&graph, &roots, Direction::Downstream)?;

        assert_eq!(result, ids(&graph, &["plateA", "merge", "comp"]));

        Ok(())
    }

    #[test]
    fn closure_is_a_fixed_point() -> anyhow::Result<()> {
        let graph = test_scene();
        let roots = ids(&graph, &["comp"]);

        let once = closure(&graph, &roots, Direction::Both)?;
        let twice = closure(&graph, &once, Direction::Both)?;

        assert_eq!(once, twice);

        Ok(())
    }

    #[test]
    fn two_cycle_terminates() -> anyhow::Result<()> {
        let mut graph = Graph::default();

        let a = Node {
            name: "a".to_string(),
            ..Default::default()
        };
        let b = Node {
            name: "b".to_string(),
            inputs: vec![Binding::Source(a.id)],
            ..Default::default()
        };
        let a_id = a.id;
        let b_id = b.id;
        graph.add_node(a);
        graph.add_node(b);
        graph.by_id_mut(a_id).unwrap().inputs = vec![Binding::Source(b_id)];

        let roots: HashSet<NodeId> = [a_id].into_iter().collect();
        let result = closure(&graph, &roots, Direction::Upstream)?;

        assert_eq!(result, [a_id, b_id].into_iter().collect::<HashSet<_>>());

        Ok(())
    }

    #[test]
    fn expression_references_create_edges() -> anyhow::Result<()> {
        let mut graph = test_scene();

        let mut lookup = Node {
            name: "lookup".to_string(),
            ..Default::default()
        };
        lookup.set_attr(FILE_ATTR, "[plateA.file]");
        let lookup_id = lookup.id;
        graph.add_node(lookup);

        let roots: HashSet<NodeId> = [lookup_id].into_iter().collect();
        let result = closure(&graph, &roots, Direction::Upstream)?;

        assert!(result.contains(&graph.by_name("plateA").unwrap().id));

        Ok(())
    }

    #[test]
    fn unknown_reference_is_an_error() {
        let mut graph = test_scene();
        graph
            .by_name_mut("comp")
            .unwrap()
            .set_attr(FILE_ATTR, "[deleted.file]");

        let roots = ids(&graph, &["comp"]);
        let err = closure(&graph, &roots, Direction::Upstream).unwrap_err();

        assert_eq!(
            err,
            ClosureError::UnknownReference {
                node: "comp".to_string(),
                reference: "deleted".to_string(),
            }
        );
    }

    #[test]
    fn unknown_root_is_an_error() {
        let graph = test_scene();
        let roots: HashSet<NodeId> = [NodeId::from_u128(999)].into_iter().collect();

        let err = closure(&graph, &roots, Direction::Both).unwrap_err();
        assert!(matches!(err, ClosureError::UnknownRoot { .. }));
    }

    #[test]
    fn empty_roots_is_an_error() {
        let graph = test_scene();

        let err = closure(&graph, &HashSet::new(), Direction::Both).unwrap_err();
        assert_eq!(err, ClosureError::EmptyRoots);
    }
}
