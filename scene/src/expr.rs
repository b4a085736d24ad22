//! Bracketed-expression evaluation for string attributes.
//!
//! `[node.attr]` resolves another node's attribute (recursively), `[env VAR]`
//! resolves an environment variable. A substitution that expands to an
//! absolute path replaces everything accumulated before it, matching
//! path-join semantics. Values without markers pass through untouched, which
//! makes evaluation idempotent on already-concrete values.

use thiserror::Error;

use crate::graph::{Graph, Node, NodeId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("node {node} not found while evaluating")]
    UnknownNode { node: String },
    #[error("node {node} has no attribute {attr}")]
    UnknownAttr { node: String, attr: String },
    #[error("malformed expression in {node}.{attr}: {expr}")]
    Malformed {
        node: String,
        attr: String,
        expr: String,
    },
    #[error("expression in {node}.{attr} references unknown node {reference}")]
    UnknownReference {
        node: String,
        attr: String,
        reference: String,
    },
    #[error("environment variable {var} referenced by {node}.{attr} is not set")]
    MissingEnv {
        node: String,
        attr: String,
        var: String,
    },
    #[error("expression cycle detected through {node}.{attr}")]
    Cycle { node: String, attr: String },
}

pub fn has_expression(value: &str) -> bool {
    value.contains('[')
}

/// Evaluates `attr` on the given node down to a concrete string.
pub fn evaluate(graph: &Graph, id: NodeId, attr: &str) -> Result<String, EvalError> {
    let mut visiting = Vec::new();
    eval_attr(graph, id, attr, &mut visiting)
}

fn eval_attr(
    graph: &Graph,
    id: NodeId,
    attr: &str,
    visiting: &mut Vec<(NodeId, String)>,
) -> Result<String, EvalError> {
    let node = graph.by_id(id).ok_or_else(|| EvalError::UnknownNode {
        node: id.to_string(),
    })?;
    let value = node.attr(attr).ok_or_else(|| EvalError::UnknownAttr {
        node: node.name.clone(),
        attr: attr.to_string(),
    })?;

    if !has_expression(value) {
        return Ok(value.to_string());
    }

    let key = (id, attr.to_string());
    if visiting.contains(&key) {
        return Err(EvalError::Cycle {
            node: node.name.clone(),
            attr: attr.to_string(),
        });
    }

    visiting.push(key);
    let result = substitute(graph, node, attr, value, visiting);
    visiting.pop();

    result
}

fn substitute(
    graph: &Graph,
    node: &Node,
    attr: &str,
    value: &str,
    visiting: &mut Vec<(NodeId, String)>,
) -> Result<String, EvalError> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let close = after.find(']').ok_or_else(|| EvalError::Malformed {
            node: node.name.clone(),
            attr: attr.to_string(),
            expr: value.to_string(),
        })?;

        let inner = after[..close].trim();
        let replacement = resolve(graph, node, attr, inner, visiting)?;

        // an absolute replacement discards the accumulated prefix
        if replacement.starts_with('/') {
            out.clear();
        }
        out.push_str(&replacement);

        rest = &after[close + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

fn resolve(
    graph: &Graph,
    node: &Node,
    attr: &str,
    inner: &str,
    visiting: &mut Vec<(NodeId, String)>,
) -> Result<String, EvalError> {
    if let Some(var) = inner.strip_prefix("env ") {
        let var = var.trim();
        return std::env::var(var).map_err(|_| EvalError::MissingEnv {
            node: node.name.clone(),
            attr: attr.to_string(),
            var: var.to_string(),
        });
    }

    let Some((target_name, target_attr)) = inner.rsplit_once('.') else {
        return Err(EvalError::Malformed {
            node: node.name.clone(),
            attr: attr.to_string(),
            expr: inner.to_string(),
        });
    };

    let target = graph
        .by_name(target_name)
        .ok_or_else(|| EvalError::UnknownReference {
            node: node.name.clone(),
            attr: attr.to_string(),
            reference: target_name.to_string(),
        })?;

    eval_attr(graph, target.id, target_attr, visiting)
}

/// Syntactic scan for `[node.attr]` references in an attribute value.
///
/// Returns `(node_name, attr_name)` pairs without evaluating anything;
/// `env` markers and markers that do not parse as a reference are skipped.
pub fn reference_names(value: &str) -> Vec<(&str, &str)> {
    let mut names = Vec::new();
    let mut rest = value;

    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };

        let inner = after[..close].trim();
        if !inner.starts_with("env ") {
            if let Some(pair) = inner.rsplit_once('.') {
                names.push(pair);
            }
        }

        rest = &after[close + 1..];
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{test_scene, Node, NodeKind, FILE_ATTR};

    fn scene_with_expression() -> Graph {
        let mut graph = test_scene();

        let mut writer = Node {
            id: NodeId::from_u128(10),
            name: "precomp".to_string(),
            kind: NodeKind::Other,
            ..Default::default()
        };
        writer.set_attr("output", "/data/seqA");
        writer.set_attr(FILE_ATTR, "shot[precomp.output]/render.####.exr");
        graph.add_node(writer);

        graph
    }

    #[test]
    fn literal_value_passes_through() -> anyhow::Result<()> {
        let graph = test_scene();
        let plate_a = graph.by_name("plateA").unwrap().id;

        let value = evaluate(&graph, plate_a, FILE_ATTR)?;
        assert_eq!(value, "/fs/show/seq010/plateA.%04d.exr");

        Ok(())
    }

    #[test]
    fn reference_substitution_resolves() -> anyhow::Result<()> {
        let graph = scene_with_expression();
        let id = graph.by_name("precomp").unwrap().id;

        // the absolute expansion replaces the `shot` prefix
        let value = evaluate(&graph, id, FILE_ATTR)?;
        assert_eq!(value, "/data/seqA/render.####.exr");

        Ok(())
    }

    #[test]
    fn relative_expansion_keeps_prefix() -> anyhow::Result<()> {
        let mut graph = test_scene();
        let mut node = Node {
            name: "grade".to_string(),
            ..Default::default()
        };
        node.set_attr("version", "v012");
        node.set_attr(FILE_ATTR, "renders/[grade.version]/beauty.exr");
        let id = node.id;
        graph.add_node(node);

        let value = evaluate(&graph, id, FILE_ATTR)?;
        assert_eq!(value, "renders/v012/beauty.exr");

        Ok(())
    }

    #[test]
    fn evaluation_is_idempotent() -> anyhow::Result<()> {
        let graph = scene_with_expression();
        let id = graph.by_name("precomp").unwrap().id;

        let once = evaluate(&graph, id, FILE_ATTR)?;

        let mut graph = graph;
        graph.by_id_mut(id).unwrap().set_attr(FILE_ATTR, once.clone());
        let twice = evaluate(&graph, id, FILE_ATTR)?;

        assert_eq!(once, twice);

        Ok(())
    }

    #[test]
    fn env_substitution() -> anyhow::Result<()> {
        // set before constructing to keep the test self-contained
        std::env::set_var("SCENE_EXPR_TEST_ROOT", "/mnt/farm");

        let mut graph = test_scene();
        let mut node = Node {
            name: "cache".to_string(),
            ..Default::default()
        };
        node.set_attr(FILE_ATTR, "[env SCENE_EXPR_TEST_ROOT]/cache.exr");
        let id = node.id;
        graph.add_node(node);

        let value = evaluate(&graph, id, FILE_ATTR)?;
        assert_eq!(value, "/mnt/farm/cache.exr");

        Ok(())
    }

    #[test]
    fn missing_env_names_node_and_attr() {
        let mut graph = test_scene();
        let mut node = Node {
            name: "cache".to_string(),
            ..Default::default()
        };
        node.set_attr(FILE_ATTR, "[env SCENE_EXPR_TEST_UNSET]/cache.exr");
        let id = node.id;
        graph.add_node(node);

        let err = evaluate(&graph, id, FILE_ATTR).unwrap_err();
        assert_eq!(
            err,
            EvalError::MissingEnv {
                node: "cache".to_string(),
                attr: FILE_ATTR.to_string(),
                var: "SCENE_EXPR_TEST_UNSET".to_string(),
            }
        );
    }

    #[test]
    fn cycle_is_detected() {
        let mut graph = Graph::default();

        let mut ping = Node {
            name: "ping".to_string(),
            ..Default::default()
        };
        ping.set_attr(FILE_ATTR, "[pong.file]");
        let mut pong = Node {
            name: "pong".to_string(),
            ..Default::default()
        };
        pong.set_attr(FILE_ATTR, "[ping.file]");

        let ping_id = ping.id;
        graph.add_node(ping);
        graph.add_node(pong);

        let err = evaluate(&graph, ping_id, FILE_ATTR).unwrap_err();
        assert!(matches!(err, EvalError::Cycle { .. }));
    }

    #[test]
    fn unterminated_marker_is_malformed() {
        let mut graph = Graph::default();
        let mut node = Node {
            name: "broken".to_string(),
            ..Default::default()
        };
        node.set_attr(FILE_ATTR, "renders/[broken.version/beauty.exr");
        let id = node.id;
        graph.add_node(node);

        let err = evaluate(&graph, id, FILE_ATTR).unwrap_err();
        assert!(matches!(err, EvalError::Malformed { .. }));
    }

    #[test]
    fn reference_names_scans_without_evaluating() {
        let refs = reference_names("shot[precomp.output]/[env ROOT]/v[grade.version].exr");

        assert_eq!(refs, vec![("precomp", "output"), ("grade", "version")]);
    }
}
