//! Mutation-free scene checks run before submission.

use scene::expr::{self, EvalError};
use scene::graph::{Graph, Node, FILE_ATTR, VIEWS_ATTR};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreflightIssue {
    /// Path outside every known server prefix; the farm cannot see it.
    LocalPath { node: String, path: String },
    /// Spaces or quotes break downstream path parsing.
    SuspectPath { node: String, path: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreflightReport {
    pub issues: Vec<PreflightIssue>,
}

impl PreflightReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Inspects every input node's file path. Collects issues without aborting;
/// the caller decides whether findings block submission.
pub fn preflight(graph: &Graph, server_prefixes: &[&str]) -> Result<PreflightReport, EvalError> {
    let mut report = PreflightReport::default();

    for node in graph.nodes().iter().filter(|node| node.kind.is_input()) {
        let Some(raw) = node.attr(FILE_ATTR) else {
            continue;
        };

        if raw.contains(' ') || raw.contains('\'') {
            report.issues.push(PreflightIssue::SuspectPath {
                node: node.name.clone(),
                path: raw.to_string(),
            });
        }

        let resolved = expr::evaluate(graph, node.id, FILE_ATTR)?;
        let on_server = server_prefixes
            .iter()
            .any(|prefix| resolved.starts_with(prefix));
        if !on_server {
            report.issues.push(PreflightIssue::LocalPath {
                node: node.name.clone(),
                path: resolved,
            });
        }
    }

    Ok(report)
}

/// A node is stereo when its file path carries a `%v`/`%V` view marker.
pub fn is_stereo(node: &Node) -> bool {
    node.attr(FILE_ATTR)
        .is_some_and(|path| path.contains("%v") || path.contains("%V"))
}

/// Whether any input or output in the scene renders more than one view.
pub fn stereo_scene(graph: &Graph) -> bool {
    graph.nodes().iter().any(|node| {
        if !node.kind.is_input() && !node.kind.is_output() {
            return false;
        }
        if is_stereo(node) {
            return true;
        }
        node.kind.is_output() && node.attr(VIEWS_ATTR) == Some("left right")
    })
}
