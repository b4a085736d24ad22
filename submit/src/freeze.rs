//! Path freezing: rewrite expression-driven file paths into concrete,
//! farm-safe paths before the scene leaves the workstation.

use thiserror::Error;

use scene::expr::{self, EvalError};
use scene::graph::{Graph, NodeId, FILE_ATTR, VIEWS_ATTR};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FreezeError {
    #[error("freeze target {node} does not exist in the graph")]
    UnknownNode { node: NodeId },
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Stereo view discriminator substituted into `%v`/`%V` path markers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewToken(String);

impl ViewToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn lower(&self) -> String {
        self.0.to_lowercase()
    }

    pub fn upper(&self) -> String {
        self.0.to_uppercase()
    }
}

impl From<&str> for ViewToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// Freezes the node's file path in place.
///
/// Output nodes take the fully evaluated path. Any other node keeps its
/// original filename component so frame placeholders (`%04d`, `####`)
/// survive, while the directory part is resolved. With a view token, `%v`
/// becomes its lowercase form and `%V` its uppercase form. Calling twice
/// with the same arguments produces the same value. A node without a file
/// attribute is a no-op.
pub fn freeze_node(
    graph: &mut Graph,
    id: NodeId,
    view: Option<&ViewToken>,
) -> Result<(), FreezeError> {
    let node = graph
        .by_id(id)
        .ok_or(FreezeError::UnknownNode { node: id })?;
    let kind = node.kind;
    let Some(raw) = node.attr(FILE_ATTR).map(str::to_string) else {
        return Ok(());
    };

    let mut value = raw.clone();
    if expr::has_expression(&value) {
        let resolved = expr::evaluate(graph, id, FILE_ATTR)?;
        value = if kind.is_output() {
            resolved
        } else {
            // resolved directory, raw filename
            let (dir, _) = split_path(&resolved);
            let (_, file) = split_path(&raw);
            join_path(dir, file)
        };
    }

    if let Some(view) = view {
        value = value.replace("%v", &view.lower()).replace("%V", &view.upper());
    }

    if value != raw {
        let node = graph.by_id_mut(id).expect("freeze target checked above");
        tracing::debug!(node = %node.name, path = %value, "froze file path");
        node.set_attr(FILE_ATTR, value);
    }

    Ok(())
}

/// Pins a multi-view node to the `left` view for farm compatibility.
pub fn normalize_views(graph: &mut Graph, id: NodeId) {
    if let Some(node) = graph.by_id_mut(id) {
        if node.attr(VIEWS_ATTR).is_some() {
            node.set_attr(VIEWS_ATTR, "left");
        }
    }
}

fn split_path(value: &str) -> (&str, &str) {
    value.rsplit_once('/').unwrap_or(("", value))
}

fn join_path(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", dir, file)
    }
}
