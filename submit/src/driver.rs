//! The snapshot/prune pipeline and submission entry point.
//!
//! Stage order: select targets → expand closure → invert selection →
//! delete unselected → freeze remaining → persist → restore. Restore is
//! guaranteed on every exit path by the enclosing [`Transaction`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use hashbrown::HashSet;
use thiserror::Error;
use tracing::info;

use scene::closure::{closure, ClosureError, Direction};
use scene::graph::{Graph, NodeId};

use crate::freeze::{freeze_node, normalize_views, FreezeError, ViewToken};
use crate::job::{drive_submission, JobId, JobParams, SubmitError, SubmitRequest, Submitter};
use crate::session::Session;
use crate::snapshot::{snapshot_path, PersistError, SceneWriter};
use crate::transaction::Transaction;

#[derive(Clone, Debug, Default)]
pub struct SnapshotOptions {
    pub direction: Direction,
    pub view: Option<ViewToken>,
    pub extra_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("no render targets selected")]
    NoTargets,
    #[error(transparent)]
    Closure(#[from] ClosureError),
    #[error(transparent)]
    Freeze(#[from] FreezeError),
    #[error("snapshot could not be persisted: {0}")]
    Persist(#[from] PersistError),
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Prepare(#[from] PrepareError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
}

/// Prunes the scene to the targets' dependency closure, freezes the
/// surviving paths, persists the result, and restores the live graph.
pub fn prepare_snapshot(
    graph: &mut Graph,
    scene_path: &Path,
    targets: &[NodeId],
    options: &SnapshotOptions,
    writer: &impl SceneWriter,
) -> Result<PathBuf, PrepareError> {
    prepare_snapshot_at(graph, scene_path, targets, options, writer, Local::now())
}

/// [`prepare_snapshot`] with an explicit timestamp for the snapshot name.
pub fn prepare_snapshot_at(
    graph: &mut Graph,
    scene_path: &Path,
    targets: &[NodeId],
    options: &SnapshotOptions,
    writer: &impl SceneWriter,
    stamp: DateTime<Local>,
) -> Result<PathBuf, PrepareError> {
    if targets.is_empty() {
        return Err(PrepareError::NoTargets);
    }

    let path = snapshot_path(scene_path, options.extra_name.as_deref(), stamp);

    let mut tx = Transaction::begin(graph);
    prune_freeze_persist(&mut tx, targets, options, writer, &path)?;
    // tx drop restores the interactive graph on success and failure alike

    Ok(path)
}

fn prune_freeze_persist(
    graph: &mut Graph,
    targets: &[NodeId],
    options: &SnapshotOptions,
    writer: &impl SceneWriter,
    path: &Path,
) -> Result<(), PrepareError> {
    let roots: HashSet<NodeId> = targets.iter().copied().collect();
    let keep = closure(graph, &roots, options.direction)?;

    for node in graph.nodes_mut() {
        node.selected = keep.contains(&node.id);
    }

    let doomed: Vec<NodeId> = graph
        .nodes()
        .iter()
        .filter(|node| !node.selected)
        .map(|node| node.id)
        .collect();
    for id in doomed.iter().copied() {
        graph.remove_node_by_id(id);
    }

    let kept: Vec<NodeId> = graph.nodes().iter().map(|node| node.id).collect();
    for id in kept.iter().copied() {
        freeze_node(graph, id, options.view.as_ref())?;
        normalize_views(graph, id);
    }

    info!(
        kept = kept.len(),
        pruned = doomed.len(),
        path = %path.display(),
        "persisting scene snapshot"
    );

    writer.save(graph, path)?;

    Ok(())
}

/// Prepares a snapshot and drives it through the submitter.
///
/// The live graph is never left mutated, wherever submission aborts.
#[allow(clippy::too_many_arguments)]
pub fn submit_scene(
    graph: &mut Graph,
    scene_path: &Path,
    targets: &[NodeId],
    options: &SnapshotOptions,
    params: JobParams,
    writer: &impl SceneWriter,
    submitter: &impl Submitter,
    session: &Session,
) -> Result<JobId, SubmissionError> {
    let output_names: Vec<String> = targets
        .iter()
        .filter_map(|&id| graph.by_id(id).map(|node| node.name.clone()))
        .collect();

    let snapshot = prepare_snapshot(graph, scene_path, targets, options, writer)?;
    let request = SubmitRequest::new(snapshot, &output_names, params);

    let job = drive_submission(submitter, session, &request)?;
    info!(job = %job, outputs = %request.outputs, "job submitted");

    Ok(job)
}
