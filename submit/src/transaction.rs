use std::mem;
use std::ops::{Deref, DerefMut};

use scene::graph::Graph;

/// Scoped graph transaction: holds a pristine copy and restores it on drop.
///
/// Mutations made through the transaction reach the underlying graph only
/// until the transaction goes out of scope; the interactive scene comes back
/// exactly as it was on every exit path, including unwinds.
#[derive(Debug)]
pub struct Transaction<'a> {
    graph: &'a mut Graph,
    pristine: Graph,
}

impl<'a> Transaction<'a> {
    pub fn begin(graph: &'a mut Graph) -> Self {
        let pristine = graph.clone();
        Self { graph, pristine }
    }
}

impl Deref for Transaction<'_> {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        self.graph
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Graph {
        self.graph
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        *self.graph = mem::take(&mut self.pristine);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene::graph::test_scene;

    #[test]
    fn mutations_are_rolled_back_on_drop() {
        let mut graph = test_scene();
        let before = graph.clone();

        {
            let mut tx = Transaction::begin(&mut graph);
            let doomed = tx.by_name("plateB").unwrap().id;
            tx.remove_node_by_id(doomed);
            tx.by_name_mut("comp").unwrap().selected = true;

            assert_eq!(tx.nodes().len(), 4);
        }

        assert_eq!(graph, before);
    }

    #[test]
    fn rollback_happens_on_early_return() {
        fn failing_edit(graph: &mut Graph) -> anyhow::Result<()> {
            let mut tx = Transaction::begin(graph);
            let doomed = tx.by_name("merge").unwrap().id;
            tx.remove_node_by_id(doomed);

            anyhow::bail!("persist failed")
        }

        let mut graph = test_scene();
        let before = graph.clone();

        assert!(failing_edit(&mut graph).is_err());
        assert_eq!(graph, before);
    }
}
