use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use common::id_type;
use common::normalize_string::NormalizeString;
use common::FileFormat;

id_type!(NodeId);

/// Attribute holding a node's file path, when the node has one.
pub const FILE_ATTR: &str = "file";
/// Attribute listing the stereo views a node renders.
pub const VIEWS_ATTR: &str = "views";

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum NodeKind {
    /// Renders its result to disk (closure targets are picked from these).
    Output,
    /// Brings footage into the graph from disk.
    Input,
    #[default]
    Other,
}

impl NodeKind {
    pub fn is_output(&self) -> bool {
        *self == NodeKind::Output
    }
    pub fn is_input(&self) -> bool {
        *self == NodeKind::Input
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Binding {
    #[default]
    None,
    Source(NodeId),
}

impl Binding {
    pub fn as_source(&self) -> Option<NodeId> {
        match self {
            Binding::Source(id) => Some(*id),
            Binding::None => None,
        }
    }

    pub fn is_some(&self) -> bool {
        self.as_source().is_some()
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Binding>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attrs: HashMap<String, String>,

    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub disabled: bool,
}

impl Default for Node {
    fn default() -> Self {
        Node {
            id: NodeId::unique(),
            name: "".to_string(),
            kind: NodeKind::Other,
            inputs: vec![],
            attrs: HashMap::new(),
            selected: false,
            disabled: false,
        }
    }
}

impl Node {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    /// Capability check used instead of matching on node kind names.
    pub fn has_file_path(&self) -> bool {
        self.attrs.contains_key(FILE_ATTR)
    }
}

#[derive(Clone, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
}

impl Graph {
    pub fn nodes(&self) -> &[Node] {
        self.nodes.as_slice()
    }
    pub fn nodes_mut(&mut self) -> &mut [Node] {
        self.nodes.as_mut_slice()
    }

    pub fn add_node(&mut self, node: Node) {
        match self.nodes.iter().position(|n| n.id == node.id) {
            Some(index) => self.nodes[index] = node,
            None => self.nodes.push(node),
        }
    }

    pub fn remove_node_by_id(&mut self, id: NodeId) {
        assert!(!id.is_nil());

        self.nodes.retain(|node| node.id != id);

        self.nodes
            .iter_mut()
            .flat_map(|node| node.inputs.iter_mut())
            .filter(|binding| binding.as_source() == Some(id))
            .for_each(|binding| *binding = Binding::None);
    }

    pub fn by_id(&self, id: NodeId) -> Option<&Node> {
        assert!(!id.is_nil());
        self.nodes.iter().find(|node| node.id == id)
    }
    pub fn by_id_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        assert!(!id.is_nil());
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name == name)
    }
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.name == name)
    }

    pub fn serialize(&self, format: FileFormat) -> String {
        common::serialize(self, format)
    }
    pub fn deserialize(serialized: &str, format: FileFormat) -> anyhow::Result<Self> {
        let graph: Graph = common::deserialize(serialized, format)?;
        graph.validate()?;

        Ok(graph)
    }

    pub fn to_yaml(&self) -> String {
        serde_yml::to_string(&self)
            .expect("Failed to serialize graph to YAML")
            .normalize()
    }
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Graph> {
        let graph: Graph = serde_yml::from_str(yaml)?;

        graph.validate()?;

        Ok(graph)
    }
    pub fn from_yaml_file(path: &str) -> anyhow::Result<Graph> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen_ids: hashbrown::HashSet<NodeId> = hashbrown::HashSet::new();
        let mut seen_names: hashbrown::HashSet<&str> = hashbrown::HashSet::new();
        for node in self.nodes.iter() {
            if node.id.is_nil() {
                return Err(anyhow::Error::msg("Node has invalid id"));
            }
            if !seen_ids.insert(node.id) {
                return Err(anyhow::anyhow!("Duplicate node id: {}", node.id));
            }
            if node.name.is_empty() {
                return Err(anyhow::Error::msg("Node has empty name"));
            }
            if !seen_names.insert(node.name.as_str()) {
                return Err(anyhow::anyhow!("Duplicate node name: {}", node.name));
            }

            for binding in node.inputs.iter() {
                if let Some(source) = binding.as_source() {
                    if self.by_id(source).is_none() {
                        return Err(anyhow::anyhow!(
                            "Node {} input connected to a non-existent node",
                            node.name
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Five-node fixture: `comp` renders `merge(plateA)`, while `plateB` and
/// `reference` hang unconnected.
pub fn test_scene() -> Graph {
    let mut graph = Graph::default();

    let mut plate_a = Node {
        id: NodeId::from_u128(1),
        name: "plateA".to_string(),
        kind: NodeKind::Input,
        ..Default::default()
    };
    plate_a.set_attr(FILE_ATTR, "/fs/show/seq010/plateA.%04d.exr");

    let mut plate_b = Node {
        id: NodeId::from_u128(2),
        name: "plateB".to_string(),
        kind: NodeKind::Input,
        ..Default::default()
    };
    plate_b.set_attr(FILE_ATTR, "/fs/show/seq010/plateB.####.exr");

    let merge = Node {
        id: NodeId::from_u128(3),
        name: "merge".to_string(),
        inputs: vec![Binding::Source(plate_a.id)],
        ..Default::default()
    };

    let mut comp = Node {
        id: NodeId::from_u128(4),
        name: "comp".to_string(),
        kind: NodeKind::Output,
        inputs: vec![Binding::Source(merge.id)],
        ..Default::default()
    };
    comp.set_attr(FILE_ATTR, "/fs/show/seq010/out/comp_v001.%04d.exr");

    let mut reference = Node {
        id: NodeId::from_u128(5),
        name: "reference".to_string(),
        kind: NodeKind::Input,
        ..Default::default()
    };
    reference.set_attr(FILE_ATTR, "/fs/show/ref/colorchart.exr");

    graph.add_node(plate_a);
    graph.add_node(plate_b);
    graph.add_node(merge);
    graph.add_node(comp);
    graph.add_node(reference);

    graph
}
