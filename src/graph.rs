//! Layered graph: named layers over one shared actor population.
//!
//! Node labels are interned once into an actor table. Each layer keeps its
//! own undirected graph whose node weights are actor ids, so the same actor
//! can be looked up in any other layer by id instead of by reference.
//!
//! Key invariants:
//! - Every node of a layer holds a state from that layer's compartment set.
//! - Slot `i` of a layer is petgraph node index `i`; slot order is the order
//!   of the graph the layer was built from and never changes.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::compartment::{validate_name, CompartmentSet, StateIndex};
use crate::error::ValidationError;
use crate::random::RandomSource;

/// Identity of an actor; equal labels in different layers denote the same actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node id from a label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(label: &str) -> Self {
        Self(label.to_string())
    }
}

impl From<String> for NodeId {
    fn from(label: String) -> Self {
        Self(label)
    }
}

impl From<&NodeId> for NodeId {
    fn from(id: &NodeId) -> Self {
        id.clone()
    }
}

macro_rules! node_id_from_integer {
    ($($t:ty),*) => {
        $(impl From<$t> for NodeId {
            fn from(n: $t) -> Self {
                Self(n.to_string())
            }
        })*
    };
}

node_id_from_integer!(u32, u64, usize, i32, i64);

/// Index into the actor table of a [`LayeredGraph`].
pub(crate) type ActorId = usize;

/// One process layer: a graph plus the current state of each of its nodes.
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    compartments: CompartmentSet,
    graph: UnGraph<ActorId, ()>,
    slot_by_actor: HashMap<ActorId, usize>,
    states: Vec<StateIndex>,
    initialized: bool,
}

impl Layer {
    /// Layer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compartment set of the layer.
    #[must_use]
    pub fn compartments(&self) -> &CompartmentSet {
        &self.compartments
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns true once an initial distribution has been applied.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Current per-compartment counts.
    #[must_use]
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.compartments.len()];
        for &state in &self.states {
            counts[state] += 1;
        }
        counts
    }

    pub(crate) fn actor_at(&self, slot: usize) -> ActorId {
        self.graph[NodeIndex::new(slot)]
    }

    pub(crate) fn slot_of(&self, actor: ActorId) -> Option<usize> {
        self.slot_by_actor.get(&actor).copied()
    }

    pub(crate) fn states(&self) -> &[StateIndex] {
        &self.states
    }

    pub(crate) fn set_state(&mut self, slot: usize, state: StateIndex) {
        self.states[slot] = state;
    }

    pub(crate) fn neighbor_slots(&self, slot: usize) -> impl Iterator<Item = usize> + Clone + '_ {
        self.graph.neighbors(NodeIndex::new(slot)).map(NodeIndex::index)
    }
}

/// Per-layer line of a [`NetworkSummary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSummary {
    /// Layer name.
    pub name: String,
    /// Node count.
    pub nodes: usize,
    /// Edge count.
    pub edges: usize,
    /// Average node degree.
    pub mean_degree: f64,
    /// Compartment labels.
    pub compartments: Vec<String>,
    /// Current per-compartment counts.
    pub counts: Vec<usize>,
}

/// Human-readable description of a [`LayeredGraph`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSummary {
    /// Distinct actors across all layers.
    pub actors: usize,
    /// One entry per layer in registration order.
    pub layers: Vec<LayerSummary>,
}

impl fmt::Display for NetworkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "network: {} layer(s), {} actor(s)", self.layers.len(), self.actors)?;
        for layer in &self.layers {
            writeln!(
                f,
                "  {}: {} nodes, {} edges, mean degree {:.3}, compartments [{}], counts {:?}",
                layer.name,
                layer.nodes,
                layer.edges,
                layer.mean_degree,
                layer.compartments.join(", "),
                layer.counts,
            )?;
        }
        Ok(())
    }
}

/// Named layers sharing an actor population.
#[derive(Debug, Clone, Default)]
pub struct LayeredGraph {
    actors: Vec<NodeId>,
    actor_index: HashMap<NodeId, ActorId>,
    layers: Vec<Layer>,
    layer_index: HashMap<String, usize>,
}

impl LayeredGraph {
    /// Creates an empty layered graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer built from `graph` with the given compartments.
    ///
    /// Every node starts in the first compartment until an initial
    /// distribution is applied.
    pub fn add_layer<N, E, I, S>(
        &mut self,
        name: impl Into<String>,
        graph: &UnGraph<N, E>,
        compartments: I,
    ) -> Result<(), ValidationError>
    where
        N: Clone + Into<NodeId>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        validate_name(&name)?;
        if self.layer_index.contains_key(&name) {
            return Err(ValidationError::DuplicateLayer { layer: name });
        }
        let compartments = CompartmentSet::new(compartments)?;

        let labels: Vec<NodeId> = graph.node_indices().map(|ix| graph[ix].clone().into()).collect();
        let mut seen = HashSet::with_capacity(labels.len());
        for label in &labels {
            if !seen.insert(label) {
                return Err(ValidationError::DuplicateNode {
                    layer: name,
                    node: label.to_string(),
                });
            }
        }

        let mut layer_graph = UnGraph::<ActorId, ()>::with_capacity(labels.len(), graph.edge_count());
        let mut slot_by_actor = HashMap::with_capacity(labels.len());
        for (slot, label) in labels.into_iter().enumerate() {
            let actor = self.intern(label);
            layer_graph.add_node(actor);
            slot_by_actor.insert(actor, slot);
        }
        for edge in graph.edge_references() {
            layer_graph.add_edge(edge.source(), edge.target(), ());
        }

        let node_count = layer_graph.node_count();
        tracing::debug!(
            layer = %name,
            nodes = node_count,
            edges = layer_graph.edge_count(),
            "layer added"
        );

        self.layer_index.insert(name.clone(), self.layers.len());
        self.layers.push(Layer {
            name,
            compartments,
            graph: layer_graph,
            slot_by_actor,
            states: vec![0; node_count],
            initialized: false,
        });
        Ok(())
    }

    fn intern(&mut self, label: NodeId) -> ActorId {
        if let Some(&actor) = self.actor_index.get(&label) {
            return actor;
        }
        let actor = self.actors.len();
        self.actors.push(label.clone());
        self.actor_index.insert(label, actor);
        actor
    }

    /// Randomly assigns compartments so that exactly `counts[i]` nodes are in
    /// compartment `i`.
    ///
    /// The node order is shuffled with `rng` and cut into contiguous blocks in
    /// compartment order. `counts` must have one entry per compartment and sum
    /// to at most the layer's node count. When the sum is smaller, the counts
    /// partition a random subset of that size; nodes outside the subset keep
    /// their current state (the first compartment on a fresh layer).
    pub fn set_initial_distribution(
        &mut self,
        layer: &str,
        counts: &[usize],
        rng: &mut RandomSource,
    ) -> Result<(), ValidationError> {
        let position = self.position(layer)?;
        let target = &mut self.layers[position];

        if counts.len() != target.compartments.len() {
            return Err(ValidationError::DistributionSize {
                layer: layer.to_string(),
                what: "compartment counts",
                expected: target.compartments.len(),
                actual: counts.len(),
            });
        }
        let total = counts.iter().fold(0usize, |acc, &c| acc.saturating_add(c));
        if total > target.node_count() {
            return Err(ValidationError::DistributionSize {
                layer: layer.to_string(),
                what: "nodes at most",
                expected: target.node_count(),
                actual: total,
            });
        }

        let mut order: Vec<usize> = (0..target.node_count()).collect();
        order.shuffle(rng);

        let mut cursor = 0;
        for (state, &count) in counts.iter().enumerate() {
            for &slot in &order[cursor..cursor + count] {
                target.states[slot] = state;
            }
            cursor += count;
        }
        target.initialized = true;

        tracing::debug!(
            layer,
            ?counts,
            untouched = target.node_count() - total,
            "initial distribution applied"
        );
        Ok(())
    }

    /// Overrides the state of a single node.
    ///
    /// A later [`LayeredGraph::set_initial_distribution`] on the same layer
    /// reassigns the node.
    pub fn set_node_state(&mut self, layer: &str, node: &str, state: &str) -> Result<(), ValidationError> {
        let position = self.position(layer)?;
        let slot = self.slot(position, node)?;
        let target = &mut self.layers[position];
        let index = target
            .compartments
            .index_of(state)
            .ok_or_else(|| ValidationError::InvalidState {
                layer: layer.to_string(),
                state: state.to_string(),
            })?;
        target.set_state(slot, index);
        Ok(())
    }

    /// Current state label of `node` in `layer`.
    pub fn node_state(&self, layer: &str, node: &str) -> Result<&str, ValidationError> {
        let position = self.position(layer)?;
        let slot = self.slot(position, node)?;
        let target = &self.layers[position];
        Ok(target.compartments.labels()[target.states[slot]].as_str())
    }

    /// Neighbours of `node` in `layer`.
    ///
    /// The returned iterator is lazy and can be cloned to restart it.
    pub fn neighbors<'a>(
        &'a self,
        layer: &str,
        node: &str,
    ) -> Result<impl Iterator<Item = &'a NodeId> + Clone + 'a, ValidationError> {
        let position = self.position(layer)?;
        let slot = self.slot(position, node)?;
        let target = &self.layers[position];
        Ok(target
            .neighbor_slots(slot)
            .map(move |neighbor| &self.actors[target.actor_at(neighbor)]))
    }

    /// Nodes of `layer` in slot order.
    pub fn nodes<'a>(&'a self, layer: &str) -> Result<impl Iterator<Item = &'a NodeId> + 'a, ValidationError> {
        let target = &self.layers[self.position(layer)?];
        Ok((0..target.node_count()).map(move |slot| &self.actors[target.actor_at(slot)]))
    }

    /// Number of nodes in `layer`.
    pub fn node_count(&self, layer: &str) -> Result<usize, ValidationError> {
        Ok(self.layers[self.position(layer)?].node_count())
    }

    /// Current per-compartment counts of `layer`.
    pub fn snapshot_counts(&self, layer: &str) -> Result<Vec<usize>, ValidationError> {
        Ok(self.layers[self.position(layer)?].counts())
    }

    /// Layer by name.
    #[must_use]
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layer_index.get(name).map(|&i| &self.layers[i])
    }

    /// All layers in registration order.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Layer names in registration order.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.layers.iter().map(Layer::name)
    }

    /// Number of distinct actors across all layers.
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Returns true if the graph has layers and all of them are initialized.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        !self.layers.is_empty() && self.layers.iter().all(Layer::is_initialized)
    }

    /// Describes layer sizes, degrees and current counts.
    #[must_use]
    pub fn summary(&self) -> NetworkSummary {
        let layers = self
            .layers
            .iter()
            .map(|layer| {
                let nodes = layer.node_count();
                #[allow(clippy::cast_precision_loss)]
                let mean_degree = if nodes == 0 {
                    0.0
                } else {
                    2.0 * layer.edge_count() as f64 / nodes as f64
                };
                LayerSummary {
                    name: layer.name.clone(),
                    nodes,
                    edges: layer.edge_count(),
                    mean_degree,
                    compartments: layer.compartments.labels().to_vec(),
                    counts: layer.counts(),
                }
            })
            .collect();
        NetworkSummary {
            actors: self.actors.len(),
            layers,
        }
    }

    pub(crate) fn position(&self, layer: &str) -> Result<usize, ValidationError> {
        self.layer_index
            .get(layer)
            .copied()
            .ok_or_else(|| ValidationError::UnknownLayer {
                layer: layer.to_string(),
            })
    }

    fn slot(&self, position: usize, node: &str) -> Result<usize, ValidationError> {
        let unknown = || ValidationError::UnknownNode {
            layer: self.layers[position].name.clone(),
            node: node.to_string(),
        };
        let actor = *self.actor_index.get(node).ok_or_else(unknown)?;
        self.layers[position].slot_of(actor).ok_or_else(unknown)
    }

    pub(crate) fn node_id(&self, actor: ActorId) -> &NodeId {
        &self.actors[actor]
    }

    pub(crate) fn layer_at_mut(&mut self, position: usize) -> &mut Layer {
        &mut self.layers[position]
    }
}
