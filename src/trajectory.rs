//! Trajectory log: per-epoch compartment counts of every layer.
//!
//! The log is append-only. Epoch 0 is the initial state; epoch `e` holds the
//! counts after the `e`-th committed batch. Each layer's series is contiguous.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::compartment::CompartmentSet;
use crate::error::{DiffusionResult, ExecutionError, ValidationError};
use crate::graph::{LayeredGraph, NodeId};

#[derive(Debug, Clone, PartialEq, Serialize)]
struct LayerTrajectory {
    name: String,
    compartments: CompartmentSet,
    /// `counts[epoch][compartment]`
    counts: Vec<Vec<usize>>,
}

/// Per-node compartment labels of every layer at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeStateSnapshot {
    layers: BTreeMap<String, BTreeMap<NodeId, String>>,
}

impl NodeStateSnapshot {
    /// Captures the current states of `graph`.
    #[must_use]
    pub fn capture(graph: &LayeredGraph) -> Self {
        let layers = graph
            .layers()
            .iter()
            .map(|layer| {
                let labels = layer.compartments().labels();
                let states = layer
                    .states()
                    .iter()
                    .enumerate()
                    .map(|(slot, &state)| {
                        (graph.node_id(layer.actor_at(slot)).clone(), labels[state].clone())
                    })
                    .collect();
                (layer.name().to_string(), states)
            })
            .collect();
        Self { layers }
    }

    /// State label of `node` in `layer`.
    #[must_use]
    pub fn state_of(&self, layer: &str, node: &str) -> Option<&str> {
        self.layers.get(layer)?.get(node).map(String::as_str)
    }

    /// All node states of `layer`, ordered by node id.
    #[must_use]
    pub fn layer(&self, layer: &str) -> Option<&BTreeMap<NodeId, String>> {
        self.layers.get(layer)
    }

    /// Layer names, sorted.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.layers.keys().map(String::as_str)
    }
}

/// Append-only record of compartment counts per layer and epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryLog {
    layers: Vec<LayerTrajectory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_states: Option<NodeStateSnapshot>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TrajectoryLog {
    /// Creates an empty log for the given `(layer, compartments)` layouts.
    pub fn new<I, S>(layouts: I) -> Self
    where
        I: IntoIterator<Item = (S, CompartmentSet)>,
        S: Into<String>,
    {
        let layers: Vec<LayerTrajectory> = layouts
            .into_iter()
            .map(|(name, compartments)| LayerTrajectory {
                name: name.into(),
                compartments,
                counts: Vec::new(),
            })
            .collect();
        let index = layers
            .iter()
            .enumerate()
            .map(|(i, layer)| (layer.name.clone(), i))
            .collect();
        Self {
            layers,
            final_states: None,
            index,
        }
    }

    /// Creates an empty log shaped after the layers of `graph`.
    #[must_use]
    pub fn for_graph(graph: &LayeredGraph) -> Self {
        Self::new(
            graph
                .layers()
                .iter()
                .map(|layer| (layer.name().to_string(), layer.compartments().clone())),
        )
    }

    fn trajectory(&self, layer: &str) -> Result<&LayerTrajectory, ValidationError> {
        self.index
            .get(layer)
            .map(|&i| &self.layers[i])
            .ok_or_else(|| ValidationError::UnknownLayer {
                layer: layer.to_string(),
            })
    }

    /// Appends the counts of `layer` at `epoch`.
    ///
    /// Epochs of a layer must be recorded as `0, 1, 2, ...` without gaps.
    pub fn record(&mut self, epoch: usize, layer: &str, counts: Vec<usize>) -> DiffusionResult<()> {
        let position = *self.index.get(layer).ok_or_else(|| ValidationError::UnknownLayer {
            layer: layer.to_string(),
        })?;
        let trajectory = &mut self.layers[position];

        let next = trajectory.counts.len();
        if epoch < next {
            return Err(ExecutionError::DuplicateEpoch {
                epoch,
                layer: layer.to_string(),
            }
            .into());
        }
        if epoch > next {
            return Err(ExecutionError::EpochOutOfOrder {
                epoch,
                next,
                layer: layer.to_string(),
            }
            .into());
        }
        if counts.len() != trajectory.compartments.len() {
            return Err(ValidationError::DistributionSize {
                layer: layer.to_string(),
                what: "compartment counts",
                expected: trajectory.compartments.len(),
                actual: counts.len(),
            }
            .into());
        }

        trajectory.counts.push(counts);
        Ok(())
    }

    /// Counts of `compartment` in `layer`, one entry per recorded epoch.
    pub fn series(&self, layer: &str, compartment: &str) -> DiffusionResult<Vec<usize>> {
        let trajectory = self.trajectory(layer)?;
        let state = trajectory
            .compartments
            .index_of(compartment)
            .ok_or_else(|| ValidationError::UnknownCompartment {
                layer: layer.to_string(),
                compartment: compartment.to_string(),
            })?;
        Ok(trajectory.counts.iter().map(|counts| counts[state]).collect())
    }

    /// Node states after the last committed epoch, once a run has finished.
    #[must_use]
    pub fn final_states(&self) -> Option<&NodeStateSnapshot> {
        self.final_states.as_ref()
    }

    pub(crate) fn set_final_states(&mut self, snapshot: NodeStateSnapshot) {
        self.final_states = Some(snapshot);
    }

    /// Number of simulated epochs recorded for every layer (epoch 0 excluded).
    #[must_use]
    pub fn epochs(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| layer.counts.len())
            .min()
            .unwrap_or(0)
            .saturating_sub(1)
    }

    /// Most recent counts of `layer`.
    #[must_use]
    pub fn latest_counts(&self, layer: &str) -> Option<&[usize]> {
        self.trajectory(layer).ok()?.counts.last().map(Vec::as_slice)
    }

    /// Compartments of `layer`.
    #[must_use]
    pub fn compartments(&self, layer: &str) -> Option<&CompartmentSet> {
        self.trajectory(layer).ok().map(|t| &t.compartments)
    }

    /// Layer names in registration order.
    pub fn layers(&self) -> impl Iterator<Item = &str> + '_ {
        self.layers.iter().map(|layer| layer.name.as_str())
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(|layer| layer.counts.is_empty())
    }

    /// BLAKE3 digest of every recorded count, as lowercase hex.
    ///
    /// Two logs have the same fingerprint iff they hold the same layers,
    /// compartments and counts.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for layer in &self.layers {
            hasher.update(&(layer.name.len() as u64).to_le_bytes());
            hasher.update(layer.name.as_bytes());
            for label in layer.compartments.iter() {
                hasher.update(&(label.len() as u64).to_le_bytes());
                hasher.update(label.as_bytes());
            }
            hasher.update(&(layer.counts.len() as u64).to_le_bytes());
            for counts in &layer.counts {
                for &count in counts {
                    hasher.update(&(count as u64).to_le_bytes());
                }
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}
