//! Declarative experiments loaded from JSON.
//!
//! A [`Scenario`] names its graphs, layers, rules and initial state. Building
//! it draws every random number from one [`RandomSource`], in the order
//! graph generation → initial distributions → simulation, so a seeded
//! scenario always yields the same trajectory.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compartment::QualifiedState;
use crate::engine::SimulationEngine;
use crate::error::{DiffusionResult, ValidationError};
use crate::generators::{self, NetworkGraph};
use crate::graph::{LayeredGraph, NodeId};
use crate::model::{Condition, TransitionModel};
use crate::random::RandomSource;
use crate::trajectory::TrajectoryLog;

/// How to obtain a layer graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphSpec {
    /// Complete graph.
    Complete {
        /// Number of nodes.
        nodes: usize,
    },
    /// G(n, p) random graph.
    ErdosRenyi {
        /// Number of nodes.
        nodes: usize,
        /// Edge probability.
        probability: f64,
    },
    /// Preferential-attachment graph.
    BarabasiAlbert {
        /// Number of nodes.
        nodes: usize,
        /// Edges added per new node.
        attachments: usize,
    },
    /// Explicit nodes and edges.
    EdgeList {
        /// Nodes, including isolated ones.
        #[serde(default)]
        nodes: Vec<NodeId>,
        /// Undirected edges.
        edges: Vec<(NodeId, NodeId)>,
    },
}

impl GraphSpec {
    /// Builds the graph.
    pub fn generate(&self, rng: &mut RandomSource) -> Result<NetworkGraph, ValidationError> {
        match self {
            Self::Complete { nodes } => generators::complete(*nodes),
            Self::ErdosRenyi { nodes, probability } => generators::erdos_renyi(*nodes, *probability, rng),
            Self::BarabasiAlbert { nodes, attachments } => generators::barabasi_albert(*nodes, *attachments, rng),
            Self::EdgeList { nodes, edges } => Ok(generators::from_edge_list(nodes, edges.iter().cloned())),
        }
    }
}

/// Graph of a layer: a reference into `graphs` or an inline spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerGraph {
    /// Name of a shared graph.
    Named(String),
    /// Graph used by this layer only.
    Inline(GraphSpec),
}

/// One layer of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerSpec {
    /// Layer name.
    pub name: String,
    /// Compartment labels.
    pub compartments: Vec<String>,
    /// Graph of the layer.
    pub graph: LayerGraph,
    /// Initial count per compartment.
    pub initial: Vec<usize>,
}

/// A transition rule written with qualified labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// Source, as `layer.state`.
    pub from: String,
    /// Target, as `layer.state`.
    pub to: String,
    /// Required states of other layers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<String>,
    /// Alternative conditions; the rule applies under each of them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when_any: Vec<Vec<String>>,
    /// Weight in `[0, 1]`.
    pub weight: f64,
}

/// A rule between two joint states differing in one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JointRuleSpec {
    /// Layer whose state changes.
    pub layer: String,
    /// Initial joint state.
    pub from: Vec<String>,
    /// Final joint state.
    pub to: Vec<String>,
    /// Weight in `[0, 1]`.
    pub weight: f64,
}

/// Pins one node to a state after the initial distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideSpec {
    /// Layer name.
    pub layer: String,
    /// Node id.
    pub node: NodeId,
    /// Compartment label.
    pub state: String,
}

/// A complete experiment declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Experiment name.
    pub name: String,
    /// Seed of the experiment's random source; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Number of epochs to simulate.
    pub epochs: usize,
    /// Background weight used at compilation.
    #[serde(default)]
    pub background_weight: f64,
    /// Shared graphs, referenced by name from layers.
    #[serde(default)]
    pub graphs: BTreeMap<String, GraphSpec>,
    /// Layers in registration order.
    pub layers: Vec<LayerSpec>,
    /// Transition rules.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// Joint-state rules.
    #[serde(default)]
    pub joint_rules: Vec<JointRuleSpec>,
    /// One weight list per layer, placed on randomly chosen transition edges.
    #[serde(default)]
    pub random_rules: Vec<Vec<f64>>,
    /// Per-node overrides.
    #[serde(default)]
    pub overrides: Vec<OverrideSpec>,
}

fn invalid(reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidScenario { reason: reason.into() }
}

impl Scenario {
    /// Parses and validates a scenario.
    pub fn from_json_str(json: &str) -> DiffusionResult<Self> {
        let scenario: Self = serde_json::from_str(json)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reads, parses and validates a scenario file.
    pub fn from_path(path: impl AsRef<Path>) -> DiffusionResult<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading scenario");
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Overrides the epoch count.
    #[must_use]
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Overrides the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks structural constraints that do not need the graphs.
    ///
    /// Rule and state errors surface from [`Scenario::build`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.epochs == 0 {
            return Err(ValidationError::InvalidEpochCount);
        }
        if !(0.0..=1.0).contains(&self.background_weight) {
            return Err(ValidationError::InvalidWeight {
                value: self.background_weight,
            });
        }
        if self.layers.is_empty() {
            return Err(invalid("at least one layer is required"));
        }

        let mut seen = HashSet::new();
        for layer in &self.layers {
            if !seen.insert(layer.name.as_str()) {
                return Err(ValidationError::DuplicateLayer {
                    layer: layer.name.clone(),
                });
            }
            if let LayerGraph::Named(graph) = &layer.graph {
                if !self.graphs.contains_key(graph) {
                    return Err(invalid(format!(
                        "layer '{}' references unknown graph '{graph}'",
                        layer.name
                    )));
                }
            }
        }
        for rule in &self.rules {
            if !rule.when.is_empty() && !rule.when_any.is_empty() {
                return Err(invalid(format!(
                    "rule {} -> {} sets both 'when' and 'when_any'",
                    rule.from, rule.to
                )));
            }
        }
        Ok(())
    }

    /// Generates graphs, compiles the model and applies the initial state.
    pub fn build(&self) -> DiffusionResult<Experiment> {
        self.validate()?;
        let mut rng = RandomSource::from_optional_seed(self.seed);

        let mut shared: BTreeMap<&str, NetworkGraph> = BTreeMap::new();
        for (name, spec) in &self.graphs {
            shared.insert(name.as_str(), spec.generate(&mut rng)?);
        }
        let mut inline: Vec<Option<NetworkGraph>> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            inline.push(match &layer.graph {
                LayerGraph::Inline(spec) => Some(spec.generate(&mut rng)?),
                LayerGraph::Named(_) => None,
            });
        }

        let mut graph = LayeredGraph::new();
        let mut model = TransitionModel::new();
        for (layer, own) in self.layers.iter().zip(&inline) {
            let network = match (&layer.graph, own) {
                (_, Some(network)) => network,
                (LayerGraph::Named(name), None) => shared
                    .get(name.as_str())
                    .ok_or_else(|| invalid(format!("unknown graph '{name}'")))?,
                (LayerGraph::Inline(_), None) => return Err(invalid("inline graph was not generated").into()),
            };
            graph.add_layer(layer.name.as_str(), network, layer.compartments.iter().cloned())?;
            model.add_layer(layer.name.as_str(), layer.compartments.iter().cloned())?;
        }

        for rule in &self.rules {
            if rule.when_any.is_empty() {
                model.declare_rule_qualified(&rule.from, &rule.to, rule.when.as_slice(), rule.weight)?;
            } else {
                let source = QualifiedState::parse(&rule.from)?;
                let target = QualifiedState::parse(&rule.to)?;
                if source.layer != target.layer {
                    return Err(ValidationError::InconsistentJointStates {
                        layer: source.layer,
                        reason: format!("target '{target}' belongs to another layer"),
                    }
                    .into());
                }
                let alternatives = rule
                    .when_any
                    .iter()
                    .map(Condition::from_qualified)
                    .collect::<Result<Vec<_>, _>>()?;
                model.declare_canonical_rule(&source.layer, &source.state, &target.state, &alternatives, rule.weight)?;
            }
        }
        for rule in &self.joint_rules {
            model.declare_joint_rule(&rule.layer, rule.from.as_slice(), rule.to.as_slice(), rule.weight)?;
        }
        if !self.random_rules.is_empty() {
            model.declare_random_rules(&self.random_rules, &mut rng)?;
        }
        model.compile(self.background_weight)?;

        for layer in &self.layers {
            graph.set_initial_distribution(&layer.name, &layer.initial, &mut rng)?;
        }
        for pin in &self.overrides {
            graph.set_node_state(&pin.layer, pin.node.as_str(), &pin.state)?;
        }

        tracing::info!(
            scenario = %self.name,
            layers = self.layers.len(),
            actors = graph.actor_count(),
            "scenario built"
        );
        Ok(Experiment {
            name: self.name.clone(),
            epochs: self.epochs,
            graph,
            model: Arc::new(model),
            rng,
        })
    }
}

/// A built scenario, ready to run.
#[derive(Debug, Clone)]
pub struct Experiment {
    name: String,
    epochs: usize,
    graph: LayeredGraph,
    model: Arc<TransitionModel>,
    rng: RandomSource,
}

impl Experiment {
    /// Scenario name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Epochs the run will simulate.
    #[must_use]
    pub const fn epochs(&self) -> usize {
        self.epochs
    }

    /// The initialized graph.
    #[must_use]
    pub const fn graph(&self) -> &LayeredGraph {
        &self.graph
    }

    /// The compiled model.
    #[must_use]
    pub fn model(&self) -> &TransitionModel {
        &self.model
    }

    /// Seed of the random source, if the scenario set one.
    #[must_use]
    pub const fn seed(&self) -> Option<u64> {
        self.rng.seed()
    }

    /// Simulates the experiment.
    pub fn run(self) -> DiffusionResult<TrajectoryLog> {
        let mut engine = SimulationEngine::new(self.graph, self.model, self.rng)?;
        engine.run(self.epochs)?;
        Ok(engine.into_log())
    }
}
