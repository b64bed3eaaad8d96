//! Single-layer neighbour-contact epidemics (SI and SIR).
//!
//! Unlike the multi-layer engine, infection pressure here comes from
//! neighbours: a susceptible node with `k` infected neighbours becomes
//! infected with probability `1 - (1 - beta)^k`. Updates are synchronous.

use petgraph::graph::UnGraph;
use serde::{Deserialize, Serialize};

use crate::error::{DiffusionResult, ValidationError};
use crate::graph::{LayeredGraph, NodeId};
use crate::random::RandomSource;
use crate::trajectory::{NodeStateSnapshot, TrajectoryLog};

const SUSCEPTIBLE: usize = 0;
const INFECTED: usize = 1;
const RECOVERED: usize = 2;

/// Default cap on the number of epochs of a contact run.
pub const DEFAULT_MAX_EPOCHS: usize = 1000;

/// Contact-process variant and its coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContactModel {
    /// Susceptible → infected; infection is permanent.
    Si {
        /// Per-contact infection probability.
        beta: f64,
    },
    /// Susceptible → infected → recovered.
    Sir {
        /// Per-contact infection probability.
        beta: f64,
        /// Per-epoch recovery probability.
        gamma: f64,
    },
}

impl ContactModel {
    /// Layer name used in the resulting log.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Si { .. } => "si",
            Self::Sir { .. } => "sir",
        }
    }

    /// Compartment labels, in index order.
    #[must_use]
    pub const fn compartments(&self) -> &'static [&'static str] {
        match self {
            Self::Si { .. } => &["S", "I"],
            Self::Sir { .. } => &["S", "I", "R"],
        }
    }

    const fn beta(&self) -> f64 {
        match *self {
            Self::Si { beta } | Self::Sir { beta, .. } => beta,
        }
    }

    const fn gamma(&self) -> Option<f64> {
        match *self {
            Self::Si { .. } => None,
            Self::Sir { gamma, .. } => Some(gamma),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let in_range = |value: f64| (0.0..=1.0).contains(&value);
        if !in_range(self.beta()) {
            return Err(ValidationError::InvalidWeight { value: self.beta() });
        }
        if let Some(gamma) = self.gamma() {
            if !in_range(gamma) {
                return Err(ValidationError::InvalidWeight { value: gamma });
            }
        }
        Ok(())
    }
}

/// Result of a contact run.
#[derive(Debug, Clone, Serialize)]
pub struct ContactOutcome {
    log: TrajectoryLog,
    newly_infected: Vec<Vec<NodeId>>,
    newly_recovered: Vec<Vec<NodeId>>,
    epochs: usize,
}

impl ContactOutcome {
    /// Per-epoch compartment counts; epoch 0 is the seeded state.
    #[must_use]
    pub const fn log(&self) -> &TrajectoryLog {
        &self.log
    }

    /// Consumes the outcome, returning the log.
    #[must_use]
    pub fn into_log(self) -> TrajectoryLog {
        self.log
    }

    /// Nodes that became infected at each epoch; entry 0 holds the seeds.
    #[must_use]
    pub fn newly_infected(&self) -> &[Vec<NodeId>] {
        &self.newly_infected
    }

    /// Nodes that recovered at each epoch; always empty under SI.
    #[must_use]
    pub fn newly_recovered(&self) -> &[Vec<NodeId>] {
        &self.newly_recovered
    }

    /// Number of epochs simulated.
    #[must_use]
    pub const fn epochs(&self) -> usize {
        self.epochs
    }
}

/// Neighbour-contact spreading process on one graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSpreading {
    model: ContactModel,
    fraction_infected: f64,
    max_epochs: usize,
}

impl ContactSpreading {
    /// Creates a process seeding `fraction_infected` of the nodes, in `(0, 1]`.
    pub fn new(model: ContactModel, fraction_infected: f64) -> Result<Self, ValidationError> {
        model.validate()?;
        if !(fraction_infected > 0.0 && fraction_infected <= 1.0) {
            return Err(ValidationError::InvalidWeight {
                value: fraction_infected,
            });
        }
        Ok(Self {
            model,
            fraction_infected,
            max_epochs: DEFAULT_MAX_EPOCHS,
        })
    }

    /// Caps the number of epochs.
    pub fn with_max_epochs(mut self, max_epochs: usize) -> Result<Self, ValidationError> {
        if max_epochs == 0 {
            return Err(ValidationError::InvalidEpochCount);
        }
        self.max_epochs = max_epochs;
        Ok(self)
    }

    /// The configured model.
    #[must_use]
    pub const fn model(&self) -> ContactModel {
        self.model
    }

    /// Runs the process until it dies out or reaches the epoch cap.
    pub fn run<N, E>(&self, graph: &UnGraph<N, E>, rng: &mut RandomSource) -> DiffusionResult<ContactOutcome>
    where
        N: Clone + Into<NodeId>,
    {
        let name = self.model.name();
        let mut network = LayeredGraph::new();
        network.add_layer(name, graph, self.model.compartments().iter().copied())?;
        let node_count = network.layers()[0].node_count();
        if node_count == 0 {
            return Err(ValidationError::DistributionSize {
                layer: name.to_string(),
                what: "nodes",
                expected: 1,
                actual: 0,
            }
            .into());
        }

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let seeds = ((self.fraction_infected * node_count as f64).ceil() as usize).min(node_count);
        let mut counts = vec![0; self.model.compartments().len()];
        counts[SUSCEPTIBLE] = node_count - seeds;
        counts[INFECTED] = seeds;
        network.set_initial_distribution(name, &counts, rng)?;

        let span = tracing::info_span!("contact", model = name, nodes = node_count, seeds);
        let _guard = span.enter();

        let mut log = TrajectoryLog::for_graph(&network);
        log.record(0, name, network.layers()[0].counts())?;

        let initial = network.layers()[0]
            .states()
            .iter()
            .enumerate()
            .filter(|&(_, &state)| state == INFECTED)
            .map(|(slot, _)| slot)
            .collect::<Vec<_>>();
        let mut newly_infected = vec![node_ids(&network, &initial)];
        let mut newly_recovered = vec![Vec::new()];

        let beta = self.model.beta();
        let mut epoch = 0;
        while epoch < self.max_epochs && self.is_active(&network) {
            epoch += 1;
            let layer = &network.layers()[0];
            let states = layer.states();

            let mut infected = Vec::new();
            let mut recovered = Vec::new();
            for (slot, &state) in states.iter().enumerate() {
                match state {
                    SUSCEPTIBLE => {
                        let contacts = layer
                            .neighbor_slots(slot)
                            .filter(|&n| states[n] == INFECTED)
                            .count();
                        if contacts > 0 {
                            let exponent = i32::try_from(contacts).unwrap_or(i32::MAX);
                            if rng.chance(1.0 - (1.0 - beta).powi(exponent)) {
                                infected.push(slot);
                            }
                        }
                    }
                    INFECTED => {
                        if let Some(gamma) = self.model.gamma() {
                            if rng.chance(gamma) {
                                recovered.push(slot);
                            }
                        }
                    }
                    _ => {}
                }
            }

            tracing::debug!(epoch, infected = infected.len(), recovered = recovered.len(), "contact epoch");
            let target = network.layer_at_mut(0);
            for &slot in &infected {
                target.set_state(slot, INFECTED);
            }
            for &slot in &recovered {
                target.set_state(slot, RECOVERED);
            }
            log.record(epoch, name, network.layers()[0].counts())?;
            newly_infected.push(node_ids(&network, &infected));
            newly_recovered.push(node_ids(&network, &recovered));
        }

        log.set_final_states(NodeStateSnapshot::capture(&network));
        tracing::info!(epochs = epoch, "contact process finished");
        Ok(ContactOutcome {
            log,
            newly_infected,
            newly_recovered,
            epochs: epoch,
        })
    }

    fn is_active(&self, network: &LayeredGraph) -> bool {
        let layer = &network.layers()[0];
        let states = layer.states();
        match self.model {
            ContactModel::Si { .. } => states.iter().enumerate().any(|(slot, &state)| {
                state == SUSCEPTIBLE && layer.neighbor_slots(slot).any(|n| states[n] == INFECTED)
            }),
            ContactModel::Sir { .. } => states.contains(&INFECTED),
        }
    }
}

fn node_ids(network: &LayeredGraph, slots: &[usize]) -> Vec<NodeId> {
    let layer = &network.layers()[0];
    slots
        .iter()
        .map(|&slot| network.node_id(layer.actor_at(slot)).clone())
        .collect()
}
