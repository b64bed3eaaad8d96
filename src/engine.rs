//! Synchronous, epoch-based simulation over a layered graph.
//!
//! Every epoch reads one immutable snapshot of all node states, samples a
//! target compartment for every node, and commits all changes as one batch.
//! Lookups into the compiled table go through per-layer slot maps built once
//! at construction, so sampling never touches node labels.

use std::sync::Arc;

use crate::compartment::StateIndex;
use crate::error::{DiffusionResult, ExecutionError, RunPhase, ValidationError};
use crate::graph::LayeredGraph;
use crate::model::TransitionModel;
use crate::random::RandomSource;
use crate::table::{CompiledLayer, ConditioningSpace};
use crate::trajectory::{NodeStateSnapshot, TrajectoryLog};

/// Where to find the same actor in one conditioning layer.
#[derive(Debug, Clone)]
struct ConditioningLookup {
    /// Graph position of the conditioning layer.
    layer: usize,
    /// For every slot of the conditioned layer, the actor's slot in `layer`.
    slots: Vec<Option<usize>>,
    stride: usize,
}

/// Sampling plan of one graph layer.
#[derive(Debug, Clone)]
struct LayerPlan {
    /// Index of the layer inside the model.
    model_layer: usize,
    lookups: Vec<ConditioningLookup>,
}

/// A pending state change, applied when the epoch commits.
#[derive(Debug, Clone, Copy)]
struct Change {
    layer: usize,
    slot: usize,
    state: StateIndex,
}

/// Runs a compiled [`TransitionModel`] over a [`LayeredGraph`].
#[derive(Debug)]
pub struct SimulationEngine {
    graph: LayeredGraph,
    model: Arc<TransitionModel>,
    rng: RandomSource,
    plans: Vec<LayerPlan>,
    log: TrajectoryLog,
    phase: RunPhase,
}

impl SimulationEngine {
    /// Binds a graph to a compiled model.
    ///
    /// The graph and the model must declare the same layers with identical
    /// compartment sets. Layer order may differ.
    pub fn new(graph: LayeredGraph, model: Arc<TransitionModel>, rng: RandomSource) -> DiffusionResult<Self> {
        let table = model.compiled()?;

        if graph.layers().is_empty() {
            return Err(mismatch("graph has no layers".to_string()).into());
        }
        let model_layers = model.layer_names().count();
        if model_layers != graph.layers().len() {
            return Err(mismatch(format!(
                "graph has {} layer(s), model has {model_layers}",
                graph.layers().len()
            ))
            .into());
        }

        let mut plans = Vec::with_capacity(graph.layers().len());
        for layer in graph.layers() {
            let model_layer = model
                .layer_position(layer.name())
                .ok_or_else(|| mismatch(format!("layer '{}' is not part of the model", layer.name())))?;
            if model.compartments(layer.name()) != Some(layer.compartments()) {
                return Err(mismatch(format!(
                    "layer '{}' has compartments {} in the graph but not in the model",
                    layer.name(),
                    layer.compartments()
                ))
                .into());
            }

            let compiled = table.layer(model_layer).ok_or(ExecutionError::NotCompiled)?;
            let space = compiled.space();
            let model_names: Vec<&str> = model.layer_names().collect();

            let mut lookups = Vec::with_capacity(space.layers().len());
            for (digit, &cond_model_layer) in space.layers().iter().enumerate() {
                let cond_position = graph.position(model_names[cond_model_layer])?;
                let cond_layer = &graph.layers()[cond_position];
                let slots = (0..layer.node_count())
                    .map(|slot| cond_layer.slot_of(layer.actor_at(slot)))
                    .collect();
                lookups.push(ConditioningLookup {
                    layer: cond_position,
                    slots,
                    stride: space.stride(digit),
                });
            }

            tracing::debug!(
                layer = layer.name(),
                conditioning_layers = lookups.len(),
                configurations = space.size(),
                "sampling plan built"
            );
            plans.push(LayerPlan { model_layer, lookups });
        }

        let phase = if graph.is_initialized() {
            RunPhase::Initialized
        } else {
            RunPhase::Uninitialized
        };
        let log = TrajectoryLog::for_graph(&graph);

        Ok(Self {
            graph,
            model,
            rng,
            plans,
            log,
            phase,
        })
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> RunPhase {
        self.phase
    }

    fn ensure_configurable(&self) -> Result<(), ExecutionError> {
        match self.phase {
            RunPhase::Uninitialized | RunPhase::Initialized => Ok(()),
            actual => Err(ExecutionError::InvalidPhase {
                expected: RunPhase::Initialized,
                actual,
            }),
        }
    }

    fn refresh_phase(&mut self) {
        if self.graph.is_initialized() {
            self.phase = RunPhase::Initialized;
        }
    }

    /// Assigns initial compartment counts of `layer`, drawing from the engine's source.
    pub fn set_initial_distribution(&mut self, layer: &str, counts: &[usize]) -> DiffusionResult<()> {
        self.ensure_configurable()?;
        self.graph.set_initial_distribution(layer, counts, &mut self.rng)?;
        self.refresh_phase();
        Ok(())
    }

    /// Overrides the state of one node before the run.
    ///
    /// The layer's initial distribution must already be set, otherwise it
    /// would overwrite the override.
    pub fn set_node_state(&mut self, layer: &str, node: &str, state: &str) -> DiffusionResult<()> {
        self.ensure_configurable()?;
        if self.graph.layer(layer).is_some_and(|l| !l.is_initialized()) {
            return Err(ExecutionError::LayerNotInitialized {
                layer: layer.to_string(),
            }
            .into());
        }
        self.graph.set_node_state(layer, node, state)?;
        Ok(())
    }

    /// Runs `n_epochs` epochs and returns the trajectory.
    ///
    /// Only valid from [`RunPhase::Initialized`]. The log receives the
    /// initial counts as epoch 0, then one entry per epoch. There is no early
    /// termination.
    pub fn run(&mut self, n_epochs: usize) -> DiffusionResult<&TrajectoryLog> {
        if self.phase != RunPhase::Initialized {
            return Err(ExecutionError::InvalidPhase {
                expected: RunPhase::Initialized,
                actual: self.phase,
            }
            .into());
        }
        if n_epochs == 0 {
            return Err(ValidationError::InvalidEpochCount.into());
        }

        let span = tracing::info_span!(
            "simulation",
            epochs = n_epochs,
            layers = self.plans.len(),
            seed = ?self.rng.seed()
        );
        let _guard = span.enter();

        self.phase = RunPhase::Running;
        self.record(0)?;

        let mut batch = Vec::new();
        for epoch in 1..=n_epochs {
            self.sample_epoch(&mut batch)?;
            tracing::debug!(epoch, changes = batch.len(), "epoch committed");
            for change in batch.drain(..) {
                self.graph.layer_at_mut(change.layer).set_state(change.slot, change.state);
            }
            self.record(epoch)?;
        }

        self.log.set_final_states(NodeStateSnapshot::capture(&self.graph));
        self.phase = RunPhase::Completed;
        tracing::info!(fingerprint = %self.log.fingerprint(), "simulation completed");
        Ok(&self.log)
    }

    /// Samples every node against the current snapshot, collecting changes in `batch`.
    fn sample_epoch(&mut self, batch: &mut Vec<Change>) -> DiffusionResult<()> {
        let table = self.model.compiled()?;
        let layers = self.graph.layers();

        for (position, plan) in self.plans.iter().enumerate() {
            let layer = &layers[position];
            let compiled: &CompiledLayer = table.layer(plan.model_layer).ok_or(ExecutionError::NotCompiled)?;

            for (slot, &source) in layer.states().iter().enumerate() {
                let configuration: usize = plan
                    .lookups
                    .iter()
                    .map(|lookup| {
                        let state = lookup.slots[slot].map(|s| layers[lookup.layer].states()[s]);
                        ConditioningSpace::digit(state) * lookup.stride
                    })
                    .sum();

                let distribution =
                    compiled
                        .entry(configuration, source)
                        .ok_or_else(|| ExecutionError::UnknownConfiguration {
                            layer: layer.name().to_string(),
                            configuration: format!("#{configuration}"),
                        })?;
                if distribution.is_absorbing() {
                    continue;
                }
                let target = distribution.sample(&mut self.rng);
                if target != source {
                    batch.push(Change {
                        layer: position,
                        slot,
                        state: target,
                    });
                }
            }
        }
        Ok(())
    }

    fn record(&mut self, epoch: usize) -> DiffusionResult<()> {
        for layer in self.graph.layers() {
            let counts = layer.counts();
            tracing::trace!(epoch, layer = layer.name(), ?counts, "counts");
            self.log.record(epoch, layer.name(), counts)?;
        }
        Ok(())
    }

    /// The trajectory recorded so far.
    #[must_use]
    pub const fn log(&self) -> &TrajectoryLog {
        &self.log
    }

    /// Consumes the engine, returning its trajectory.
    #[must_use]
    pub fn into_log(self) -> TrajectoryLog {
        self.log
    }

    /// The simulated graph with its current node states.
    #[must_use]
    pub const fn graph(&self) -> &LayeredGraph {
        &self.graph
    }

    /// The compiled model.
    #[must_use]
    pub fn model(&self) -> &TransitionModel {
        &self.model
    }
}

fn mismatch(reason: String) -> ValidationError {
    ValidationError::LayerMismatch { reason }
}
