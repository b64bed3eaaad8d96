//! # netdiffuse - Multi-layer compartmental diffusion on networks
//!
//! netdiffuse simulates several interacting processes (illness, awareness,
//! vaccination, opinions, ...) spreading over layered networks. Every layer
//! has its own graph and compartment set; actors are shared between layers by
//! node label, and a transition in one layer may be conditioned on the same
//! actor's state in other layers.
//!
//! ## Core Concepts
//!
//! - **LayeredGraph**: named layers over one actor population, plus node states
//! - **TransitionModel**: sparse conditional rules compiled into a dense table
//! - **SimulationEngine**: synchronous epochs over a compiled model
//! - **TrajectoryLog**: per-epoch compartment counts of every layer
//! - **ContactSpreading**: single-layer SI/SIR neighbour-contact epidemics
//! - **Scenario**: JSON experiment declarations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use netdiffuse::{generators, Condition, LayeredGraph, RandomSource, SimulationEngine, TransitionModel};
//!
//! let mut rng = RandomSource::seeded(0);
//! let town = generators::erdos_renyi(100, 0.05, &mut rng)?;
//!
//! let mut graph = LayeredGraph::new();
//! graph.add_layer("illness", &town, ["S", "I"])?;
//! graph.add_layer("vaccination", &town, ["UV", "V"])?;
//!
//! let mut model = TransitionModel::new();
//! model.add_layer("illness", ["S", "I"])?;
//! model.add_layer("vaccination", ["UV", "V"])?;
//! model.declare_rule_qualified("illness.S", "illness.I", &["vaccination.UV"], 0.2)?;
//! model.declare_rule("vaccination", "UV", "V", &Condition::unconditional(), 0.05)?;
//! model.compile(0.0)?;
//!
//! let mut engine = SimulationEngine::new(graph, Arc::new(model), rng)?;
//! engine.set_initial_distribution("illness", &[95, 5])?;
//! engine.set_initial_distribution("vaccination", &[100, 0])?;
//! let log = engine.run(50)?;
//! println!("{:?}", log.series("illness", "I")?);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod compartment;
pub mod error;
pub mod graph;
pub mod random;

// Model, compilation and simulation
pub mod engine;
pub mod model;
pub mod table;
pub mod trajectory;

// Supplementary processes and configuration
pub mod contact;
pub mod generators;
pub mod scenario;

pub use compartment::{CompartmentSet, QualifiedState, StateIndex};
pub use contact::{ContactModel, ContactOutcome, ContactSpreading};
pub use engine::SimulationEngine;
pub use error::{DiffusionError, DiffusionResult, ExecutionError, RunPhase, ValidationError};
pub use generators::NetworkGraph;
pub use graph::{Layer, LayerSummary, LayeredGraph, NetworkSummary, NodeId};
pub use model::{Condition, Configuration, TransitionModel, TransitionRule};
pub use random::RandomSource;
pub use scenario::{Experiment, GraphSpec, LayerGraph, Scenario};
pub use table::{CompiledLayer, CompiledTable, ConditioningSpace, TransitionDistribution};
pub use trajectory::{NodeStateSnapshot, TrajectoryLog};
