//! Compiled transition table.
//!
//! Compilation is a two-phase pipeline:
//! 1. enumerate, per layer, the conditioning space: the Cartesian product of
//!    `{absent} ∪ compartments` over every layer referenced by that layer's
//!    rule conditions;
//! 2. for every (configuration, source) pair, accumulate background and rule
//!    weights per target and normalize into a distribution that sums to 1.
//!
//! Configurations are addressed by a mixed-radix index so that lookups during
//! simulation are a multiply-add per conditioning layer.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::compartment::StateIndex;
use crate::random::RandomSource;

/// A rule with every name resolved to an index.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedRule {
    pub layer: usize,
    pub source: StateIndex,
    pub target: StateIndex,
    /// `(layer, state)` requirements, sorted by layer.
    pub requirements: Vec<(usize, StateIndex)>,
    pub weight: f64,
}

/// Outgoing probabilities of one source compartment under one configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionDistribution {
    source: StateIndex,
    probabilities: Vec<f64>,
}

impl TransitionDistribution {
    fn from_weights(source: StateIndex, mut weights: Vec<f64>) -> Self {
        weights[source] = 0.0;
        let outgoing: f64 = weights.iter().sum();
        if outgoing > 1.0 {
            for w in &mut weights {
                *w /= outgoing;
            }
        } else {
            weights[source] = 1.0 - outgoing;
        }
        Self {
            source,
            probabilities: weights,
        }
    }

    /// Source compartment index.
    #[must_use]
    pub const fn source(&self) -> StateIndex {
        self.source
    }

    /// Probability of each target compartment, indexed like the compartment set.
    #[must_use]
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    /// Probability of moving to `target` (the source index gives "stay").
    #[must_use]
    pub fn probability(&self, target: StateIndex) -> f64 {
        self.probabilities.get(target).copied().unwrap_or(0.0)
    }

    /// Probability of remaining in the source compartment.
    #[must_use]
    pub fn stay(&self) -> f64 {
        self.probabilities[self.source]
    }

    /// Total probability of leaving the source compartment.
    #[must_use]
    pub fn outgoing(&self) -> f64 {
        self.probabilities
            .iter()
            .enumerate()
            .filter(|&(idx, _)| idx != self.source)
            .map(|(_, p)| p)
            .sum()
    }

    /// Returns true when the distribution is a pure self-loop.
    #[must_use]
    pub fn is_absorbing(&self) -> bool {
        self.probabilities
            .iter()
            .enumerate()
            .all(|(idx, &p)| idx == self.source || p == 0.0)
    }

    /// Samples a target compartment.
    pub fn sample(&self, rng: &mut RandomSource) -> StateIndex {
        rng.pick_weighted(&self.probabilities)
    }
}

/// Enumerated conditioning space of one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditioningSpace {
    layers: Vec<usize>,
    radices: Vec<usize>,
    strides: Vec<usize>,
    size: usize,
}

impl ConditioningSpace {
    /// Digit reserved for "actor absent from this conditioning layer".
    pub const ABSENT: usize = 0;

    /// Returns `None` when the number of configurations overflows `usize`.
    fn new(layers: Vec<usize>, compartment_counts: &[usize]) -> Option<Self> {
        let radices: Vec<usize> = layers.iter().map(|&l| compartment_counts[l] + 1).collect();
        let mut strides = Vec::with_capacity(radices.len());
        let mut size = 1usize;
        for &radix in &radices {
            strides.push(size);
            size = size.checked_mul(radix)?;
        }
        Some(Self {
            layers,
            radices,
            strides,
            size,
        })
    }

    /// Conditioning layers (model indices) in registration order.
    #[must_use]
    pub fn layers(&self) -> &[usize] {
        &self.layers
    }

    /// Number of configurations.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Position of `layer` among the conditioning layers.
    #[must_use]
    pub fn position(&self, layer: usize) -> Option<usize> {
        self.layers.iter().position(|&l| l == layer)
    }

    /// Stride of the conditioning layer at `position`.
    pub(crate) fn stride(&self, position: usize) -> usize {
        self.strides[position]
    }

    /// Digit for a conditioning-layer state (`None` = absent).
    #[must_use]
    pub const fn digit(state: Option<StateIndex>) -> usize {
        match state {
            Some(s) => s + 1,
            None => Self::ABSENT,
        }
    }

    /// Encodes one digit per conditioning layer into a configuration index.
    #[must_use]
    pub fn encode(&self, digits: &[usize]) -> Option<usize> {
        if digits.len() != self.layers.len() {
            return None;
        }
        let mut index = 0;
        for ((&digit, &radix), &stride) in digits.iter().zip(&self.radices).zip(&self.strides) {
            if digit >= radix {
                return None;
            }
            index += digit * stride;
        }
        Some(index)
    }

    fn decode(&self, mut index: usize) -> Vec<usize> {
        self.radices
            .iter()
            .map(|&radix| {
                let digit = index % radix;
                index /= radix;
                digit
            })
            .collect()
    }
}

/// Compiled distributions of one layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledLayer {
    space: ConditioningSpace,
    states: usize,
    entries: Vec<TransitionDistribution>,
}

impl CompiledLayer {
    /// The layer's conditioning space.
    #[must_use]
    pub const fn space(&self) -> &ConditioningSpace {
        &self.space
    }

    /// Distribution for a configuration index and source compartment.
    #[must_use]
    pub fn entry(&self, configuration: usize, source: StateIndex) -> Option<&TransitionDistribution> {
        if source >= self.states || configuration >= self.space.size {
            return None;
        }
        self.entries.get(configuration * self.states + source)
    }

    /// All distributions, configuration-major.
    pub fn entries(&self) -> impl Iterator<Item = &TransitionDistribution> + '_ {
        self.entries.iter()
    }
}

/// Dense, immutable transition table for every layer of a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledTable {
    background_weight: f64,
    layers: Vec<CompiledLayer>,
}

impl CompiledTable {
    /// Background weight the table was compiled with.
    #[must_use]
    pub const fn background_weight(&self) -> f64 {
        self.background_weight
    }

    /// Compiled layer by model index.
    #[must_use]
    pub fn layer(&self, index: usize) -> Option<&CompiledLayer> {
        self.layers.get(index)
    }

    /// Total number of stored distributions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.iter().map(|l| l.entries.len()).sum()
    }

    /// Returns true if the table holds no distributions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Conditioning layers of every layer, derived from rule conditions.
pub(crate) fn conditioning_layers(layer_count: usize, rules: &[ResolvedRule]) -> Vec<Vec<usize>> {
    let mut sets = vec![BTreeSet::new(); layer_count];
    for rule in rules {
        sets[rule.layer].extend(rule.requirements.iter().map(|&(layer, _)| layer));
    }
    sets.into_iter().map(|set| set.into_iter().collect()).collect()
}

/// A layer whose table would not be addressable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SpaceOverflow {
    pub layer: usize,
    pub conditioning_layers: usize,
}

/// Builds the dense table from resolved rules.
///
/// `compartment_counts[l]` is the number of compartments of layer `l`.
pub(crate) fn compile(
    compartment_counts: &[usize],
    rules: &[ResolvedRule],
    background_weight: f64,
) -> Result<CompiledTable, SpaceOverflow> {
    let conditioning = conditioning_layers(compartment_counts.len(), rules);

    let layers = conditioning
        .into_iter()
        .enumerate()
        .map(|(layer, cond_layers)| {
            let overflow = SpaceOverflow {
                layer,
                conditioning_layers: cond_layers.len(),
            };
            let states = compartment_counts[layer];
            let space = ConditioningSpace::new(cond_layers, compartment_counts).ok_or(overflow)?;
            let capacity = space.size.checked_mul(states).ok_or(overflow)?;

            // Requirements re-expressed as (digit position, required digit).
            let layer_rules: Vec<(&ResolvedRule, Vec<(usize, usize)>)> = rules
                .iter()
                .filter(|rule| rule.layer == layer)
                .map(|rule| {
                    let reqs = rule
                        .requirements
                        .iter()
                        .filter_map(|&(l, s)| space.position(l).map(|pos| (pos, s + 1)))
                        .collect();
                    (rule, reqs)
                })
                .collect();

            let mut entries = Vec::with_capacity(capacity);
            for configuration in 0..space.size {
                let digits = space.decode(configuration);
                for source in 0..states {
                    let mut weights = vec![background_weight; states];
                    for (rule, reqs) in &layer_rules {
                        if rule.source == source && reqs.iter().all(|&(pos, d)| digits[pos] == d) {
                            weights[rule.target] += rule.weight;
                        }
                    }
                    entries.push(TransitionDistribution::from_weights(source, weights));
                }
            }

            tracing::debug!(
                layer,
                conditioning_layers = space.layers.len(),
                configurations = space.size,
                "layer compiled"
            );

            Ok(CompiledLayer {
                space,
                states,
                entries,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledTable {
        background_weight,
        layers,
    })
}
