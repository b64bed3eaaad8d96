//! Transition model: per-layer compartments and conditional transition rules.
//!
//! Rules are declared sparsely ("S → I with weight 0.4 when vaccination is UV
//! and awareness is UA") and compiled once into a dense [`CompiledTable`].
//! After compilation the model is immutable.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::compartment::{validate_name, CompartmentSet, QualifiedState, StateIndex};
use crate::error::{DiffusionResult, ExecutionError, ValidationError};
use crate::random::RandomSource;
use crate::table::{self, CompiledLayer, CompiledTable, ConditioningSpace, ResolvedRule, TransitionDistribution};

/// Required states of other layers for the same actor, keyed by layer name.
///
/// An empty condition is unconditional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Condition {
    requirements: BTreeMap<String, String>,
}

/// A joint assignment of states to conditioning layers.
///
/// Conditioning layers left out of a configuration are treated as absent.
pub type Configuration = Condition;

impl Condition {
    /// The empty (always satisfied) condition.
    #[must_use]
    pub fn unconditional() -> Self {
        Self::default()
    }

    /// Builds a condition from `(layer, state)` pairs.
    ///
    /// Repeating a layer with the same state is allowed; with a different
    /// state it fails with `ConflictingCondition`.
    pub fn from_pairs<I, L, S>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (L, S)>,
        L: Into<String>,
        S: Into<String>,
    {
        let mut requirements: BTreeMap<String, String> = BTreeMap::new();
        for (layer, state) in pairs {
            let layer = layer.into();
            let state = state.into();
            match requirements.get(&layer) {
                Some(existing) if *existing != state => {
                    return Err(ValidationError::ConflictingCondition {
                        layer,
                        first: existing.clone(),
                        second: state,
                    });
                }
                Some(_) => {}
                None => {
                    requirements.insert(layer, state);
                }
            }
        }
        Ok(Self { requirements })
    }

    /// Builds a condition from `layer.state` labels.
    pub fn from_qualified<I, S>(labels: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pairs = labels
            .into_iter()
            .map(|label| QualifiedState::parse(label.as_ref()).map(|q| (q.layer, q.state)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_pairs(pairs)
    }

    /// Returns true if the condition has no requirements.
    #[must_use]
    pub fn is_unconditional(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Required state of `layer`, if any.
    #[must_use]
    pub fn get(&self, layer: &str) -> Option<&str> {
        self.requirements.get(layer).map(String::as_str)
    }

    /// Number of required layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    /// Returns true if the condition has no requirements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// `(layer, state)` requirements ordered by layer name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.requirements.iter().map(|(l, s)| (l.as_str(), s.as_str()))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(l, s)| format!("{l}.{s}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// A declared transition rule, as written by the modeller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionRule {
    /// Layer whose state changes.
    pub layer: String,
    /// Source compartment.
    pub source: String,
    /// Target compartment.
    pub target: String,
    /// Required states of other layers.
    pub condition: Condition,
    /// Pseudo-probability contribution in `[0, 1]`.
    pub weight: f64,
}

#[derive(Debug, Clone)]
struct ProcessLayer {
    name: String,
    compartments: CompartmentSet,
}

fn validate_weight(weight: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&weight) {
        Ok(())
    } else {
        Err(ValidationError::InvalidWeight { value: weight })
    }
}

/// Per-layer compartments plus conditional transition rules.
#[derive(Debug, Clone, Default)]
pub struct TransitionModel {
    layers: Vec<ProcessLayer>,
    layer_index: HashMap<String, usize>,
    rules: Vec<ResolvedRule>,
    compiled: Option<CompiledTable>,
}

impl TransitionModel {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), ExecutionError> {
        if self.compiled.is_some() {
            return Err(ExecutionError::AlreadyCompiled);
        }
        Ok(())
    }

    /// Registers a process layer and its compartments.
    pub fn add_layer<I, S>(&mut self, name: impl Into<String>, compartments: I) -> DiffusionResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_open()?;
        let name = name.into();
        validate_name(&name)?;
        if self.layer_index.contains_key(&name) {
            return Err(ValidationError::DuplicateLayer { layer: name }.into());
        }
        let compartments = CompartmentSet::new(compartments)?;
        self.layer_index.insert(name.clone(), self.layers.len());
        self.layers.push(ProcessLayer { name, compartments });
        Ok(())
    }

    fn position(&self, layer: &str) -> Result<usize, ValidationError> {
        self.layer_index
            .get(layer)
            .copied()
            .ok_or_else(|| ValidationError::UnknownLayer {
                layer: layer.to_string(),
            })
    }

    fn state_index(&self, layer: usize, state: &str) -> Result<StateIndex, ValidationError> {
        let process = &self.layers[layer];
        process
            .compartments
            .index_of(state)
            .ok_or_else(|| ValidationError::UnknownCompartment {
                layer: process.name.clone(),
                compartment: state.to_string(),
            })
    }

    fn resolve(
        &self,
        layer: &str,
        source: &str,
        target: &str,
        condition: &Condition,
        weight: f64,
    ) -> Result<ResolvedRule, ValidationError> {
        let position = self.position(layer)?;
        let source_index = self.state_index(position, source)?;
        let target_index = self.state_index(position, target)?;
        if source_index == target_index {
            return Err(ValidationError::SelfTransition {
                layer: layer.to_string(),
                state: source.to_string(),
            });
        }
        validate_weight(weight)?;

        let mut requirements = Vec::with_capacity(condition.len());
        for (cond_layer, cond_state) in condition.iter() {
            if cond_layer == layer {
                return Err(ValidationError::SelfConditionedRule {
                    layer: layer.to_string(),
                });
            }
            let cond_position =
                self.layer_index
                    .get(cond_layer)
                    .copied()
                    .ok_or_else(|| ValidationError::UnknownConditionLayer {
                        layer: layer.to_string(),
                        condition_layer: cond_layer.to_string(),
                    })?;
            requirements.push((cond_position, self.state_index(cond_position, cond_state)?));
        }
        requirements.sort_unstable();

        Ok(ResolvedRule {
            layer: position,
            source: source_index,
            target: target_index,
            requirements,
            weight,
        })
    }

    /// Declares `layer: source → target` with `weight`, applied when `condition` holds.
    pub fn declare_rule(
        &mut self,
        layer: &str,
        source: &str,
        target: &str,
        condition: &Condition,
        weight: f64,
    ) -> DiffusionResult<()> {
        self.ensure_open()?;
        let rule = self.resolve(layer, source, target, condition, weight)?;
        self.rules.push(rule);
        Ok(())
    }

    /// Declares one rule per alternative condition, sharing source, target and weight.
    ///
    /// Either every alternative is valid and declared, or none is.
    pub fn declare_canonical_rule(
        &mut self,
        layer: &str,
        source: &str,
        target: &str,
        alternatives: &[Condition],
        weight: f64,
    ) -> DiffusionResult<()> {
        self.ensure_open()?;
        let resolved = alternatives
            .iter()
            .map(|condition| self.resolve(layer, source, target, condition, weight))
            .collect::<Result<Vec<_>, _>>()?;
        self.rules.extend(resolved);
        Ok(())
    }

    /// Declares a rule from `layer.state` labels.
    ///
    /// `source` and `target` must name the same layer, e.g.
    /// `declare_rule_qualified("ill.s", "ill.i", &["vacc.u", "awar.n"], 0.4)`.
    pub fn declare_rule_qualified<S: AsRef<str>>(
        &mut self,
        source: &str,
        target: &str,
        condition: &[S],
        weight: f64,
    ) -> DiffusionResult<()> {
        let source = QualifiedState::parse(source)?;
        let target = QualifiedState::parse(target)?;
        if source.layer != target.layer {
            return Err(ValidationError::InconsistentJointStates {
                layer: source.layer,
                reason: format!("target '{target}' belongs to another layer"),
            }
            .into());
        }
        let condition = Condition::from_qualified(condition)?;
        self.declare_rule(&source.layer, &source.state, &target.state, &condition, weight)
    }

    /// Declares a rule between two full joint states that differ only in `layer`.
    ///
    /// `from` and `to` list `layer.state` labels; the entries for other layers
    /// must agree and become the rule's condition.
    pub fn declare_joint_rule<S: AsRef<str>>(
        &mut self,
        layer: &str,
        from: &[S],
        to: &[S],
        weight: f64,
    ) -> DiffusionResult<()> {
        let inconsistent = |reason: String| ValidationError::InconsistentJointStates {
            layer: layer.to_string(),
            reason,
        };
        let from = Condition::from_qualified(from)?;
        let to = Condition::from_qualified(to)?;

        let source = from
            .get(layer)
            .ok_or_else(|| inconsistent("initial state does not mention the layer".to_string()))?
            .to_string();
        let target = to
            .get(layer)
            .ok_or_else(|| inconsistent("final state does not mention the layer".to_string()))?
            .to_string();

        let context: Vec<(&str, &str)> = from.iter().filter(|&(l, _)| l != layer).collect();
        let final_context: Vec<(&str, &str)> = to.iter().filter(|&(l, _)| l != layer).collect();
        if context != final_context {
            return Err(inconsistent(format!("context changes from {from} to {to}")).into());
        }

        let condition = Condition::from_pairs(context)?;
        self.declare_rule(layer, &source, &target, &condition, weight)
    }

    /// Places each weight on a distinct, randomly chosen transition edge.
    ///
    /// `weights` holds one list per layer in registration order. An edge of
    /// layer `l` is a `(source, target, configuration)` triple where the
    /// configuration fixes a compartment of every other layer. Edges are
    /// drawn without replacement from `rng`, so a list may not be longer
    /// than the layer's edge count. Either every weight is declared, or none is.
    pub fn declare_random_rules(&mut self, weights: &[Vec<f64>], rng: &mut RandomSource) -> DiffusionResult<()> {
        self.ensure_open()?;
        if weights.len() != self.layers.len() {
            return Err(ValidationError::InvalidRandomRules {
                reason: format!("expected {} weight list(s), got {}", self.layers.len(), weights.len()),
            }
            .into());
        }

        let mut resolved = Vec::new();
        for (position, layer_weights) in weights.iter().enumerate() {
            if layer_weights.is_empty() {
                continue;
            }
            let process = &self.layers[position];
            let states = process.compartments.len();
            let pairs = states * (states - 1);
            let others: Vec<usize> = (0..self.layers.len()).filter(|&l| l != position).collect();
            let edges = others
                .iter()
                .try_fold(pairs, |acc, &l| acc.checked_mul(self.layers[l].compartments.len()))
                .ok_or_else(|| ValidationError::InvalidRandomRules {
                    reason: format!("layer '{}' has too many transition edges to enumerate", process.name),
                })?;
            if layer_weights.len() > edges {
                return Err(ValidationError::InvalidRandomRules {
                    reason: format!(
                        "layer '{}' has {edges} transition edge(s), got {} weight(s)",
                        process.name,
                        layer_weights.len()
                    ),
                }
                .into());
            }

            let picks = index::sample(rng, edges, layer_weights.len());
            for (edge, &weight) in picks.iter().zip(layer_weights) {
                let pair = edge % pairs;
                let source = pair / (states - 1);
                let offset = pair % (states - 1);
                let target = if offset < source { offset } else { offset + 1 };

                let mut rest = edge / pairs;
                let mut pairs_by_layer = Vec::with_capacity(others.len());
                for &l in &others {
                    let other = &self.layers[l];
                    let count = other.compartments.len();
                    pairs_by_layer.push((other.name.as_str(), other.compartments.labels()[rest % count].as_str()));
                    rest /= count;
                }
                let condition = Condition::from_pairs(pairs_by_layer)?;
                let labels = process.compartments.labels();
                resolved.push(self.resolve(&process.name, &labels[source], &labels[target], &condition, weight)?);
            }
        }

        tracing::debug!(rules = resolved.len(), "random rules declared");
        self.rules.extend(resolved);
        Ok(())
    }

    /// Compiles the rules into a dense table.
    ///
    /// Every target other than the source starts at `background_weight`.
    /// Must be called exactly once.
    pub fn compile(&mut self, background_weight: f64) -> DiffusionResult<()> {
        self.ensure_open()?;
        validate_weight(background_weight)?;

        let counts: Vec<usize> = self.layers.iter().map(|l| l.compartments.len()).collect();
        let compiled = table::compile(&counts, &self.rules, background_weight).map_err(|overflow| {
            ValidationError::ConditioningSpaceTooLarge {
                layer: self.layers[overflow.layer].name.clone(),
                conditioning_layers: overflow.conditioning_layers,
            }
        })?;
        tracing::debug!(
            layers = self.layers.len(),
            rules = self.rules.len(),
            distributions = compiled.len(),
            background_weight,
            "transition model compiled"
        );
        self.compiled = Some(compiled);
        Ok(())
    }

    /// Returns true once `compile` has succeeded.
    #[must_use]
    pub const fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Background weight used at compilation.
    #[must_use]
    pub fn background_weight(&self) -> Option<f64> {
        self.compiled.as_ref().map(CompiledTable::background_weight)
    }

    /// The compiled table.
    pub fn compiled(&self) -> DiffusionResult<&CompiledTable> {
        Ok(self.compiled.as_ref().ok_or(ExecutionError::NotCompiled)?)
    }

    fn compiled_layer(&self, layer: &str) -> DiffusionResult<(usize, &CompiledLayer)> {
        let table = self.compiled()?;
        let position = self.position(layer)?;
        let compiled = table.layer(position).ok_or(ExecutionError::NotCompiled)?;
        Ok((position, compiled))
    }

    /// Compiled distribution of `layer` leaving `source` under `configuration`.
    pub fn transition_distribution(
        &self,
        layer: &str,
        source: &str,
        configuration: &Configuration,
    ) -> DiffusionResult<&TransitionDistribution> {
        let (position, compiled) = self.compiled_layer(layer)?;
        let source_index = self.state_index(position, source)?;
        let space = compiled.space();

        let unknown = || ExecutionError::UnknownConfiguration {
            layer: layer.to_string(),
            configuration: configuration.to_string(),
        };
        let mut digits = vec![ConditioningSpace::ABSENT; space.layers().len()];
        for (cond_layer, cond_state) in configuration.iter() {
            let cond_position = self.layer_index.get(cond_layer).copied().ok_or_else(unknown)?;
            let digit_position = space.position(cond_position).ok_or_else(unknown)?;
            let state = self.layers[cond_position]
                .compartments
                .index_of(cond_state)
                .ok_or_else(unknown)?;
            digits[digit_position] = ConditioningSpace::digit(Some(state));
        }

        let index = space.encode(&digits).ok_or_else(unknown)?;
        Ok(compiled.entry(index, source_index).ok_or_else(unknown)?)
    }

    /// Non-zero probabilities of the compiled distribution, keyed by compartment label.
    pub fn transition_probabilities(
        &self,
        layer: &str,
        source: &str,
        configuration: &Configuration,
    ) -> DiffusionResult<BTreeMap<String, f64>> {
        let distribution = self.transition_distribution(layer, source, configuration)?;
        let compartments = &self.layers[self.position(layer)?].compartments;
        Ok(compartments
            .iter()
            .zip(distribution.probabilities())
            .filter(|&(_, &p)| p > 0.0)
            .map(|(label, &p)| (label.to_string(), p))
            .collect())
    }

    /// Layers conditioning `layer`, in registration order.
    pub fn conditioning_layers(&self, layer: &str) -> DiffusionResult<Vec<&str>> {
        let position = self.position(layer)?;
        let all = table::conditioning_layers(self.layers.len(), &self.rules);
        Ok(all[position].iter().map(|&l| self.layers[l].name.as_str()).collect())
    }

    /// Layer names in registration order.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.layers.iter().map(|l| l.name.as_str())
    }

    /// Compartments of `layer`.
    #[must_use]
    pub fn compartments(&self, layer: &str) -> Option<&CompartmentSet> {
        self.layer_index.get(layer).map(|&i| &self.layers[i].compartments)
    }

    /// Declared rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> Vec<TransitionRule> {
        self.rules.iter().map(|rule| self.describe_rule(rule)).collect()
    }

    fn describe_rule(&self, rule: &ResolvedRule) -> TransitionRule {
        let process = &self.layers[rule.layer];
        let condition = rule
            .requirements
            .iter()
            .map(|&(l, s)| {
                let cond = &self.layers[l];
                (cond.name.clone(), cond.compartments.labels()[s].clone())
            })
            .collect();
        TransitionRule {
            layer: process.name.clone(),
            source: process.compartments.labels()[rule.source].clone(),
            target: process.compartments.labels()[rule.target].clone(),
            condition: Condition { requirements: condition },
            weight: rule.weight,
        }
    }

    pub(crate) fn layer_position(&self, layer: &str) -> Option<usize> {
        self.layer_index.get(layer).copied()
    }
}

impl fmt::Display for TransitionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model: {} layer(s), {} rule(s)", self.layers.len(), self.rules.len())?;
        match &self.compiled {
            Some(table) => writeln!(
                f,
                ", compiled with background weight {} ({} distributions)",
                table.background_weight(),
                table.len()
            )?,
            None => writeln!(f, ", not compiled")?,
        }
        for process in &self.layers {
            writeln!(f, "  {} {}", process.name, process.compartments)?;
            for rule in self.rules().iter().filter(|r| r.layer == process.name) {
                if rule.condition.is_unconditional() {
                    writeln!(f, "    {} -> {}  weight {}", rule.source, rule.target, rule.weight)?;
                } else {
                    writeln!(
                        f,
                        "    {} -> {}  when {}  weight {}",
                        rule.source, rule.target, rule.condition, rule.weight
                    )?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn si_model() -> TransitionModel {
        let mut model = TransitionModel::new();
        model.add_layer("layer", ["S", "I"]).unwrap();
        model
    }

    fn two_process_model() -> TransitionModel {
        let mut model = TransitionModel::new();
        model.add_layer("marriage", ["S", "I"]).unwrap();
        model.add_layer("business", ["UV", "V"]).unwrap();
        model
    }

    #[test]
    fn single_unconditional_rule_matches_expected_distribution() {
        let mut model = si_model();
        model
            .declare_rule("layer", "S", "I", &Condition::unconditional(), 0.5)
            .unwrap();
        model.compile(0.0).unwrap();

        let s = model
            .transition_probabilities("layer", "S", &Configuration::unconditional())
            .unwrap();
        assert_eq!(s, BTreeMap::from([("S".to_string(), 0.5), ("I".to_string(), 0.5)]));

        let i = model
            .transition_probabilities("layer", "I", &Configuration::unconditional())
            .unwrap();
        assert_eq!(i, BTreeMap::from([("I".to_string(), 1.0)]));
    }

    #[test]
    fn unknown_compartment_fails_at_declaration() {
        let mut model = si_model();
        let err = model
            .declare_rule("layer", "S", "R", &Condition::unconditional(), 0.5)
            .unwrap_err();
        assert!(matches!(
            err.as_validation(),
            Some(ValidationError::UnknownCompartment { compartment, .. }) if compartment == "R"
        ));
        assert!(!model.is_compiled());
    }

    #[test]
    fn unknown_condition_layer_fails() {
        let mut model = si_model();
        let condition = Condition::from_qualified(["vacc.u"]).unwrap();
        let err = model.declare_rule("layer", "S", "I", &condition, 0.2).unwrap_err();
        assert!(matches!(
            err.as_validation(),
            Some(ValidationError::UnknownConditionLayer { condition_layer, .. }) if condition_layer == "vacc"
        ));
    }

    #[test]
    fn invalid_rules_are_rejected() {
        let mut model = two_process_model();
        let own = Condition::from_qualified(["marriage.S"]).unwrap();
        assert!(matches!(
            model.declare_rule("marriage", "S", "I", &own, 0.1).unwrap_err().as_validation(),
            Some(ValidationError::SelfConditionedRule { .. })
        ));
        assert!(matches!(
            model
                .declare_rule("marriage", "S", "S", &Condition::unconditional(), 0.1)
                .unwrap_err()
                .as_validation(),
            Some(ValidationError::SelfTransition { .. })
        ));
        for weight in [-0.1, 1.5, f64::NAN] {
            assert!(matches!(
                model
                    .declare_rule("marriage", "S", "I", &Condition::unconditional(), weight)
                    .unwrap_err()
                    .as_validation(),
                Some(ValidationError::InvalidWeight { .. })
            ));
        }
        let bad_state = Condition::from_qualified(["business.X"]).unwrap();
        assert!(matches!(
            model.declare_rule("marriage", "S", "I", &bad_state, 0.1).unwrap_err().as_validation(),
            Some(ValidationError::UnknownCompartment { layer, .. }) if layer == "business"
        ));
        assert!(model.rules().is_empty());
    }

    #[test]
    fn condition_rejects_conflicting_requirements() {
        assert!(matches!(
            Condition::from_qualified(["vacc.u", "vacc.v"]),
            Err(ValidationError::ConflictingCondition { .. })
        ));
        let same = Condition::from_qualified(["vacc.u", "vacc.u"]).unwrap();
        assert_eq!(same.len(), 1);
    }

    #[test]
    fn compile_twice_fails_and_freezes_model() {
        let mut model = si_model();
        model.compile(0.1).unwrap();
        assert!(matches!(
            model.compile(0.1).unwrap_err().as_execution(),
            Some(ExecutionError::AlreadyCompiled)
        ));
        assert!(matches!(
            model
                .declare_rule("layer", "S", "I", &Condition::unconditional(), 0.5)
                .unwrap_err()
                .as_execution(),
            Some(ExecutionError::AlreadyCompiled)
        ));
        assert!(model.add_layer("other", ["A", "B"]).unwrap_err().is_execution());
    }

    #[test]
    fn lookup_before_compile_fails() {
        let model = si_model();
        let err = model
            .transition_distribution("layer", "S", &Configuration::unconditional())
            .unwrap_err();
        assert!(matches!(err.as_execution(), Some(ExecutionError::NotCompiled)));
    }

    #[test]
    fn compile_rejects_invalid_background_weight() {
        let mut model = si_model();
        assert!(model.compile(1.2).unwrap_err().is_validation());
        assert!(!model.is_compiled());
        model.compile(0.2).unwrap();
    }

    #[test]
    fn cross_layer_conditions_select_distribution() {
        let mut model = two_process_model();
        model
            .declare_rule_qualified("marriage.S", "marriage.I", &["business.UV"], 0.9)
            .unwrap();
        model
            .declare_rule_qualified("marriage.S", "marriage.I", &["business.V"], 0.3)
            .unwrap();
        model
            .declare_rule_qualified("business.UV", "business.V", &["marriage.S"], 0.05)
            .unwrap();
        model.compile(0.01).unwrap();

        let uv = Configuration::from_qualified(["business.UV"]).unwrap();
        let dist = model.transition_distribution("marriage", "S", &uv).unwrap();
        assert!((dist.probability(1) - 0.91).abs() < 1e-12);

        let v = Configuration::from_qualified(["business.V"]).unwrap();
        let dist = model.transition_distribution("marriage", "S", &v).unwrap();
        assert!((dist.probability(1) - 0.31).abs() < 1e-12);

        // business absent: background only
        let dist = model
            .transition_distribution("marriage", "S", &Configuration::unconditional())
            .unwrap();
        assert!((dist.probability(1) - 0.01).abs() < 1e-12);

        assert_eq!(model.conditioning_layers("marriage").unwrap(), vec!["business"]);
    }

    #[test]
    fn configuration_outside_space_is_unknown() {
        let mut model = two_process_model();
        model.compile(0.0).unwrap();
        let config = Configuration::from_qualified(["business.V"]).unwrap();
        let err = model
            .transition_distribution("marriage", "S", &config)
            .unwrap_err();
        assert!(matches!(
            err.as_execution(),
            Some(ExecutionError::UnknownConfiguration { .. })
        ));
    }

    #[test]
    fn canonical_rule_declares_each_alternative_atomically() {
        let mut model = TransitionModel::new();
        model.add_layer("illness", ["S", "I", "R"]).unwrap();
        model.add_layer("awareness", ["UA", "A"]).unwrap();
        model.add_layer("vaccination", ["UV", "V"]).unwrap();

        let alternatives = vec![
            Condition::from_qualified(["awareness.A", "vaccination.UV"]).unwrap(),
            Condition::from_qualified(["awareness.UA", "vaccination.V"]).unwrap(),
        ];
        model
            .declare_canonical_rule("illness", "I", "R", &alternatives, 0.3)
            .unwrap();
        assert_eq!(model.rules().len(), 2);

        let with_bad = vec![
            Condition::from_qualified(["awareness.A"]).unwrap(),
            Condition::from_qualified(["awareness.X"]).unwrap(),
        ];
        assert!(model
            .declare_canonical_rule("illness", "S", "I", &with_bad, 0.3)
            .is_err());
        assert_eq!(model.rules().len(), 2);
    }

    #[test]
    fn joint_rule_derives_condition_from_context() {
        let mut model = TransitionModel::new();
        model.add_layer("illness", ["S", "I", "R"]).unwrap();
        model.add_layer("awareness", ["UA", "A"]).unwrap();
        model.add_layer("vaccination", ["UV", "V"]).unwrap();

        model
            .declare_joint_rule(
                "illness",
                &["awareness.A", "illness.I", "vaccination.UV"],
                &["awareness.A", "illness.R", "vaccination.UV"],
                0.3,
            )
            .unwrap();
        let rules = model.rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].source, "I");
        assert_eq!(rules[0].target, "R");
        assert_eq!(rules[0].condition.get("awareness"), Some("A"));
        assert_eq!(rules[0].condition.get("vaccination"), Some("UV"));

        let err = model
            .declare_joint_rule(
                "illness",
                &["awareness.A", "illness.I"],
                &["awareness.UA", "illness.R"],
                0.3,
            )
            .unwrap_err();
        assert!(matches!(
            err.as_validation(),
            Some(ValidationError::InconsistentJointStates { .. })
        ));
    }

    #[test]
    fn qualified_rule_requires_single_layer() {
        let mut model = two_process_model();
        let err = model
            .declare_rule_qualified("marriage.S", "business.V", &[] as &[&str], 0.1)
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn display_lists_layers_and_rules() {
        let mut model = two_process_model();
        model
            .declare_rule_qualified("marriage.S", "marriage.I", &["business.UV"], 0.9)
            .unwrap();
        let text = model.to_string();
        assert!(text.contains("not compiled"));
        assert!(text.contains("marriage [S, I]"));
        assert!(text.contains("S -> I  when {business.UV}  weight 0.9"));
    }

    fn five_process_model() -> TransitionModel {
        let mut model = TransitionModel::new();
        model.add_layer("facebook", ["S", "I", "R"]).unwrap();
        model.add_layer("lunch", ["UA", "A"]).unwrap();
        model.add_layer("coauthor", ["UV", "V"]).unwrap();
        model.add_layer("leisure", ["S", "I", "R"]).unwrap();
        model.add_layer("work", ["UV", "V"]).unwrap();
        model
    }

    fn five_process_weights() -> Vec<Vec<f64>> {
        vec![vec![0.4, 0.5], vec![0.3, 0.2, 0.1], vec![0.9], vec![0.8, 0.6], vec![0.7]]
    }

    #[test]
    fn random_rules_are_reproducible_and_distinct() {
        let mut a = five_process_model();
        a.declare_random_rules(&five_process_weights(), &mut RandomSource::seeded(4)).unwrap();
        let mut b = five_process_model();
        b.declare_random_rules(&five_process_weights(), &mut RandomSource::seeded(4)).unwrap();
        assert_eq!(a.rules(), b.rules());

        let rules = a.rules();
        assert_eq!(rules.len(), 9);
        let lunch: Vec<f64> = rules.iter().filter(|r| r.layer == "lunch").map(|r| r.weight).collect();
        assert_eq!(lunch, vec![0.3, 0.2, 0.1]);
        for rule in &rules {
            // every other layer is fixed by the edge's configuration
            assert_eq!(rule.condition.len(), 4);
            assert!(rule.condition.get(&rule.layer).is_none());
            assert_ne!(rule.source, rule.target);
        }
        for (i, x) in rules.iter().enumerate() {
            for y in &rules[i + 1..] {
                assert!(!(x.layer == y.layer && x.source == y.source && x.target == y.target && x.condition == y.condition));
            }
        }
        a.compile(0.2).unwrap();
    }

    #[test]
    fn random_rules_cover_every_edge_of_a_small_layer() {
        let mut model = two_process_model();
        // marriage has 2 ordered pairs x 2 business states = 4 edges
        model
            .declare_random_rules(&[vec![0.1, 0.2, 0.3, 0.4], vec![]], &mut RandomSource::seeded(9))
            .unwrap();
        let mut edges: Vec<(String, String)> = model
            .rules()
            .into_iter()
            .map(|r| (format!("{}->{}", r.source, r.target), r.condition.to_string()))
            .collect();
        edges.sort();
        assert_eq!(
            edges,
            vec![
                ("I->S".to_string(), "{business.UV}".to_string()),
                ("I->S".to_string(), "{business.V}".to_string()),
                ("S->I".to_string(), "{business.UV}".to_string()),
                ("S->I".to_string(), "{business.V}".to_string()),
            ]
        );
    }

    #[test]
    fn random_rules_reject_bad_weight_lists() {
        let mut model = two_process_model();
        let mut rng = RandomSource::seeded(0);
        for weights in [
            vec![vec![0.1]],
            vec![vec![0.1; 5], vec![]],
            vec![vec![0.1], vec![1.5]],
        ] {
            let err = model.declare_random_rules(&weights, &mut rng).unwrap_err();
            assert!(err.is_validation());
        }
        assert!(model.rules().is_empty());
    }

    #[test]
    fn oversized_conditioning_space_fails_compile() {
        let mut model = TransitionModel::new();
        let names: Vec<String> = (0..70).map(|i| format!("l{i}")).collect();
        for name in &names {
            model.add_layer(name.as_str(), ["a", "b"]).unwrap();
        }
        let condition = Condition::from_pairs(names[1..].iter().map(|n| (n.as_str(), "a"))).unwrap();
        model.declare_rule("l0", "a", "b", &condition, 0.5).unwrap();

        let err = model.compile(0.0).unwrap_err();
        assert!(matches!(
            err.as_validation(),
            Some(ValidationError::ConditioningSpaceTooLarge { layer, conditioning_layers: 69 }) if layer == "l0"
        ));
        assert!(!model.is_compiled());
    }
}
