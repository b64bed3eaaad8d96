//! Compartment sets and qualified state labels.
//!
//! A compartment set is the ordered, finite state space of one layer
//! (e.g. `S, I, R`). Internally states are addressed by their position in
//! the set; labels only appear at the API boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Position of a compartment inside its layer's [`CompartmentSet`].
pub type StateIndex = usize;

/// Separator between layer and state in a qualified label (`ill.s`).
pub const QUALIFIER: char = '.';

/// Checks that a layer or compartment name is usable in qualified labels.
pub(crate) fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason: "name cannot be empty".to_string(),
        });
    }
    if name.contains(QUALIFIER) {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason: format!("name cannot contain '{QUALIFIER}'"),
        });
    }
    Ok(())
}

/// Ordered sequence of distinct state labels of one layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CompartmentSet {
    labels: Vec<String>,
}

impl CompartmentSet {
    /// Builds a compartment set.
    ///
    /// Fails when fewer than two labels are given, a label repeats, or a label
    /// is empty or contains the `.` qualifier.
    pub fn new<I, S>(labels: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();

        for label in &labels {
            validate_name(label).map_err(|err| ValidationError::InvalidCompartmentSet {
                reason: err.to_string(),
            })?;
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(ValidationError::InvalidCompartmentSet {
                    reason: format!("label '{label}' appears more than once"),
                });
            }
        }
        if labels.len() < 2 {
            return Err(ValidationError::InvalidCompartmentSet {
                reason: format!("at least 2 distinct labels required, got {}", labels.len()),
            });
        }

        Ok(Self { labels })
    }

    /// Number of compartments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false; a valid set holds at least two compartments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in declaration order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Label at `index`.
    #[must_use]
    pub fn label(&self, index: StateIndex) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Position of `label`.
    #[must_use]
    pub fn index_of(&self, label: &str) -> Option<StateIndex> {
        self.labels.iter().position(|l| l == label)
    }

    /// Returns true if `label` is a member of the set.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.index_of(label).is_some()
    }

    /// Iterates over labels in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.labels.iter().map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for CompartmentSet {
    type Error = ValidationError;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(labels)
    }
}

impl From<CompartmentSet> for Vec<String> {
    fn from(set: CompartmentSet) -> Self {
        set.labels
    }
}

impl fmt::Display for CompartmentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.labels.join(", "))
    }
}

/// A `layer.state` pair, as written in experiment declarations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedState {
    /// Layer name.
    pub layer: String,
    /// Compartment label within the layer.
    pub state: String,
}

impl QualifiedState {
    /// Creates a qualified state from its parts.
    #[must_use]
    pub fn new(layer: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            state: state.into(),
        }
    }

    /// Parses `layer.state`.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidQualifiedState {
            value: value.to_string(),
        };
        let (layer, state) = value.split_once(QUALIFIER).ok_or_else(invalid)?;
        if layer.is_empty() || state.is_empty() || state.contains(QUALIFIER) {
            return Err(invalid());
        }
        Ok(Self::new(layer, state))
    }
}

impl std::str::FromStr for QualifiedState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for QualifiedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{QUALIFIER}{}", self.layer, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compartment_set_preserves_order() {
        let set = CompartmentSet::new(["S", "I", "R"]).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.index_of("I"), Some(1));
        assert_eq!(set.label(2), Some("R"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["S", "I", "R"]);
        assert_eq!(set.to_string(), "[S, I, R]");
    }

    #[test]
    fn compartment_set_requires_two_distinct_labels() {
        assert!(matches!(
            CompartmentSet::new(["S"]),
            Err(ValidationError::InvalidCompartmentSet { .. })
        ));
        assert!(matches!(
            CompartmentSet::new(["S", "S"]),
            Err(ValidationError::InvalidCompartmentSet { .. })
        ));
        assert!(CompartmentSet::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn compartment_set_rejects_qualifier_in_label() {
        assert!(CompartmentSet::new(["a.b", "c"]).is_err());
        assert!(CompartmentSet::new(["", "c"]).is_err());
    }

    #[test]
    fn compartment_set_deserializes_with_validation() {
        let set: CompartmentSet = serde_json::from_str(r#"["UV", "V"]"#).unwrap();
        assert_eq!(set.labels(), ["UV", "V"]);
        assert!(serde_json::from_str::<CompartmentSet>(r#"["UV"]"#).is_err());
    }

    #[test]
    fn qualified_state_parses_layer_and_state() {
        let q = QualifiedState::parse("vaccination.UV").unwrap();
        assert_eq!(q.layer, "vaccination");
        assert_eq!(q.state, "UV");
        assert_eq!(q.to_string(), "vaccination.UV");
    }

    #[test]
    fn qualified_state_rejects_malformed_input() {
        for bad in ["ill", ".s", "ill.", "a.b.c"] {
            assert!(
                matches!(
                    QualifiedState::parse(bad),
                    Err(ValidationError::InvalidQualifiedState { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }
}
