//! Error types for netdiffuse.
//!
//! All errors are strongly typed using thiserror. Configuration mistakes are
//! reported as [`ValidationError`] at declaration time, sequencing mistakes
//! (compiling twice, running before initialization, ...) as
//! [`ExecutionError`]. Nothing is retried or repaired internally.

use thiserror::Error;

/// Validation errors raised while declaring layers, rules, graphs or scenarios.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Layer '{layer}' is already registered")]
    DuplicateLayer {
        layer: String,
    },

    #[error("Invalid compartment set: {reason}")]
    InvalidCompartmentSet {
        reason: String,
    },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName {
        name: String,
        reason: String,
    },

    #[error("Node '{node}' appears more than once in the graph of layer '{layer}'")]
    DuplicateNode {
        layer: String,
        node: String,
    },

    #[error("Layer '{layer}' expects {expected} {what}, got {actual}")]
    DistributionSize {
        layer: String,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown layer '{layer}'")]
    UnknownLayer {
        layer: String,
    },

    #[error("Node '{node}' does not exist in layer '{layer}'")]
    UnknownNode {
        layer: String,
        node: String,
    },

    #[error("State '{state}' is not a compartment of layer '{layer}'")]
    InvalidState {
        layer: String,
        state: String,
    },

    #[error("Compartment '{compartment}' is not registered for layer '{layer}'")]
    UnknownCompartment {
        layer: String,
        compartment: String,
    },

    #[error("Rule for layer '{layer}' is conditioned on unregistered layer '{condition_layer}'")]
    UnknownConditionLayer {
        layer: String,
        condition_layer: String,
    },

    #[error("Rule for layer '{layer}' cannot be conditioned on its own layer")]
    SelfConditionedRule {
        layer: String,
    },

    #[error("Rule for layer '{layer}' has identical source and target '{state}'")]
    SelfTransition {
        layer: String,
        state: String,
    },

    #[error("Condition requires layer '{layer}' to be both '{first}' and '{second}'")]
    ConflictingCondition {
        layer: String,
        first: String,
        second: String,
    },

    #[error("Weight {value} is out of range [0.0, 1.0]")]
    InvalidWeight {
        value: f64,
    },

    #[error("'{value}' is not a qualified state of the form 'layer.state'")]
    InvalidQualifiedState {
        value: String,
    },

    #[error("Joint states for layer '{layer}' are inconsistent: {reason}")]
    InconsistentJointStates {
        layer: String,
        reason: String,
    },

    #[error("Layer '{layer}' is conditioned on {conditioning_layers} layers; its transition table does not fit in memory")]
    ConditioningSpaceTooLarge {
        layer: String,
        conditioning_layers: usize,
    },

    #[error("Cannot place random rules: {reason}")]
    InvalidRandomRules {
        reason: String,
    },

    #[error("Graph and model disagree: {reason}")]
    LayerMismatch {
        reason: String,
    },

    #[error("Epoch count must be positive")]
    InvalidEpochCount,

    #[error("Invalid graph generator parameters: {reason}")]
    InvalidGenerator {
        reason: String,
    },

    #[error("Invalid scenario: {reason}")]
    InvalidScenario {
        reason: String,
    },
}

/// Lifecycle phase of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    /// At least one layer has no initial distribution yet.
    Uninitialized,
    /// Every layer has an initial distribution; `run` may be called.
    Initialized,
    /// Epochs are being processed.
    Running,
    /// All requested epochs have been processed.
    Completed,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Errors caused by calling operations in the wrong order.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("Transition model is already compiled")]
    AlreadyCompiled,

    #[error("Transition model has not been compiled")]
    NotCompiled,

    #[error("Operation requires phase '{expected}', engine is '{actual}'")]
    InvalidPhase {
        expected: RunPhase,
        actual: RunPhase,
    },

    #[error("Layer '{layer}' has no initial distribution yet")]
    LayerNotInitialized {
        layer: String,
    },

    #[error("Configuration {configuration} is outside the conditioning space of layer '{layer}'")]
    UnknownConfiguration {
        layer: String,
        configuration: String,
    },

    #[error("Epoch {epoch} is already recorded for layer '{layer}'")]
    DuplicateEpoch {
        epoch: usize,
        layer: String,
    },

    #[error("Epoch {epoch} recorded for layer '{layer}' out of order (next is {next})")]
    EpochOutOfOrder {
        epoch: usize,
        next: usize,
        layer: String,
    },
}

/// Top-level error type for netdiffuse.
#[derive(Debug, Error)]
pub enum DiffusionError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scenario parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DiffusionError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution (sequencing) error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns the validation error, if this is one.
    #[must_use]
    pub const fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the execution error, if this is one.
    #[must_use]
    pub const fn as_execution(&self) -> Option<&ExecutionError> {
        match self {
            Self::Execution(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for netdiffuse operations.
pub type DiffusionResult<T> = Result<T, DiffusionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_weight() {
        let err = ValidationError::InvalidWeight { value: 1.5 };
        let msg = format!("{err}");
        assert!(msg.contains("1.5"));
        assert!(msg.contains("out of range"));
    }

    #[test]
    fn test_distribution_size_message() {
        let err = ValidationError::DistributionSize {
            layer: "ill".to_string(),
            what: "nodes",
            expected: 77,
            actual: 76,
        };
        let msg = format!("{err}");
        assert!(msg.contains("ill"));
        assert!(msg.contains("77"));
        assert!(msg.contains("76"));
    }

    #[test]
    fn test_invalid_phase_message() {
        let err = ExecutionError::InvalidPhase {
            expected: RunPhase::Initialized,
            actual: RunPhase::Completed,
        };
        let msg = format!("{err}");
        assert!(msg.contains("initialized"));
        assert!(msg.contains("completed"));
    }

    #[test]
    fn test_diffusion_error_from_validation() {
        let err: DiffusionError = ValidationError::InvalidEpochCount.into();
        assert!(err.is_validation());
        assert!(!err.is_execution());
        assert_eq!(err.as_validation(), Some(&ValidationError::InvalidEpochCount));
    }

    #[test]
    fn test_diffusion_error_from_execution() {
        let err: DiffusionError = ExecutionError::NotCompiled.into();
        assert!(err.is_execution());
        assert_eq!(err.as_execution(), Some(&ExecutionError::NotCompiled));
    }

    #[test]
    fn test_diffusion_error_from_json() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: DiffusionError = parse.into();
        assert!(!err.is_validation());
        assert!(format!("{err}").contains("parse"));
    }
}
