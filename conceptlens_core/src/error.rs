//! Error types for readiness inference

use thiserror::Error;

/// Main error type for the readiness core
#[derive(Error, Debug)]
pub enum ReadinessError {
    /// Malformed concept graph (ids, endpoints, weights)
    #[error("Graph structure error: {0}")]
    GraphStructure(#[from] GraphStructureError),

    /// Operation requires a DAG but the graph has a cycle
    #[error("Cycle error: {0}")]
    Cycle(#[from] CycleError),

    /// Missing or unusable pipeline inputs
    #[error("Input data error: {0}")]
    InputData(#[from] InputDataError),

    /// Internal invariant violated by the numeric stages
    #[error("Numeric integrity error: {0}")]
    NumericIntegrity(#[from] NumericIntegrityError),

    /// Parameter file could not be loaded
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Structural problems in a concept graph payload
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphStructureError {
    #[error("Duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("Edge {parent} -> {child} references unknown node '{missing}'")]
    DanglingEdge {
        parent: String,
        child: String,
        missing: String,
    },

    #[error("Edge {parent} -> {child} has weight {weight} outside [0, 1]")]
    WeightOutOfRange {
        parent: String,
        child: String,
        weight: f64,
    },

    #[error("Self-loop on node '{0}'")]
    SelfLoop(String),

    #[error("Duplicate edge {parent} -> {child}")]
    DuplicateEdge { parent: String, child: String },
}

/// A cycle found in a graph that must be acyclic
///
/// `path` is closed: the first node id is repeated at the end.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cycle detected: {}", .path.join(" -> "))]
pub struct CycleError {
    pub path: Vec<String>,
}

impl CycleError {
    pub fn new(path: Vec<String>) -> Self {
        Self { path }
    }
}

/// Problems with the scores, mapping or parameters handed to the pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputDataError {
    #[error("No scores supplied")]
    NoScores,

    #[error("No question-concept mapping supplied")]
    NoQuestionMapping,

    #[error("Invalid parameter {field}: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Unknown student '{0}'")]
    UnknownStudent(String),
}

/// A final readiness value escaped the stage-4 sanitizer
#[derive(Error, Debug, Clone, PartialEq)]
#[error("final readiness for ({student}, {concept}) is {value}, expected a finite value in [0, 1]")]
pub struct NumericIntegrityError {
    pub student: String,
    pub concept: String,
    pub value: f64,
}

/// Parameter file loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for readiness operations
pub type Result<T> = std::result::Result<T, ReadinessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_display() {
        let err = CycleError::new(vec!["A".into(), "B".into(), "A".into()]);
        assert_eq!(err.to_string(), "cycle detected: A -> B -> A");
    }

    #[test]
    fn test_structure_error_wraps() {
        let err: ReadinessError = GraphStructureError::SelfLoop("A".into()).into();
        assert!(matches!(err, ReadinessError::GraphStructure(_)));
        assert!(err.to_string().contains("Self-loop"));
    }

    #[test]
    fn test_input_error_display() {
        let err = InputDataError::InvalidParameter {
            field: "k".into(),
            reason: "must be in [2, 20]".into(),
        };
        assert_eq!(err.to_string(), "Invalid parameter k: must be in [2, 20]");
    }
}
