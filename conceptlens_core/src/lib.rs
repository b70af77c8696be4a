//! ConceptLens Core
//!
//! Deterministic concept-readiness inference over an instructor-supplied
//! prerequisite graph:
//! - Graph engine: build, validate, patch and order concept graphs
//! - Readiness engine: four-stage readiness with confidence and traces
//! - Class aggregates, student clustering and intervention ranking
//!
//! # Example
//!
//! ```ignore
//! use conceptlens_core::{run_analysis, ComputeParams, PipelineInputs};
//!
//! let inputs: PipelineInputs = serde_json::from_str(&payload)?;
//! let run = run_analysis(&inputs, &ComputeParams::default())?;
//! for candidate in &run.interventions {
//!     println!("{}: {:.2}", candidate.concept_id, candidate.impact);
//! }
//! ```

pub mod aggregate;
pub mod analysis;
pub mod cluster;
pub mod error;
pub mod graph;
pub mod intervention;
pub mod params;
pub mod readiness;
pub mod report;
pub mod types;

// Re-export commonly used types
pub use aggregate::{class_aggregates, ClassAggregate};
pub use analysis::{run_analysis, AnalysisRun};
pub use cluster::{run_clustering, run_clustering_with, Cluster, ClusteringResult, KMeansConfig};
pub use error::{
    ConfigError, CycleError, GraphStructureError, InputDataError, NumericIntegrityError,
    ReadinessError, Result,
};
pub use graph::{
    apply_graph_patch, build_graph, validate_edge_suggestions, validate_graph,
    validate_tag_suggestions, ConceptGraph, ConceptNode, EdgeKey, EdgeSuggestion, GraphPatch,
    GraphPayload, GraphValidation, PatchOutcome, PrerequisiteEdge, SuggestionReview, TagSuggestion,
};
pub use intervention::{rank_interventions, InterventionCandidate, InterventionFormat};
pub use params::ComputeParams;
pub use readiness::{
    run_readiness_pipeline, ExplanationTrace, PipelineInputs, PipelineResult, QuestionConceptMap,
    ReadinessCell, ReadinessWeights, ScoreMatrix, TaggedQuestion,
};
pub use report::{build_student_report, StudentReport, StudyPlanItem, StudyReason};
pub use types::{ConceptId, ConfidenceLevel, QuestionId, StudentId, ValidationIssue};

/// Version of the readiness core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the readiness core
pub fn init() {
    tracing::info!("ConceptLens Core v{}", VERSION);
}
