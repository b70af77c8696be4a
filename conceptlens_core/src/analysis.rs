//! End-to-end analysis run
//!
//! Validates parameters, runs the readiness pipeline, then clustering and
//! intervention ranking over the resulting matrices. This is the single
//! entry point an orchestrator calls per compute run.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::cluster::{run_clustering_with, ClusteringResult, KMeansConfig};
use crate::error::Result;
use crate::intervention::{rank_interventions, InterventionCandidate};
use crate::params::ComputeParams;
use crate::readiness::{run_readiness_pipeline, PipelineInputs, PipelineResult};

/// Everything one compute run produces
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub params: ComputeParams,
    pub pipeline: PipelineResult,
    pub clustering: ClusteringResult,
    pub interventions: Vec<InterventionCandidate>,
    pub students_processed: usize,
    pub concepts_processed: usize,
    pub duration_ms: u64,
}

pub fn run_analysis(inputs: &PipelineInputs, params: &ComputeParams) -> Result<AnalysisRun> {
    params.ensure_valid()?;
    let start = Instant::now();

    let pipeline = run_readiness_pipeline(inputs, &params.readiness_weights())?;

    let kmeans = KMeansConfig {
        k: params.k,
        seed: params.seed,
        ..Default::default()
    };
    let clustering = run_clustering_with(
        &pipeline.final_readiness_matrix,
        &pipeline.concepts,
        &pipeline.students,
        &kmeans,
    );
    tracing::debug!("Clustering produced {} cluster(s)", clustering.clusters.len());

    let interventions = rank_interventions(
        &pipeline.final_readiness_matrix,
        &pipeline.concepts,
        &pipeline.adjacency_matrix,
        params.threshold,
    );

    let duration_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        "Analysis finished in {}ms: {} students, {} concepts, {} interventions",
        duration_ms,
        pipeline.students.len(),
        pipeline.concepts.len(),
        interventions.len()
    );

    Ok(AnalysisRun {
        params: params.clone(),
        students_processed: pipeline.students.len(),
        concepts_processed: pipeline.concepts.len(),
        pipeline,
        clustering,
        interventions,
        duration_ms,
    })
}
