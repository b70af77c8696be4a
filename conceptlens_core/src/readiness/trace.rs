//! Explanation traces
//!
//! A trace records every term that went into one `(student, concept)` final
//! readiness value, so the value can be audited and rebuilt from its parts.

use serde::{Deserialize, Serialize};

use super::stages::{combine, BOOST_CAP};
use super::ReadinessWeights;
use crate::types::{sanitize, ConceptId, ConfidenceLevel, StudentId};

/// Penalty contributed by one weak prerequisite
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpstreamContribution {
    pub concept_id: ConceptId,
    /// Parent's direct readiness (missing reported as 0)
    pub readiness: f64,
    pub edge_weight: f64,
    /// `edge_weight * (threshold - readiness)`
    pub penalty_contribution: f64,
}

/// Boost contributed by one dependent concept
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownstreamContribution {
    pub concept_id: ConceptId,
    /// Child's direct readiness (missing reported as 0)
    pub readiness: f64,
    /// `edge_weight * 0.4`
    pub validation_weight: f64,
    /// `validation_weight * readiness`, before the cap
    pub boost_contribution: f64,
}

/// The stage-4 formula with its weighted components
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormulaBreakdown {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    /// `alpha * direct`
    pub direct_component: f64,
    /// `beta * penalty`, subtracted
    pub penalty_component: f64,
    /// `gamma * boost`, added
    pub boost_component: f64,
    pub final_readiness: f64,
}

/// One bar of the explanation waterfall
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaterfallStep {
    pub label: String,
    pub value: f64,
    pub cumulative: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplanationTrace {
    pub student_id: StudentId,
    pub concept_id: ConceptId,
    pub direct_readiness: Option<f64>,
    pub confidence: ConfidenceLevel,
    pub threshold: f64,
    pub upstream_penalties: Vec<UpstreamContribution>,
    pub downstream_boosts: Vec<DownstreamContribution>,
    pub formula: FormulaBreakdown,
}

impl ExplanationTrace {
    /// Sum of recorded upstream contributions
    pub fn penalty_total(&self) -> f64 {
        self.upstream_penalties
            .iter()
            .map(|u| u.penalty_contribution)
            .sum()
    }

    /// Sum of recorded downstream contributions, capped
    pub fn boost_total(&self) -> f64 {
        self.downstream_boosts
            .iter()
            .map(|d| d.boost_contribution)
            .sum::<f64>()
            .min(BOOST_CAP)
    }

    /// Recompute the final readiness from the recorded parts alone
    pub fn reconstruct(&self) -> f64 {
        let weights = ReadinessWeights {
            alpha: self.formula.alpha,
            beta: self.formula.beta,
            gamma: self.formula.gamma,
            threshold: self.threshold,
        };
        combine(
            self.direct_readiness.unwrap_or(0.0),
            self.penalty_total(),
            self.boost_total(),
            &weights,
        )
    }

    /// Direct, penalty, boost, then the clamped final value
    pub fn waterfall(&self) -> Vec<WaterfallStep> {
        let f = &self.formula;
        let mut cumulative = f.direct_component;
        let mut steps = vec![WaterfallStep {
            label: "Direct readiness".to_string(),
            value: f.direct_component,
            cumulative,
        }];

        cumulative -= f.penalty_component;
        steps.push(WaterfallStep {
            label: "Prerequisite penalty".to_string(),
            value: -f.penalty_component,
            cumulative,
        });

        cumulative += f.boost_component;
        steps.push(WaterfallStep {
            label: "Downstream boost".to_string(),
            value: f.boost_component,
            cumulative,
        });

        steps.push(WaterfallStep {
            label: "Final (clamped)".to_string(),
            value: f.final_readiness,
            cumulative: f.final_readiness,
        });
        steps
    }
}

/// Inputs for one cell's trace, gathered by the pipeline
pub(crate) struct TraceInputs<'a> {
    pub student_id: &'a str,
    pub concept_id: &'a str,
    pub direct: Option<f64>,
    pub penalty: f64,
    pub boost: f64,
    pub final_readiness: f64,
    pub confidence: ConfidenceLevel,
    /// `(parent id, parent direct readiness, edge weight)`
    pub parents: Vec<(&'a str, Option<f64>, f64)>,
    /// `(child id, child direct readiness, edge weight)`
    pub children: Vec<(&'a str, Option<f64>, f64)>,
}

pub(crate) fn build_trace(inputs: TraceInputs<'_>, weights: &ReadinessWeights) -> ExplanationTrace {
    let upstream_penalties = inputs
        .parents
        .iter()
        .filter_map(|&(id, readiness, weight)| {
            let value = readiness.unwrap_or(0.0);
            let gap = (weights.threshold - value).max(0.0);
            (gap > 0.0).then(|| UpstreamContribution {
                concept_id: id.to_string(),
                readiness: sanitize(value),
                edge_weight: sanitize(weight),
                penalty_contribution: sanitize(weight * gap),
            })
        })
        .collect();

    let downstream_boosts = inputs
        .children
        .iter()
        .map(|&(id, readiness, weight)| {
            let value = readiness.unwrap_or(0.0);
            let validation_weight = weight * super::stages::VALIDATION_FACTOR;
            DownstreamContribution {
                concept_id: id.to_string(),
                readiness: sanitize(value),
                validation_weight: sanitize(validation_weight),
                boost_contribution: sanitize(validation_weight * value),
            }
        })
        .collect();

    ExplanationTrace {
        student_id: inputs.student_id.to_string(),
        concept_id: inputs.concept_id.to_string(),
        direct_readiness: inputs.direct,
        confidence: inputs.confidence,
        threshold: weights.threshold,
        upstream_penalties,
        downstream_boosts,
        formula: FormulaBreakdown {
            alpha: weights.alpha,
            beta: weights.beta,
            gamma: weights.gamma,
            direct_component: sanitize(weights.alpha * inputs.direct.unwrap_or(0.0)),
            penalty_component: sanitize(weights.beta * inputs.penalty),
            boost_component: sanitize(weights.gamma * inputs.boost),
            final_readiness: sanitize(inputs.final_readiness),
        },
    }
}
