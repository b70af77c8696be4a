//! Criterion benchmarks for the readiness pipeline and clustering

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use conceptlens_core::*;

/// Layered synthetic class: `concepts` concepts in chains of 5, two
/// questions per concept, deterministic pseudo-random scores
fn synthetic_inputs(students: usize, concepts: usize) -> PipelineInputs {
    let mut scores = ScoreMatrix::new();
    let mut question_concept_map = QuestionConceptMap::new();
    let mut nodes = Vec::with_capacity(concepts);
    let mut edges = Vec::new();

    for c in 0..concepts {
        let concept = format!("C{c:04}");
        nodes.push(ConceptNode::new(concept.clone(), concept.clone()));
        if c % 5 != 0 {
            edges.push(PrerequisiteEdge::new(format!("C{:04}", c - 1), concept.clone(), 0.6));
        }

        let questions: Vec<TaggedQuestion> = (0..2)
            .map(|q| TaggedQuestion::new(format!("Q{c:04}_{q}"), 1.0))
            .collect();
        for tagged in &questions {
            scores.set_max_score(tagged.question_id.clone(), 10.0);
        }
        question_concept_map.insert(concept, questions);
    }

    for s in 0..students {
        let student = format!("S{s:05}");
        for c in 0..concepts {
            for q in 0..2 {
                let score = ((s * 31 + c * 17 + q * 7) % 11) as f64;
                scores.insert(student.clone(), format!("Q{c:04}_{q}"), score);
            }
        }
    }

    PipelineInputs {
        scores,
        question_concept_map,
        graph: GraphPayload { nodes, edges },
    }
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("readiness_pipeline");
    let weights = ReadinessWeights::default();

    for students in [30, 120, 480] {
        let inputs = synthetic_inputs(students, 25);
        group.throughput(Throughput::Elements((students * 25) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(students), &inputs, |b, inputs| {
            b.iter(|| run_readiness_pipeline(black_box(inputs), &weights).unwrap());
        });
    }

    group.finish();
}

fn bench_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("clustering");
    let result = run_readiness_pipeline(&synthetic_inputs(480, 25), &ReadinessWeights::default()).unwrap();

    for k in [2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, &k| {
            b.iter(|| {
                run_clustering(
                    black_box(&result.final_readiness_matrix),
                    &result.concepts,
                    &result.students,
                    k,
                )
            });
        });
    }

    group.finish();
}

fn bench_full_analysis(c: &mut Criterion) {
    let inputs = synthetic_inputs(120, 25);
    let params = ComputeParams::default();
    c.bench_function("full_analysis_120x25", |b| {
        b.iter(|| run_analysis(black_box(&inputs), &params).unwrap());
    });
}

criterion_group!(benches, bench_pipeline, bench_clustering, bench_full_analysis);
criterion_main!(benches);
