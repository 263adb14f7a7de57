//! Benchmarks for supervisor runs against the in-memory store.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ideaforge::prelude::*;
use ideaforge::testing::ScriptedPipeline;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn supervisor_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let next_id = AtomicU64::new(0);

    let store = Arc::new(InMemoryStore::new());
    let completing = PipelineSupervisor::new(
        ScriptedPipeline::new().registry().unwrap(),
        store.clone(),
        SupervisorConfig::default(),
    )
    .unwrap();

    c.bench_function("run_pipeline_nine_stages", |b| {
        b.iter(|| {
            let project_id = format!("bench-{}", next_id.fetch_add(1, Ordering::Relaxed));
            runtime.block_on(async {
                store.create_project(&ProjectState::new(&project_id)).await.unwrap();
                black_box(completing.run_pipeline(&project_id).await.unwrap())
            })
        });
    });

    let exhausting = PipelineSupervisor::new(
        ScriptedPipeline::new()
            .with_stage(
                "tester",
                ideaforge::testing::ScriptedStage::new("tester")
                    .returning(StageResult::rebuild_required(HashMap::new())),
            )
            .registry()
            .unwrap(),
        store.clone(),
        SupervisorConfig::default(),
    )
    .unwrap();

    c.bench_function("run_pipeline_exhausted_corrections", |b| {
        b.iter(|| {
            let project_id = format!("bench-{}", next_id.fetch_add(1, Ordering::Relaxed));
            runtime.block_on(async {
                store.create_project(&ProjectState::new(&project_id)).await.unwrap();
                black_box(exhausting.run_pipeline(&project_id).await.unwrap())
            })
        });
    });

    c.bench_function("get_status", |b| {
        let project_id = "bench-status";
        runtime.block_on(async {
            store.create_project(&ProjectState::new(project_id)).await.unwrap();
            completing.run_pipeline(project_id).await.unwrap();
        });
        b.iter(|| runtime.block_on(async { black_box(completing.get_status(project_id).await.unwrap()) }));
    });
}

criterion_group!(benches, supervisor_benchmark);
criterion_main!(benches);
