//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use seqflow::contracts::tolerant_parse;
use seqflow::core::PipelineState;
use seqflow::domains::{career, devops};
use seqflow::errors::CompletionError;
use seqflow::pipeline::RunContext;
use seqflow::testing::ScriptedCompletionClient;
use std::sync::Arc;

fn pipeline_benchmark(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        return;
    };

    let Ok(devops) = devops::pipeline(Arc::new(ScriptedCompletionClient::new()), RunContext::new())
    else {
        return;
    };
    c.bench_function("devops_full_run", |b| {
        b.to_async(&runtime).iter(|| async {
            let state = PipelineState::new("Deploy my Node.js API with Redis to AWS", "bench");
            black_box(devops.execute(state).await)
        });
    });

    let Ok(career) = career::pipeline(
        Arc::new(ScriptedCompletionClient::new().fail_all(CompletionError::Timeout)),
        RunContext::new(),
    ) else {
        return;
    };
    c.bench_function("career_global_fallback", |b| {
        b.to_async(&runtime).iter(|| async {
            let state = PipelineState::new("Python developer who led a team", "bench");
            black_box(career.execute(state).await)
        });
    });

    c.bench_function("tolerant_parse_repair", |b| {
        b.iter(|| {
            let raw = serde_json::json!({"technology": 42, "services": ["Redis"], "steps": "x"});
            black_box(tolerant_parse::<devops::DeploymentPlan>(raw))
        });
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
