//! Integration tests for sequential pipeline execution.

use super::{PipelineBuilder, RunContext, SequentialPipeline};
use crate::completion::CompletionClient;
use crate::contracts::parse_with_report;
use crate::core::{FinalResult, PipelineState, RunId, StageStatus};
use crate::errors::CompletionError;
use crate::handoff::{HandoffBus, HandoffConfig};
use crate::stages::{CompletionStage, Stage};
use crate::synthesis::Synthesizer;
use crate::tracking::StatusTracker;
use crate::testing::{
    assert_clean, assert_completed_in_order, assert_degraded_exactly, assert_has_stages,
    PanickingStage, ScriptedCompletionClient,
};
use crate::users::{InMemoryUserStore, UserRecord};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const STAGES: [&str; 5] = ["s0", "s1", "s2", "s3", "s4"];

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Note {
    text: String,
    score: u32,
}

fn note_stage(index: usize) -> Arc<dyn Stage> {
    let name = STAGES[index];
    Arc::new(
        CompletionStage::<Note>::new(name, name, format!("You are {name}."))
            .depends_on(&STAGES[..index])
            .with_fallback(|_| Note {
                text: "fallback".to_string(),
                score: 0,
            }),
    )
}

fn builder() -> PipelineBuilder {
    (0..STAGES.len()).fold(PipelineBuilder::new("notes"), |builder, index| {
        builder.stage(note_stage(index)).unwrap()
    })
}

fn scripted() -> ScriptedCompletionClient {
    STAGES.iter().fold(ScriptedCompletionClient::new(), |client, name| {
        client.respond(*name, serde_json::json!({"text": format!("from {name}"), "score": 1}))
    })
}

fn pipeline(client: Arc<dyn CompletionClient>, context: RunContext) -> SequentialPipeline {
    builder().build(client, context).unwrap()
}

#[tokio::test]
async fn test_stages_complete_in_order_and_see_upstream() {
    let client = Arc::new(scripted());
    let pipeline = pipeline(client.clone(), RunContext::new());

    let run = pipeline.execute(PipelineState::new("write notes", "u")).await;

    assert_completed_in_order(&run.state, &STAGES);
    assert_eq!(client.roles_called(), STAGES.to_vec());
    for (index, call) in client.calls().iter().enumerate() {
        let upstream = call.payload["upstream"].as_object().unwrap();
        assert_eq!(upstream.len(), index);
        for earlier in &STAGES[..index] {
            assert_eq!(upstream[*earlier]["text"], format!("from {earlier}"));
        }
    }

    assert_clean(&run.result);
    assert_has_stages(&run.result, &STAGES);
    assert_eq!(run.result.pipeline, "notes");
    assert_eq!(run.result.run_id, run.state.run_id);
}

#[tokio::test]
async fn test_single_failure_at_each_position() {
    for failing in STAGES {
        let client = scripted().fail(failing, CompletionError::transport("connection reset"));
        let pipeline = pipeline(Arc::new(client), RunContext::new());

        let run = pipeline.execute(PipelineState::new("write notes", "u")).await;
        let result = run.result;

        assert!(!result.fallback, "only {failing} failed");
        assert_has_stages(&result, &STAGES);
        assert_degraded_exactly(&result, &[failing]);

        let parsed = parse_with_report::<Note>(result.stage(failing).cloned().unwrap());
        assert!(parsed.is_exact());
        assert_eq!(parsed.value.text, "fallback");

        for other in STAGES.iter().filter(|s| **s != failing) {
            assert_eq!(result.stage(other).unwrap()["text"], format!("from {other}"));
        }
    }
}

#[tokio::test]
async fn test_all_stages_failing_returns_global_fallback() {
    let client = ScriptedCompletionClient::new().fail_all(CompletionError::Timeout);
    let context = RunContext::new();
    let pipeline = builder()
        .with_global_fallback(|state| {
            let mut result = FinalResult::new(state.run_id, "ignored");
            result.summary = "notes are unavailable right now".to_string();
            result
        })
        .build(Arc::new(client), context.clone())
        .unwrap();

    let run = pipeline.execute(PipelineState::new("write notes", "u")).await;

    assert!(run.result.fallback);
    assert_eq!(run.result.pipeline, "notes");
    assert_eq!(run.result.summary, "notes are unavailable right now");
    assert_eq!(run.result.degraded.len(), STAGES.len());
    assert_has_stages(&run.result, &STAGES);

    let fallback_records: Vec<_> = context
        .log
        .for_run(run.state.run_id)
        .into_iter()
        .filter(|r| r.action == "fallback")
        .collect();
    assert_eq!(fallback_records.len(), 1);
}

#[tokio::test]
async fn test_panicking_stage_returns_last_known_good_state() {
    let client: Arc<dyn CompletionClient> = Arc::new(scripted());
    let context = RunContext::new();
    let pipeline = PipelineBuilder::new("notes")
        .stage(note_stage(0))
        .unwrap()
        .stage(Arc::new(PanickingStage::new("s1").depends_on(&["s0"])))
        .unwrap()
        .stage(note_stage(2))
        .unwrap()
        .build(client, context.clone())
        .unwrap();
    let run = pipeline.execute(PipelineState::new("write notes", "u")).await;

    assert!(run.result.fallback);
    assert_completed_in_order(&run.state, &["s0"]);
    assert_eq!(run.result.stage("s0"), run.state.result("s0"));
    assert!(run.result.stage("s2").is_none());
    assert!(run.result.degraded.is_empty());

    // The abandoned stages still reach a terminal status.
    let snapshot = context.tracker.get_all(run.state.run_id);
    assert!(snapshot.all_complete());
    assert_eq!(snapshot.status("s1"), StageStatus::Complete);
    assert_eq!(snapshot.status("s2"), StageStatus::Complete);

    let records = context.log.for_run(run.state.run_id);
    let fallback = records.iter().find(|r| r.action == "fallback").unwrap();
    assert!(fallback.detail.contains("panicked"));
}

#[tokio::test]
async fn test_fault_marks_canned_entries_degraded() {
    let context = RunContext::new();
    let pipeline = PipelineBuilder::new("notes")
        .stage(note_stage(0))
        .unwrap()
        .stage(Arc::new(PanickingStage::new("s1").depends_on(&["s0"])))
        .unwrap()
        .stage(note_stage(2))
        .unwrap()
        .with_global_fallback(|state| {
            let mut result = FinalResult::new(state.run_id, "notes");
            for stage in ["s1", "s2"] {
                result
                    .stage_results
                    .insert(stage.to_string(), serde_json::json!({"text": "canned", "score": 0}));
            }
            result
        })
        .build(Arc::new(scripted()), context.clone())
        .unwrap();

    let run = pipeline.execute(PipelineState::new("write notes", "u")).await;

    assert!(run.result.fallback);
    assert_has_stages(&run.result, &["s0", "s1", "s2"]);
    assert_eq!(run.result.stage("s0").unwrap()["text"], "from s0");
    assert_degraded_exactly(&run.result, &["s1", "s2"]);
    assert!(context.tracker.get_all(run.state.run_id).all_complete());
}

#[tokio::test]
async fn test_tracker_keeps_only_recent_runs() {
    let context = RunContext::new().with_tracker(Arc::new(StatusTracker::with_retention(8)));
    let pipeline = pipeline(Arc::new(scripted()), context.clone());

    let mut run_ids = Vec::new();
    for _ in 0..50 {
        let run = pipeline.execute(PipelineState::new("write notes", "u")).await;
        run_ids.push(run.state.run_id);
    }

    assert_eq!(context.tracker.get_all_runs().len(), 8);
    assert!(context.tracker.get_all(run_ids[49]).all_complete());
    assert!(context.tracker.get_all(run_ids[0]).stages.is_empty());
}

struct PanickingSynthesizer;

impl Synthesizer for PanickingSynthesizer {
    #[allow(clippy::panic)]
    fn synthesize(&self, _pipeline: &str, _state: &PipelineState) -> FinalResult {
        panic!("cannot synthesize")
    }
}

#[tokio::test]
async fn test_synthesizer_panic_returns_global_fallback() {
    let pipeline = builder()
        .with_synthesizer(Arc::new(PanickingSynthesizer))
        .build(Arc::new(scripted()), RunContext::new())
        .unwrap();

    let run = pipeline.execute(PipelineState::new("write notes", "u")).await;

    assert!(run.result.fallback);
    assert!(run.result.degraded.is_empty());
    assert_has_stages(&run.result, &STAGES);
}

#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let client = Arc::new(scripted().with_delay(Duration::from_millis(5)));
    let context = RunContext::new();
    let pipeline = Arc::new(pipeline(client, context.clone()));

    let seen: Arc<Mutex<Vec<RunId>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _subscription = context.tracker.subscribe(move |snapshot| {
        sink.lock().push(snapshot.run_id);
    });

    let first = PipelineState::new("first", "u-1");
    let second = PipelineState::new("second", "u-2");
    let (first_id, second_id) = (first.run_id, second.run_id);

    let (a, b) = tokio::join!(
        tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.execute(first).await }
        }),
        tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.execute(second).await }
        }),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.result.run_id, first_id);
    assert_eq!(b.result.run_id, second_id);
    assert_clean(&a.result);
    assert_clean(&b.result);

    for run_id in [first_id, second_id] {
        let snapshot = context.tracker.get_all(run_id);
        assert_eq!(snapshot.stages.len(), STAGES.len());
        assert!(snapshot.all_complete());
        assert_eq!(context.log.for_run(run_id).len(), STAGES.len());
    }
    assert_eq!(context.tracker.get_all_runs().len(), 2);

    // reset + (active, thinking, complete) per stage, for each run.
    let seen = seen.lock();
    let per_run = 1 + 3 * STAGES.len();
    assert_eq!(seen.iter().filter(|id| **id == first_id).count(), per_run);
    assert_eq!(seen.iter().filter(|id| **id == second_id).count(), per_run);
}

#[tokio::test]
async fn test_subscriber_sees_stage_progress() {
    let context = RunContext::new();
    let pipeline = PipelineBuilder::new("single")
        .stage(note_stage(0))
        .unwrap()
        .build(Arc::new(scripted()), context.clone())
        .unwrap();

    let statuses: Arc<Mutex<Vec<StageStatus>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    let subscription = context.tracker.subscribe(move |snapshot| {
        sink.lock().push(snapshot.status("s0"));
    });

    pipeline.execute(PipelineState::new("x", "u")).await;
    subscription.unsubscribe();

    assert_eq!(
        *statuses.lock(),
        vec![
            StageStatus::Idle,
            StageStatus::Active,
            StageStatus::Thinking,
            StageStatus::Complete
        ]
    );
    assert_eq!(context.tracker.subscriber_count(), 0);
}

#[tokio::test]
async fn test_handoffs_between_consecutive_stages() {
    let context = RunContext::new();
    let bus = Arc::new(HandoffBus::start(&HandoffConfig::default(), context.log.clone()));
    let context = context.with_handoff(bus.clone());
    let pipeline = pipeline(Arc::new(scripted()), context.clone());

    let run = pipeline.execute(PipelineState::new("write notes", "u")).await;
    let stats = bus.shutdown().await;

    assert_eq!(stats.delivered, (STAGES.len() - 1) as u64);
    let handoffs: Vec<String> = context
        .log
        .for_run(run.state.run_id)
        .into_iter()
        .filter(|r| r.action == "handoff")
        .map(|r| r.detail)
        .collect();
    assert_eq!(handoffs.len(), STAGES.len() - 1);
    assert!(handoffs[0].starts_with("s0 -> s1"));
}

#[tokio::test]
async fn test_user_preferences_reach_payload() {
    let users = Arc::new(InMemoryUserStore::new());
    users.insert(UserRecord::new("u-1").with_preference("tone", serde_json::json!("brief")));
    let client = Arc::new(scripted());
    let pipeline = pipeline(client.clone(), RunContext::new().with_users(users));

    pipeline.execute(PipelineState::new("x", "u-1")).await;
    pipeline.execute(PipelineState::new("x", "unknown")).await;

    let calls = client.calls();
    assert_eq!(calls[0].payload["preferences"]["tone"], "brief");
    assert!(calls[STAGES.len()].payload.get("preferences").is_none());
}
