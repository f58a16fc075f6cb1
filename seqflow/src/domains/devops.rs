//! DevOps deployment pipeline: plan, build, test, infrastructure, monitor.
//!
//! The input is a free-text deployment command such as
//! `"Deploy my Node.js API with Redis to AWS"`. When the model is
//! unreachable, fallbacks infer the stack and the cloud provider from the
//! command so degraded output still describes this deployment.

use super::{find_keywords, Keyword};
use crate::completion::CompletionClient;
use crate::core::{FinalResult, PipelineState};
use crate::errors::PipelineValidationError;
use crate::pipeline::{PipelineBuilder, RunContext, SequentialPipeline};
use crate::stages::CompletionStage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pipeline name.
pub const PIPELINE: &str = "devops";
/// Deployment planning stage.
pub const PLAN: &str = "plan";
/// Build stage.
pub const BUILD: &str = "build";
/// Test stage.
pub const TEST: &str = "test";
/// Infrastructure provisioning stage.
pub const INFRASTRUCTURE: &str = "infrastructure";
/// Monitoring setup stage.
pub const MONITOR: &str = "monitor";
/// Stage names in execution order.
pub const STAGES: [&str; 5] = [PLAN, BUILD, TEST, INFRASTRUCTURE, MONITOR];

const PROVIDERS: &[Keyword] = &[
    Keyword::new("aws", &["aws", "amazon", "ec2", "ecs", "lambda"]),
    Keyword::new("gcp", &["gcp", "google", "gke", "cloudrun"]),
    Keyword::new("azure", &["azure", "aks"]),
];

const RUNTIMES: &[Keyword] = &[
    Keyword::new("Node.js", &["node", "nodejs", "express", "nestjs"]),
    Keyword::new("Python", &["python", "django", "flask", "fastapi"]),
    Keyword::new("Go", &["golang"]),
    Keyword::new("Rust", &["rust", "axum", "actix"]),
    Keyword::new("Java", &["java", "spring"]),
    Keyword::new("Ruby", &["ruby", "rails"]),
    Keyword::new("React", &["react", "nextjs"]),
];

const SERVICES: &[Keyword] = &[
    Keyword::new("Redis", &["redis"]),
    Keyword::new("PostgreSQL", &["postgres", "postgresql"]),
    Keyword::new("MySQL", &["mysql"]),
    Keyword::new("MongoDB", &["mongo", "mongodb"]),
    Keyword::new("Kafka", &["kafka"]),
    Keyword::new("RabbitMQ", &["rabbitmq"]),
];

const DEFAULT_PROVIDER: &str = "aws";

/// Output of the `plan` stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeploymentPlan {
    /// Primary runtime or framework.
    pub technology: String,
    /// Backing services (databases, caches, queues).
    pub services: Vec<String>,
    /// Target cloud provider.
    pub provider: String,
    /// Ordered deployment steps.
    pub steps: Vec<String>,
}

/// Output of the `build` stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildReport {
    /// The produced artifact (image tag, archive, ...).
    pub artifact: String,
    /// Build commands.
    pub commands: Vec<String>,
    /// Dockerfile or equivalent build recipe.
    pub dockerfile: String,
}

/// Output of the `test` stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestReport {
    /// Whether the suite is considered passing.
    pub passed: bool,
    /// Suites that ran or should run.
    pub suites: Vec<String>,
    /// Line coverage, 0-100.
    pub coverage: f64,
}

/// A provisioned cloud resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Resource {
    /// Resource kind (e.g., "container-service", "cache").
    pub kind: String,
    /// Resource name.
    pub name: String,
}

/// Output of the `infrastructure` stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InfrastructureSpec {
    /// Cloud provider ("aws", "gcp" or "azure").
    pub provider: String,
    /// Deployment region.
    pub region: String,
    /// Resources to provision.
    pub resources: Vec<Resource>,
}

/// Output of the `monitor` stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitoringSetup {
    /// Dashboards to create.
    pub dashboards: Vec<String>,
    /// Alert rules.
    pub alerts: Vec<String>,
    /// Health check endpoint.
    pub health_check: String,
}

/// Infers the cloud provider from a deployment command.
#[must_use]
pub fn infer_provider(command: &str) -> &'static str {
    find_keywords(command, PROVIDERS)
        .first()
        .copied()
        .unwrap_or(DEFAULT_PROVIDER)
}

/// Returns the default region for a provider.
#[must_use]
pub fn default_region(provider: &str) -> &'static str {
    match provider {
        "gcp" => "us-central1",
        "azure" => "eastus",
        _ => "us-east-1",
    }
}

/// Builds a deployment plan from the command text alone.
#[must_use]
pub fn fallback_plan(command: &str) -> DeploymentPlan {
    let technology = find_keywords(command, RUNTIMES)
        .first()
        .map_or_else(|| "container".to_string(), |t| (*t).to_string());
    let services: Vec<String> = find_keywords(command, SERVICES)
        .into_iter()
        .map(str::to_string)
        .collect();
    let provider = infer_provider(command).to_string();

    let mut steps = vec![
        format!("Containerize the {technology} application"),
        "Run the test suite".to_string(),
    ];
    steps.extend(services.iter().map(|s| format!("Provision managed {s}")));
    steps.push(format!("Deploy to {provider}"));
    steps.push("Configure monitoring and alerts".to_string());

    DeploymentPlan {
        technology,
        services,
        provider,
        steps,
    }
}

fn plan_for(state: &PipelineState) -> DeploymentPlan {
    match state.output::<DeploymentPlan>(PLAN) {
        Some(plan) if !plan.technology.is_empty() => plan,
        _ => fallback_plan(&state.input),
    }
}

fn fallback_build(state: &PipelineState) -> BuildReport {
    let plan = plan_for(state);
    BuildReport {
        artifact: "app:latest".to_string(),
        commands: vec![
            "docker build -t app:latest .".to_string(),
            "docker push app:latest".to_string(),
        ],
        dockerfile: format!("# {} service image", plan.technology),
    }
}

fn fallback_test(_state: &PipelineState) -> TestReport {
    TestReport {
        passed: false,
        suites: vec!["unit".to_string(), "integration".to_string()],
        coverage: 0.0,
    }
}

/// Builds an infrastructure spec from the plan, or from the command text.
#[must_use]
pub fn fallback_infrastructure(state: &PipelineState) -> InfrastructureSpec {
    let plan = plan_for(state);
    let provider = if plan.provider.is_empty() {
        infer_provider(&state.input).to_string()
    } else {
        plan.provider.to_lowercase()
    };

    let mut resources = vec![Resource {
        kind: "container-service".to_string(),
        name: "app".to_string(),
    }];
    resources.extend(plan.services.iter().map(|service| Resource {
        kind: "managed-service".to_string(),
        name: service.to_lowercase(),
    }));

    InfrastructureSpec {
        region: default_region(&provider).to_string(),
        provider,
        resources,
    }
}

fn fallback_monitor(_state: &PipelineState) -> MonitoringSetup {
    MonitoringSetup {
        dashboards: vec!["Service overview".to_string()],
        alerts: vec![
            "Error rate above 5% for 5 minutes".to_string(),
            "p95 latency above 1s".to_string(),
        ],
        health_check: "/health".to_string(),
    }
}

/// The whole-pipeline fallback: every stage from the plan (or from keyword
/// inference when no plan exists).
#[must_use]
pub fn global_fallback(state: &PipelineState) -> FinalResult {
    let plan = plan_for(state);
    let mut result = FinalResult::new(state.run_id, PIPELINE);
    let entries = [
        (PLAN, serde_json::to_value(&plan)),
        (BUILD, serde_json::to_value(fallback_build(state))),
        (TEST, serde_json::to_value(fallback_test(state))),
        (INFRASTRUCTURE, serde_json::to_value(fallback_infrastructure(state))),
        (MONITOR, serde_json::to_value(fallback_monitor(state))),
    ];
    for (stage, value) in entries {
        result
            .stage_results
            .insert(stage.to_string(), value.unwrap_or_default());
    }
    result.summary = format!(
        "Deployment assistant is unavailable; showing a default {} deployment plan for {}",
        plan.technology, plan.provider
    );
    result
}

/// Builds the DevOps pipeline.
///
/// # Errors
///
/// Returns an error only if the stage wiring is invalid.
pub fn pipeline(
    client: Arc<dyn CompletionClient>,
    context: RunContext,
) -> Result<SequentialPipeline, PipelineValidationError> {
    PipelineBuilder::new(PIPELINE)
        .stage(Arc::new(
            CompletionStage::<DeploymentPlan>::new(
                PLAN,
                "planner",
                "You plan software deployments. Identify the primary technology, backing \
                 services and target cloud provider (aws, gcp or azure) from the request, \
                 and list the deployment steps. Respond with JSON: \
                 {\"technology\", \"services\", \"provider\", \"steps\"}.",
            )
            .with_fallback(|state| fallback_plan(&state.input)),
        ))?
        .stage(Arc::new(
            CompletionStage::<BuildReport>::new(
                BUILD,
                "builder",
                "You write build pipelines. Given the deployment plan, produce the build \
                 artifact name, build commands and a Dockerfile. Respond with JSON: \
                 {\"artifact\", \"commands\", \"dockerfile\"}.",
            )
            .depends_on(&[PLAN])
            .with_fallback(fallback_build),
        ))?
        .stage(Arc::new(
            CompletionStage::<TestReport>::new(
                TEST,
                "tester",
                "You design test strategies. Given the plan and build, list the test \
                 suites, estimate coverage and say whether the release should pass. \
                 Respond with JSON: {\"passed\", \"suites\", \"coverage\"}.",
            )
            .depends_on(&[PLAN, BUILD])
            .with_fallback(fallback_test),
        ))?
        .stage(Arc::new(
            CompletionStage::<InfrastructureSpec>::new(
                INFRASTRUCTURE,
                "deployer",
                "You provision cloud infrastructure. Given the plan and build, choose the \
                 provider, region and resources. Respond with JSON: \
                 {\"provider\", \"region\", \"resources\": [{\"kind\", \"name\"}]}.",
            )
            .depends_on(&[PLAN, BUILD, TEST])
            .with_fallback(fallback_infrastructure),
        ))?
        .stage(Arc::new(
            CompletionStage::<MonitoringSetup>::new(
                MONITOR,
                "monitor",
                "You set up observability. Given the infrastructure, define dashboards, \
                 alert rules and the health check endpoint. Respond with JSON: \
                 {\"dashboards\", \"alerts\", \"healthCheck\"}.",
            )
            .depends_on(&[PLAN, INFRASTRUCTURE])
            .with_fallback(fallback_monitor),
        ))?
        .with_global_fallback(global_fallback)
        .build(client, context)
}
