//! Career analysis pipeline:
//! plan, extract-skills, research-trends, build-learning-plan, synthesize.
//!
//! The input is resume text. The last stage asks the model for final
//! insights over everything gathered; the namespaced synthesizer then
//! assembles the result.

use super::{find_keywords, Keyword};
use crate::completion::CompletionClient;
use crate::core::{FinalResult, PipelineState};
use crate::errors::PipelineValidationError;
use crate::pipeline::{PipelineBuilder, RunContext, SequentialPipeline};
use crate::stages::CompletionStage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pipeline name.
pub const PIPELINE: &str = "career";
/// Career planning stage.
pub const PLAN: &str = "plan";
/// Skills extraction stage.
pub const EXTRACT_SKILLS: &str = "extract-skills";
/// Market trend research stage.
pub const RESEARCH_TRENDS: &str = "research-trends";
/// Learning plan stage.
pub const BUILD_LEARNING_PLAN: &str = "build-learning-plan";
/// Final insights stage.
pub const SYNTHESIZE: &str = "synthesize";
/// Stage names in execution order.
pub const STAGES: [&str; 5] = [
    PLAN,
    EXTRACT_SKILLS,
    RESEARCH_TRENDS,
    BUILD_LEARNING_PLAN,
    SYNTHESIZE,
];

const TECHNICAL_SKILLS: &[Keyword] = &[
    Keyword::new("Rust", &["rust"]),
    Keyword::new("Python", &["python"]),
    Keyword::new("JavaScript", &["javascript", "js"]),
    Keyword::new("TypeScript", &["typescript", "ts"]),
    Keyword::new("React", &["react"]),
    Keyword::new("Node.js", &["node", "nodejs"]),
    Keyword::new("Java", &["java"]),
    Keyword::new("Go", &["golang"]),
    Keyword::new("SQL", &["sql", "postgres", "postgresql", "mysql"]),
    Keyword::new("AWS", &["aws"]),
    Keyword::new("Docker", &["docker"]),
    Keyword::new("Kubernetes", &["kubernetes", "k8s"]),
    Keyword::new("Machine Learning", &["ml", "pytorch", "tensorflow"]),
];

const SOFT_SKILLS: &[Keyword] = &[
    Keyword::new("Leadership", &["led", "lead", "leadership", "managed", "mentored"]),
    Keyword::new("Communication", &["communication", "presented", "wrote"]),
    Keyword::new("Collaboration", &["collaborated", "collaboration", "partnered"]),
];

const IN_DEMAND: [&str; 5] = ["TypeScript", "Kubernetes", "AWS", "Machine Learning", "Rust"];

/// Output of the `plan` stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CareerPlan {
    /// Career goals inferred from the resume.
    pub goals: Vec<String>,
    /// Roles worth targeting.
    pub target_roles: Vec<String>,
    /// Areas the analysis should focus on.
    pub focus_areas: Vec<String>,
}

/// Output of the `extract-skills` stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkillsProfile {
    /// Technical skills.
    pub technical: Vec<String>,
    /// Soft skills.
    pub soft: Vec<String>,
    /// Years of professional experience, if stated.
    pub years_experience: u32,
}

/// Output of the `research-trends` stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrendReport {
    /// Skills with growing demand.
    pub trending_skills: Vec<String>,
    /// Roles with growing demand.
    pub growing_roles: Vec<String>,
    /// Market observations.
    pub insights: Vec<String>,
}

/// One step of a learning plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Milestone {
    /// What to achieve.
    pub title: String,
    /// The skill it builds.
    pub skill: String,
    /// Estimated duration in weeks.
    pub weeks: u32,
}

/// Output of the `build-learning-plan` stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LearningPlan {
    /// Ordered milestones.
    pub milestones: Vec<Milestone>,
    /// Suggested resources.
    pub resources: Vec<String>,
}

/// Output of the `synthesize` stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CareerInsights {
    /// One-paragraph summary.
    pub summary: String,
    /// Recommendations.
    pub recommendations: Vec<String>,
    /// Concrete next steps.
    pub next_steps: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn fallback_plan(_state: &PipelineState) -> CareerPlan {
    CareerPlan {
        goals: strings(&["Identify strengths", "Close the most valuable skill gaps"]),
        target_roles: Vec::new(),
        focus_areas: strings(&["skills", "market trends", "learning plan"]),
    }
}

/// Extracts skills from resume text by keyword.
#[must_use]
pub fn fallback_skills(resume: &str) -> SkillsProfile {
    let labels = |table: &[Keyword]| -> Vec<String> {
        find_keywords(resume, table)
            .into_iter()
            .map(str::to_string)
            .collect()
    };
    SkillsProfile {
        technical: labels(TECHNICAL_SKILLS),
        soft: labels(SOFT_SKILLS),
        years_experience: 0,
    }
}

fn skills_for(state: &PipelineState) -> SkillsProfile {
    match state.output::<SkillsProfile>(EXTRACT_SKILLS) {
        Some(skills) if !skills.technical.is_empty() => skills,
        _ => fallback_skills(&state.input),
    }
}

fn fallback_trends(_state: &PipelineState) -> TrendReport {
    TrendReport {
        trending_skills: strings(&IN_DEMAND),
        growing_roles: strings(&["Platform Engineer", "ML Engineer", "Security Engineer"]),
        insights: strings(&["Live market data is unavailable; showing long-term trends."]),
    }
}

/// Builds a learning plan from the gap between skills and trends.
#[must_use]
pub fn fallback_learning_plan(state: &PipelineState) -> LearningPlan {
    let skills = skills_for(state);
    let trends = state
        .output::<TrendReport>(RESEARCH_TRENDS)
        .filter(|t| !t.trending_skills.is_empty())
        .unwrap_or_else(|| fallback_trends(state));

    let milestones = trends
        .trending_skills
        .iter()
        .filter(|skill| !skills.technical.contains(*skill))
        .take(3)
        .map(|skill| Milestone {
            title: format!("Build a project using {skill}"),
            skill: skill.clone(),
            weeks: 4,
        })
        .collect();

    LearningPlan {
        milestones,
        resources: strings(&["Official documentation", "A hands-on side project"]),
    }
}

fn fallback_insights(state: &PipelineState) -> CareerInsights {
    let skills = skills_for(state);
    let summary = if skills.technical.is_empty() {
        "Your resume was received; detailed insights are unavailable right now.".to_string()
    } else {
        format!(
            "Your strongest areas are {}; detailed insights are unavailable right now.",
            skills.technical.join(", ")
        )
    };
    CareerInsights {
        summary,
        recommendations: strings(&["Follow the learning plan milestones in order"]),
        next_steps: strings(&["Update your resume after each milestone"]),
    }
}

/// The whole-pipeline fallback.
#[must_use]
pub fn global_fallback(state: &PipelineState) -> FinalResult {
    let mut result = FinalResult::new(state.run_id, PIPELINE);
    let entries = [
        (PLAN, serde_json::to_value(fallback_plan(state))),
        (EXTRACT_SKILLS, serde_json::to_value(skills_for(state))),
        (RESEARCH_TRENDS, serde_json::to_value(fallback_trends(state))),
        (BUILD_LEARNING_PLAN, serde_json::to_value(fallback_learning_plan(state))),
        (SYNTHESIZE, serde_json::to_value(fallback_insights(state))),
    ];
    for (stage, value) in entries {
        result
            .stage_results
            .insert(stage.to_string(), value.unwrap_or_default());
    }
    result.summary =
        "Career analysis is temporarily unavailable; showing a general plan.".to_string();
    result
}

/// Builds the career pipeline.
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
            CompletionStage::<CareerPlan>::new(
                PLAN,
                "career-planner",
                "You are a career coach. Read the resume and the user's preferences and \
                 decide what the analysis should cover. Respond with JSON: \
                 {\"goals\", \"targetRoles\", \"focusAreas\"}.",
            )
            .with_fallback(fallback_plan),
        ))?
        .stage(Arc::new(
            CompletionStage::<SkillsProfile>::new(
                EXTRACT_SKILLS,
                "skills-analyst",
                "You extract skills from resumes. List technical and soft skills and the \
                 years of experience. Respond with JSON: \
                 {\"technical\", \"soft\", \"yearsExperience\"}.",
            )
            .depends_on(&[PLAN])
            .with_fallback(|state| fallback_skills(&state.input)),
        ))?
        .stage(Arc::new(
            CompletionStage::<TrendReport>::new(
                RESEARCH_TRENDS,
                "market-researcher",
                "You research the job market. Given the plan and skills, report trending \
                 skills, growing roles and insights. Respond with JSON: \
                 {\"trendingSkills\", \"growingRoles\", \"insights\"}.",
            )
            .depends_on(&[PLAN, EXTRACT_SKILLS])
            .with_fallback(fallback_trends),
        ))?
        .stage(Arc::new(
            CompletionStage::<LearningPlan>::new(
                BUILD_LEARNING_PLAN,
                "learning-designer",
                "You design learning plans. Close the gap between the user's skills and \
                 the market trends with ordered milestones. Respond with JSON: \
                 {\"milestones\": [{\"title\", \"skill\", \"weeks\"}], \"resources\"}.",
            )
            .depends_on(&[EXTRACT_SKILLS, RESEARCH_TRENDS])
            .with_fallback(fallback_learning_plan),
        ))?
        .stage(Arc::new(
            CompletionStage::<CareerInsights>::new(
                SYNTHESIZE,
                "career-advisor",
                "You summarize career analyses. Combine everything gathered into a \
                 summary, recommendations and next steps. Respond with JSON: \
                 {\"summary\", \"recommendations\", \"nextSteps\"}.",
            )
            .depends_on(&[PLAN, EXTRACT_SKILLS, RESEARCH_TRENDS, BUILD_LEARNING_PLAN])
            .with_fallback(fallback_insights),
        ))?
        .with_global_fallback(global_fallback)
        .build(client, context)
}
