//! End-to-end pipeline tests with mocked LLM and embedding backends.

use std::sync::Arc;

use chrono::Duration;
use serde_json::json;

use counsel_advisor::steps::{CareerGuidanceStep, FinancialAidStep, ProgramMatchStep};
use counsel_advisor::testing::{test_deps, FailingStep, FixedEmbedder, MockGenerator};
use counsel_advisor::{Orchestrator, ReasoningStep, StepOutcome, SUMMARY_UNAVAILABLE};
use counsel_core::{
    CatalogItem, CounselDeps, EmbeddingProvider, LlmService, ManualClock, ReasoningMode,
    StudentProfile,
};

fn item(value: serde_json::Value) -> CatalogItem {
    value.as_object().cloned().unwrap()
}

fn ai_and_business() -> Vec<CatalogItem> {
    vec![
        item(json!({"program": "Diploma in AI", "institution": "Temasek Polytechnic", "level": "diploma", "keywords": ["ai"]})),
        item(json!({"program": "Diploma in Business", "institution": "Ngee Ann Polytechnic", "level": "diploma", "keywords": ["business"]})),
    ]
}

fn topic_embedder() -> EmbeddingProvider {
    EmbeddingProvider::remote(Arc::new(
        FixedEmbedder::new(3)
            .on_keyword("ai", vec![1.0, 0.0, 0.0])
            .on_keyword("business", vec![0.0, 1.0, 0.0]),
    ))
}

fn ai_student() -> StudentProfile {
    StudentProfile::new("Alex")
        .with_interests(["AI"])
        .with_target_level("diploma")
}

/// Deps plus a program step over the AI/Business catalog.
async fn program_pipeline(deps: &CounselDeps) -> Arc<dyn ReasoningStep> {
    let mut store = deps.similarity_store();
    store.add_items(ai_and_business(), false).await.unwrap();
    Arc::new(ProgramMatchStep::new(
        Arc::new(store),
        deps.llm.clone(),
        deps.prompts.clone(),
        10,
    ))
}

#[tokio::test]
async fn ai_student_gets_ai_diploma_first_without_llm() {
    let dir = tempfile::tempdir().unwrap();
    let deps = test_deps(
        dir.path(),
        LlmService::unavailable(),
        topic_embedder(),
        Arc::new(ManualClock::default()),
    );
    let step = program_pipeline(&deps).await;
    let orchestrator = Orchestrator::new(deps, vec![step]);

    let report = orchestrator.run(&ai_student()).await;
    let programs = report.programs().unwrap();
    assert_eq!(programs.data_source, ReasoningMode::FallbackSimpleRanking);
    assert_eq!(programs.total_programs_analyzed, 2);
    assert_eq!(programs.programs[0].title, "Diploma in AI");
    assert_eq!(programs.programs[0].similarity, Some(1.0));
    assert_eq!(
        programs.programs[0].fit_reasoning,
        "Matched via semantic search (similarity: 100%)"
    );
    assert_eq!(programs.programs[1].title, "Diploma in Business");
}

#[tokio::test]
async fn repeated_profile_is_memoized_until_ttl_expires() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::default());
    let deps = test_deps(
        dir.path(),
        LlmService::unavailable(),
        EmbeddingProvider::offline(),
        clock.clone(),
    );
    let orchestrator = Orchestrator::from_deps(deps).await.unwrap();
    let profile = ai_student();

    let first = orchestrator.run(&profile).await;
    assert!(!first.cached);

    clock.advance(Duration::seconds(60));
    let second = orchestrator.run(&profile).await;
    assert!(second.cached);
    assert_eq!(second.steps, first.steps);

    clock.advance(Duration::seconds(61));
    let third = orchestrator.run(&profile).await;
    assert!(!third.cached);

    let other = orchestrator.run(&profile.clone().with_budget_category("low")).await;
    assert!(!other.cached);
}

#[tokio::test]
async fn failing_step_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let deps = test_deps(
        dir.path(),
        LlmService::unavailable(),
        EmbeddingProvider::offline(),
        Arc::new(ManualClock::default()),
    );
    let broken: Arc<dyn ReasoningStep> = Arc::new(FailingStep::new("broken", "backend exploded"));
    let career: Arc<dyn ReasoningStep> =
        Arc::new(CareerGuidanceStep::new(deps.llm.clone(), deps.prompts.clone()));
    let orchestrator = Orchestrator::new(deps, vec![broken, career]);

    let report = orchestrator
        .run(&StudentProfile::new("Sam").with_interests(["Finance"]))
        .await;

    assert_eq!(report.step("broken").and_then(StepOutcome::error), Some("backend exploded"));
    let careers = report.careers().unwrap();
    assert_eq!(careers.data_source, ReasoningMode::FallbackBasic);
    assert_eq!(careers.career_suggestions[0].title, "Financial Analyst / FinTech Specialist");

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["steps"]["broken"], json!({"error": "backend exploded"}));
}

struct PanickingStep;

#[async_trait::async_trait]
impl ReasoningStep for PanickingStep {
    fn name(&self) -> &str {
        "panicky"
    }

    async fn handle(
        &self,
        _request: &counsel_advisor::StepRequest<'_>,
    ) -> anyhow::Result<counsel_advisor::StepOutput> {
        panic!("index out of range")
    }
}

#[tokio::test]
async fn panicking_step_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let deps = test_deps(
        dir.path(),
        LlmService::unavailable(),
        EmbeddingProvider::offline(),
        Arc::new(ManualClock::default()),
    );
    let panicky: Arc<dyn ReasoningStep> = Arc::new(PanickingStep);
    let career: Arc<dyn ReasoningStep> =
        Arc::new(CareerGuidanceStep::new(deps.llm.clone(), deps.prompts.clone()));
    let orchestrator = Orchestrator::new(deps, vec![panicky, career]);

    let report = orchestrator
        .run(&StudentProfile::new("Sam").with_interests(["Finance"]))
        .await;

    assert_eq!(
        report.step("panicky").and_then(StepOutcome::error),
        Some("step panicked: index out of range")
    );
    assert!(report.careers().is_some());
}

#[tokio::test]
async fn llm_answers_drive_every_step_and_summary_is_exported() {
    let dir = tempfile::tempdir().unwrap();
    let llm = LlmService::new(vec![Arc::new(
        MockGenerator::new()
            .on_prompt(
                "expert education counselor",
                r#"```json
[{"program_name": "Diploma in AI", "institution": "Temasek Polytechnic", "fit_score": 0.92, "counselor_reasoning": "Strong match for AI."}]
```"#,
            )
            .on_prompt(
                "Student is considering these programs: Diploma in AI",
                r#"[{"title": "ML Engineer", "fit_reasoning": "Builds on the diploma.", "salary_range": {"starting": "S$4,000", "five_years": "S$7,000"}}]"#,
            )
            .on_prompt(
                "expert financial aid counselor",
                r#"[{"name": "Made Up Grant"}, {"name": "Higher Education Community Bursary", "priority": "High"}]"#,
            )
            .on_prompt("counseling summary", "Focus on the AI diploma."),
    )]);

    let deps = test_deps(dir.path(), llm, topic_embedder(), Arc::new(ManualClock::default()));
    let program_step = program_pipeline(&deps).await;
    let career_step: Arc<dyn ReasoningStep> =
        Arc::new(CareerGuidanceStep::new(deps.llm.clone(), deps.prompts.clone()));
    let aid_step: Arc<dyn ReasoningStep> = Arc::new(FinancialAidStep::new(
        Arc::new(counsel_advisor::aid::builtin_aid().unwrap()),
        deps.llm.clone(),
        deps.prompts.clone(),
    ));
    let orchestrator =
        Orchestrator::new(deps, vec![program_step, career_step, aid_step]).with_summarizer(true);

    let report = orchestrator.run(&ai_student()).await;

    let programs = report.programs().unwrap();
    assert_eq!(programs.data_source, ReasoningMode::AiCounselorReasoning);
    assert_eq!(programs.programs.len(), 1);
    assert_eq!(programs.programs[0].fit_score, Some(0.92));
    assert_eq!(programs.programs[0].level, "diploma");

    let careers = report.careers().unwrap();
    assert_eq!(careers.data_source, ReasoningMode::AiCareerCounseling);
    assert_eq!(careers.career_suggestions[0].title, "ML Engineer");

    let aid = report.financial_aid().unwrap();
    assert_eq!(aid.data_source, ReasoningMode::AiFinancialCounseling);
    assert_eq!(aid.citizenship, "Singapore Citizen");
    assert_eq!(aid.aid_options.len(), 1);
    assert_eq!(aid.aid_options[0].name, "Higher Education Community Bursary");

    assert_eq!(report.summary.as_deref(), Some("Focus on the AI diploma."));
    let exports: Vec<_> = std::fs::read_dir(dir.path().join("exports"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(exports.len(), 1);
    let text = std::fs::read_to_string(&exports[0]).unwrap();
    assert!(text.contains("Focus on the AI diploma."));
    assert!(text.contains("- **Diploma in AI** (Temasek Polytechnic)"));
}

#[tokio::test]
async fn summary_placeholder_when_llm_is_down() {
    let dir = tempfile::tempdir().unwrap();
    let deps = test_deps(
        dir.path(),
        LlmService::unavailable(),
        EmbeddingProvider::offline(),
        Arc::new(ManualClock::default()),
    );
    let orchestrator = Orchestrator::from_deps(deps)
        .await
        .unwrap()
        .with_summarizer(true)
        .with_export_dir(None);

    let report = orchestrator.run(&ai_student()).await;
    assert_eq!(report.summary.as_deref(), Some(SUMMARY_UNAVAILABLE));
    assert!(!dir.path().join("exports").exists());
}

#[tokio::test]
async fn configured_steps_skip_unknown_names() {
    let dir = tempfile::tempdir().unwrap();
    let mut deps = test_deps(
        dir.path(),
        LlmService::unavailable(),
        EmbeddingProvider::offline(),
        Arc::new(ManualClock::default()),
    );
    let file_config = Arc::make_mut(&mut deps.file_config);
    file_config.agents.enabled = vec!["web_search".into(), "financial_aid".into()];
    file_config.orchestrator.use_vector_store = false;

    let orchestrator = Orchestrator::from_deps(deps).await.unwrap();
    assert_eq!(orchestrator.step_names(), vec!["financial_aid"]);

    let report = orchestrator
        .run(&StudentProfile::new("Lee").with_budget_category("low"))
        .await;
    let aid = report.financial_aid().unwrap();
    assert_eq!(aid.data_source, ReasoningMode::FallbackSimpleRanking);
    assert!(aid.aid_options.len() <= 6);
    assert!(!aid.aid_options.is_empty());
    assert!(!dir.path().join("vector_cache").exists());
}

#[tokio::test]
async fn disabled_store_reports_missing_program_data() {
    let dir = tempfile::tempdir().unwrap();
    let mut deps = test_deps(
        dir.path(),
        LlmService::unavailable(),
        EmbeddingProvider::offline(),
        Arc::new(ManualClock::default()),
    );
    let file_config = Arc::make_mut(&mut deps.file_config);
    file_config.agents.enabled = vec!["institutional_data".into()];
    file_config.orchestrator.use_vector_store = false;

    let orchestrator = Orchestrator::from_deps(deps).await.unwrap();
    let report = orchestrator.run(&ai_student()).await;
    let programs = report.programs().unwrap();
    assert!(programs.programs.is_empty());
    assert_eq!(programs.message.as_deref(), Some("Program database not available"));
}

#[tokio::test]
async fn builtin_catalog_is_cached_on_first_start() {
    let dir = tempfile::tempdir().unwrap();
    let deps = test_deps(
        dir.path(),
        LlmService::unavailable(),
        EmbeddingProvider::offline(),
        Arc::new(ManualClock::default()),
    );
    let cache_dir = deps.cache_dir();
    Orchestrator::from_deps(deps).await.unwrap();
    assert_eq!(cache_dir.files().unwrap().len(), 1);
}
