//! The recommendation pipeline: memoized fan-out of a profile to the
//! configured reasoning steps, plus the optional summary.

use std::any::Any;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::FutureExt;
use counsel_core::catalog;
use counsel_core::{AddOutcome, CounselDeps, MemoBuilder, MemoCache, StudentProfile};
use tracing::{info, warn};

use crate::aid;
use crate::export::export_summary;
use crate::report::{CounselReport, StepOutcome};
use crate::steps::{
    CareerGuidanceStep, FinancialAidStep, ProgramMatchStep, ReasoningStep, StepRequest,
    CAREER_GUIDANCE, FINANCIAL_AID, PROGRAM_MATCH,
};

pub const SUMMARY_UNAVAILABLE: &str = "(LLM summary unavailable - fill in manually)";

const MEMO_FUNCTION: &str = "counsel_run_v1";

pub struct Orchestrator {
    deps: CounselDeps,
    steps: Vec<Arc<dyn ReasoningStep>>,
    memo: MemoCache<CounselReport>,
    summarizer: bool,
    export_dir: Option<PathBuf>,
}

impl Orchestrator {
    /// Pipeline with explicit steps. Summary and export follow the config.
    pub fn new(deps: CounselDeps, steps: Vec<Arc<dyn ReasoningStep>>) -> Self {
        let orchestrator = &deps.file_config.orchestrator;
        let summarizer = orchestrator.summarizer;
        let export_dir = Some(orchestrator.export_dir.clone());
        let memo = deps.memo_cache();
        Self {
            deps,
            steps,
            memo,
            summarizer,
            export_dir,
        }
    }

    /// Load the catalogs, embed the programs and build the steps listed in
    /// `[agents].enabled`. Unknown step names are logged and skipped.
    pub async fn from_deps(deps: CounselDeps) -> Result<Self> {
        let file_config = deps.file_config.clone();
        let mut store = deps.similarity_store();

        if file_config.orchestrator.use_vector_store {
            let programs_path = file_config.data.programs.as_deref().map(|p| deps.resolve_path(p));
            let programs = catalog::load_or_builtin(programs_path.as_deref())?;
            let outcome = store
                .add_items(programs, file_config.vector_store.use_cache)
                .await
                .context("Program catalog is malformed")?;
            if let AddOutcome::CacheHit { count } = outcome {
                info!(count, "Program vectors restored from cache");
            }
        } else {
            info!("Similarity store disabled, program matching will report no data");
        }
        let store = Arc::new(store);

        let aid_path = file_config.data.financial_aid.as_deref().map(|p| deps.resolve_path(p));
        let aid_catalog = Arc::new(aid::load_or_builtin(aid_path.as_deref())?);

        let mut steps: Vec<Arc<dyn ReasoningStep>> = Vec::new();
        for name in &file_config.agents.enabled {
            match name.as_str() {
                PROGRAM_MATCH => steps.push(Arc::new(ProgramMatchStep::new(
                    store.clone(),
                    deps.llm.clone(),
                    deps.prompts.clone(),
                    file_config.orchestrator.search_top_k,
                ))),
                CAREER_GUIDANCE => steps.push(Arc::new(CareerGuidanceStep::new(
                    deps.llm.clone(),
                    deps.prompts.clone(),
                ))),
                FINANCIAL_AID => steps.push(Arc::new(FinancialAidStep::new(
                    aid_catalog.clone(),
                    deps.llm.clone(),
                    deps.prompts.clone(),
                ))),
                other => warn!(step = other, "Unknown step in [agents].enabled, skipping"),
            }
        }

        info!(
            steps = ?steps.iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
            programs = store.len(),
            "Orchestrator ready"
        );
        Ok(Self::new(deps, steps))
    }

    pub fn with_summarizer(mut self, enabled: bool) -> Self {
        self.summarizer = enabled;
        self
    }

    /// `None` disables summary export.
    pub fn with_export_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.export_dir = dir;
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step for `profile`. An identical profile within the TTL gets
    /// the stored report back with `cached = true`.
    pub async fn run(&self, profile: &StudentProfile) -> CounselReport {
        let memoized = MemoBuilder::new(MEMO_FUNCTION, profile, &self.memo)
            .get_or(|| async { Ok::<_, Infallible>(self.run_uncached(profile).await) })
            .await
            .unwrap_or_else(|never| match never {});

        let mut report = memoized.value;
        report.cached = memoized.cached;
        if report.cached {
            info!(student = %profile.name, "Returning memoized report");
        }
        report
    }

    async fn run_uncached(&self, profile: &StudentProfile) -> CounselReport {
        let mut report = CounselReport::new(profile.clone());

        for step in &self.steps {
            let request = StepRequest::new(profile).with_completed(&report.steps);
            let outcome = match AssertUnwindSafe(step.handle(&request)).catch_unwind().await {
                Ok(Ok(output)) => {
                    info!(step = step.name(), mode = ?output.mode(), "Step completed");
                    StepOutcome::Completed(output)
                }
                Ok(Err(e)) => {
                    warn!(step = step.name(), error = %e, "Step failed");
                    StepOutcome::Failed {
                        error: format!("{e:#}"),
                    }
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(step = step.name(), panic = %message, "Step panicked");
                    StepOutcome::Failed {
                        error: format!("step panicked: {message}"),
                    }
                }
            };
            report.steps.push((step.name().to_string(), outcome));
        }

        if self.summarizer {
            report.summary = Some(self.summarize(&report).await);
            self.export(&report);
        }

        report
    }

    async fn summarize(&self, report: &CounselReport) -> String {
        let step_json = |name: &str| {
            report
                .step(name)
                .and_then(|outcome| serde_json::to_string_pretty(outcome).ok())
                .unwrap_or_else(|| "{}".to_string())
        };
        let prompt = self.deps.prompts.summary_prompt(
            &report.student,
            &step_json(PROGRAM_MATCH),
            &step_json(CAREER_GUIDANCE),
            &step_json(FINANCIAL_AID),
        );

        match self.deps.llm.complete(&prompt).await {
            Some(summary) => summary.trim().to_string(),
            None => {
                warn!("Summary unavailable, using placeholder");
                SUMMARY_UNAVAILABLE.to_string()
            }
        }
    }

    fn export(&self, report: &CounselReport) {
        let Some(dir) = &self.export_dir else {
            return;
        };
        let ts = self.deps.clock.now().timestamp();
        match export_summary(dir, report, ts) {
            Ok(path) => info!(path = %path.display(), "Exported summary"),
            Err(e) => warn!(error = %e, "Failed to export summary"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
