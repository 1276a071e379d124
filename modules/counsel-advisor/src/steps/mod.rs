//! The reasoning steps a profile is fanned out to.

mod career_guidance;
mod financial_aid;
mod program_match;

pub use career_guidance::CareerGuidanceStep;
pub use financial_aid::FinancialAidStep;
pub use program_match::ProgramMatchStep;

use anyhow::Result;
use async_trait::async_trait;
use counsel_core::{LlmService, StudentProfile};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::parse::parse_json_array;
use crate::report::{StepOutcome, StepOutput};

pub const PROGRAM_MATCH: &str = "institutional_data";
pub const CAREER_GUIDANCE: &str = "career_guidance";
pub const FINANCIAL_AID: &str = "financial_aid";

/// One isolated unit of the recommendation pipeline.
///
/// An `Err` is recorded as `{error}` under the step's name; it never stops
/// the remaining steps.
#[async_trait]
pub trait ReasoningStep: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, request: &StepRequest<'_>) -> Result<StepOutput>;
}

/// What a step sees: the profile plus the outcomes of the steps before it.
#[derive(Debug, Clone, Copy)]
pub struct StepRequest<'a> {
    pub profile: &'a StudentProfile,
    pub completed: &'a [(String, StepOutcome)],
}

impl<'a> StepRequest<'a> {
    pub fn new(profile: &'a StudentProfile) -> Self {
        Self {
            profile,
            completed: &[],
        }
    }

    pub fn with_completed(mut self, completed: &'a [(String, StepOutcome)]) -> Self {
        self.completed = completed;
        self
    }

    /// Titles of up to `limit` programs recommended by an earlier step.
    pub fn considered_programs(&self, limit: usize) -> Vec<String> {
        self.completed
            .iter()
            .find_map(|(_, outcome)| match outcome.output() {
                Some(StepOutput::Programs(matches)) => Some(matches),
                _ => None,
            })
            .map(|matches| {
                matches
                    .programs
                    .iter()
                    .take(limit)
                    .map(|p| p.title.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Ask the LLM and parse a non-empty JSON array from its answer. `None` means
/// the caller should use its rule-based fallback.
pub(crate) async fn ask_for_array<T: DeserializeOwned>(
    llm: &LlmService,
    step: &str,
    prompt: &str,
) -> Option<Vec<T>> {
    if !llm.is_available() {
        info!(step, "No LLM backend, using fallback");
        return None;
    }

    let response = llm.complete(prompt).await?;
    match parse_json_array::<T>(&response) {
        Ok(items) if !items.is_empty() => Some(items),
        Ok(_) => {
            warn!(step, "LLM returned an empty list, using fallback");
            None
        }
        Err(e) => {
            warn!(step, error = %e, "Unparseable LLM response, using fallback");
            None
        }
    }
}
