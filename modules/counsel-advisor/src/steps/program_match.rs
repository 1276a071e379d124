use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use counsel_core::{
    CatalogItem, LlmService, PromptRegistry, ReasoningMode, SearchHit, SimilarityStore,
    StudentProfile,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{ask_for_array, ReasoningStep, StepRequest, PROGRAM_MATCH};
use crate::parse::{loose_f64, loose_text};
use crate::report::{ProgramMatches, ProgramRecommendation, StepOutput};

/// Candidates handed to the LLM after level filtering.
const CANDIDATE_LIMIT: usize = 8;
/// Recommendations returned.
const OUTPUT_LIMIT: usize = 5;
/// Catalog items without a level are treated as degrees.
const DEFAULT_ITEM_LEVEL: &str = "degree";

/// Semantic search over the program catalog, then LLM fit reasoning.
pub struct ProgramMatchStep {
    store: Arc<SimilarityStore>,
    llm: LlmService,
    prompts: Arc<PromptRegistry>,
    search_top_k: usize,
}

/// One program as the model describes it.
#[derive(Debug, Deserialize)]
struct ProgramFit {
    program_name: String,
    #[serde(default, deserialize_with = "loose_text")]
    institution: String,
    #[serde(default, deserialize_with = "loose_f64")]
    fit_score: Option<f64>,
    #[serde(default, deserialize_with = "loose_text")]
    counselor_reasoning: String,
    #[serde(default, deserialize_with = "loose_text")]
    career_insights: String,
    #[serde(default, deserialize_with = "loose_text")]
    local_advantage: String,
    #[serde(default, deserialize_with = "loose_text")]
    financial_note: String,
    #[serde(default, deserialize_with = "loose_text")]
    what_student_should_know: String,
}

impl ProgramMatchStep {
    pub fn new(
        store: Arc<SimilarityStore>,
        llm: LlmService,
        prompts: Arc<PromptRegistry>,
        search_top_k: usize,
    ) -> Self {
        Self {
            store,
            llm,
            prompts,
            search_top_k,
        }
    }

    async fn candidates(&self, profile: &StudentProfile) -> Vec<SearchHit> {
        let target_level = profile.target_level_or("degree");
        let query = search_query(profile);
        info!(query = %query, "Searching program catalog");

        self.store
            .search(&query, self.search_top_k)
            .await
            .into_iter()
            .filter(|hit| level_matches(target_level, item_level(&hit.item)))
            .take(CANDIDATE_LIMIT)
            .collect()
    }
}

#[async_trait]
impl ReasoningStep for ProgramMatchStep {
    fn name(&self) -> &str {
        PROGRAM_MATCH
    }

    async fn handle(&self, request: &StepRequest<'_>) -> Result<StepOutput> {
        let profile = request.profile;

        if self.store.is_empty() {
            return Ok(StepOutput::Programs(ProgramMatches {
                programs: Vec::new(),
                data_source: ReasoningMode::FallbackSimpleRanking,
                total_programs_analyzed: 0,
                message: Some("Program database not available".to_string()),
            }));
        }

        let candidates = self.candidates(profile).await;
        if candidates.is_empty() {
            return Ok(StepOutput::Programs(ProgramMatches {
                programs: Vec::new(),
                data_source: ReasoningMode::FallbackSimpleRanking,
                total_programs_analyzed: 0,
                message: Some("No programs match the specified criteria".to_string()),
            }));
        }

        let programs_json = serde_json::to_string_pretty(&candidate_summaries(&candidates))?;
        let prompt = self.prompts.program_fit_prompt(profile, &programs_json);
        let display_field = self.store.text_fields().display.as_str();

        let fits = ask_for_array::<ProgramFit>(&self.llm, PROGRAM_MATCH, &prompt).await;
        let (mut programs, mode): (Vec<ProgramRecommendation>, ReasoningMode) = match fits {
            Some(fits) => (
                fits.into_iter()
                    .map(|fit| from_fit(fit, &candidates, display_field, profile))
                    .collect(),
                ReasoningMode::AiCounselorReasoning,
            ),
            None => (
                fallback_ranking(&candidates, display_field),
                ReasoningMode::FallbackSimpleRanking,
            ),
        };
        programs.truncate(OUTPUT_LIMIT);

        Ok(StepOutput::Programs(ProgramMatches {
            programs,
            data_source: mode,
            total_programs_analyzed: candidates.len(),
            message: None,
        }))
    }
}

/// "Student interested in: ... Student strengths: ... Looking for ... programs Constraints: ..."
pub(crate) fn search_query(profile: &StudentProfile) -> String {
    let mut parts = Vec::new();
    if !profile.interests.is_empty() {
        parts.push(format!("Student interested in: {}", profile.interests_text()));
    }
    if !profile.strengths.is_empty() {
        parts.push(format!("Student strengths: {}", profile.strengths_text()));
    }
    let level = profile.target_level_or("degree");
    let level_phrase = match level {
        "diploma" => "polytechnic diploma",
        "degree" => "bachelor degree",
        "postgrad" => "master postgraduate",
        other => other,
    };
    parts.push(format!("Looking for {level_phrase} programs"));
    if !profile.constraints.is_empty() {
        let first: Vec<&str> = profile.constraints.iter().take(3).map(String::as_str).collect();
        parts.push(format!("Constraints: {}", first.join(", ")));
    }
    parts.join(" ")
}

/// A diploma target keeps only diplomas; a degree target drops them.
fn level_matches(target: &str, item_level: &str) -> bool {
    match target {
        "diploma" => item_level == "diploma",
        "degree" => item_level != "diploma",
        _ => true,
    }
}

fn item_level(item: &CatalogItem) -> &str {
    item.get("level")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_ITEM_LEVEL)
}

fn text(item: &CatalogItem, field: &str) -> String {
    item.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn candidate_summaries(candidates: &[SearchHit]) -> Vec<Value> {
    candidates
        .iter()
        .map(|hit| {
            let mut summary = hit.item.clone();
            summary.insert("semantic_match_score".to_string(), Value::from(hit.score));
            Value::Object(summary)
        })
        .collect()
}

fn from_fit(
    fit: ProgramFit,
    candidates: &[SearchHit],
    display_field: &str,
    profile: &StudentProfile,
) -> ProgramRecommendation {
    let matched = candidates
        .iter()
        .find(|hit| hit.item.get(display_field).and_then(Value::as_str) == Some(fit.program_name.as_str()));

    let institution = match (&fit.institution, matched) {
        (name, _) if !name.is_empty() => name.clone(),
        (_, Some(hit)) => text(&hit.item, "institution"),
        _ => String::new(),
    };

    ProgramRecommendation {
        title: fit.program_name,
        institution,
        level: matched
            .map(|hit| item_level(&hit.item).to_string())
            .unwrap_or_else(|| profile.target_level_or("degree").to_string()),
        duration_years: matched.and_then(|hit| hit.item.get("duration_years").cloned()),
        field: matched.map(|hit| text(&hit.item, "field")).unwrap_or_default(),
        fit_reasoning: fit.counselor_reasoning,
        fit_score: fit.fit_score,
        similarity: matched.map(|hit| hit.score),
        career_alignment: fit.career_insights,
        local_context: fit.local_advantage,
        financial_fit: fit.financial_note,
        what_to_know: fit.what_student_should_know,
        reasoning_type: ReasoningMode::AiCounselorReasoning,
    }
}

fn fallback_ranking(candidates: &[SearchHit], display_field: &str) -> Vec<ProgramRecommendation> {
    candidates
        .iter()
        .take(OUTPUT_LIMIT)
        .map(|hit| ProgramRecommendation {
            title: text(&hit.item, display_field),
            institution: text(&hit.item, "institution"),
            level: item_level(&hit.item).to_string(),
            duration_years: hit.item.get("duration_years").cloned(),
            field: text(&hit.item, "field"),
            fit_reasoning: format!(
                "Matched via semantic search (similarity: {:.0}%)",
                hit.score * 100.0
            ),
            fit_score: None,
            similarity: Some(hit.score),
            career_alignment: String::new(),
            local_context: String::new(),
            financial_fit: String::new(),
            what_to_know: String::new(),
            reasoning_type: ReasoningMode::FallbackSimpleRanking,
        })
        .collect()
}
