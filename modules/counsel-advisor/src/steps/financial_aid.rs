use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use counsel_core::{LlmService, PromptRegistry, ReasoningMode};
use serde::Deserialize;
use serde_json::json;

use super::{ask_for_array, ReasoningStep, StepRequest, FINANCIAL_AID};
use crate::aid::{citizenship_from_constraints, AidOption};
use crate::parse::loose_text;
use crate::report::{AidGuidance, AidRecommendation, StepOutput};

const OUTPUT_LIMIT: usize = 6;

/// Budget bands that make need-based aid the priority.
const TIGHT_BUDGETS: &[&str] = &["tight", "low"];

/// Eligibility filtering over the aid catalog, then LLM prioritisation.
pub struct FinancialAidStep {
    catalog: Arc<Vec<AidOption>>,
    llm: LlmService,
    prompts: Arc<PromptRegistry>,
}

/// One aid option as the model ranks it.
#[derive(Debug, Deserialize)]
struct AidAdvice {
    name: String,
    #[serde(default, deserialize_with = "loose_text")]
    priority: String,
    #[serde(default, deserialize_with = "loose_text")]
    fit_reasoning: String,
    #[serde(default, deserialize_with = "loose_text")]
    expected_benefit: String,
    #[serde(default, deserialize_with = "loose_text")]
    application_difficulty: String,
    #[serde(default, deserialize_with = "loose_text")]
    application_advice: String,
    #[serde(default, deserialize_with = "loose_text")]
    combination_strategy: String,
    #[serde(default, deserialize_with = "loose_text")]
    important_notes: String,
}

impl FinancialAidStep {
    pub fn new(catalog: Arc<Vec<AidOption>>, llm: LlmService, prompts: Arc<PromptRegistry>) -> Self {
        Self {
            catalog,
            llm,
            prompts,
        }
    }
}

#[async_trait]
impl ReasoningStep for FinancialAidStep {
    fn name(&self) -> &str {
        FINANCIAL_AID
    }

    async fn handle(&self, request: &StepRequest<'_>) -> Result<StepOutput> {
        let profile = request.profile;
        let citizenship = citizenship_from_constraints(&profile.constraints);
        let target_level = profile.target_level_or("degree");
        let budget = profile.budget_or("moderate");

        let empty = |message: &str| {
            StepOutput::FinancialAid(AidGuidance {
                aid_options: Vec::new(),
                data_source: ReasoningMode::FallbackSimpleRanking,
                citizenship: citizenship.to_string(),
                total_eligible: 0,
                message: Some(message.to_string()),
            })
        };

        if self.catalog.is_empty() {
            return Ok(empty("Financial aid database not available"));
        }

        let eligible: Vec<&AidOption> = self
            .catalog
            .iter()
            .filter(|aid| aid.is_eligible(citizenship, target_level))
            .collect();
        if eligible.is_empty() {
            return Ok(empty("No matching financial aid options found for your profile"));
        }

        let aid_json = serde_json::to_string_pretty(&aid_summaries(&eligible))?;
        let prompt = self.prompts.financial_aid_prompt(profile, citizenship, &aid_json);

        let advised = ask_for_array::<AidAdvice>(&self.llm, FINANCIAL_AID, &prompt)
            .await
            .map(|advice| from_advice(advice, &eligible))
            .filter(|recs| !recs.is_empty());

        let (mut aid_options, mode) = match advised {
            Some(recs) => (recs, ReasoningMode::AiFinancialCounseling),
            None => (
                fallback_ranking(&eligible, budget),
                ReasoningMode::FallbackSimpleRanking,
            ),
        };
        aid_options.truncate(OUTPUT_LIMIT);

        Ok(StepOutput::FinancialAid(AidGuidance {
            aid_options,
            data_source: mode,
            citizenship: citizenship.to_string(),
            total_eligible: eligible.len(),
            message: None,
        }))
    }
}

fn aid_summaries(eligible: &[&AidOption]) -> Vec<serde_json::Value> {
    eligible
        .iter()
        .map(|aid| {
            json!({
                "name": aid.name,
                "type": aid.kind,
                "category": aid.category,
                "amount": aid.amount,
                "description": aid.description,
                "application_process": aid.application_process,
                "bond_requirement": aid.bond_requirement,
            })
        })
        .collect()
}

/// Keep advice only for options that are actually eligible (models invent names).
fn from_advice(advice: Vec<AidAdvice>, eligible: &[&AidOption]) -> Vec<AidRecommendation> {
    let mut seen = HashSet::new();
    advice
        .into_iter()
        .filter_map(|rec| {
            let aid = eligible.iter().find(|a| a.name == rec.name)?;
            if !seen.insert(aid.name.clone()) {
                return None;
            }
            Some(AidRecommendation {
                name: rec.name,
                kind: aid.kind.clone(),
                amount: aid.amount.clone(),
                priority: Some(if rec.priority.is_empty() {
                    "Medium".to_string()
                } else {
                    rec.priority
                }),
                fit_reasoning: rec.fit_reasoning,
                expected_benefit: rec.expected_benefit,
                application_difficulty: rec.application_difficulty,
                application_process: aid.application_process.clone(),
                application_advice: rec.application_advice,
                combination_strategy: rec.combination_strategy,
                important_notes: rec.important_notes,
                bond_requirement: aid.bond_requirement.clone(),
                website: aid.website.clone(),
                reasoning_type: ReasoningMode::AiFinancialCounseling,
            })
        })
        .collect()
}

/// +3 need-based on a tight budget, +2 universal, +2 government scheme, +1 no bond.
pub(crate) fn priority_score(aid: &AidOption, budget: &str) -> u32 {
    let tight = TIGHT_BUDGETS.iter().any(|b| b.eq_ignore_ascii_case(budget));
    let mut score = 0;
    if tight && aid.category == "need-based" {
        score += 3;
    }
    if aid.category == "universal" {
        score += 2;
    }
    if aid.kind.to_lowercase().contains("government") {
        score += 2;
    }
    if !aid.has_bond() {
        score += 1;
    }
    score
}

/// Stable sort by priority score, best first.
fn fallback_ranking(eligible: &[&AidOption], budget: &str) -> Vec<AidRecommendation> {
    let mut ranked: Vec<&AidOption> = eligible.to_vec();
    ranked.sort_by_key(|aid| Reverse(priority_score(aid, budget)));
    ranked
        .into_iter()
        .map(|aid| AidRecommendation {
            name: aid.name.clone(),
            kind: aid.kind.clone(),
            amount: aid.amount.clone(),
            priority: None,
            fit_reasoning: aid.description.clone(),
            expected_benefit: String::new(),
            application_difficulty: String::new(),
            application_process: aid.application_process.clone(),
            application_advice: String::new(),
            combination_strategy: String::new(),
            important_notes: String::new(),
            bond_requirement: aid.bond_requirement.clone(),
            website: aid.website.clone(),
            reasoning_type: ReasoningMode::FallbackSimpleRanking,
        })
        .collect()
}
