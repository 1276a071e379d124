use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use counsel_core::{LlmService, PromptRegistry, ReasoningMode};
use serde::Deserialize;

use super::{ask_for_array, ReasoningStep, StepRequest, CAREER_GUIDANCE};
use crate::parse::loose_text;
use crate::report::{CareerGuidance, CareerOutlook, CareerSuggestion, StepOutput};

const OUTPUT_LIMIT: usize = 5;
/// Interests considered by the keyword fallback.
const FALLBACK_INTERESTS: usize = 3;
/// Earlier program recommendations mentioned in the prompt.
const CONSIDERED_PROGRAMS: usize = 3;

struct CareerTemplate {
    keyword: &'static str,
    title: &'static str,
    salary: &'static str,
    skills: &'static [&'static str],
}

const CAREER_MAP: &[CareerTemplate] = &[
    CareerTemplate {
        keyword: "artificial intelligence",
        title: "AI Engineer / Machine Learning Specialist",
        salary: "S$5,000 - S$7,000/month (starting)",
        skills: &["Python", "Machine Learning", "Deep Learning", "Data Analysis"],
    },
    CareerTemplate {
        keyword: "data science",
        title: "Data Scientist",
        salary: "S$4,500 - S$6,500/month (starting)",
        skills: &["Python", "Statistics", "SQL", "Data Visualization"],
    },
    CareerTemplate {
        keyword: "finance",
        title: "Financial Analyst / FinTech Specialist",
        salary: "S$4,000 - S$6,000/month (starting)",
        skills: &["Financial Modeling", "Excel", "SQL", "Business Analysis"],
    },
    CareerTemplate {
        keyword: "business",
        title: "Business Analyst / Consultant",
        salary: "S$3,800 - S$5,500/month (starting)",
        skills: &[
            "Business Analysis",
            "Project Management",
            "Stakeholder Management",
            "Data Analysis",
        ],
    },
    CareerTemplate {
        keyword: "engineering",
        title: "Software Engineer / Engineer",
        salary: "S$4,000 - S$6,000/month (starting)",
        skills: &["Programming", "System Design", "Problem Solving", "Technical Skills"],
    },
];

const GENERIC_SALARY: &str = "S$3,500 - S$5,000/month (starting)";
const GENERIC_SKILLS: &[&str] = &[
    "Critical Thinking",
    "Communication",
    "Problem Solving",
    "Technical Skills",
];

/// Career paths for the student's interests.
pub struct CareerGuidanceStep {
    llm: LlmService,
    prompts: Arc<PromptRegistry>,
}

#[derive(Debug, Default, Deserialize)]
struct SalaryRange {
    #[serde(default, deserialize_with = "loose_text")]
    starting: String,
    #[serde(default, deserialize_with = "loose_text")]
    five_years: String,
}

/// One career as the model describes it.
#[derive(Debug, Deserialize)]
struct CareerPath {
    title: String,
    #[serde(default, deserialize_with = "loose_text")]
    fit_reasoning: String,
    #[serde(default, deserialize_with = "loose_text")]
    local_demand: String,
    #[serde(default, deserialize_with = "loose_text")]
    career_path: String,
    #[serde(default)]
    salary_range: SalaryRange,
    #[serde(default)]
    key_skills: Vec<String>,
    #[serde(default, deserialize_with = "loose_text")]
    where_to_work: String,
    #[serde(default, deserialize_with = "loose_text")]
    growth_potential: String,
}

impl From<CareerPath> for CareerSuggestion {
    fn from(career: CareerPath) -> Self {
        Self {
            title: career.title,
            description: career.fit_reasoning,
            required_skills: career.key_skills,
            outlook: CareerOutlook {
                demand: career.local_demand,
                salary_range: format!(
                    "{} (starting) → {} (5 years)",
                    career.salary_range.starting, career.salary_range.five_years
                ),
                where_to_work: career.where_to_work,
                growth_potential: career.growth_potential,
            },
            career_path: career.career_path,
            reasoning_type: ReasoningMode::AiCareerCounseling,
        }
    }
}

impl CareerGuidanceStep {
    pub fn new(llm: LlmService, prompts: Arc<PromptRegistry>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl ReasoningStep for CareerGuidanceStep {
    fn name(&self) -> &str {
        CAREER_GUIDANCE
    }

    async fn handle(&self, request: &StepRequest<'_>) -> Result<StepOutput> {
        let profile = request.profile;
        if profile.interests.is_empty() {
            return Ok(StepOutput::Careers(CareerGuidance {
                career_suggestions: Vec::new(),
                data_source: ReasoningMode::FallbackBasic,
                message: Some("No interests provided for career guidance".to_string()),
            }));
        }

        let considered = request.considered_programs(CONSIDERED_PROGRAMS);
        let prompt = self.prompts.career_guidance_prompt(profile, &considered);

        let (mut careers, mode): (Vec<CareerSuggestion>, ReasoningMode) =
            match ask_for_array::<CareerPath>(&self.llm, CAREER_GUIDANCE, &prompt).await {
                Some(paths) => (
                    paths.into_iter().map(CareerSuggestion::from).collect(),
                    ReasoningMode::AiCareerCounseling,
                ),
                None => (fallback_careers(&profile.interests), ReasoningMode::FallbackBasic),
            };
        careers.truncate(OUTPUT_LIMIT);

        Ok(StepOutput::Careers(CareerGuidance {
            career_suggestions: careers,
            data_source: mode,
            message: None,
        }))
    }
}

/// Keyword lookup for the first few interests; anything unmapped becomes
/// "<interest> Professional".
pub(crate) fn fallback_careers(interests: &[String]) -> Vec<CareerSuggestion> {
    interests
        .iter()
        .take(FALLBACK_INTERESTS)
        .map(|interest| {
            let lower = interest.to_lowercase();
            let (title, salary, skills) = match CAREER_MAP.iter().find(|c| lower.contains(c.keyword)) {
                Some(c) => (c.title.to_string(), c.salary, c.skills),
                None => (format!("{interest} Professional"), GENERIC_SALARY, GENERIC_SKILLS),
            };
            CareerSuggestion {
                title,
                description: format!("Career path related to {interest} (fallback - basic suggestion)"),
                required_skills: skills.iter().map(|s| s.to_string()).collect(),
                outlook: CareerOutlook {
                    demand: "Refer to local job market data".to_string(),
                    salary_range: salary.to_string(),
                    ..CareerOutlook::default()
                },
                career_path: String::new(),
                reasoning_type: ReasoningMode::FallbackBasic,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fallback_maps_known_interests() {
        let careers = fallback_careers(&strings(&["Artificial Intelligence", "Finance"]));
        assert_eq!(careers.len(), 2);
        assert_eq!(careers[0].title, "AI Engineer / Machine Learning Specialist");
        assert_eq!(careers[1].title, "Financial Analyst / FinTech Specialist");
        assert!(careers.iter().all(|c| c.reasoning_type == ReasoningMode::FallbackBasic));
    }

    #[test]
    fn fallback_uses_generic_title_and_first_three_interests() {
        let careers = fallback_careers(&strings(&["Music", "Cooking", "Sports", "Art"]));
        assert_eq!(careers.len(), 3);
        assert_eq!(careers[0].title, "Music Professional");
        assert_eq!(careers[0].outlook.salary_range, GENERIC_SALARY);
    }

    #[test]
    fn llm_career_maps_salary_range() {
        let career: CareerPath = serde_json::from_str(
            r#"{"title": "Data Engineer", "fit_reasoning": "fits",
                "salary_range": {"starting": "S$4,500", "five_years": "S$8,000"},
                "key_skills": ["SQL"], "where_to_work": ["GovTech", "DBS"]}"#,
        )
        .unwrap();
        let suggestion = CareerSuggestion::from(career);
        assert_eq!(suggestion.outlook.salary_range, "S$4,500 (starting) → S$8,000 (5 years)");
        assert_eq!(suggestion.outlook.where_to_work, "GovTech, DBS");
        assert_eq!(suggestion.required_skills, vec!["SQL"]);
    }
}
