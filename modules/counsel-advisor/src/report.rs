use counsel_core::{ReasoningMode, StudentProfile};
use serde::{Serialize, Serializer};
use serde_json::Value;

// =============================================================================
// Program matching
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramRecommendation {
    pub title: String,
    pub institution: String,
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_years: Option<Value>,
    pub field: String,
    pub fit_reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit_score: Option<f64>,
    /// Cosine score from the similarity search, when the program was a candidate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub career_alignment: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub local_context: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub financial_fit: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub what_to_know: String,
    pub reasoning_type: ReasoningMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramMatches {
    pub programs: Vec<ProgramRecommendation>,
    pub data_source: ReasoningMode,
    pub total_programs_analyzed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Career guidance
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CareerOutlook {
    pub demand: String,
    pub salary_range: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub where_to_work: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub growth_potential: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CareerSuggestion {
    pub title: String,
    pub description: String,
    pub required_skills: Vec<String>,
    pub outlook: CareerOutlook,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub career_path: String,
    pub reasoning_type: ReasoningMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CareerGuidance {
    pub career_suggestions: Vec<CareerSuggestion>,
    pub data_source: ReasoningMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Financial aid
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AidRecommendation {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fit_reasoning: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub expected_benefit: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub application_difficulty: String,
    pub application_process: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub application_advice: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub combination_strategy: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub important_notes: String,
    pub bond_requirement: String,
    pub website: String,
    pub reasoning_type: ReasoningMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AidGuidance {
    pub aid_options: Vec<AidRecommendation>,
    pub data_source: ReasoningMode,
    pub citizenship: String,
    pub total_eligible: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Step outcomes and the combined report
// =============================================================================

/// Structured output of one reasoning step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepOutput {
    Programs(ProgramMatches),
    Careers(CareerGuidance),
    FinancialAid(AidGuidance),
}

impl StepOutput {
    pub fn mode(&self) -> ReasoningMode {
        match self {
            Self::Programs(p) => p.data_source,
            Self::Careers(c) => c.data_source,
            Self::FinancialAid(a) => a.data_source,
        }
    }
}

/// A step's output, or the error it failed with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepOutcome {
    Completed(StepOutput),
    Failed { error: String },
}

impl StepOutcome {
    pub fn output(&self) -> Option<&StepOutput> {
        match self {
            Self::Completed(output) => Some(output),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error } => Some(error),
            Self::Completed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounselReport {
    pub student: StudentProfile,
    /// Step name to outcome, in execution order.
    #[serde(serialize_with = "serialize_steps")]
    pub steps: Vec<(String, StepOutcome)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cached: bool,
}

impl CounselReport {
    pub fn new(student: StudentProfile) -> Self {
        Self {
            student,
            steps: Vec::new(),
            summary: None,
            cached: false,
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    pub fn programs(&self) -> Option<&ProgramMatches> {
        self.steps.iter().find_map(|(_, o)| match o.output() {
            Some(StepOutput::Programs(p)) => Some(p),
            _ => None,
        })
    }

    pub fn careers(&self) -> Option<&CareerGuidance> {
        self.steps.iter().find_map(|(_, o)| match o.output() {
            Some(StepOutput::Careers(c)) => Some(c),
            _ => None,
        })
    }

    pub fn financial_aid(&self) -> Option<&AidGuidance> {
        self.steps.iter().find_map(|(_, o)| match o.output() {
            Some(StepOutput::FinancialAid(a)) => Some(a),
            _ => None,
        })
    }
}

fn serialize_steps<S: Serializer>(
    steps: &[(String, StepOutcome)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(steps.iter().map(|(name, outcome)| (name, outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_step_serializes_as_error_object() {
        let outcome = StepOutcome::Failed {
            error: "boom".into(),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"error": "boom"})
        );
    }

    #[test]
    fn report_keeps_step_order_and_hides_cached_false() {
        let mut report = CounselReport::new(StudentProfile::new("Ana"));
        report.steps.push((
            "zeta".into(),
            StepOutcome::Failed { error: "x".into() },
        ));
        report.steps.push((
            "alpha".into(),
            StepOutcome::Failed { error: "y".into() },
        ));

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.find("zeta").unwrap() < json.find("alpha").unwrap());
        assert!(!json.contains("cached"));
        assert!(!json.contains("summary"));

        report.cached = true;
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["cached"], true);
        assert_eq!(value["steps"]["alpha"]["error"], "y");
    }

    #[test]
    fn careers_output_serializes_flat() {
        let outcome = StepOutcome::Completed(StepOutput::Careers(CareerGuidance {
            career_suggestions: Vec::new(),
            data_source: ReasoningMode::FallbackBasic,
            message: Some("No interests provided for career guidance".into()),
        }));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["data_source"], "fallback_basic");
        assert_eq!(value["career_suggestions"], serde_json::json!([]));
    }
}
