use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A catalog entry (typically a program). Opaque beyond the display and
/// keyword fields the similarity store reads.
pub type CatalogItem = Map<String, Value>;

// =============================================================================
// Student profile
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub name: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub target_level: Option<String>,
    #[serde(default)]
    pub budget_category: Option<String>,
}

impl StudentProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interests: Vec::new(),
            strengths: Vec::new(),
            constraints: Vec::new(),
            target_level: None,
            budget_category: None,
        }
    }

    pub fn with_interests<S: Into<String>>(mut self, interests: impl IntoIterator<Item = S>) -> Self {
        self.interests = interests.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_strengths<S: Into<String>>(mut self, strengths: impl IntoIterator<Item = S>) -> Self {
        self.strengths = strengths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_constraints<S: Into<String>>(
        mut self,
        constraints: impl IntoIterator<Item = S>,
    ) -> Self {
        self.constraints = constraints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_target_level(mut self, level: impl Into<String>) -> Self {
        self.target_level = Some(level.into());
        self
    }

    pub fn with_budget_category(mut self, budget: impl Into<String>) -> Self {
        self.budget_category = Some(budget.into());
        self
    }

    /// Target level, or `default` when the student left it blank.
    pub fn target_level_or<'a>(&'a self, default: &'a str) -> &'a str {
        non_blank(self.target_level.as_deref()).unwrap_or(default)
    }

    /// Budget band, or `default` when the student left it blank.
    pub fn budget_or<'a>(&'a self, default: &'a str) -> &'a str {
        non_blank(self.budget_category.as_deref()).unwrap_or(default)
    }

    pub fn interests_text(&self) -> String {
        self.interests.join(", ")
    }

    pub fn strengths_text(&self) -> String {
        self.strengths.join(", ")
    }

    /// Constraints joined for a prompt, or `none` when there are none.
    pub fn constraints_text_or(&self, none: &str) -> String {
        if self.constraints.is_empty() {
            none.to_string()
        } else {
            self.constraints.join(", ")
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Search results
// =============================================================================

/// One similarity-search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub item: CatalogItem,
    /// Cosine similarity rounded to 4 decimal places.
    pub score: f64,
    pub query: String,
}

// =============================================================================
// Reasoning mode
// =============================================================================

/// Which path produced a step's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningMode {
    AiCounselorReasoning,
    AiCareerCounseling,
    AiFinancialCounseling,
    FallbackSimpleRanking,
    FallbackBasic,
}

impl ReasoningMode {
    pub fn is_fallback(self) -> bool {
        matches!(self, Self::FallbackSimpleRanking | Self::FallbackBasic)
    }
}
