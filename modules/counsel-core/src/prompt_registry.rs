use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use crate::file_config::{FileConfig, PromptsConfig};
use crate::template::{resolve_config_vars, resolve_runtime_vars, validate_template};
use crate::types::StudentProfile;

const BUILTIN_PROGRAM_FIT: &str = include_str!("../prompts/program_fit.md");
const BUILTIN_CAREER_GUIDANCE: &str = include_str!("../prompts/career_guidance.md");
const BUILTIN_FINANCIAL_AID: &str = include_str!("../prompts/financial_aid.md");
const BUILTIN_SUMMARY: &str = include_str!("../prompts/summary.md");

/// Allowed runtime variables per prompt type.
const PROGRAM_FIT_RUNTIME_VARS: &[&str] = &[
    "interests",
    "strengths",
    "target_level",
    "budget_category",
    "constraints",
    "programs_json",
];
const CAREER_RUNTIME_VARS: &[&str] = &[
    "interests",
    "strengths",
    "target_level",
    "constraints",
    "programs_context",
];
const FINANCIAL_AID_RUNTIME_VARS: &[&str] = &[
    "budget_category",
    "citizenship",
    "target_level",
    "interests",
    "constraints",
    "aid_json",
];
const SUMMARY_RUNTIME_VARS: &[&str] = &[
    "student_name",
    "interests",
    "strengths",
    "target_level",
    "budget_category",
    "constraints",
    "program_data",
    "career_data",
    "financial_data",
];

/// Pre-resolved prompt templates (config vars resolved, runtime vars intact).
///
/// Built once at startup and handed to each reasoning step; there is no
/// process-wide instance.
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    program_fit: String,
    career_guidance: String,
    financial_aid: String,
    summary: String,
}

impl PromptRegistry {
    /// Load every prompt (file override or built-in), resolve config vars and
    /// validate runtime vars.
    pub fn load(config: &FileConfig, config_dir: &Path) -> Result<Self> {
        let toml_value = config.to_toml_value()?;
        let prompts: &PromptsConfig = &config.prompts;

        Ok(Self {
            program_fit: load_and_resolve(
                prompts.program_fit.as_deref(),
                BUILTIN_PROGRAM_FIT,
                config_dir,
                &toml_value,
                PROGRAM_FIT_RUNTIME_VARS,
                "program_fit",
            )?,
            career_guidance: load_and_resolve(
                prompts.career_guidance.as_deref(),
                BUILTIN_CAREER_GUIDANCE,
                config_dir,
                &toml_value,
                CAREER_RUNTIME_VARS,
                "career_guidance",
            )?,
            financial_aid: load_and_resolve(
                prompts.financial_aid.as_deref(),
                BUILTIN_FINANCIAL_AID,
                config_dir,
                &toml_value,
                FINANCIAL_AID_RUNTIME_VARS,
                "financial_aid",
            )?,
            summary: load_and_resolve(
                prompts.summary.as_deref(),
                BUILTIN_SUMMARY,
                config_dir,
                &toml_value,
                SUMMARY_RUNTIME_VARS,
                "summary",
            )?,
        })
    }

    /// Built-in templates resolved against the default config.
    pub fn builtin() -> Result<Self> {
        Self::load(&FileConfig::default(), Path::new("."))
    }

    /// Program-fit prompt for the candidates serialized in `programs_json`.
    pub fn program_fit_prompt(&self, profile: &StudentProfile, programs_json: &str) -> String {
        let mut vars = profile_vars(profile);
        vars.insert("programs_json", programs_json.to_string());
        resolve_runtime_vars(&self.program_fit, &vars)
    }

    /// Career prompt; `programs_considered` may be empty.
    pub fn career_guidance_prompt(
        &self,
        profile: &StudentProfile,
        programs_considered: &[String],
    ) -> String {
        let mut vars = profile_vars(profile);
        vars.insert("constraints", profile.constraints_text_or("None"));
        let context = if programs_considered.is_empty() {
            String::new()
        } else {
            format!(
                "Student is considering these programs: {}",
                programs_considered.join(", ")
            )
        };
        vars.insert("programs_context", context);
        resolve_runtime_vars(&self.career_guidance, &vars)
    }

    pub fn financial_aid_prompt(
        &self,
        profile: &StudentProfile,
        citizenship: &str,
        aid_json: &str,
    ) -> String {
        let mut vars = profile_vars(profile);
        vars.insert("constraints", profile.constraints_text_or("None"));
        vars.insert("citizenship", citizenship.to_string());
        vars.insert("aid_json", aid_json.to_string());
        resolve_runtime_vars(&self.financial_aid, &vars)
    }

    /// Summary prompt over the JSON of each step's output.
    pub fn summary_prompt(
        &self,
        profile: &StudentProfile,
        program_data: &str,
        career_data: &str,
        financial_data: &str,
    ) -> String {
        let mut vars = profile_vars(profile);
        vars.insert("student_name", profile.name.clone());
        vars.insert("target_level", profile.target_level_or("Bachelor").to_string());
        vars.insert("budget_category", profile.budget_or("Medium").to_string());
        vars.insert("program_data", program_data.to_string());
        vars.insert("career_data", career_data.to_string());
        vars.insert("financial_data", financial_data.to_string());
        resolve_runtime_vars(&self.summary, &vars)
    }
}

/// Variables every prompt shares. Blank values become "N/A".
fn profile_vars(profile: &StudentProfile) -> HashMap<&'static str, String> {
    let or_na = |s: String| if s.trim().is_empty() { "N/A".to_string() } else { s };
    HashMap::from([
        ("interests", or_na(profile.interests_text())),
        ("strengths", or_na(profile.strengths_text())),
        ("target_level", profile.target_level_or("degree").to_string()),
        ("budget_category", profile.budget_or("moderate").to_string()),
        ("constraints", profile.constraints_text_or("None specified")),
    ])
}

/// Load a prompt (override file or built-in text), resolve config-time variables, and validate.
fn load_and_resolve(
    override_path: Option<&Path>,
    builtin: &str,
    config_dir: &Path,
    toml_value: &toml::Value,
    allowed_runtime: &[&str],
    prompt_name: &str,
) -> Result<String> {
    let (content, source) = match override_path {
        Some(relative) => {
            let full_path = FileConfig::resolve_path(config_dir, relative);
            let content = std::fs::read_to_string(&full_path).with_context(|| {
                format!(
                    "Failed to read {} prompt file: {}",
                    prompt_name,
                    full_path.display()
                )
            })?;
            (content, full_path.display().to_string())
        }
        None => (builtin.to_string(), "<built-in>".to_string()),
    };

    if content.trim().is_empty() {
        anyhow::bail!("Prompt file is empty: {} ({})", source, prompt_name);
    }

    let resolved = resolve_config_vars(&content, toml_value).with_context(|| {
        format!(
            "Failed to resolve config variables in {} prompt: {}",
            prompt_name, source
        )
    })?;

    validate_template(&resolved, toml_value, allowed_runtime).with_context(|| {
        format!(
            "Template validation failed for {} prompt: {}",
            prompt_name, source
        )
    })?;

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn profile() -> StudentProfile {
        StudentProfile::new("Alex")
            .with_interests(["AI", "Finance"])
            .with_strengths(["Math"])
            .with_budget_category("low")
    }

    #[test]
    fn builtin_templates_resolve_and_validate() {
        let registry = PromptRegistry::builtin().unwrap();
        let prompt = registry.program_fit_prompt(&profile(), "[]");
        assert!(prompt.contains("Singapore"));
        assert!(prompt.contains("Interests: AI, Finance"));
        assert!(prompt.contains("Budget Category: low"));
        assert!(prompt.contains("Target Level: degree"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn career_prompt_mentions_considered_programs() {
        let registry = PromptRegistry::builtin().unwrap();
        let prompt = registry.career_guidance_prompt(&profile(), &["Diploma in AI".to_string()]);
        assert!(prompt.contains("Student is considering these programs: Diploma in AI"));
        assert!(prompt.contains("Constraints: None"));
    }

    #[test]
    fn summary_prompt_uses_summary_defaults() {
        let registry = PromptRegistry::builtin().unwrap();
        let prompt = registry.summary_prompt(&StudentProfile::new("Jo"), "{}", "{}", "{}");
        assert!(prompt.contains("summary for Jo"));
        assert!(prompt.contains("Target level: Bachelor"));
        assert!(prompt.contains("Interests: N/A"));
    }

    #[test]
    fn override_file_is_loaded_relative_to_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("summary.md"), "Hi {{student_name}} from {{config.identity.region}}").unwrap();

        let mut config = FileConfig::default();
        config.prompts.summary = Some(PathBuf::from("summary.md"));

        let registry = PromptRegistry::load(&config, dir.path()).unwrap();
        let prompt = registry.summary_prompt(&StudentProfile::new("Jo"), "", "", "");
        assert_eq!(prompt, "Hi Jo from Singapore");
    }

    #[test]
    fn override_with_unknown_variable_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("career.md"), "{{salary}}").unwrap();

        let mut config = FileConfig::default();
        config.prompts.career_guidance = Some(PathBuf::from("career.md"));

        assert!(PromptRegistry::load(&config, dir.path()).is_err());
    }

    #[test]
    fn missing_override_file_is_an_error() {
        let mut config = FileConfig::default();
        config.prompts.program_fit = Some(PathBuf::from("/nonexistent/program_fit.md"));
        assert!(PromptRegistry::load(&config, Path::new(".")).is_err());
    }
}
