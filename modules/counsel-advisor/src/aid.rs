//! Financial aid catalog: typed options, loading and eligibility.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const BUILTIN_AID: &str = include_str!("../data/financial_aid.json");

/// Wildcard accepted in eligibility lists.
const ANY: &str = "any";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AidOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// `need-based`, `merit-based`, `universal` or `loan`.
    pub category: String,
    pub amount: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub eligibility: Eligibility,
    #[serde(default)]
    pub application_process: String,
    #[serde(default = "no_bond")]
    pub bond_requirement: String,
    #[serde(default)]
    pub website: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Eligibility {
    #[serde(default)]
    pub citizenship: Vec<String>,
    #[serde(default)]
    pub level: Vec<String>,
}

fn no_bond() -> String {
    "None".to_string()
}

impl AidOption {
    pub fn has_bond(&self) -> bool {
        self.bond_requirement != "None"
    }

    /// Both the citizenship and level lists admit the student (`any` matches all).
    pub fn is_eligible(&self, citizenship: &str, target_level: &str) -> bool {
        admits(&self.eligibility.citizenship, citizenship) && admits(&self.eligibility.level, target_level)
    }
}

fn admits(allowed: &[String], value: &str) -> bool {
    allowed
        .iter()
        .any(|a| a.eq_ignore_ascii_case(value) || a.eq_ignore_ascii_case(ANY))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AidFile {
    Wrapped { financial_aid_options: Vec<AidOption> },
    List(Vec<AidOption>),
}

pub fn parse_aid_catalog(content: &str) -> Result<Vec<AidOption>> {
    let file: AidFile = serde_json::from_str(content).context("Invalid financial aid catalog")?;
    Ok(match file {
        AidFile::Wrapped {
            financial_aid_options,
        } => financial_aid_options,
        AidFile::List(options) => options,
    })
}

pub fn load_aid_catalog(path: &Path) -> Result<Vec<AidOption>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read financial aid catalog: {}", path.display()))?;
    let options = parse_aid_catalog(&content)
        .with_context(|| format!("Failed to parse financial aid catalog: {}", path.display()))?;
    info!(path = %path.display(), count = options.len(), "Loaded financial aid catalog");
    Ok(options)
}

/// Catalog from `path` when given and present, else the built-in options.
pub fn load_or_builtin(path: Option<&Path>) -> Result<Vec<AidOption>> {
    match path {
        Some(path) if path.exists() => load_aid_catalog(path),
        Some(path) => {
            warn!(path = %path.display(), "Financial aid catalog not found, using built-in options");
            builtin_aid()
        }
        None => builtin_aid(),
    }
}

pub fn builtin_aid() -> Result<Vec<AidOption>> {
    parse_aid_catalog(BUILTIN_AID)
}

/// Citizenship implied by the student's constraints. The first constraint
/// that mentions a status wins; the default is a local citizen.
pub fn citizenship_from_constraints(constraints: &[String]) -> &'static str {
    for constraint in constraints {
        let lower = constraint.to_lowercase();
        if lower.contains("citizen") {
            return "Singapore Citizen";
        }
        let says_pr = lower.split(|c: char| !c.is_alphanumeric()).any(|w| w == "pr");
        if says_pr || lower.contains("permanent resident") {
            return "Permanent Resident";
        }
        if lower.contains("international") {
            return "International";
        }
    }
    "Singapore Citizen"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_parses() {
        let options = builtin_aid().unwrap();
        assert!(options.len() >= 8);
        assert!(options.iter().any(|o| o.category == "need-based"));
    }

    #[test]
    fn citizenship_detection_order() {
        let c = |items: &[&str]| {
            citizenship_from_constraints(&items.iter().map(|s| s.to_string()).collect::<Vec<_>>())
        };
        assert_eq!(c(&[]), "Singapore Citizen");
        assert_eq!(c(&["I am a PR"]), "Permanent Resident");
        assert_eq!(c(&["international student"]), "International");
        assert_eq!(c(&["Permanent Resident"]), "Permanent Resident");
        assert_eq!(c(&["budget", "citizen of Singapore"]), "Singapore Citizen");
        // "pr" must be a word of its own
        assert_eq!(c(&["prefer part-time", "international"]), "International");
    }

    #[test]
    fn eligibility_honours_wildcards() {
        let option = AidOption {
            name: "X".into(),
            kind: "Government Grant".into(),
            category: "universal".into(),
            amount: "S$1".into(),
            description: String::new(),
            eligibility: Eligibility {
                citizenship: vec!["Any".into()],
                level: vec!["degree".into()],
            },
            application_process: String::new(),
            bond_requirement: no_bond(),
            website: String::new(),
        };
        assert!(option.is_eligible("International", "degree"));
        assert!(!option.is_eligible("International", "diploma"));
        assert!(!option.has_bond());
    }

    #[test]
    fn accepts_bare_list_and_defaults_bond() {
        let options = parse_aid_catalog(
            r#"[{"name": "A", "type": "Grant", "category": "universal", "amount": "S$1"}]"#,
        )
        .unwrap();
        assert_eq!(options[0].bond_requirement, "None");
        assert!(options[0].eligibility.citizenship.is_empty());
    }
}
