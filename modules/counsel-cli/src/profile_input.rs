//! Reading and writing student profiles for the `advise` command.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use counsel_core::StudentProfile;

pub fn load(path: &Path) -> Result<StudentProfile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse profile: {}", path.display()))
}

pub fn save(path: &Path, profile: &StudentProfile) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(profile)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write profile: {}", path.display()))
}

/// Ask for each field on stderr and read answers from stdin.
pub fn prompt_stdin() -> Result<StudentProfile> {
    let stdin = std::io::stdin();
    read_profile(stdin.lock(), std::io::stderr())
}

pub(crate) fn read_profile(mut input: impl BufRead, mut out: impl Write) -> Result<StudentProfile> {
    let mut ask = |question: &str| -> Result<String> {
        write!(out, "{question}: ")?;
        out.flush()?;
        let mut line = String::new();
        input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    };

    let name = ask("Student name")?;
    let interests = split_list(&ask("Interests (comma separated)")?);
    let strengths = split_list(&ask("Strengths (comma separated)")?);
    let constraints = split_list(&ask("Constraints (comma separated)")?);
    let level = ask("Target level (diploma/degree/postgrad)")?;
    let budget = ask("Budget category (low/medium/high)")?;

    let mut profile = StudentProfile::new(if name.is_empty() { "Anonymous" } else { name.as_str() })
        .with_interests(interests)
        .with_strengths(strengths)
        .with_constraints(constraints);
    if let Some(level) = normalize_level(&level) {
        profile = profile.with_target_level(level);
    }
    if !budget.is_empty() {
        profile = profile.with_budget_category(budget.to_lowercase());
    }
    Ok(profile)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accept the common spellings and map them onto diploma/degree/postgrad.
fn normalize_level(raw: &str) -> Option<String> {
    let level = raw.trim().to_lowercase();
    let mapped = match level.as_str() {
        "" => return None,
        "bachelor" | "bachelors" | "undergraduate" => "degree",
        "master" | "masters" | "phd" | "postgraduate" => "postgrad",
        "poly" | "polytechnic" => "diploma",
        other => other,
    };
    Some(mapped.to_string())
}
