//! Markdown export of a counseling summary.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::report::CounselReport;

/// Render the summary file: the summary text followed by the recommended programs.
pub fn render_summary(report: &CounselReport) -> String {
    let mut out = String::new();
    let summary = report.summary.as_deref().unwrap_or_default();
    let _ = write!(out, "# Counseling Summary\n\n{summary}\n\n");
    out.push_str("## Key Program Suggestions\n");
    if let Some(matches) = report.programs() {
        for program in &matches.programs {
            let institution = if program.institution.is_empty() {
                "?"
            } else {
                program.institution.as_str()
            };
            let _ = write!(out, "- **{}** ({})", program.title, institution);
            if let Some(score) = program.similarity {
                let _ = write!(out, " score={score}");
            }
            out.push('\n');
        }
    }
    out
}

/// Write `summary_<unix_ts>.md` into `dir`, creating it if needed.
pub fn export_summary(dir: &Path, report: &CounselReport, unix_ts: i64) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;
    let path = dir.join(format!("summary_{unix_ts}.md"));
    std::fs::write(&path, render_summary(report))
        .with_context(|| format!("Failed to write summary: {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ProgramMatches, ProgramRecommendation, StepOutcome, StepOutput};
    use counsel_core::{ReasoningMode, StudentProfile};

    fn report_with_program() -> CounselReport {
        let mut report = CounselReport::new(StudentProfile::new("Ana"));
        report.summary = Some("Study AI.".into());
        report.steps.push((
            "institutional_data".into(),
            StepOutcome::Completed(StepOutput::Programs(ProgramMatches {
                programs: vec![ProgramRecommendation {
                    title: "Diploma in AI".into(),
                    institution: "Temasek Polytechnic".into(),
                    level: "diploma".into(),
                    duration_years: None,
                    field: String::new(),
                    fit_reasoning: String::new(),
                    fit_score: None,
                    similarity: Some(0.91),
                    career_alignment: String::new(),
                    local_context: String::new(),
                    financial_fit: String::new(),
                    what_to_know: String::new(),
                    reasoning_type: ReasoningMode::FallbackSimpleRanking,
                }],
                data_source: ReasoningMode::FallbackSimpleRanking,
                total_programs_analyzed: 1,
                message: None,
            })),
        ));
        report
    }

    #[test]
    fn renders_summary_and_program_list() {
        let text = render_summary(&report_with_program());
        assert!(text.starts_with("# Counseling Summary\n\nStudy AI.\n\n## Key Program Suggestions\n"));
        assert!(text.contains("- **Diploma in AI** (Temasek Polytechnic) score=0.91\n"));
    }

    #[test]
    fn writes_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = export_summary(&dir.path().join("exports"), &report_with_program(), 1_700_000_000).unwrap();
        assert_eq!(path.file_name().unwrap(), "summary_1700000000.md");
        assert!(std::fs::read_to_string(path).unwrap().contains("Study AI."));
    }
}
