pub mod aid;
pub mod export;
pub mod orchestrator;
pub mod parse;
pub mod report;
pub mod steps;

#[cfg(feature = "test-support")]
pub mod testing;

pub use aid::AidOption;
pub use orchestrator::{Orchestrator, SUMMARY_UNAVAILABLE};
pub use parse::ParseError;
pub use report::{
    AidGuidance, AidRecommendation, CareerGuidance, CareerSuggestion, CounselReport,
    ProgramMatches, ProgramRecommendation, StepOutcome, StepOutput,
};
pub use steps::{ReasoningStep, StepRequest};
