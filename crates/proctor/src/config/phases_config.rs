use proctor_core::PhasePlan;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Time limits and content counts of the assessment phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhasesConfig {
    /// Writing time limit, in seconds.
    pub writing_limit_secs: u64,

    /// Number of writing task videos to pick from.
    pub writing_tasks: u8,

    /// Intelligence time limit, in seconds.
    pub intelligence_limit_secs: u64,

    /// Personality time limit, in seconds. Untimed when absent.
    pub personality_limit_secs: Option<u64>,

    /// Spoken questions in the verbal phase.
    pub verbal_questions: usize,
}

impl Default for PhasesConfig {
    fn default() -> Self {
        let plan = PhasePlan::default();
        Self {
            writing_limit_secs: plan.writing_limit.as_secs(),
            writing_tasks: plan.writing_tasks,
            intelligence_limit_secs: plan.intelligence_limit.as_secs(),
            personality_limit_secs: plan.personality_limit.map(|d| d.as_secs()),
            verbal_questions: plan.verbal_questions,
        }
    }
}

impl PhasesConfig {
    /// Plan handed to the phase steps.
    pub fn plan(&self) -> PhasePlan {
        PhasePlan {
            writing_limit: Duration::from_secs(self.writing_limit_secs),
            writing_tasks: self.writing_tasks.max(1),
            intelligence_limit: Duration::from_secs(self.intelligence_limit_secs),
            personality_limit: self.personality_limit_secs.map(Duration::from_secs),
            verbal_questions: self.verbal_questions.max(1),
        }
    }
}
