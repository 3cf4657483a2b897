use std::time::Duration;

/// Time limits and sizes of the assessment phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePlan {
    /// Writing limit, counted from the end of the task video.
    pub writing_limit: Duration,
    /// Number of writing task videos to choose from.
    pub writing_tasks: u8,
    /// Intelligence limit.
    pub intelligence_limit: Duration,
    /// Personality limit; `None` for untimed.
    pub personality_limit: Option<Duration>,
    /// Verbal questions asked.
    pub verbal_questions: usize,
}

impl Default for PhasePlan {
    fn default() -> Self {
        Self {
            writing_limit: Duration::from_secs(7 * 60),
            writing_tasks: 5,
            intelligence_limit: Duration::from_secs(12 * 60),
            personality_limit: None,
            verbal_questions: 3,
        }
    }
}
