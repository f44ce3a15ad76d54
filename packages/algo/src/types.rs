//! Common Types and Constants
//!
//! Shared data structures used across all algorithm modules.

use serde::{Deserialize, Serialize};

use crate::sanitize::clamp_probability;

// ==================== Constants ====================

/// Baseline mastery for a freshly bootstrapped (student, skill) pair
pub const DEFAULT_P_KNOWN: f64 = 0.2;

/// Default transit probability (unknown -> known per opportunity)
pub const DEFAULT_P_LEARN: f64 = 0.3;

/// Default probability of a correct answer while unknown
pub const DEFAULT_P_GUESS: f64 = 0.2;

/// Default probability of a wrong answer while known
pub const DEFAULT_P_SLIP: f64 = 0.1;

/// Placeholder mastery reported for a requested skill with no stored row.
/// Distinct from [`DEFAULT_P_KNOWN`], which only applies when seeding.
pub const UNKNOWN_MASTERY: f64 = 0.5;

/// Mastery below which a skill counts as weak for lesson remediation
pub const DEFAULT_WEAK_THRESHOLD: f64 = 0.75;

/// Number of weak skills fed to content generation
pub const DEFAULT_WEAK_SKILL_COUNT: usize = 3;

// ==================== BKT Types ====================

/// The four BKT probabilities of one (student, skill) pair.
///
/// `p_learn`, `p_guess` and `p_slip` are per-skill item parameters and are
/// never re-estimated; only `p_known` moves.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BktParams {
    /// Probability the skill is mastered (latent state)
    pub p_known: f64,
    /// Transit probability
    pub p_learn: f64,
    /// Guess probability
    pub p_guess: f64,
    /// Slip probability
    pub p_slip: f64,
}

impl Default for BktParams {
    fn default() -> Self {
        Self {
            p_known: DEFAULT_P_KNOWN,
            p_learn: DEFAULT_P_LEARN,
            p_guess: DEFAULT_P_GUESS,
            p_slip: DEFAULT_P_SLIP,
        }
    }
}

impl BktParams {
    /// Baseline parameters with a custom starting mastery.
    pub fn with_p_known(p_known: f64) -> Self {
        Self {
            p_known: clamp_probability(p_known),
            ..Self::default()
        }
    }

    /// Every field clamped to [0, 1].
    pub fn clamped(&self) -> Self {
        Self {
            p_known: clamp_probability(self.p_known),
            p_learn: clamp_probability(self.p_learn),
            p_guess: clamp_probability(self.p_guess),
            p_slip: clamp_probability(self.p_slip),
        }
    }
}

/// Persisted mastery record, one per (student_id, skill_key).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkillMasteryState {
    pub student_id: String,
    pub skill_key: String,
    #[serde(flatten)]
    pub params: BktParams,
    /// Last mutation, epoch milliseconds
    pub updated_at: i64,
}

impl SkillMasteryState {
    /// Baseline state for a pair that has no stored row yet.
    pub fn baseline(student_id: impl Into<String>, skill_key: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            skill_key: skill_key.into(),
            params: BktParams::default(),
            updated_at: 0,
        }
    }

    pub fn with_params(mut self, params: BktParams) -> Self {
        self.params = params;
        self
    }

    pub fn p_known(&self) -> f64 {
        self.params.p_known
    }

    /// Copy with every probability clamped to [0, 1].
    pub fn sanitized(&self) -> Self {
        Self {
            params: self.params.clamped(),
            ..self.clone()
        }
    }
}

/// A single graded answer, consumed once by the mastery service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerObservation {
    pub student_id: String,
    pub skill_key: String,
    pub correct: bool,
    pub lesson_id: Option<String>,
    pub question_id: Option<String>,
}

impl AnswerObservation {
    pub fn new(student_id: impl Into<String>, skill_key: impl Into<String>, correct: bool) -> Self {
        Self {
            student_id: student_id.into(),
            skill_key: skill_key.into(),
            correct,
            lesson_id: None,
            question_id: None,
        }
    }

    pub fn with_context(mut self, lesson_id: Option<String>, question_id: Option<String>) -> Self {
        self.lesson_id = lesson_id;
        self.question_id = question_id;
        self
    }
}

// ==================== Skill Catalog Types ====================

/// Catalog entry of the fixed skill taxonomy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SkillDef {
    pub id: &'static str,
    pub description: &'static str,
}
