//! Bayesian Knowledge Tracing
//!
//! Two-step update per observed answer:
//! 1. evidence: posterior P(known | answer) from `p_known`, `p_guess`, `p_slip`
//! 2. learning transition: `p_new = posterior + (1 - posterior) * p_learn`
//!
//! All inputs are clamped to [0, 1] first, so stale or hand-edited stored
//! state never makes the update fail. When the evidence denominator is zero
//! (e.g. `p_guess = 1` and `p_slip = 1` on a wrong answer) the prior
//! `p_known` is kept as the posterior.

use serde::{Deserialize, Serialize};

use crate::sanitize::clamp_probability;
use crate::types::{BktParams, SkillMasteryState};

/// Intermediate values of one update, useful for audit logs and tests.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BktStep {
    /// Clamped prior mastery
    pub prior: f64,
    /// Mastery after the evidence update, before learning
    pub posterior: f64,
    /// Mastery after the learning transition
    pub p_new: f64,
    /// True when the posterior fell back to the prior
    pub degenerate: bool,
}

/// Evidence update. Returns `(posterior, degenerate)`.
pub fn posterior(params: &BktParams, correct: bool) -> (f64, bool) {
    let p = params.clamped();
    let (numerator, denominator) = if correct {
        let num = p.p_known * (1.0 - p.p_slip);
        (num, num + (1.0 - p.p_known) * p.p_guess)
    } else {
        let num = p.p_known * p.p_slip;
        (num, num + (1.0 - p.p_known) * (1.0 - p.p_guess))
    };

    if denominator == 0.0 {
        (p.p_known, true)
    } else {
        (clamp_probability(numerator / denominator), false)
    }
}

/// Learning transition applied after every observation.
pub fn transition(posterior: f64, p_learn: f64) -> f64 {
    let post = clamp_probability(posterior);
    clamp_probability(post + (1.0 - post) * clamp_probability(p_learn))
}

pub fn step(params: &BktParams, correct: bool) -> BktStep {
    let clamped = params.clamped();
    let (post, degenerate) = posterior(&clamped, correct);
    BktStep {
        prior: clamped.p_known,
        posterior: post,
        p_new: transition(post, clamped.p_learn),
        degenerate,
    }
}

/// Updated parameters: only `p_known` changes, item parameters are carried
/// over (clamped).
pub fn update_params(params: &BktParams, correct: bool) -> BktParams {
    let clamped = params.clamped();
    BktParams {
        p_known: step(&clamped, correct).p_new,
        ..clamped
    }
}

/// Returns a new state; `prior` is left untouched. `updated_at` is copied
/// as-is, stamping the mutation time is the caller's job.
pub fn update(prior: &SkillMasteryState, correct: bool) -> SkillMasteryState {
    SkillMasteryState {
        params: update_params(&prior.params, correct),
        ..prior.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn round4(x: f64) -> f64 {
        (x * 10_000.0).round() / 10_000.0
    }

    fn baseline() -> BktParams {
        BktParams {
            p_known: 0.2,
            p_learn: 0.3,
            p_guess: 0.2,
            p_slip: 0.1,
        }
    }

    #[test]
    fn test_correct_answer_scenario() {
        let s = step(&baseline(), true);
        assert_eq!(round4(s.posterior), 0.5294);
        assert_eq!(round4(s.p_new), 0.6706);
        assert!(!s.degenerate);
    }

    #[test]
    fn test_incorrect_answer_scenario() {
        let s = step(&baseline(), false);
        assert_eq!(round4(s.posterior), 0.0303);
        assert_eq!(round4(s.p_new), 0.3212);
    }

    #[test]
    fn test_update_copies_item_parameters() {
        let prior = SkillMasteryState::baseline("u1", "chronology");
        let next = update(&prior, true);
        assert_eq!(next.params.p_learn, 0.3);
        assert_eq!(next.params.p_guess, 0.2);
        assert_eq!(next.params.p_slip, 0.1);
        assert_eq!(next.student_id, "u1");
        assert_eq!(next.skill_key, "chronology");
        // prior untouched
        assert_eq!(prior.params.p_known, 0.2);
        assert_eq!(round4(next.params.p_known), 0.6706);
    }

    #[test]
    fn test_degenerate_evidence_keeps_prior() {
        let params = BktParams {
            p_known: 0.0,
            p_learn: 0.0,
            p_guess: 1.0,
            p_slip: 1.0,
        };
        let s = step(&params, false);
        assert!(s.degenerate);
        assert_eq!(s.posterior, 0.0);
        assert_eq!(s.p_new, 0.0);

        let params = BktParams {
            p_known: 1.0,
            p_learn: 0.2,
            p_guess: 0.3,
            p_slip: 1.0,
        };
        let s = step(&params, true);
        assert!(s.degenerate);
        assert_eq!(s.posterior, 1.0);
    }

    #[test]
    fn test_adversarial_prior_is_clamped() {
        let params = BktParams {
            p_known: -5.0,
            p_learn: 7.0,
            p_guess: 2.0,
            p_slip: f64::NAN,
        };
        let next = update_params(&params, true);
        assert!((0.0..=1.0).contains(&next.p_known));
        assert_eq!(next.p_learn, 1.0);
        assert_eq!(next.p_guess, 1.0);
        assert_eq!(next.p_slip, 0.0);
    }

    #[test]
    fn test_full_mastery_is_absorbing_without_slip() {
        let params = BktParams {
            p_known: 1.0,
            p_learn: 0.3,
            p_guess: 0.2,
            p_slip: 0.0,
        };
        assert_eq!(step(&params, true).p_new, 1.0);
    }

    fn prob() -> impl Strategy<Value = f64> {
        (0u32..=1000u32).prop_map(|v| v as f64 / 1000.0)
    }

    fn any_f64() -> impl Strategy<Value = f64> {
        prop_oneof![
            -10.0f64..10.0f64,
            Just(f64::NAN),
            Just(f64::INFINITY),
            Just(f64::NEG_INFINITY),
        ]
    }

    proptest! {
        #[test]
        fn prop_p_new_in_unit_interval(
            pk in any_f64(),
            pl in any_f64(),
            pg in any_f64(),
            ps in any_f64(),
            correct in any::<bool>(),
        ) {
            let params = BktParams { p_known: pk, p_learn: pl, p_guess: pg, p_slip: ps };
            let s = step(&params, correct);
            prop_assert!((0.0..=1.0).contains(&s.p_new));
            prop_assert!((0.0..=1.0).contains(&s.posterior));
        }

        #[test]
        fn prop_clamping_is_consistent(
            pk in any_f64(),
            pl in any_f64(),
            pg in any_f64(),
            ps in any_f64(),
            correct in any::<bool>(),
        ) {
            let raw = BktParams { p_known: pk, p_learn: pl, p_guess: pg, p_slip: ps };
            let pre = raw.clamped();
            prop_assert_eq!(update_params(&raw, correct), update_params(&pre, correct));
        }

        #[test]
        fn prop_transition_never_lowers_posterior(
            pk in prob(), pl in prob(), pg in prob(), ps in prob()
        ) {
            let s = step(&BktParams { p_known: pk, p_learn: pl, p_guess: pg, p_slip: ps }, true);
            prop_assert!(s.p_new >= s.posterior);
        }

        #[test]
        fn prop_lower_slip_rewards_correct_answers(
            pk in 0.01f64..0.99f64, pl in prob(), pg in 0.01f64..1.0f64,
            ps_low in 0.0f64..0.5f64, gap in 0.01f64..0.5f64
        ) {
            let low = BktParams { p_known: pk, p_learn: pl, p_guess: pg, p_slip: ps_low };
            let high = BktParams { p_slip: ps_low + gap, ..low };
            prop_assert!(posterior(&low, true).0 > posterior(&high, true).0);
        }

        #[test]
        fn prop_incorrect_answer_does_not_raise_posterior(
            pk in prob(), pg in 0.0f64..0.999f64, slip_share in 0.0f64..=1.0f64
        ) {
            // item parameters within the usual identifiability bound: p_slip <= 1 - p_guess
            let ps = slip_share * (1.0 - pg);
            let params = BktParams { p_known: pk, p_learn: 0.3, p_guess: pg, p_slip: ps };
            prop_assert!(posterior(&params, false).0 <= pk + 1e-12);
        }
    }
}
