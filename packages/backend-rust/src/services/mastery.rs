//! Per-student skill mastery: BKT updates, reads and baseline seeding.
//!
//! The store is the only shared state. Each call performs at most one write
//! per (student, skill) and never retries; the remote BKT server, when
//! configured, is only an optional fast path in front of the local engine.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use mastery_algo::skills::{normalize_skill_key, skill_description, SKILL_CATALOG};
use mastery_algo::{
    bkt, select_weakest, AnswerObservation, BktParams, SkillMasteryState, DEFAULT_P_KNOWN,
    UNKNOWN_MASTERY,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::logging::AUDIT_TARGET;
use crate::services::bkt_remote::RemoteBktClient;
use crate::store::{MasteryStore, StoreError};

#[derive(Debug, Error)]
pub enum MasteryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The computed state, when there is one, was not persisted and must be
    /// treated as unconfirmed.
    #[error("mastery store unavailable: {source}")]
    StoreUnavailable {
        unconfirmed: Option<Box<SkillMasteryState>>,
        #[source]
        source: StoreError,
    },
}

impl MasteryError {
    fn store(source: StoreError) -> Self {
        MasteryError::StoreUnavailable {
            unconfirmed: None,
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputationSource {
    Local,
    Remote,
}

impl ComputationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputationSource::Local => "local",
            ComputationSource::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub state: SkillMasteryState,
    pub p_old: f64,
    pub source: ComputationSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillMasteryView {
    pub skill_key: String,
    pub p_known: f64,
    pub description: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    /// Rows created by this call
    pub seeded: usize,
    pub skills: Vec<&'static str>,
}

pub struct MasteryService {
    store: Arc<dyn MasteryStore>,
    remote: Option<RemoteBktClient>,
}

impl MasteryService {
    pub fn new(store: Arc<dyn MasteryStore>) -> Self {
        Self {
            store,
            remote: None,
        }
    }

    pub fn with_remote(mut self, remote: Option<RemoteBktClient>) -> Self {
        self.remote = remote;
        self
    }

    pub fn store(&self) -> Arc<dyn MasteryStore> {
        Arc::clone(&self.store)
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    pub async fn record_answer(
        &self,
        student_id: &str,
        skill_key: &str,
        correct: bool,
    ) -> Result<SkillMasteryState, MasteryError> {
        self.record(AnswerObservation::new(student_id, skill_key, correct))
            .await
            .map(|outcome| outcome.state)
    }

    /// Loads the prior (baseline when absent), applies one BKT update and
    /// upserts the result.
    pub async fn record(&self, obs: AnswerObservation) -> Result<AnswerOutcome, MasteryError> {
        let student_id = require("student_id", &obs.student_id)?.to_string();
        let raw_skill = require("skill_key", &obs.skill_key)?;
        let skill_key = normalize_skill_key(raw_skill);
        if skill_key != raw_skill {
            debug!(raw = raw_skill, normalized = skill_key, "unknown skill key normalized");
        }

        let obs = AnswerObservation {
            student_id,
            skill_key: skill_key.to_string(),
            ..obs
        };

        let prior = match self
            .store
            .get(&obs.student_id, skill_key)
            .await
            .map_err(MasteryError::store)?
        {
            Some(state) => state.sanitized(),
            None => {
                self.store
                    .ensure_skill_exists(skill_key, skill_description(skill_key))
                    .await
                    .map_err(MasteryError::store)?;
                SkillMasteryState::baseline(&obs.student_id, skill_key)
            }
        };

        let (params, source) = self.compute(&obs, &prior.params).await;
        let state = SkillMasteryState {
            params,
            updated_at: now_millis(),
            ..prior.clone()
        };

        if let Err(err) = self.store.upsert(&state).await {
            warn!(
                student_id = %state.student_id,
                skill_key = %state.skill_key,
                error = %err,
                "mastery update not persisted"
            );
            return Err(MasteryError::StoreUnavailable {
                unconfirmed: Some(Box::new(state)),
                source: err,
            });
        }

        info!(
            target: AUDIT_TARGET,
            student_id = %state.student_id,
            skill_key = %state.skill_key,
            lesson_id = obs.lesson_id.as_deref().unwrap_or(""),
            question_id = obs.question_id.as_deref().unwrap_or(""),
            correct = obs.correct,
            p_known_before = prior.params.p_known,
            p_known_after = state.params.p_known,
            source = source.as_str(),
            "answer recorded"
        );

        Ok(AnswerOutcome {
            p_old: prior.params.p_known,
            state,
            source,
        })
    }

    async fn compute(
        &self,
        obs: &AnswerObservation,
        prior: &BktParams,
    ) -> (BktParams, ComputationSource) {
        if let Some(remote) = &self.remote {
            match remote.compute(obs, prior).await {
                Ok(params) => return (params, ComputationSource::Remote),
                Err(err) => {
                    warn!(
                        error = %err,
                        skill_key = %obs.skill_key,
                        "remote BKT unavailable, using local engine"
                    );
                }
            }
        }
        (bkt::update_params(prior, obs.correct), ComputationSource::Local)
    }

    /// Mastery per skill. With no keys, every stored skill of the student;
    /// otherwise each requested key (normalized) is present, defaulting to
    /// [`UNKNOWN_MASTERY`] when there is no row.
    pub async fn get_mastery(
        &self,
        student_id: &str,
        skill_keys: &[String],
    ) -> Result<BTreeMap<String, f64>, MasteryError> {
        let student_id = require("student_id", student_id)?;

        let requested: BTreeSet<&'static str> = skill_keys
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| normalize_skill_key(k))
            .collect();

        if requested.is_empty() {
            let rows = self
                .store
                .list_for_student(student_id)
                .await
                .map_err(MasteryError::store)?;
            return Ok(rows
                .into_iter()
                .map(|s| {
                    let p = s.sanitized().params.p_known;
                    (s.skill_key, p)
                })
                .collect());
        }

        let keys: Vec<String> = requested.iter().map(|k| k.to_string()).collect();
        let stored = self
            .store
            .get_many(student_id, &keys)
            .await
            .map_err(MasteryError::store)?;

        Ok(keys
            .into_iter()
            .map(|key| {
                let p = stored
                    .get(&key)
                    .map(|s| s.sanitized().params.p_known)
                    .unwrap_or(UNKNOWN_MASTERY);
                (key, p)
            })
            .collect())
    }

    /// Stored rows with catalog descriptions, ordered by skill key.
    pub async fn full_mastery(
        &self,
        student_id: &str,
    ) -> Result<Vec<SkillMasteryView>, MasteryError> {
        let student_id = require("student_id", student_id)?;
        let mut rows = self
            .store
            .list_for_student(student_id)
            .await
            .map_err(MasteryError::store)?;
        rows.sort_by(|a, b| a.skill_key.cmp(&b.skill_key));

        Ok(rows
            .into_iter()
            .map(|s| SkillMasteryView {
                description: skill_description(&s.skill_key),
                p_known: s.sanitized().params.p_known,
                skill_key: s.skill_key,
            })
            .collect())
    }

    /// Seeds a baseline row for every catalog skill the student lacks.
    /// Existing rows are never touched.
    pub async fn bootstrap(
        &self,
        student_id: &str,
        p_known_default: Option<f64>,
    ) -> Result<BootstrapReport, MasteryError> {
        let student_id = require("student_id", student_id)?;
        let params = BktParams::with_p_known(p_known_default.unwrap_or(DEFAULT_P_KNOWN));
        let now = now_millis();

        let mut seeded = 0;
        for skill in SKILL_CATALOG {
            self.store
                .ensure_skill_exists(skill.id, Some(skill.description))
                .await
                .map_err(MasteryError::store)?;

            let state = SkillMasteryState {
                updated_at: now,
                ..SkillMasteryState::baseline(student_id, skill.id).with_params(params)
            };
            if self
                .store
                .insert_if_absent(&state)
                .await
                .map_err(MasteryError::store)?
            {
                seeded += 1;
            }
        }

        if seeded > 0 {
            info!(student_id, seeded, "student mastery bootstrapped");
        }

        Ok(BootstrapReport {
            seeded,
            skills: SKILL_CATALOG.iter().map(|s| s.id).collect(),
        })
    }

    /// Remediation targets: the `k` weakest skills, optionally only those
    /// below `threshold`.
    pub async fn weak_skills(
        &self,
        student_id: &str,
        skill_keys: &[String],
        k: usize,
        threshold: Option<f64>,
    ) -> Result<Vec<String>, MasteryError> {
        let mastery = self.get_mastery(student_id, skill_keys).await?;
        Ok(select_weakest(&mastery, k, threshold))
    }
}

/// Rejects blank values; the value itself is passed through as given.
fn require<'a>(field: &str, value: &'a str) -> Result<&'a str, MasteryError> {
    if value.trim().is_empty() {
        return Err(MasteryError::InvalidInput(format!("{field} is required")));
    }
    Ok(value)
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryMasteryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn service() -> (Arc<MemoryMasteryStore>, MasteryService) {
        let store = Arc::new(MemoryMasteryStore::new());
        let service = MasteryService::new(store.clone());
        (store, service)
    }

    fn round4(x: f64) -> f64 {
        (x * 10_000.0).round() / 10_000.0
    }

    /// Reads succeed (always empty), writes fail.
    struct ReadOnlyStore;

    #[async_trait]
    impl MasteryStore for ReadOnlyStore {
        fn backend(&self) -> &'static str {
            "read-only"
        }

        async fn get(&self, _: &str, _: &str) -> Result<Option<SkillMasteryState>, StoreError> {
            Ok(None)
        }

        async fn get_many(
            &self,
            _: &str,
            _: &[String],
        ) -> Result<HashMap<String, SkillMasteryState>, StoreError> {
            Ok(HashMap::new())
        }

        async fn list_for_student(&self, _: &str) -> Result<Vec<SkillMasteryState>, StoreError> {
            Ok(Vec::new())
        }

        async fn upsert(&self, _: &SkillMasteryState) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only".into()))
        }

        async fn insert_if_absent(&self, _: &SkillMasteryState) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("read-only".into()))
        }

        async fn ensure_skill_exists(&self, _: &str, _: Option<&str>) -> Result<(), StoreError> {
            Ok(())
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_first_answer_starts_from_baseline() {
        let (store, service) = service();
        let state = service.record_answer("u1", "chronology", true).await.unwrap();

        assert_eq!(round4(state.p_known()), 0.6706);
        assert_eq!(state.params.p_learn, 0.3);
        assert!(state.updated_at > 0);
        assert!(store.has_skill("chronology"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_student_id_is_stored_as_given() {
        let (store, service) = service();
        let state = service.record_answer(" u1 ", "chronology", true).await.unwrap();
        assert_eq!(state.student_id, " u1 ");

        assert!(store.get(" u1 ", "chronology").await.unwrap().is_some());
        assert!(store.get("u1", "chronology").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_incorrect_answer_scenario() {
        let (_, service) = service();
        let outcome = service
            .record(AnswerObservation::new("u1", "chronology", false))
            .await
            .unwrap();
        assert_eq!(outcome.p_old, 0.2);
        assert_eq!(round4(outcome.state.p_known()), 0.3212);
        assert_eq!(outcome.source, ComputationSource::Local);
    }

    #[tokio::test]
    async fn test_answers_chain_from_stored_prior() {
        let (store, service) = service();
        let first = service.record_answer("u1", "chronology", true).await.unwrap();
        let second = service.record_answer("u1", "chronology", true).await.unwrap();

        let expected = bkt::update_params(&first.params, true).p_known;
        assert_eq!(second.p_known(), expected);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_skill_recorded_as_general() {
        let (store, service) = service();
        let state = service.record_answer("u1", "geography", true).await.unwrap();
        assert_eq!(state.skill_key, "general");
        assert!(store.get("u1", "general").await.unwrap().is_some());
        assert!(store.get("u1", "geography").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupted_prior_is_clamped() {
        let (store, service) = service();
        let corrupt = SkillMasteryState::baseline("u1", "chronology").with_params(BktParams {
            p_known: -5.0,
            p_learn: 0.3,
            p_guess: 2.0,
            p_slip: 0.1,
        });
        store.upsert(&corrupt).await.unwrap();

        let outcome = service
            .record(AnswerObservation::new("u1", "chronology", true))
            .await
            .unwrap();
        assert_eq!(outcome.p_old, 0.0);
        assert!((0.0..=1.0).contains(&outcome.state.p_known()));
        assert_eq!(outcome.state.params.p_guess, 1.0);
    }

    #[tokio::test]
    async fn test_blank_ids_are_rejected_before_any_write() {
        let (store, service) = service();
        let err = service.record_answer("  ", "chronology", true).await.unwrap_err();
        assert!(matches!(err, MasteryError::InvalidInput(_)));
        let err = service.record_answer("u1", "", true).await.unwrap_err();
        assert!(matches!(err, MasteryError::InvalidInput(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_returns_unconfirmed_state() {
        let service = MasteryService::new(Arc::new(ReadOnlyStore));
        let err = service.record_answer("u1", "chronology", true).await.unwrap_err();
        match err {
            MasteryError::StoreUnavailable {
                unconfirmed: Some(state),
                ..
            } => assert_eq!(round4(state.p_known()), 0.6706),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_mastery_fills_missing_with_unknown_default() {
        let (store, service) = service();
        let stored = SkillMasteryState::baseline("u1", "chronology")
            .with_params(BktParams::with_p_known(0.75));
        store.upsert(&stored).await.unwrap();

        let mastery = service
            .get_mastery("u1", &["chronology".to_string(), "general".to_string()])
            .await
            .unwrap();
        assert_eq!(mastery.len(), 2);
        assert_eq!(mastery["chronology"], 0.75);
        assert_eq!(mastery["general"], 0.5);
    }

    #[tokio::test]
    async fn test_get_mastery_without_keys_lists_stored_rows() {
        let (_, service) = service();
        assert!(service.get_mastery("u1", &[]).await.unwrap().is_empty());

        service.record_answer("u1", "chronology", true).await.unwrap();
        let mastery = service.get_mastery("u1", &[]).await.unwrap();
        assert_eq!(mastery.keys().collect::<Vec<_>>(), vec!["chronology"]);
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let (store, service) = service();
        let report = service.bootstrap("u1", None).await.unwrap();
        assert_eq!(report.seeded, SKILL_CATALOG.len());
        assert_eq!(store.len(), SKILL_CATALOG.len());

        service.record_answer("u1", "chronology", true).await.unwrap();
        let before = store.get("u1", "chronology").await.unwrap();

        let again = service.bootstrap("u1", Some(0.9)).await.unwrap();
        assert_eq!(again.seeded, 0);
        assert_eq!(store.get("u1", "chronology").await.unwrap(), before);
        assert_eq!(store.get("u1", "general").await.unwrap().unwrap().p_known(), 0.2);
    }

    #[tokio::test]
    async fn test_bootstrap_custom_default() {
        let (store, service) = service();
        service.bootstrap("u2", Some(0.35)).await.unwrap();
        let row = store.get("u2", "critical_thinking").await.unwrap().unwrap();
        assert_eq!(row.p_known(), 0.35);
        assert_eq!(row.params.p_slip, 0.1);
    }

    #[tokio::test]
    async fn test_full_mastery_has_descriptions_in_key_order() {
        let (_, service) = service();
        service.bootstrap("u1", None).await.unwrap();
        let rows = service.full_mastery("u1").await.unwrap();
        assert_eq!(rows.len(), SKILL_CATALOG.len());
        assert!(rows.windows(2).all(|w| w[0].skill_key < w[1].skill_key));
        let chronology = rows.iter().find(|r| r.skill_key == "chronology").unwrap();
        assert_eq!(chronology.description, Some("Sequencing and timelines"));
    }

    #[tokio::test]
    async fn test_weak_skills_after_bootstrap() {
        let (_, service) = service();
        service.bootstrap("u1", None).await.unwrap();
        service.record_answer("u1", "chronology", true).await.unwrap();

        let weak = service.weak_skills("u1", &[], 3, None).await.unwrap();
        assert_eq!(weak.len(), 3);
        assert!(!weak.contains(&"chronology".to_string()));
        assert_eq!(weak[0], "critical_thinking");
    }
}
