//! Durable mapping of (student, skill) to BKT state.
//!
//! Implementations must make `upsert` atomic per key; concurrent writers to
//! the same pair resolve last-write-wins.

pub mod memory;
pub mod postgres;
pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;
use mastery_algo::SkillMasteryState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MasteryStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    async fn get(
        &self,
        student_id: &str,
        skill_key: &str,
    ) -> Result<Option<SkillMasteryState>, StoreError>;

    /// Keys without a row are absent from the result.
    async fn get_many(
        &self,
        student_id: &str,
        skill_keys: &[String],
    ) -> Result<HashMap<String, SkillMasteryState>, StoreError>;

    /// All rows of one student, ordered by skill key.
    async fn list_for_student(&self, student_id: &str)
        -> Result<Vec<SkillMasteryState>, StoreError>;

    async fn upsert(&self, state: &SkillMasteryState) -> Result<(), StoreError>;

    /// Inserts only when no row exists for the pair. Returns whether a row
    /// was created.
    async fn insert_if_absent(&self, state: &SkillMasteryState) -> Result<bool, StoreError>;

    /// Idempotent catalog upsert; `bkt_states.skill_key` references it.
    async fn ensure_skill_exists(
        &self,
        skill_key: &str,
        description: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
