use std::collections::HashMap;

use async_trait::async_trait;
use mastery_algo::{BktParams, SkillMasteryState};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use super::{MasteryStore, StoreError};
use crate::db::schema::{
    INSERT_STATE_IF_ABSENT_SQL, LIST_STATES_SQL, SELECT_STATES_PREFIX_SQL, SELECT_STATE_SQL,
    UPSERT_SKILL_SQL, UPSERT_STATE_SQL,
};

#[derive(Clone)]
pub struct PgMasteryStore {
    pool: PgPool,
}

impl PgMasteryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MasteryStore for PgMasteryStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn get(
        &self,
        student_id: &str,
        skill_key: &str,
    ) -> Result<Option<SkillMasteryState>, StoreError> {
        let row = sqlx::query(SELECT_STATE_SQL)
            .bind(student_id)
            .bind(skill_key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_postgres_state).transpose()
    }

    async fn get_many(
        &self,
        student_id: &str,
        skill_keys: &[String],
    ) -> Result<HashMap<String, SkillMasteryState>, StoreError> {
        if skill_keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_STATES_PREFIX_SQL);
        qb.push_bind(student_id);
        qb.push(r#" AND "skill_key" IN ("#);
        let mut separated = qb.separated(", ");
        for key in skill_keys {
            separated.push_bind(key.as_str());
        }
        separated.push_unseparated(")");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| map_postgres_state(row).map(|s| (s.skill_key.clone(), s)))
            .collect()
    }

    async fn list_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<SkillMasteryState>, StoreError> {
        let rows = sqlx::query(LIST_STATES_SQL)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_postgres_state).collect()
    }

    async fn upsert(&self, state: &SkillMasteryState) -> Result<(), StoreError> {
        let p = state.params.clamped();
        sqlx::query(UPSERT_STATE_SQL)
            .bind(&state.student_id)
            .bind(&state.skill_key)
            .bind(p.p_known)
            .bind(p.p_learn)
            .bind(p.p_guess)
            .bind(p.p_slip)
            .bind(state.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_if_absent(&self, state: &SkillMasteryState) -> Result<bool, StoreError> {
        let p = state.params.clamped();
        let result = sqlx::query(INSERT_STATE_IF_ABSENT_SQL)
            .bind(&state.student_id)
            .bind(&state.skill_key)
            .bind(p.p_known)
            .bind(p.p_learn)
            .bind(p.p_guess)
            .bind(p.p_slip)
            .bind(state.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ensure_skill_exists(
        &self,
        skill_key: &str,
        description: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(UPSERT_SKILL_SQL)
            .bind(skill_key)
            .bind(description)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn map_postgres_state(row: &PgRow) -> Result<SkillMasteryState, StoreError> {
    let state = SkillMasteryState {
        student_id: row.try_get("student_id")?,
        skill_key: row.try_get("skill_key")?,
        params: BktParams {
            p_known: row.try_get("p_known")?,
            p_learn: row.try_get("p_learn")?,
            p_guess: row.try_get("p_guess")?,
            p_slip: row.try_get("p_slip")?,
        },
        updated_at: row.try_get("updated_at")?,
    };
    Ok(state.sanitized())
}
