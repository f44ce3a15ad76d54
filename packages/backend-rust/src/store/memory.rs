use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use mastery_algo::SkillMasteryState;
use parking_lot::RwLock;

use super::{MasteryStore, StoreError};

type Key = (String, String);

/// Process-local store. Not durable; used for tests and `DATABASE_URL=memory`.
#[derive(Debug, Default)]
pub struct MemoryMasteryStore {
    states: RwLock<BTreeMap<Key, SkillMasteryState>>,
    skills: RwLock<HashMap<String, Option<String>>>,
}

impl MemoryMasteryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }

    pub fn has_skill(&self, skill_key: &str) -> bool {
        self.skills.read().contains_key(skill_key)
    }

    fn key(student_id: &str, skill_key: &str) -> Key {
        (student_id.to_string(), skill_key.to_string())
    }
}

#[async_trait]
impl MasteryStore for MemoryMasteryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(
        &self,
        student_id: &str,
        skill_key: &str,
    ) -> Result<Option<SkillMasteryState>, StoreError> {
        Ok(self
            .states
            .read()
            .get(&Self::key(student_id, skill_key))
            .cloned())
    }

    async fn get_many(
        &self,
        student_id: &str,
        skill_keys: &[String],
    ) -> Result<HashMap<String, SkillMasteryState>, StoreError> {
        let states = self.states.read();
        Ok(skill_keys
            .iter()
            .filter_map(|key| {
                states
                    .get(&Self::key(student_id, key))
                    .map(|s| (key.clone(), s.clone()))
            })
            .collect())
    }

    async fn list_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<SkillMasteryState>, StoreError> {
        Ok(self
            .states
            .read()
            .iter()
            .filter(|((student, _), _)| student == student_id)
            .map(|(_, state)| state.clone())
            .collect())
    }

    async fn upsert(&self, state: &SkillMasteryState) -> Result<(), StoreError> {
        self.states.write().insert(
            Self::key(&state.student_id, &state.skill_key),
            state.clone(),
        );
        Ok(())
    }

    async fn insert_if_absent(&self, state: &SkillMasteryState) -> Result<bool, StoreError> {
        let mut states = self.states.write();
        let key = Self::key(&state.student_id, &state.skill_key);
        if states.contains_key(&key) {
            return Ok(false);
        }
        states.insert(key, state.clone());
        Ok(true)
    }

    async fn ensure_skill_exists(
        &self,
        skill_key: &str,
        description: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut skills = self.skills.write();
        let entry = skills.entry(skill_key.to_string()).or_insert(None);
        if let Some(description) = description {
            *entry = Some(description.to_string());
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mastery_algo::BktParams;

    #[tokio::test]
    async fn test_upsert_replaces_single_row() {
        let store = MemoryMasteryStore::new();
        let state = SkillMasteryState::baseline("u1", "chronology");
        store.upsert(&state).await.unwrap();
        let updated = state.clone().with_params(BktParams::with_p_known(0.9));
        store.upsert(&updated).await.unwrap();

        assert_eq!(store.len(), 1);
        let loaded = store.get("u1", "chronology").await.unwrap().unwrap();
        assert_eq!(loaded.p_known(), 0.9);
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_existing() {
        let store = MemoryMasteryStore::new();
        let state = SkillMasteryState::baseline("u1", "general")
            .with_params(BktParams::with_p_known(0.7));
        assert!(store.insert_if_absent(&state).await.unwrap());
        assert!(!store
            .insert_if_absent(&SkillMasteryState::baseline("u1", "general"))
            .await
            .unwrap());
        assert_eq!(store.get("u1", "general").await.unwrap().unwrap().p_known(), 0.7);
    }

    #[tokio::test]
    async fn test_get_many_omits_missing_and_other_students() {
        let store = MemoryMasteryStore::new();
        store.upsert(&SkillMasteryState::baseline("u1", "chronology")).await.unwrap();
        store.upsert(&SkillMasteryState::baseline("u2", "general")).await.unwrap();

        let found = store
            .get_many("u1", &["chronology".to_string(), "general".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("chronology"));
        assert_eq!(store.list_for_student("u2").await.unwrap().len(), 1);
    }
}
