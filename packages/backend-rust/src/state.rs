use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::services::content::ContentGenerator;
use crate::services::mastery::MasteryService;
use crate::store::MasteryStore;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    mastery: Arc<MasteryService>,
    content: Option<Arc<ContentGenerator>>,
}

impl AppState {
    pub fn new(mastery: MasteryService, content: Option<ContentGenerator>) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            mastery: Arc::new(mastery),
            content: content.map(Arc::new),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn mastery(&self) -> Arc<MasteryService> {
        Arc::clone(&self.mastery)
    }

    pub fn store(&self) -> Arc<dyn MasteryStore> {
        self.mastery.store()
    }

    pub fn content(&self) -> Option<Arc<ContentGenerator>> {
        self.content.clone()
    }
}
