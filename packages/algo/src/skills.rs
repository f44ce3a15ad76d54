//! Fixed skill taxonomy.
//!
//! Skill keys come from a closed catalog. Anything outside it (typos, keys
//! invented by a generative model) collapses to [`GENERAL_SKILL`].

use crate::types::SkillDef;

/// Catch-all key for unrecognized skills
pub const GENERAL_SKILL: &str = "general";

pub const SKILL_CATALOG: &[SkillDef] = &[
    SkillDef {
        id: "historical_knowledge",
        description: "Recall of key facts, dates, people, events",
    },
    SkillDef {
        id: "historical_analysis",
        description: "Cause-effect, comparison, interpretation",
    },
    SkillDef {
        id: "historical_understanding",
        description: "Conceptual understanding of the topic",
    },
    SkillDef {
        id: "critical_thinking",
        description: "Reasoning, evaluation, inference",
    },
    SkillDef {
        id: "source_evaluation",
        description: "Primary/secondary source reasoning",
    },
    SkillDef {
        id: "chronology",
        description: "Sequencing and timelines",
    },
    SkillDef {
        id: GENERAL_SKILL,
        description: "Fallback skill key",
    },
];

pub fn find_skill(key: &str) -> Option<&'static SkillDef> {
    SKILL_CATALOG.iter().find(|s| s.id == key)
}

pub fn is_known_skill(key: &str) -> bool {
    find_skill(key).is_some()
}

/// Maps a raw key onto the taxonomy. Surrounding whitespace is ignored and
/// matching is case-sensitive, like the stored keys.
pub fn normalize_skill_key(raw: &str) -> &'static str {
    find_skill(raw.trim()).map(|s| s.id).unwrap_or(GENERAL_SKILL)
}

pub fn skill_description(key: &str) -> Option<&'static str> {
    find_skill(key).map(|s| s.description)
}

pub fn skill_ids() -> impl Iterator<Item = &'static str> {
    SKILL_CATALOG.iter().map(|s| s.id)
}
