//! # mastery-algo - 自适应学习核心算法库
//!
//! 本 crate 提供纯 Rust 实现的掌握度追踪算法:
//!
//! - **Bayesian Knowledge Tracing** - 基于答题结果更新技能掌握概率
//! - **Weak-Skill Selection** - 选出掌握度最低的技能用于补救教学
//! - **Skill Taxonomy** - 固定技能目录与键名规范化
//!
//! ## 模块结构
//!
//! - [`bkt`] - BKT 证据更新与学习转移
//! - [`selector`] - 弱项技能排序与截断
//! - [`skills`] - 技能目录
//! - [`sanitize`] - 数据清洗 (概率限制、数值校验)
//! - [`types`] - 公共类型和常量
//!
//! ## 使用示例
//!
//! ```rust
//! use std::collections::HashMap;
//! use mastery_algo::{bkt, select_weakest, SkillMasteryState};
//!
//! let prior = SkillMasteryState::baseline("student-1", "chronology");
//! let next = bkt::update(&prior, true);
//! assert!(next.p_known() > prior.p_known());
//!
//! let mut mastery = HashMap::new();
//! mastery.insert("chronology".to_string(), next.p_known());
//! mastery.insert("general".to_string(), 0.1);
//! assert_eq!(select_weakest(&mastery, 1, None), vec!["general"]);
//! ```

// ============================================================================
// 模块声明
// ============================================================================

pub mod bkt;
pub mod sanitize;
pub mod selector;
pub mod skills;
pub mod types;

// ============================================================================
// 重新导出
// ============================================================================

/// 重新导出所有公共类型
pub use types::*;

pub use bkt::BktStep;
pub use sanitize::clamp_probability;
pub use selector::select_weakest;
pub use skills::{normalize_skill_key, GENERAL_SKILL, SKILL_CATALOG};
