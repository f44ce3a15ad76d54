pub mod bkt_remote;
pub mod content;
pub mod llm_provider;
pub mod mastery;
