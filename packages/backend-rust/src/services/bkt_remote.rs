//! Optional remote BKT computation.
//!
//! A separate BKT server may own the update. Its answer is preferred when it
//! arrives in time and is well formed; every other outcome falls back to the
//! local engine in the mastery service.

use std::time::Duration;

use mastery_algo::sanitize::{finite, probability_or};
use mastery_algo::{AnswerObservation, BktParams};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{env_string, env_u64};

pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 1500;

#[derive(Debug, Clone)]
pub struct RemoteBktConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl RemoteBktConfig {
    /// `None` unless `BKT_SERVER_URL` is set.
    pub fn from_env() -> Option<Self> {
        let base_url = env_string("BKT_SERVER_URL")?;
        let timeout = Duration::from_millis(
            env_u64("BKT_SERVER_TIMEOUT_MS").unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS),
        );
        Some(Self::new(base_url, timeout))
    }

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn answer_url(&self) -> String {
        format!("{}/bkt/answer", self.base_url)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteBktRequest<'a> {
    pub student_id: &'a str,
    /// Same value as `student_id`; older BKT servers read this name.
    pub user_id: &'a str,
    pub skill_key: &'a str,
    pub correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<&'a str>,
}

impl<'a> RemoteBktRequest<'a> {
    pub fn from_observation(obs: &'a AnswerObservation) -> Self {
        Self {
            student_id: &obs.student_id,
            user_id: &obs.student_id,
            skill_key: &obs.skill_key,
            correct: obs.correct,
            lesson_id: obs.lesson_id.as_deref(),
            question_id: obs.question_id.as_deref(),
        }
    }
}

/// Every field is optional; `p_old` is informational only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteBktResponse {
    pub p_old: Option<f64>,
    pub p_new: Option<f64>,
    pub p_learn: Option<f64>,
    pub p_guess: Option<f64>,
    pub p_slip: Option<f64>,
}

#[derive(Debug, Error)]
pub enum RemoteBktError {
    #[error("remote BKT timed out after {0:?}")]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("response missing a finite p_new")]
    MissingPNew,
}

/// Applies a remote answer on top of the prior. Missing or non-finite item
/// parameters keep the prior value; a missing or non-finite `p_new` rejects
/// the whole response.
pub fn merge_remote(prior: &BktParams, response: &RemoteBktResponse) -> Option<BktParams> {
    let prior = prior.clamped();
    let p_new = finite(response.p_new)?;
    Some(BktParams {
        p_known: mastery_algo::clamp_probability(p_new),
        p_learn: probability_or(response.p_learn, prior.p_learn),
        p_guess: probability_or(response.p_guess, prior.p_guess),
        p_slip: probability_or(response.p_slip, prior.p_slip),
    })
}

#[derive(Clone)]
pub struct RemoteBktClient {
    config: RemoteBktConfig,
    client: reqwest::Client,
}

impl RemoteBktClient {
    pub fn new(config: RemoteBktConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    pub fn config(&self) -> &RemoteBktConfig {
        &self.config
    }

    /// Bounded by the configured timeout regardless of client settings.
    pub async fn compute(
        &self,
        obs: &AnswerObservation,
        prior: &BktParams,
    ) -> Result<BktParams, RemoteBktError> {
        let response = tokio::time::timeout(self.config.timeout, self.post(obs))
            .await
            .map_err(|_| RemoteBktError::Timeout(self.config.timeout))??;

        merge_remote(prior, &response).ok_or(RemoteBktError::MissingPNew)
    }

    async fn post(&self, obs: &AnswerObservation) -> Result<RemoteBktResponse, RemoteBktError> {
        let payload = RemoteBktRequest::from_observation(obs);
        let resp = self
            .client
            .post(self.config.answer_url())
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RemoteBktError::HttpStatus(status));
        }

        Ok(resp.json::<RemoteBktResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prior() -> BktParams {
        BktParams {
            p_known: 0.4,
            p_learn: 0.3,
            p_guess: 0.2,
            p_slip: 0.1,
        }
    }

    #[test]
    fn test_merge_uses_remote_values() {
        let response = RemoteBktResponse {
            p_new: Some(0.8),
            p_learn: Some(0.25),
            p_guess: Some(0.15),
            p_slip: Some(0.05),
            ..Default::default()
        };
        let merged = merge_remote(&prior(), &response).unwrap();
        assert_eq!(merged.p_known, 0.8);
        assert_eq!(merged.p_learn, 0.25);
        assert_eq!(merged.p_guess, 0.15);
        assert_eq!(merged.p_slip, 0.05);
    }

    #[test]
    fn test_merge_fills_missing_fields_from_prior() {
        let response = RemoteBktResponse {
            p_new: Some(1.4),
            p_guess: Some(f64::NAN),
            ..Default::default()
        };
        let merged = merge_remote(&prior(), &response).unwrap();
        assert_eq!(merged.p_known, 1.0);
        assert_eq!(merged.p_learn, 0.3);
        assert_eq!(merged.p_guess, 0.2);
        assert_eq!(merged.p_slip, 0.1);
    }

    #[test]
    fn test_merge_rejects_missing_p_new() {
        assert!(merge_remote(&prior(), &RemoteBktResponse::default()).is_none());
        let response = RemoteBktResponse {
            p_new: Some(f64::INFINITY),
            ..Default::default()
        };
        assert!(merge_remote(&prior(), &response).is_none());
    }

    #[test]
    fn test_response_tolerates_nulls_and_extra_fields() {
        let response: RemoteBktResponse = serde_json::from_str(
            r#"{"p_old":0.5,"p_new":0.7,"p_learn":null,"p_guess":0.2,"p_slip":0.1,"extra":"x"}"#,
        )
        .unwrap();
        assert_eq!(response.p_new, Some(0.7));
        assert_eq!(response.p_learn, None);
    }

    #[test]
    fn test_request_carries_context() {
        let obs = AnswerObservation::new("u1", "chronology", true)
            .with_context(Some("lesson-1".into()), None);
        let json = serde_json::to_value(RemoteBktRequest::from_observation(&obs)).unwrap();
        assert_eq!(json["student_id"], "u1");
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["lesson_id"], "lesson-1");
        assert!(json.get("question_id").is_none());
    }

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = RemoteBktConfig::new("http://localhost:8000/", Duration::from_millis(10));
        assert_eq!(config.answer_url(), "http://localhost:8000/bkt/answer");
    }
}
