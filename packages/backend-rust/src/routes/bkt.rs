use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use mastery_algo::sanitize::is_valid_probability;
use mastery_algo::{AnswerObservation, DEFAULT_WEAK_SKILL_COUNT};
use serde::{Deserialize, Serialize};

use crate::response::{ok, AppError, SuccessResponse};
use crate::services::mastery::{BootstrapReport, SkillMasteryView};
use crate::state::AppState;

const MAX_WEAK_SKILLS: usize = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/answer", post(answer))
        .route("/mastery", post(mastery))
        .route("/mastery/full", post(mastery_full))
        .route("/bootstrap", post(bootstrap))
        .route("/seed", post(seed))
        .route("/weak-skills", post(weak_skills))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    user_id: String,
    skill_key: String,
    correct: bool,
    lesson_id: Option<String>,
    question_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerResponse {
    skill_key: String,
    p_old: f64,
    p_new: f64,
    p_learn: f64,
    p_guess: f64,
    p_slip: f64,
    source: &'static str,
    updated_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MasteryRequest {
    user_id: String,
    #[serde(default)]
    skill_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MasteryResponse {
    skills: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullMasteryRequest {
    user_id: String,
}

#[derive(Debug, Serialize)]
struct FullMasteryResponse {
    skills: Vec<SkillMasteryView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BootstrapRequest {
    user_id: String,
    p_known: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedRequest {
    user_id: String,
    initial_p_known: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeakSkillsRequest {
    user_id: String,
    #[serde(default)]
    skill_keys: Vec<String>,
    k: Option<usize>,
    threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WeakSkillsResponse {
    weak_skills: Vec<String>,
}

async fn answer(
    State(state): State<AppState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<SuccessResponse<AnswerResponse>>, AppError> {
    let obs = AnswerObservation::new(payload.user_id, payload.skill_key, payload.correct)
        .with_context(payload.lesson_id, payload.question_id);
    let outcome = state.mastery().record(obs).await?;

    let params = outcome.state.params;
    Ok(ok(AnswerResponse {
        skill_key: outcome.state.skill_key,
        p_old: outcome.p_old,
        p_new: params.p_known,
        p_learn: params.p_learn,
        p_guess: params.p_guess,
        p_slip: params.p_slip,
        source: outcome.source.as_str(),
        updated_at: outcome.state.updated_at,
    }))
}

async fn mastery(
    State(state): State<AppState>,
    Json(payload): Json<MasteryRequest>,
) -> Result<Json<SuccessResponse<MasteryResponse>>, AppError> {
    let skills = state
        .mastery()
        .get_mastery(&payload.user_id, &payload.skill_keys)
        .await?;
    Ok(ok(MasteryResponse { skills }))
}

async fn mastery_full(
    State(state): State<AppState>,
    Json(payload): Json<FullMasteryRequest>,
) -> Result<Json<SuccessResponse<FullMasteryResponse>>, AppError> {
    let skills = state.mastery().full_mastery(&payload.user_id).await?;
    Ok(ok(FullMasteryResponse { skills }))
}

async fn bootstrap(
    State(state): State<AppState>,
    Json(payload): Json<BootstrapRequest>,
) -> Result<Json<SuccessResponse<BootstrapReport>>, AppError> {
    seed_student(&state, &payload.user_id, payload.p_known).await
}

async fn seed(
    State(state): State<AppState>,
    Json(payload): Json<SeedRequest>,
) -> Result<Json<SuccessResponse<BootstrapReport>>, AppError> {
    seed_student(&state, &payload.user_id, payload.initial_p_known).await
}

async fn seed_student(
    state: &AppState,
    user_id: &str,
    p_known: Option<f64>,
) -> Result<Json<SuccessResponse<BootstrapReport>>, AppError> {
    if let Some(p) = p_known {
        if !is_valid_probability(p) {
            return Err(AppError::validation("pKnown must be within [0, 1]"));
        }
    }
    let report = state.mastery().bootstrap(user_id, p_known).await?;
    Ok(ok(report))
}

async fn weak_skills(
    State(state): State<AppState>,
    Json(payload): Json<WeakSkillsRequest>,
) -> Result<Json<SuccessResponse<WeakSkillsResponse>>, AppError> {
    let k = payload
        .k
        .unwrap_or(DEFAULT_WEAK_SKILL_COUNT)
        .min(MAX_WEAK_SKILLS);

    let weak_skills = state
        .mastery()
        .weak_skills(&payload.user_id, &payload.skill_keys, k, payload.threshold)
        .await?;
    Ok(ok(WeakSkillsResponse { weak_skills }))
}
