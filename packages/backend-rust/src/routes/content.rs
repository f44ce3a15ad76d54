use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use mastery_algo::{normalize_skill_key, DEFAULT_WEAK_SKILL_COUNT, DEFAULT_WEAK_THRESHOLD};
use serde::{Deserialize, Serialize};

use crate::response::{ok, AppError, SuccessResponse};
use crate::services::content::{ContentGenerator, Difficulty, LearningStyle, Lesson, QuizQuestion};
use crate::state::AppState;

const DEFAULT_ROUTE_QUESTIONS: usize = 5;
const MAX_QUESTIONS: usize = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/lesson-gen", post(lesson_gen))
        .route("/api/quiz-gen", post(quiz_gen))
        .route("/api/explanation", post(explanation))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LessonGenRequest {
    topic: String,
    difficulty: Option<String>,
    learning_style: Option<String>,
    user_id: Option<String>,
    #[serde(default)]
    skill_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LessonGenResponse {
    lesson: Lesson,
    weak_skills: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizGenRequest {
    user_id: String,
    lesson_content: String,
    difficulty: Option<String>,
    learning_style: Option<String>,
    num_questions: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuizGenResponse {
    questions: Vec<QuizQuestion>,
    weak_skills: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplanationRequest {
    lesson_content: String,
    #[serde(default)]
    weak_skills: Vec<String>,
    user_id: Option<String>,
    learning_style: Option<String>,
    difficulty: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExplanationResponse {
    explanation: String,
    weak_skills: Vec<String>,
}

fn generator(state: &AppState) -> Result<Arc<ContentGenerator>, AppError> {
    state.content().ok_or_else(|| {
        AppError::service_unavailable("CONTENT_UNAVAILABLE", "content generation is not configured")
    })
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(())
}

async fn lesson_gen(
    State(state): State<AppState>,
    Json(payload): Json<LessonGenRequest>,
) -> Result<Json<SuccessResponse<LessonGenResponse>>, AppError> {
    require_text("topic", &payload.topic)?;
    let generator = generator(&state)?;

    // Weak-skill focus is best effort; a failing store must not block the lesson.
    let mut weak_skills = Vec::new();
    if let Some(user_id) = payload.user_id.as_deref().filter(|u| !u.trim().is_empty()) {
        match state
            .mastery()
            .weak_skills(
                user_id,
                &payload.skill_keys,
                DEFAULT_WEAK_SKILL_COUNT,
                Some(DEFAULT_WEAK_THRESHOLD),
            )
            .await
        {
            Ok(skills) => weak_skills = skills,
            Err(err) => tracing::warn!(error = %err, "weak skills unavailable for lesson"),
        }
    }

    let lesson = generator
        .generate_lesson(
            payload.topic.trim(),
            Difficulty::parse_or_default(payload.difficulty.as_deref()),
            LearningStyle::parse_or_default(payload.learning_style.as_deref()),
            &weak_skills,
        )
        .await?;

    Ok(ok(LessonGenResponse {
        lesson,
        weak_skills,
    }))
}

async fn quiz_gen(
    State(state): State<AppState>,
    Json(payload): Json<QuizGenRequest>,
) -> Result<Json<SuccessResponse<QuizGenResponse>>, AppError> {
    require_text("userId", &payload.user_id)?;
    require_text("lessonContent", &payload.lesson_content)?;
    let generator = generator(&state)?;

    let mastery = state.mastery();
    mastery.bootstrap(&payload.user_id, None).await?;
    let weak_skills = mastery
        .weak_skills(&payload.user_id, &[], DEFAULT_WEAK_SKILL_COUNT, None)
        .await?;

    let num_questions = payload
        .num_questions
        .unwrap_or(DEFAULT_ROUTE_QUESTIONS)
        .clamp(1, MAX_QUESTIONS);
    let quiz = generator
        .generate_quiz(
            &payload.lesson_content,
            Difficulty::parse_or_default(payload.difficulty.as_deref()),
            LearningStyle::parse_or_default(payload.learning_style.as_deref()),
            Some(num_questions),
            &weak_skills,
        )
        .await?;

    Ok(ok(QuizGenResponse {
        questions: quiz.questions,
        weak_skills,
    }))
}

async fn explanation(
    State(state): State<AppState>,
    Json(payload): Json<ExplanationRequest>,
) -> Result<Json<SuccessResponse<ExplanationResponse>>, AppError> {
    require_text("lessonContent", &payload.lesson_content)?;
    let generator = generator(&state)?;

    let mut seen = HashSet::new();
    let mut weak_skills: Vec<String> = payload
        .weak_skills
        .iter()
        .filter(|k| !k.trim().is_empty())
        .map(|k| normalize_skill_key(k))
        .filter(|k| seen.insert(*k))
        .map(str::to_string)
        .collect();

    if weak_skills.is_empty() {
        if let Some(user_id) = payload.user_id.as_deref().filter(|u| !u.trim().is_empty()) {
            weak_skills = state
                .mastery()
                .weak_skills(user_id, &[], DEFAULT_WEAK_SKILL_COUNT, None)
                .await?;
        }
    }

    let explanation = generator
        .generate_explanation(
            &payload.lesson_content,
            &weak_skills,
            LearningStyle::parse_or_default(payload.learning_style.as_deref()),
            Difficulty::parse_or_default(payload.difficulty.as_deref()),
        )
        .await?;

    Ok(ok(ExplanationResponse {
        explanation,
        weak_skills,
    }))
}
