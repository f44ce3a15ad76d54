//! Lesson, quiz and explanation generation on top of [`LLMProvider`].
//!
//! Model output is untrusted: JSON is extracted leniently, quiz questions are
//! validated one by one and every `skill_key` is mapped onto the taxonomy.

use mastery_algo::normalize_skill_key;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::services::llm_provider::{ChatOptions, LLMError, LLMProvider};

pub const DEFAULT_QUIZ_QUESTIONS: usize = 7;
pub const OPTIONS_PER_QUESTION: usize = 4;

const LESSON_TEMPERATURE: f32 = 0.4;
const QUIZ_TEMPERATURE: f32 = 0.7;
const EXPLANATION_TEMPERATURE: f32 = 0.8;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    Llm(#[from] LLMError),
    #[error("malformed model output: {0}")]
    Malformed(String),
    #[error("model returned no usable questions")]
    NoValidQuestions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    /// Unknown or missing values fall back to `normal`.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("easy") => Difficulty::Easy,
            Some("hard") => Difficulty::Hard,
            _ => Difficulty::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LearningStyle {
    Visual,
    #[default]
    Verbal,
    StepByStep,
    ShortSummaries,
}

impl LearningStyle {
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("visual") => LearningStyle::Visual,
            Some("step-by-step") => LearningStyle::StepByStep,
            Some("short-summaries") => LearningStyle::ShortSummaries,
            _ => LearningStyle::Verbal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LearningStyle::Visual => "visual",
            LearningStyle::Verbal => "verbal",
            LearningStyle::StepByStep => "step-by-step",
            LearningStyle::ShortSummaries => "short-summaries",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer_index: usize,
    pub skill_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Deserialize)]
struct RawQuiz {
    questions: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    options: Vec<String>,
    #[serde(alias = "answer_index")]
    answer: i64,
    #[serde(default)]
    skill_key: Option<String>,
}

pub struct ContentGenerator {
    provider: LLMProvider,
}

impl ContentGenerator {
    pub fn new(provider: LLMProvider) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.config().kind.as_str()
    }

    pub async fn generate_lesson(
        &self,
        topic: &str,
        difficulty: Difficulty,
        learning_style: LearningStyle,
        weak_skills: &[String],
    ) -> Result<Lesson, ContentError> {
        let prompt = lesson_prompt(topic, difficulty, learning_style, weak_skills);
        let raw = self
            .provider
            .complete_with_system(
                "Return STRICT JSON ONLY. Never add comments.",
                &prompt,
                ChatOptions {
                    temperature: LESSON_TEMPERATURE,
                    json_mode: true,
                },
            )
            .await?;

        let value = extract_json(&raw)?;
        let lesson: Lesson = serde_json::from_value(value)
            .map_err(|e| ContentError::Malformed(format!("lesson: {e}")))?;
        if lesson.content.trim().is_empty() {
            return Err(ContentError::Malformed("lesson content is empty".into()));
        }
        Ok(lesson)
    }

    pub async fn generate_quiz(
        &self,
        lesson_content: &str,
        difficulty: Difficulty,
        learning_style: LearningStyle,
        num_questions: Option<usize>,
        weak_skills: &[String],
    ) -> Result<Quiz, ContentError> {
        let num_questions = num_questions.unwrap_or(DEFAULT_QUIZ_QUESTIONS);
        let prompt = quiz_prompt(
            lesson_content,
            difficulty,
            learning_style,
            num_questions,
            weak_skills,
        );
        let raw = self
            .provider
            .complete_with_system(
                "You generate high-quality history multiple-choice quizzes. Always respond with pure JSON only.",
                &prompt,
                ChatOptions {
                    temperature: QUIZ_TEMPERATURE,
                    json_mode: true,
                },
            )
            .await?;

        parse_quiz(&raw)
    }

    /// Plain-text re-explanation aimed at the given weak skills.
    pub async fn generate_explanation(
        &self,
        lesson_content: &str,
        weak_skills: &[String],
        learning_style: LearningStyle,
        difficulty: Difficulty,
    ) -> Result<String, ContentError> {
        let prompt = format!(
            "The student is struggling with: {}.\n\n\
             Rewrite the explanation based on:\n\
             - Learning style: {}\n\
             - Difficulty: {}\n\n\
             Return ONLY plain text, not JSON.\n\n{}",
            weak_skills.join(", "),
            learning_style.as_str(),
            difficulty.as_str(),
            lesson_content
        );
        let text = self
            .provider
            .complete_with_system(
                "You generate explanations with clear reasoning.",
                &prompt,
                ChatOptions {
                    temperature: EXPLANATION_TEMPERATURE,
                    json_mode: false,
                },
            )
            .await?;
        Ok(text.trim().to_string())
    }
}

fn lesson_prompt(
    topic: &str,
    difficulty: Difficulty,
    learning_style: LearningStyle,
    weak_skills: &[String],
) -> String {
    let visual_extra = if learning_style == LearningStyle::Visual {
        "\nThe student is a VISUAL learner: at the END of \"content\", append 1-2 short Mermaid \
         diagrams as ```mermaid fenced blocks (simple flowcharts or timelines of the key causes, \
         events and relationships). Diagrams must be valid Mermaid syntax.\n"
    } else {
        ""
    };
    let focus = if weak_skills.is_empty() {
        String::new()
    } else {
        format!("- Give extra attention to these skills: {}\n", weak_skills.join(", "))
    };

    format!(
        r#"You MUST output a STRICT JSON object with EXACTLY these keys:

{{
  "title": string,
  "content": string
}}

Rules:
- NO explanation
- NO markdown outside the JSON
- "title" must be 5-12 words
- "content" must be ~3-6 paragraphs of text and MAY contain markdown
- Topic: "{topic}"
- Difficulty: "{difficulty}"
- Learning style: "{style}"
{focus}{visual_extra}
Now generate ONLY the JSON object."#,
        difficulty = difficulty.as_str(),
        style = learning_style.as_str(),
    )
}

fn quiz_prompt(
    lesson_content: &str,
    difficulty: Difficulty,
    learning_style: LearningStyle,
    num_questions: usize,
    weak_skills: &[String],
) -> String {
    let focus = if weak_skills.is_empty() {
        "None".to_string()
    } else {
        weak_skills.join(", ")
    };
    let skill_keys = mastery_algo::skills::skill_ids().collect::<Vec<_>>().join(", ");

    format!(
        r#"Generate {num_questions} multiple-choice questions based on the lesson below.
Difficulty: {difficulty}. Learning style: {style}.

{lesson_content}

Focus extra questions on weak skills: {focus}.

STRICT RULES:
- Output ONLY valid JSON.
- Options must be an array of FOUR plain strings WITHOUT prefixes like "A)", "B)".
- "answer" is the 0-based index of the correct option.
- "skill_key" must be one of: {skill_keys}.
- The structure MUST be:

{{
  "questions": [
    {{
      "question": "string",
      "options": ["opt1","opt2","opt3","opt4"],
      "answer": 0,
      "skill_key": "string"
    }}
  ]
}}

No comments, no markdown, no explanation. ONLY the JSON object."#,
        difficulty = difficulty.as_str(),
        style = learning_style.as_str(),
    )
}

/// Parses a quiz payload, keeping only well-formed questions.
pub fn parse_quiz(raw: &str) -> Result<Quiz, ContentError> {
    let value = extract_json(raw)?;
    let quiz: RawQuiz = serde_json::from_value(value)
        .map_err(|e| ContentError::Malformed(format!("quiz: {e}")))?;

    let total = quiz.questions.len();
    let questions: Vec<QuizQuestion> = quiz
        .questions
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawQuestion>(v).ok())
        .filter_map(sanitize_question)
        .collect();

    if questions.len() < total {
        warn!(total, kept = questions.len(), "dropped malformed quiz questions");
    }
    if questions.is_empty() {
        return Err(ContentError::NoValidQuestions);
    }
    Ok(Quiz { questions })
}

fn sanitize_question(raw: RawQuestion) -> Option<QuizQuestion> {
    let question = raw.question.trim();
    if question.is_empty() || raw.options.len() != OPTIONS_PER_QUESTION {
        return None;
    }
    let answer_index = usize::try_from(raw.answer).ok()?;
    if answer_index >= OPTIONS_PER_QUESTION {
        return None;
    }

    let skill_key = normalize_skill_key(raw.skill_key.as_deref().unwrap_or_default());
    Some(QuizQuestion {
        question: question.to_string(),
        options: raw.options.into_iter().map(|o| o.trim().to_string()).collect(),
        answer_index,
        skill_key: skill_key.to_string(),
    })
}

/// Pulls a JSON object out of free-form model output. Unless the whole text
/// parses, code fences are stripped, the outermost `{...}` span is parsed and, failing that, the
/// braces are balanced and parsing is retried once.
pub fn extract_json(text: &str) -> Result<serde_json::Value, ContentError> {
    // Well-formed output keeps any fenced blocks inside string values intact.
    if let Ok(value) = serde_json::from_str(text.trim()) {
        return Ok(value);
    }

    let cleaned = text.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    let (start, end) = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            debug!(raw = %text, "model output has no JSON object");
            return Err(ContentError::Malformed("model did not output JSON".into()));
        }
    };
    let candidate = &cleaned[start..=end];

    if let Ok(value) = serde_json::from_str(candidate) {
        return Ok(value);
    }

    let open = candidate.matches('{').count();
    let close = candidate.matches('}').count();
    let mut repaired = String::with_capacity(candidate.len() + open.abs_diff(close));
    if close > open {
        repaired.push_str(&"{".repeat(close - open));
    }
    repaired.push_str(candidate);
    if open > close {
        repaired.push_str(&"}".repeat(open - close));
    }

    serde_json::from_str(&repaired).map_err(|e| {
        debug!(raw = %candidate, "JSON repair failed");
        ContentError::Malformed(format!("JSON malformed after repair: {e}"))
    })
}
