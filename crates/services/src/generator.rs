use std::env;
use std::fmt::Write as _;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use quiz_core::model::{Outcome, QuestionDraft, Subject, Tutor};

use crate::error::{GeneratorError, LlmConfigError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

//
// ─── REQUEST ───────────────────────────────────────────────────────────────────
//

/// Everything a generator needs to write one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRequest {
    pub subject: Subject,
    pub tutor: Tutor,
    pub stage: u8,
    /// Outcome of the previous answer; only flavours tags and visuals.
    pub last_outcome: Option<Outcome>,
    pub specific_topic: Option<String>,
    pub situational: bool,
}

impl QuestionRequest {
    #[must_use]
    pub fn new(subject: Subject, tutor: Tutor, stage: u8) -> Self {
        let specific_topic = subject.topic().map(str::to_string);
        let situational = quiz_core::catalog::is_situational(subject.base());
        Self {
            subject,
            tutor,
            stage,
            last_outcome: None,
            specific_topic,
            situational,
        }
    }

    #[must_use]
    pub fn with_last_outcome(mut self, outcome: Option<Outcome>) -> Self {
        self.last_outcome = outcome;
        self
    }
}

/// Source of questions (and lesson explanations) for the engine.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Produce a loosely-typed draft; the caller validates it.
    ///
    /// # Errors
    ///
    /// Returns `GeneratorError` when the backend is unavailable or replies with
    /// something that is not a question.
    async fn generate(&self, request: &QuestionRequest) -> Result<QuestionDraft, GeneratorError>;

    /// Short teaching text for a lesson block.
    ///
    /// # Errors
    ///
    /// Returns `GeneratorError::Unsupported` unless the backend can write lessons.
    async fn explain(&self, _subject: &Subject, _tutor: Tutor) -> Result<String, GeneratorError> {
        Err(GeneratorError::Unsupported("lessons"))
    }
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// Settings for an OpenAI-compatible chat-completions backend.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    base_url: Url,
    api_key: String,
    model: String,
}

impl LlmConfig {
    /// # Errors
    ///
    /// Returns `LlmConfigError` if the base URL is not an http(s) URL or the
    /// model name is blank.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LlmConfigError> {
        let invalid = |reason: String| LlmConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let parsed = Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", parsed.scheme())));
        }
        let model = model.into();
        if model.trim().is_empty() {
            return Err(LlmConfigError::EmptyModel);
        }
        Ok(Self {
            base_url: parsed,
            api_key: api_key.into(),
            model: model.trim().to_string(),
        })
    }

    /// Read `QUIZ_AI_API_KEY`, `QUIZ_AI_BASE_URL` and `QUIZ_AI_MODEL`.
    ///
    /// Returns `Ok(None)` when no API key is set.
    ///
    /// # Errors
    ///
    /// Returns `LlmConfigError` if a variable is set but invalid.
    pub fn from_env() -> Result<Option<Self>, LlmConfigError> {
        let Some(api_key) = env::var("QUIZ_AI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
        else {
            return Ok(None);
        };
        let base_url = env::var("QUIZ_AI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let model = env::var("QUIZ_AI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        Self::new(&base_url, api_key, model).map(Some)
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.base_url.as_str().trim_end_matches('/')
        )
    }
}

//
// ─── LLM GENERATOR ─────────────────────────────────────────────────────────────
//

#[derive(Clone)]
pub struct LlmQuestionGenerator {
    client: Client,
    config: Option<LlmConfig>,
}

impl LlmQuestionGenerator {
    #[must_use]
    pub fn new(config: Option<LlmConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    async fn chat(&self, prompt: &str, temperature: f32) -> Result<String, GeneratorError> {
        let config = self.config.as_ref().ok_or(GeneratorError::Disabled)?;

        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature,
        };

        let response = self
            .client
            .post(config.completions_url())
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeneratorError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GeneratorError::EmptyResponse)?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl QuestionGenerator for LlmQuestionGenerator {
    async fn generate(&self, request: &QuestionRequest) -> Result<QuestionDraft, GeneratorError> {
        let prompt = build_question_prompt(request);
        let text = self.chat(&prompt, 0.7).await?;
        parse_draft(&text)
    }

    async fn explain(&self, subject: &Subject, tutor: Tutor) -> Result<String, GeneratorError> {
        let prompt = build_lesson_prompt(subject, tutor);
        self.chat(&prompt, 0.4).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

//
// ─── PROMPTS ───────────────────────────────────────────────────────────────────
//

fn persona(tutor: Tutor) -> &'static str {
    match tutor {
        Tutor::Luna => "a warm tutor for culture and institutions",
        Tutor::Stella => "a quick, playful tutor for logic, technology and languages",
        Tutor::Maria => "a strict tutor for law and public administration rules",
    }
}

/// Prompt asking for exactly one question as a JSON object.
#[must_use]
pub fn build_question_prompt(request: &QuestionRequest) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are {}, {}. Write ONE multiple-choice question for a \
         public-administration entrance exam.",
        request.tutor,
        persona(request.tutor)
    );
    let _ = writeln!(prompt, "Subject: {}", request.subject.base());
    if let Some(topic) = &request.specific_topic {
        let _ = writeln!(prompt, "Specific topic: {topic}");
    }
    let _ = writeln!(prompt, "Tutor stage: {} of 5", request.stage);
    if let Some(outcome) = request.last_outcome {
        let _ = writeln!(
            prompt,
            "Previous answer was {outcome}; reflect it only in tags and visual."
        );
    }
    prompt.push_str(
        "Reply with JSON only, no prose, using the keys: question_id, question, \
         options (object with keys A, B, C, D), difficulty (1-5), explanation, tags, visual",
    );
    if request.situational {
        prompt.push_str(
            ", kind = \"situational\", efficacy (object mapping every option letter to \
             \"effective\", \"neutral\" or \"ineffective\").\n",
        );
    } else {
        prompt.push_str(", correct (one letter A-D).\n");
    }
    prompt
}

fn build_lesson_prompt(subject: &Subject, tutor: Tutor) -> String {
    format!(
        "You are {tutor}, {}. Give a short, clear lesson (about 200 words) on \"{}\" \
         for a public-administration entrance exam. Plain text only.",
        persona(tutor),
        subject.label()
    )
}

/// Remove a surrounding Markdown code fence, if any.
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (e.g. "json") on the opening line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a generator reply into a draft.
///
/// # Errors
///
/// Returns `GeneratorError::Malformed` if no JSON object can be read.
pub fn parse_draft(text: &str) -> Result<QuestionDraft, GeneratorError> {
    let body = strip_code_fences(text);
    // tolerate chatter around the object
    let json = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    };
    serde_json::from_str(json).map_err(|e| GeneratorError::Malformed(e.to_string()))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
