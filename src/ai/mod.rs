use crate::config::{API_KEY_ENV, Config};
use crate::domain::coach::{ChatMessage, ChatRole};
use crate::domain::journal::Reflection;
use crate::domain::tasks::{Priority, TaskDraft};
use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

const PERSONA_PROMPT: &str = r#"You are Justly, a warm and supportive life coach and wellness companion.
- Listen without judgment and give the user room to think out loud.
- Offer small, practical next steps that fit the user's goals.
- Ask a thoughtful follow-up question when it helps reflection.
- Support the user's daily habits and celebrate progress, however small.
Keep replies conversational and short (two to four paragraphs). You are not a therapist: if the user mentions a serious mental health concern, gently suggest professional help while staying supportive.
Refer to the user's goals, habits and mood when they are relevant."#;

const TASKS_SYSTEM_PROMPT: &str =
    "You are a task generation assistant. Return only valid JSON arrays, no additional text.";
const JOURNAL_SYSTEM_PROMPT: &str =
    "You are helping write a personal journal entry. Write in first person, be reflective and warm.";

pub const JOURNAL_EMPTY_FALLBACK: &str = "Today was a day of growth and learning.";
pub const JOURNAL_FAILURE_FALLBACK: &str =
    "Today was a day of growth and learning. I continued working on my goals and habits.";

pub const DEFAULT_REFLECTION_PROMPTS: [&str; 3] = [
    "What moment today made you feel most alive?",
    "What's one thing you learned about yourself?",
    "What are you grateful for right now?",
];

const JOURNAL_CHAT_WINDOW: usize = 10;

static JSON_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[\s\S]*\]").expect("valid JSON array pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Model,
}

impl Speaker {
    fn as_str(self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Model => "model",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub turns: Vec<Turn>,
    pub system_instruction: Option<String>,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl GenerateRequest {
    fn single(prompt: String, system: Option<&str>, temperature: f64, max_tokens: u32) -> Self {
        Self {
            turns: vec![Turn {
                speaker: Speaker::User,
                text: prompt,
            }],
            system_instruction: system.map(str::to_string),
            temperature,
            max_output_tokens: max_tokens,
        }
    }

    /// The last user turn, which carries the templated prompt.
    pub fn prompt(&self) -> &str {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.speaker == Speaker::User)
            .map(|turn| turn.text.as_str())
            .unwrap_or_default()
    }

    pub fn to_body(&self) -> Value {
        let contents = self
            .turns
            .iter()
            .map(|turn| json!({ "role": turn.speaker.as_str(), "parts": [{ "text": turn.text }] }))
            .collect::<Vec<_>>();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            }
        });

        if let Some(system) = &self.system_instruction {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        body
    }
}

/// A single-shot text generation backend.
pub trait LanguageModel: Send + Sync {
    fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    enabled: bool,
    api_key: Option<String>,
    base_url: String,
    model: String,
    timeout_seconds: u64,
}

impl GeminiClient {
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.ai_enabled,
            api_key: resolve_api_key(config),
            base_url: config.ai_api_base_url.clone(),
            model: config.ai_model.clone(),
            timeout_seconds: config.ai_timeout(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl LanguageModel for GeminiClient {
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        if !self.enabled {
            bail!("AI feature is disabled");
        }
        let api_key = self.api_key.clone().with_context(|| {
            format!("AI API key is missing. Set `justly config set ai.api_key <KEY>` or `{API_KEY_ENV}`.")
        })?;

        debug!(
            model = %self.model,
            turns = request.turns.len(),
            prompt_chars = request.prompt().len(),
            "calling generateContent"
        );
        let endpoint = self.endpoint();
        let timeout_seconds = self.timeout_seconds;
        let body = request.to_body();

        // reqwest's blocking client must not run on an async runtime thread.
        std::thread::spawn(move || generate_blocking(&endpoint, timeout_seconds, &api_key, &body))
            .join()
            .map_err(|_| anyhow!("AI worker thread panicked"))?
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn generate_blocking(
    endpoint: &str,
    timeout_seconds: u64,
    api_key: &str,
    body: &Value,
) -> Result<String> {
    if api_key.trim().is_empty() {
        bail!("AI API key is empty");
    }

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static("x-goog-api-key"),
        HeaderValue::from_str(api_key).context("Failed to build API key header")?,
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .default_headers(headers)
        .build()
        .context("Failed to create AI HTTP client")?;

    let response = client
        .post(endpoint)
        .json(body)
        .send()
        .context("AI API request failed")?;

    let status = response.status();
    let text = response.text().context("Failed to read AI response body")?;

    if !status.is_success() {
        bail!("AI API error {}: {}", status, text);
    }

    extract_candidate_text(&text)
}

/// A well-formed response without text yields an empty string; callers
/// decide what an empty reply means.
fn extract_candidate_text(body: &str) -> Result<String> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .with_context(|| format!("Failed to parse AI response: {body}"))?;

    Ok(parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .unwrap_or_default())
}

/// Context appended to the coach persona.
#[derive(Debug, Clone, Default)]
pub struct CoachContext {
    pub goals: Vec<String>,
    pub habits: Vec<String>,
    pub recent_mood: Option<String>,
}

impl CoachContext {
    pub fn system_prompt(&self) -> String {
        let mut prompt = PERSONA_PROMPT.to_string();

        if !self.goals.is_empty() {
            prompt.push_str(&format!("\n\nUser's current goals: {}", self.goals.join(", ")));
        }
        if !self.habits.is_empty() {
            prompt.push_str(&format!("\nUser's habits: {}", self.habits.join(", ")));
        }
        if let Some(mood) = self.recent_mood.as_deref().filter(|mood| !mood.trim().is_empty()) {
            prompt.push_str(&format!("\nRecent mood: {}", mood.trim()));
        }

        prompt
    }
}

/// One coach turn. Failures are returned to the caller.
pub fn send_message(
    model: &dyn LanguageModel,
    user_message: &str,
    history: &[ChatMessage],
    context: &CoachContext,
) -> Result<String> {
    let turns = history
        .iter()
        .map(|message| Turn {
            speaker: match message.role {
                ChatRole::Assistant => Speaker::Model,
                ChatRole::User => Speaker::User,
            },
            text: message.content.clone(),
        })
        .chain(std::iter::once(Turn {
            speaker: Speaker::User,
            text: user_message.to_string(),
        }))
        .collect();

    let request = GenerateRequest {
        turns,
        system_instruction: Some(context.system_prompt()),
        temperature: 0.8,
        max_output_tokens: 1024,
    };

    model
        .generate(&request)
        .and_then(|text| {
            if text.trim().is_empty() {
                bail!("AI returned an empty reply");
            }
            Ok(text)
        })
        .map_err(|error| {
            warn!(error = %error, "coach reply failed");
            anyhow!("Failed to get response from AI")
        })
}

/// Title and category of a goal or habit as shown to the model.
#[derive(Debug, Clone)]
pub struct TopicRef {
    pub title: String,
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct PreviousDay {
    pub completed_tasks: usize,
    pub total_tasks: usize,
    pub mood: Option<String>,
}

pub fn morning_tasks_prompt(
    goals: &[TopicRef],
    habits: &[TopicRef],
    previous_day: Option<&PreviousDay>,
) -> String {
    let describe = |items: &[TopicRef]| {
        if items.is_empty() {
            "None set yet".to_string()
        } else {
            items
                .iter()
                .map(|item| format!("{} ({})", item.title, item.category))
                .collect::<Vec<_>>()
                .join(", ")
        }
    };

    let yesterday = previous_day
        .map(|day| {
            let mood = day
                .mood
                .as_deref()
                .map(|mood| format!(", mood was {mood}"))
                .unwrap_or_default();
            format!(
                "Yesterday: Completed {}/{} tasks{mood}",
                day.completed_tasks, day.total_tasks
            )
        })
        .unwrap_or_default();

    format!(
        "Based on the user's goals and habits, generate 5-7 actionable tasks for today.\n\nGoals: {}\nHabits: {}\n{}\n\nReturn ONLY a JSON array with objects containing: title, priority (low/medium/high), description (optional).\nExample: [{{\"title\": \"Morning meditation\", \"priority\": \"high\", \"description\": \"10 minutes of mindfulness\"}}]\nDo not include any other text, just the JSON array.",
        describe(goals),
        describe(habits),
        yesterday
    )
}

pub fn fallback_tasks() -> Vec<TaskDraft> {
    [
        ("Start your day with intention", Priority::High),
        ("Review your goals", Priority::Medium),
        ("Complete one habit", Priority::Medium),
    ]
    .into_iter()
    .map(|(title, priority)| TaskDraft {
        title: title.to_string(),
        priority,
        description: None,
    })
    .collect()
}

pub fn generate_morning_tasks(
    model: &dyn LanguageModel,
    goals: &[TopicRef],
    habits: &[TopicRef],
    previous_day: Option<&PreviousDay>,
) -> Vec<TaskDraft> {
    let request = GenerateRequest::single(
        morning_tasks_prompt(goals, habits, previous_day),
        Some(TASKS_SYSTEM_PROMPT),
        0.7,
        1024,
    );

    generate_array(model, &request).unwrap_or_else(|error| {
        warn!(error = %error, "task generation failed. fallback to default tasks");
        fallback_tasks()
    })
}

pub fn generate_reflection_prompts(
    model: &dyn LanguageModel,
    mood: &str,
    tasks_completed: usize,
    habits: &[String],
) -> Vec<String> {
    let habits = if habits.is_empty() {
        "general wellness".to_string()
    } else {
        habits.join(", ")
    };
    let prompt = format!(
        "Generate 3 thoughtful reflection prompts for someone who:\n- Current mood: {mood}\n- Completed {tasks_completed} tasks today\n- Working on habits: {habits}\n\nReturn ONLY a JSON array of 3 prompt strings. No other text.\nExample: [\"What moment brought you the most joy today?\", \"What would you do differently?\", \"What are you grateful for?\"]"
    );
    let request = GenerateRequest::single(prompt, None, 0.8, 256);

    generate_array::<String>(model, &request)
        .map(|prompts| {
            prompts
                .into_iter()
                .map(|prompt| prompt.trim().to_string())
                .filter(|prompt| !prompt.is_empty())
                .collect::<Vec<_>>()
        })
        .and_then(|prompts| {
            if prompts.is_empty() {
                bail!("AI returned no reflection prompts");
            }
            Ok(prompts)
        })
        .unwrap_or_else(|error| {
            warn!(error = %error, "reflection prompt generation failed. fallback to defaults");
            DEFAULT_REFLECTION_PROMPTS
                .iter()
                .map(|prompt| prompt.to_string())
                .collect()
        })
}

pub fn journal_prompt(
    chat_messages: &[ChatMessage],
    reflection: Option<&Reflection>,
    tasks: Option<(usize, usize)>,
) -> String {
    let conversations = if chat_messages.is_empty() {
        String::new()
    } else {
        let recent = chat_messages
            .iter()
            .skip(chat_messages.len().saturating_sub(JOURNAL_CHAT_WINDOW))
            .map(|message| format!("{}: {}", message.role.as_str(), message.content))
            .collect::<Vec<_>>()
            .join("\n");
        format!("Conversations today:\n{recent}\n")
    };

    let noted = |items: &[String]| {
        if items.is_empty() {
            "None noted".to_string()
        } else {
            items.join(", ")
        }
    };

    let evening = reflection
        .map(|reflection| {
            let lessons = if reflection.lessons_learned.trim().is_empty() {
                "None noted"
            } else {
                reflection.lessons_learned.trim()
            };
            format!(
                "Evening reflection:\n- Wins: {}\n- Challenges: {}\n- Mood: {}\n- Lessons: {}",
                noted(&reflection.wins),
                noted(&reflection.challenges),
                reflection.mood,
                lessons
            )
        })
        .unwrap_or_default();

    let task_line = tasks
        .map(|(completed, total)| format!("Tasks: {completed}/{total} completed"))
        .unwrap_or_default();

    format!(
        "Create a reflective journal entry based on the following:\n\n{conversations}\n{evening}\n{task_line}\n\nWrite a first-person journal entry (2-3 paragraphs) that captures the essence of the day, insights gained, and looks forward positively. Make it personal and reflective."
    )
}

pub fn generate_journal_entry(
    model: &dyn LanguageModel,
    chat_messages: &[ChatMessage],
    reflection: Option<&Reflection>,
    tasks: Option<(usize, usize)>,
) -> String {
    let request = GenerateRequest::single(
        journal_prompt(chat_messages, reflection, tasks),
        Some(JOURNAL_SYSTEM_PROMPT),
        0.9,
        512,
    );

    match model.generate(&request) {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => JOURNAL_EMPTY_FALLBACK.to_string(),
        Err(error) => {
            warn!(error = %error, "journal generation failed. fallback to default entry");
            JOURNAL_FAILURE_FALLBACK.to_string()
        }
    }
}

pub fn test_connection(model: &dyn LanguageModel) -> Result<String> {
    let request = GenerateRequest::single(
        "Health check for Justly.".to_string(),
        Some("Return exactly one short sentence confirming the AI API is reachable."),
        0.1,
        64,
    );

    let text = model.generate(&request)?;
    if text.trim().is_empty() {
        bail!("AI responded without any text");
    }
    Ok(text.trim().to_string())
}

pub fn has_api_key(config: &Config) -> bool {
    resolve_api_key(config).is_some()
}

fn resolve_api_key(config: &Config) -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            config
                .ai_api_key
                .clone()
                .filter(|value| !value.trim().is_empty())
        })
}

fn generate_array<T: DeserializeOwned>(
    model: &dyn LanguageModel,
    request: &GenerateRequest,
) -> Result<Vec<T>> {
    let text = model.generate(request)?;
    let items = extract_json_array::<T>(&text)?;
    if items.is_empty() {
        bail!("AI returned an empty array");
    }
    Ok(items)
}

/// Parses the outermost bracketed JSON array embedded in free text.
pub fn extract_json_array<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let matched = JSON_ARRAY
        .find(text)
        .with_context(|| format!("AI response did not contain a JSON array: {text}"))?;

    serde_json::from_str(matched.as_str())
        .with_context(|| format!("Failed to parse AI JSON array: {}", matched.as_str()))
}

#[cfg(test)]
pub mod testing {
    use super::{GenerateRequest, LanguageModel};
    use anyhow::{Result, bail};
    use std::sync::Mutex;

    /// Simulates an unreachable endpoint.
    pub struct FailingModel;

    impl LanguageModel for FailingModel {
        fn generate(&self, _request: &GenerateRequest) -> Result<String> {
            bail!("AI API error 503 Service Unavailable: upstream down")
        }
    }

    /// Replies with a fixed text and records what it was asked.
    pub struct ScriptedModel {
        reply: String,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedModel {
        pub fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn last_request(&self) -> GenerateRequest {
            self.requests
                .lock()
                .expect("requests lock")
                .last()
                .cloned()
                .expect("at least one request")
        }

        pub fn last_prompt(&self) -> String {
            self.last_request().prompt().to_string()
        }
    }

    impl LanguageModel for ScriptedModel {
        fn generate(&self, request: &GenerateRequest) -> Result<String> {
            self.requests
                .lock()
                .expect("requests lock")
                .push(request.clone());
            Ok(self.reply.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingModel, ScriptedModel};
    use super::*;
    use chrono::Utc;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn message(role: ChatRole, content: &str) -> ChatMessage {
        ChatMessage {
            id: "id".to_string(),
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn failed_call_yields_the_three_fallback_tasks() {
        let tasks = generate_morning_tasks(&FailingModel, &[], &[], None);

        assert_eq!(
            tasks,
            vec![
                TaskDraft {
                    title: "Start your day with intention".to_string(),
                    priority: Priority::High,
                    description: None,
                },
                TaskDraft {
                    title: "Review your goals".to_string(),
                    priority: Priority::Medium,
                    description: None,
                },
                TaskDraft {
                    title: "Complete one habit".to_string(),
                    priority: Priority::Medium,
                    description: None,
                },
            ]
        );
    }

    #[test]
    fn extracts_array_surrounded_by_prose() {
        let model = ScriptedModel::new(
            "Sure! Here are your tasks:\n[{\"title\": \"Walk 20 minutes\", \"priority\": \"low\", \"description\": \"Outside\"}, {\"title\": \"Plan lunch\", \"priority\": \"medium\"}]\nHave a great day!",
        );

        let tasks = generate_morning_tasks(&model, &[], &[], None);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "Walk 20 minutes");
        assert_eq!(tasks[0].priority, Priority::Low);
        assert_eq!(tasks[0].description.as_deref(), Some("Outside"));
        assert_eq!(tasks[1].description, None);
    }

    #[test]
    fn missing_array_falls_back() {
        let model = ScriptedModel::new("I could not think of anything today.");
        assert_eq!(generate_morning_tasks(&model, &[], &[], None), fallback_tasks());

        let prompts = generate_reflection_prompts(&model, "tired", 2, &[]);
        assert_eq!(prompts, DEFAULT_REFLECTION_PROMPTS.map(str::to_string).to_vec());
    }

    #[test]
    fn malformed_array_falls_back() {
        let model = ScriptedModel::new("[{\"title\": \"Unclosed\", ]");
        assert_eq!(generate_morning_tasks(&model, &[], &[], None), fallback_tasks());
    }

    #[test]
    fn reflection_prompts_are_parsed() {
        let model = ScriptedModel::new(
            "[\"What went well?\", \"What drained you?\", \"What will you try tomorrow?\"]",
        );
        let prompts = generate_reflection_prompts(&model, "good", 3, &["Read".to_string()]);
        assert_eq!(prompts.len(), 3);
        assert_eq!(prompts[1], "What drained you?");
        assert!(model.last_prompt().contains("Working on habits: Read"));
    }

    #[test]
    fn coach_request_maps_roles_and_context() {
        let model = ScriptedModel::new("You're doing great.");
        let history = vec![
            message(ChatRole::User, "Hi"),
            message(ChatRole::Assistant, "Hello! How are you?"),
        ];
        let context = CoachContext {
            goals: vec!["Run 5k".to_string()],
            habits: vec!["Morning exercise".to_string()],
            recent_mood: Some("anxious".to_string()),
        };

        let reply = send_message(&model, "I skipped my run", &history, &context).expect("reply");
        assert_eq!(reply, "You're doing great.");

        let body = model.last_request().to_body();
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "I skipped my run");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        let system = body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .expect("system text");
        assert!(system.contains("User's current goals: Run 5k"));
        assert!(system.contains("Recent mood: anxious"));
    }

    #[test]
    fn coach_failure_is_generic() {
        let error = send_message(&FailingModel, "Hi", &[], &CoachContext::default()).unwrap_err();
        assert_eq!(error.to_string(), "Failed to get response from AI");
    }

    #[test]
    fn journal_uses_fallbacks() {
        assert_eq!(
            generate_journal_entry(&FailingModel, &[], None, None),
            JOURNAL_FAILURE_FALLBACK
        );
        assert_eq!(
            generate_journal_entry(&ScriptedModel::new("   "), &[], None, Some((1, 2))),
            JOURNAL_EMPTY_FALLBACK
        );
    }

    #[test]
    fn journal_prompt_keeps_the_last_ten_messages() {
        let messages = (0..12)
            .map(|index| message(ChatRole::User, &format!("note {index}")))
            .collect::<Vec<_>>();
        let prompt = journal_prompt(&messages, None, Some((2, 5)));

        assert!(!prompt.contains("note 1\n"));
        assert!(prompt.contains("note 2"));
        assert!(prompt.contains("note 11"));
        assert!(prompt.contains("Tasks: 2/5 completed"));
    }

    #[test]
    fn reads_text_from_the_first_candidate() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hello there"}],"role":"model"}}]}"#;
        assert_eq!(extract_candidate_text(body).expect("text"), "Hello there");
        assert_eq!(extract_candidate_text(r#"{"candidates":[]}"#).expect("empty"), "");
        assert_eq!(
            extract_candidate_text(r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#)
                .expect("empty text"),
            ""
        );
        assert!(extract_candidate_text("<html>bad gateway</html>").is_err());
    }

    #[test]
    fn empty_coach_reply_is_an_error() {
        let error = send_message(&ScriptedModel::new("  "), "Hi", &[], &CoachContext::default())
            .unwrap_err();
        assert_eq!(error.to_string(), "Failed to get response from AI");
    }

    /// Answers a single HTTP request with `body` and returns the base URL.
    fn serve_once(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let address = listener.local_addr().expect("address");

        std::thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut request = Vec::new();
            let mut buffer = [0u8; 4096];
            loop {
                let Ok(read) = stream.read(&mut buffer) else {
                    return;
                };
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buffer[..read]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        });

        format!("http://{address}")
    }

    fn local_client(base_url: String) -> GeminiClient {
        GeminiClient {
            enabled: true,
            api_key: Some("test-key".to_string()),
            base_url,
            model: "gemini-2.0-flash".to_string(),
            timeout_seconds: 5,
        }
    }

    #[test]
    fn empty_http_reply_gets_the_empty_journal_fallback() {
        let client = local_client(serve_once(
            r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#,
        ));

        assert_eq!(
            generate_journal_entry(&client, &[], None, None),
            JOURNAL_EMPTY_FALLBACK
        );
    }

    #[test]
    fn http_reply_text_reaches_the_journal() {
        let client = local_client(serve_once(
            r#"{"candidates":[{"content":{"parts":[{"text":"  I felt steady today.  "}]}}]}"#,
        ));

        assert_eq!(
            generate_journal_entry(&client, &[], None, None),
            "I felt steady today."
        );
    }

    #[test]
    fn disabled_client_refuses_to_call() {
        let config = Config {
            ai_enabled: false,
            ..Config::default()
        };
        let client = GeminiClient::from_config(&config);
        assert!(client.generate(&GenerateRequest::single("hi".to_string(), None, 0.1, 8)).is_err());
        assert!(client.endpoint().ends_with("/models/gemini-2.0-flash:generateContent"));
    }
}
