use crate::ai::LanguageModel;
use crate::domain::achievements::{Achievement, get_achievements, unlock_achievement};
use crate::domain::coach::{ChatMessage, CoachTurn, chat_history};
use crate::domain::goals::{
    Goal, GoalCategory, GoalUpdate, NewGoal, add_goal, delete_goal, list_goals, update_goal,
};
use crate::domain::habits::{
    Habit, HabitUpdate, NewHabit, add_habit, delete_habit, list_habits, toggle_habit, update_habit,
};
use crate::domain::journal::{
    EveningReflection, JournalEntry, Reflection, delete_journal_entry, list_journal_entries,
};
use crate::domain::onboarding::{
    OnboardingOutcome, OnboardingPlan, SuggestedHabit, complete_onboarding, suggested_habits,
};
use crate::domain::settings::{Settings, get_settings, save_settings};
use crate::domain::summary::{DailySummary, build_daily_summary};
use crate::domain::tasks::{
    MorningPrep, Task, TaskDraft, TaskUpdate, add_task, add_tasks, delete_task, tasks_for_date,
    toggle_task, update_task,
};
use crate::domain::users::UserProfile;
use crate::domain::{self, Record};
use crate::session::{Route, RouteDecision, Session};
use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Clone)]
pub struct ApiState {
    pub session: Arc<Mutex<Session>>,
    pub model: Arc<dyn LanguageModel>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/v1/session",
            get(session_get).post(session_login).delete(session_logout),
        )
        .route("/api/v1/signup", post(signup))
        .route(
            "/api/v1/onboarding",
            get(onboarding_suggestions).post(onboarding_complete),
        )
        .route("/api/v1/home", get(home))
        .route("/api/v1/habits", get(habits_list).post(habits_create))
        .route("/api/v1/habits/:id", put(habits_update).delete(habits_delete))
        .route("/api/v1/habits/:id/toggle", post(habits_toggle))
        .route("/api/v1/tasks", get(tasks_list).post(tasks_create))
        .route("/api/v1/tasks/prep", post(tasks_prep))
        .route("/api/v1/tasks/:id", put(tasks_update).delete(tasks_delete))
        .route("/api/v1/tasks/:id/toggle", post(tasks_toggle))
        .route("/api/v1/goals", get(goals_list).post(goals_create))
        .route("/api/v1/goals/:id", put(goals_update).delete(goals_delete))
        .route("/api/v1/coach", get(coach_history).post(coach_send))
        .route("/api/v1/reflect", get(reflect_prompts).post(reflect_save))
        .route("/api/v1/journal", get(journal_list))
        .route("/api/v1/journal/:id", delete(journal_delete))
        .route("/api/v1/settings", get(settings_get).put(settings_put))
        .route("/api/v1/achievements", get(achievements))
        .route("/api/v1/achievements/:id/unlock", post(achievements_unlock))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct SignupPayload {
    name: String,
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct SessionPayload {
    user: Option<UserProfile>,
    onboarded: bool,
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MoodQuery {
    mood: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PrepPayload {
    #[serde(default)]
    mood: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskPayload {
    #[serde(flatten)]
    draft: TaskDraft,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoachPayload {
    message: String,
    #[serde(default)]
    mood: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReflectPayload {
    #[serde(flatten)]
    reflection: Reflection,
    date: Option<String>,
}

#[derive(Debug, Serialize)]
struct SuggestionGroup {
    category: GoalCategory,
    label: &'static str,
    habits: &'static [SuggestedHabit],
}

async fn session_get(State(state): State<ApiState>) -> ApiResult<Json<SessionPayload>> {
    with_session(&state, |session| {
        Ok(Json(SessionPayload {
            user: session.user().map(|user| user.profile()),
            onboarded: session.is_onboarded()?,
        }))
    })
}

async fn session_login(
    State(state): State<ApiState>,
    Json(payload): Json<Credentials>,
) -> ApiResult<Json<SessionPayload>> {
    with_session(&state, |session| {
        if !session.login(&payload.email, &payload.password)? {
            return Err(ApiError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }

        Ok(Json(SessionPayload {
            user: session.user().map(|user| user.profile()),
            onboarded: session.is_onboarded()?,
        }))
    })
}

async fn session_logout(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    with_session(&state, |session| {
        session.logout()?;
        Ok(Json(json!({ "signed_out": true })))
    })
}

async fn signup(
    State(state): State<ApiState>,
    Json(payload): Json<SignupPayload>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    with_session(&state, |session| {
        let user = session
            .signup(&payload.name, &payload.email, &payload.password)
            .map_err(ApiError::bad_request)?;
        Ok((StatusCode::CREATED, Json(user.profile())))
    })
}

async fn onboarding_suggestions() -> Json<Vec<SuggestionGroup>> {
    Json(
        GoalCategory::ALL
            .into_iter()
            .map(|category| SuggestionGroup {
                category,
                label: category.label(),
                habits: suggested_habits(category),
            })
            .collect(),
    )
}

async fn onboarding_complete(
    State(state): State<ApiState>,
    Json(plan): Json<OnboardingPlan>,
) -> ApiResult<Json<OnboardingOutcome>> {
    with_route(&state, Route::Onboarding, |session| {
        Ok(Json(complete_onboarding(session.store(), &plan)?))
    })
}

async fn home(
    State(state): State<ApiState>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<DailySummary>> {
    let date = parse_optional_date(query.date.as_deref())?;
    with_route(&state, Route::Home, |session| {
        Ok(Json(build_daily_summary(session.store(), date)?))
    })
}

async fn habits_list(State(state): State<ApiState>) -> ApiResult<Json<Vec<Habit>>> {
    with_route(&state, Route::Habits, |session| {
        Ok(Json(list_habits(session.store())?))
    })
}

async fn habits_create(
    State(state): State<ApiState>,
    Json(payload): Json<NewHabit>,
) -> ApiResult<(StatusCode, Json<Habit>)> {
    with_route(&state, Route::Habits, |session| {
        let habit = add_habit(session.store(), payload).map_err(ApiError::bad_request)?;
        Ok((StatusCode::CREATED, Json(habit)))
    })
}

async fn habits_update(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(changes): Json<HabitUpdate>,
) -> ApiResult<Json<Habit>> {
    with_route(&state, Route::Habits, |session| {
        let id = resolve::<Habit>(session, &id)?;
        let habit = update_habit(session.store(), &id, changes).map_err(ApiError::bad_request)?;
        Ok(Json(habit))
    })
}

async fn habits_delete(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Habit>> {
    with_route(&state, Route::Habits, |session| {
        let id = resolve::<Habit>(session, &id)?;
        Ok(Json(delete_habit(session.store(), &id)?))
    })
}

async fn habits_toggle(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Habit>> {
    with_route(&state, Route::Habits, |session| {
        let id = resolve::<Habit>(session, &id)?;
        Ok(Json(toggle_habit(session.store(), &id, domain::today())?))
    })
}

async fn tasks_list(
    State(state): State<ApiState>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let date = parse_optional_date(query.date.as_deref())?;
    with_route(&state, Route::Home, |session| {
        Ok(Json(tasks_for_date(session.store(), date)?))
    })
}

async fn tasks_create(
    State(state): State<ApiState>,
    Json(payload): Json<TaskPayload>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let date = parse_optional_date(payload.date.as_deref())?;
    with_route(&state, Route::Home, |session| {
        let task = add_task(session.store(), payload.draft, date).map_err(ApiError::bad_request)?;
        Ok((StatusCode::CREATED, Json(task)))
    })
}

async fn tasks_update(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(changes): Json<TaskUpdate>,
) -> ApiResult<Json<Task>> {
    with_route(&state, Route::Home, |session| {
        let id = resolve::<Task>(session, &id)?;
        let task = update_task(session.store(), &id, changes).map_err(ApiError::bad_request)?;
        Ok(Json(task))
    })
}

async fn tasks_delete(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    with_route(&state, Route::Home, |session| {
        let id = resolve::<Task>(session, &id)?;
        Ok(Json(delete_task(session.store(), &id)?))
    })
}

async fn tasks_toggle(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    with_route(&state, Route::Home, |session| {
        let id = resolve::<Task>(session, &id)?;
        Ok(Json(toggle_task(session.store(), &id)?))
    })
}

async fn tasks_prep(
    State(state): State<ApiState>,
    payload: Option<Json<PrepPayload>>,
) -> ApiResult<Json<Vec<Task>>> {
    let mood = payload.and_then(|Json(payload)| payload.mood);
    let prep = with_route(&state, Route::Home, |session| {
        Ok(MorningPrep::prepare(session.store(), domain::today(), mood)?)
    })?;

    let model = Arc::clone(&state.model);
    let (prep, drafts) = tokio::task::spawn_blocking(move || {
        let drafts = prep.generate(model.as_ref());
        (prep, drafts)
    })
    .await
    .context("Morning prep worker failed")?;

    with_session(&state, |session| {
        Ok(Json(add_tasks(
            session.store(),
            drafts,
            prep.date,
        )?))
    })
}

async fn goals_list(State(state): State<ApiState>) -> ApiResult<Json<Vec<Goal>>> {
    with_route(&state, Route::Profile, |session| {
        Ok(Json(list_goals(session.store())?))
    })
}

async fn goals_create(
    State(state): State<ApiState>,
    Json(payload): Json<NewGoal>,
) -> ApiResult<(StatusCode, Json<Goal>)> {
    with_route(&state, Route::Profile, |session| {
        let goal = add_goal(session.store(), payload).map_err(ApiError::bad_request)?;
        Ok((StatusCode::CREATED, Json(goal)))
    })
}

async fn goals_update(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(changes): Json<GoalUpdate>,
) -> ApiResult<Json<Goal>> {
    with_route(&state, Route::Profile, |session| {
        let id = resolve::<Goal>(session, &id)?;
        let goal = update_goal(session.store(), &id, changes).map_err(ApiError::bad_request)?;
        Ok(Json(goal))
    })
}

async fn goals_delete(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Goal>> {
    with_route(&state, Route::Profile, |session| {
        let id = resolve::<Goal>(session, &id)?;
        Ok(Json(delete_goal(session.store(), &id)?))
    })
}

async fn coach_history(State(state): State<ApiState>) -> ApiResult<Json<Vec<ChatMessage>>> {
    with_route(&state, Route::Coach, |session| {
        Ok(Json(chat_history(session.store())?))
    })
}

async fn coach_send(
    State(state): State<ApiState>,
    Json(payload): Json<CoachPayload>,
) -> ApiResult<Json<ChatMessage>> {
    let turn = with_route(&state, Route::Coach, |session| {
        CoachTurn::begin(session.store(), &payload.message, payload.mood.clone())
            .map_err(ApiError::bad_request)
    })?;

    let model = Arc::clone(&state.model);
    let (turn, reply) = tokio::task::spawn_blocking(move || {
        let reply = turn.ask(model.as_ref());
        (turn, reply)
    })
    .await
    .context("Coach worker failed")?;

    let reply = reply?;
    with_session(&state, |session| Ok(Json(turn.finish(session.store(), &reply)?)))
}

async fn reflect_prompts(
    State(state): State<ApiState>,
    Query(query): Query<MoodQuery>,
) -> ApiResult<Json<Vec<String>>> {
    let mood = query.mood.unwrap_or_default();
    let date = domain::today();
    let (tasks_completed, habits) = with_route(&state, Route::Reflect, |session| {
        let completed = tasks_for_date(session.store(), date)?
            .iter()
            .filter(|task| task.completed)
            .count();
        let habits = list_habits(session.store())?
            .into_iter()
            .map(|habit| habit.title)
            .collect::<Vec<_>>();
        Ok((completed, habits))
    })?;

    let model = Arc::clone(&state.model);
    let prompts = tokio::task::spawn_blocking(move || {
        crate::ai::generate_reflection_prompts(model.as_ref(), &mood, tasks_completed, &habits)
    })
    .await
    .context("Reflection worker failed")?;

    Ok(Json(prompts))
}

async fn reflect_save(
    State(state): State<ApiState>,
    Json(payload): Json<ReflectPayload>,
) -> ApiResult<(StatusCode, Json<JournalEntry>)> {
    let date = parse_optional_date(payload.date.as_deref())?;
    let reflection = with_route(&state, Route::Reflect, |session| {
        Ok(EveningReflection::prepare(session.store(), date, payload.reflection)?)
    })?;

    let model = Arc::clone(&state.model);
    let (reflection, content) = tokio::task::spawn_blocking(move || {
        let content = reflection.write(model.as_ref());
        (reflection, content)
    })
    .await
    .context("Journal worker failed")?;

    with_session(&state, |session| {
        let entry = reflection.save(session.store(), &content)?;
        Ok((StatusCode::CREATED, Json(entry)))
    })
}

async fn journal_list(State(state): State<ApiState>) -> ApiResult<Json<Vec<JournalEntry>>> {
    with_route(&state, Route::Reflect, |session| {
        Ok(Json(list_journal_entries(session.store())?))
    })
}

async fn journal_delete(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JournalEntry>> {
    with_route(&state, Route::Reflect, |session| {
        let id = resolve::<JournalEntry>(session, &id)?;
        Ok(Json(delete_journal_entry(session.store(), &id)?))
    })
}

async fn settings_get(State(state): State<ApiState>) -> ApiResult<Json<Settings>> {
    with_route(&state, Route::Profile, |session| {
        Ok(Json(get_settings(session.store())?))
    })
}

async fn settings_put(
    State(state): State<ApiState>,
    Json(settings): Json<Settings>,
) -> ApiResult<Json<Settings>> {
    with_route(&state, Route::Profile, |session| {
        save_settings(session.store(), &settings).map_err(ApiError::bad_request)?;
        Ok(Json(settings))
    })
}

async fn achievements(State(state): State<ApiState>) -> ApiResult<Json<Vec<Achievement>>> {
    with_route(&state, Route::Profile, |session| {
        Ok(Json(get_achievements(session.store())?))
    })
}

async fn achievements_unlock(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Achievement>> {
    with_route(&state, Route::Profile, |session| {
        let achievement = unlock_achievement(session.store(), &id, Utc::now())
            .map_err(|error| ApiError::NotFound(error.to_string()))?;
        Ok(Json(achievement))
    })
}

/// Runs `apply` with the session locked. The lock is never held across an
/// await point.
fn with_session<R, F>(state: &ApiState, apply: F) -> ApiResult<R>
where
    F: FnOnce(&mut Session) -> ApiResult<R>,
{
    let mut session = state
        .session
        .lock()
        .map_err(|_| ApiError::Internal(anyhow::anyhow!("Session lock poisoned")))?;
    apply(&mut *session)
}

fn with_route<R, F>(state: &ApiState, route: Route, apply: F) -> ApiResult<R>
where
    F: FnOnce(&mut Session) -> ApiResult<R>,
{
    with_session(state, |session| {
        match session.route(route)? {
            RouteDecision::Allow => {}
            RouteDecision::Redirect(Route::Onboarding) => {
                return Err(ApiError::Conflict("Onboarding required".to_string()));
            }
            RouteDecision::Redirect(_) => {
                return Err(ApiError::Unauthorized("Sign in required".to_string()));
            }
        }
        apply(session)
    })
}

fn resolve<T: Record>(session: &Session, needle: &str) -> ApiResult<String> {
    domain::resolve_id::<T>(session.store(), needle)
        .map_err(|error| ApiError::NotFound(error.to_string()))
}

fn parse_optional_date(input: Option<&str>) -> ApiResult<NaiveDate> {
    input
        .map(|raw| parse_date(raw).map_err(ApiError::bad_request))
        .transpose()
        .map(|date| date.unwrap_or_else(domain::today))
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format: {input}. Example: 2026-02-18"))
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Conflict(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn bad_request(error: anyhow::Error) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(error) => {
                warn!(error = %error, "API request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
