mod ai;
mod api;
mod cli;
mod config;
mod db;
mod domain;
mod scheduler;
mod session;
mod voice;

use crate::ai::{GeminiClient, LanguageModel};
use crate::api::routes::ApiState;
use crate::cli::interactive::{run_coach, run_reflection};
use crate::cli::onboard::run_onboarding;
use crate::cli::{
    AiCommands, Cli, Commands, ConfigCommands, GoalCommands, HabitCommands, JournalCommands,
    ProfileCommands, SettingsCommands, TaskCommands,
};
use crate::config::Config;
use crate::db::Store;
use crate::domain::achievements::get_achievements;
use crate::domain::goals::{Goal, NewGoal, add_goal, delete_goal, list_goals};
use crate::domain::habits::{Habit, NewHabit, add_habit, delete_habit, list_habits, toggle_habit};
use crate::domain::journal::{entries_on, list_journal_entries};
use crate::domain::settings::{get_settings, save_settings};
use crate::domain::summary::{build_daily_summary, render_markdown};
use crate::domain::tasks::{
    MorningPrep, Task, TaskDraft, add_task, add_tasks, delete_task, tasks_for_date, toggle_task,
};
use crate::domain::users::UserUpdate;
use crate::domain::{resolve_id, short_id, today};
use crate::scheduler::{DailyJob, DailySchedule};
use crate::session::{Route, RouteDecision, Session};
use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use clap::Parser;
use dialoguer::{Input, Password, theme::ColorfulTheme};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Signup { name, email } => handle_signup(name, email),
        Commands::Login { email } => handle_login(email),
        Commands::Logout => handle_logout(),
        Commands::Whoami => handle_whoami(),
        Commands::Profile { command } => handle_profile_command(command),
        Commands::Onboard => handle_onboard(),
        Commands::Home => handle_home(),
        Commands::Prep { mood } => handle_prep(mood),
        Commands::Habit { command } => handle_habit_command(command),
        Commands::Task { command } => handle_task_command(command),
        Commands::Goal { command } => handle_goal_command(command),
        Commands::Coach {
            message,
            mood,
            voice,
        } => handle_coach(message, mood, voice),
        Commands::Reflect => handle_reflect(),
        Commands::Journal { command } => handle_journal_command(command),
        Commands::Settings { command } => handle_settings_command(command),
        Commands::Achievements => handle_achievements(),
        Commands::Summary { date } => handle_summary(date),
        Commands::Config { command } => handle_config_command(command),
        Commands::Ai { command } => handle_ai_command(command),
        Commands::Doctor => handle_doctor(),
        Commands::Serve { port } => {
            let config = Config::load_or_default()?;
            run_service(config, port).await
        }
    }
}

fn handle_signup(name: Option<String>, email: Option<String>) -> Result<()> {
    let mut session = open_session(&Config::load_or_default()?)?;
    if let RouteDecision::Redirect(_) = session.route(Route::Signup)? {
        println!("Already signed in. Run `justly logout` to switch accounts.");
        return Ok(());
    }

    let theme = ColorfulTheme::default();
    let name = match name {
        Some(value) => value,
        None => Input::with_theme(&theme)
            .with_prompt("Name")
            .interact_text()
            .context("Failed to read name")?,
    };
    let email = match email {
        Some(value) => value,
        None => Input::with_theme(&theme)
            .with_prompt("Email")
            .interact_text()
            .context("Failed to read email")?,
    };
    let password = Password::with_theme(&theme)
        .with_prompt("Password (min 6 characters)")
        .with_confirmation("Repeat password", "Passwords do not match")
        .interact()
        .context("Failed to read password")?;

    let user = session.signup(&name, &email, &password)?;
    println!("Welcome, {}! Run `justly onboard` to set your goals.", user.name);
    Ok(())
}

fn handle_login(email: Option<String>) -> Result<()> {
    let mut session = open_session(&Config::load_or_default()?)?;
    if let RouteDecision::Redirect(_) = session.route(Route::Login)? {
        println!("Already signed in. Run `justly logout` to switch accounts.");
        return Ok(());
    }

    let theme = ColorfulTheme::default();
    let email = match email {
        Some(value) => value,
        None => Input::with_theme(&theme)
            .with_prompt("Email")
            .interact_text()
            .context("Failed to read email")?,
    };
    let password = Password::with_theme(&theme)
        .with_prompt("Password")
        .interact()
        .context("Failed to read password")?;

    if !session.login(&email, &password)? {
        bail!("Invalid email or password");
    }

    let name = session.user().map(|user| user.name.clone()).unwrap_or_default();
    println!("Welcome back, {name}!");
    if !session.is_onboarded()? {
        println!("Run `justly onboard` to finish setting up.");
    }
    Ok(())
}

fn handle_logout() -> Result<()> {
    let mut session = open_session(&Config::load_or_default()?)?;
    session.logout()?;
    println!("Signed out");
    Ok(())
}

fn handle_whoami() -> Result<()> {
    let session = open_session(&Config::load_or_default()?)?;
    match session.user() {
        Some(user) => {
            let profile = user.profile();
            println!("{} <{}>", profile.name, profile.email);
            println!("- member since: {}", profile.created_at.format("%Y-%m-%d"));
            println!("- onboarded: {}", session.is_onboarded()?);
        }
        None => println!("Not signed in"),
    }
    Ok(())
}

fn handle_profile_command(command: ProfileCommands) -> Result<()> {
    let mut session = open_session(&Config::load_or_default()?)?;
    require_route(&session, Route::Profile)?;

    match command {
        ProfileCommands::Update {
            name,
            email,
            password,
        } => {
            let password = if password {
                Some(
                    Password::with_theme(&ColorfulTheme::default())
                        .with_prompt("New password (min 6 characters)")
                        .with_confirmation("Repeat password", "Passwords do not match")
                        .interact()
                        .context("Failed to read password")?,
                )
            } else {
                None
            };

            if name.is_none() && email.is_none() && password.is_none() {
                bail!("Nothing to update. Use --name, --email or --password");
            }

            let user = session.update_user(UserUpdate {
                name,
                email,
                password,
            })?;
            println!("Profile updated: {} <{}>", user.name, user.email);
            Ok(())
        }
    }
}

fn handle_onboard() -> Result<()> {
    let session = open_session(&Config::load_or_default()?)?;
    require_route(&session, Route::Onboarding)?;

    if session.is_onboarded()? {
        println!("Onboarding already completed. Use `justly goal add` or `justly habit add`.");
        return Ok(());
    }

    run_onboarding(&session)?;
    Ok(())
}

fn handle_home() -> Result<()> {
    let session = open_session(&Config::load_or_default()?)?;
    require_route(&session, Route::Home)?;

    let store = session.store();
    let date = today();
    let show_streak = get_settings(store)?.privacy.show_streak;
    let name = session.user().map(|user| user.name.as_str()).unwrap_or("there");

    println!("Hi {name}! Today is {}", date.format("%A, %B %-d"));

    println!("\nHabits");
    let habits = list_habits(store)?;
    if habits.is_empty() {
        println!("  (none) add one with `justly habit add`");
    }
    for habit in &habits {
        println!("  {}", format_habit(habit, date, show_streak));
    }

    println!("\nTasks");
    let tasks = tasks_for_date(store, date)?;
    if tasks.is_empty() {
        println!("  (none) run `justly prep` for suggestions");
    }
    for task in &tasks {
        println!("  {}", format_task(task));
    }

    Ok(())
}

fn handle_prep(mood: Option<String>) -> Result<()> {
    let config = Config::load_or_default()?;
    let session = open_session(&config)?;
    require_route(&session, Route::Home)?;

    let model = GeminiClient::from_config(&config);
    let date = today();
    let tasks = MorningPrep::prepare(session.store(), date, mood)?.run(session.store(), &model)?;

    println!("Today's focus ({date}):");
    for task in &tasks {
        println!("  {}", format_task(task));
    }
    Ok(())
}

fn handle_habit_command(command: HabitCommands) -> Result<()> {
    let session = open_session(&Config::load_or_default()?)?;
    require_route(&session, Route::Habits)?;
    let store = session.store();
    let date = today();

    match command {
        HabitCommands::Add {
            title,
            category,
            description,
            frequency,
        } => {
            let habit = add_habit(
                store,
                NewHabit {
                    title,
                    description,
                    category: category.parse()?,
                    frequency: frequency.parse()?,
                },
            )?;
            println!("Habit added: {} ({})", habit.title, short_id(&habit.id));
        }
        HabitCommands::List => {
            let show_streak = get_settings(store)?.privacy.show_streak;
            let habits = list_habits(store)?;
            if habits.is_empty() {
                println!("No habits yet");
            }
            for habit in &habits {
                println!("{}", format_habit(habit, date, show_streak));
            }
        }
        HabitCommands::Toggle { id } => {
            let id = resolve_id::<Habit>(store, &id)?;
            let habit = toggle_habit(store, &id, date)?;
            if habit.is_completed_on(date) {
                println!("Done: {} (streak {})", habit.title, habit.streak);
            } else {
                println!("Undone: {}", habit.title);
            }
        }
        HabitCommands::Delete { id } => {
            let id = resolve_id::<Habit>(store, &id)?;
            let habit = delete_habit(store, &id)?;
            println!("Habit deleted: {}", habit.title);
        }
    }

    Ok(())
}

fn handle_task_command(command: TaskCommands) -> Result<()> {
    let session = open_session(&Config::load_or_default()?)?;
    require_route(&session, Route::Home)?;
    let store = session.store();

    match command {
        TaskCommands::Add {
            title,
            priority,
            description,
            date,
        } => {
            let date = parse_optional_date(date)?;
            let task = add_task(
                store,
                TaskDraft {
                    title,
                    priority: priority.parse()?,
                    description,
                },
                date,
            )?;
            println!("Task added for {date}: {} ({})", task.title, short_id(&task.id));
        }
        TaskCommands::List { date } => {
            let date = parse_optional_date(date)?;
            let tasks = tasks_for_date(store, date)?;
            if tasks.is_empty() {
                println!("No tasks for {date}");
            }
            for task in &tasks {
                println!("{}", format_task(task));
            }
        }
        TaskCommands::Toggle { id } => {
            let id = resolve_id::<Task>(store, &id)?;
            let task = toggle_task(store, &id)?;
            let state = if task.completed { "Done" } else { "Open" };
            println!("{state}: {}", task.title);
        }
        TaskCommands::Delete { id } => {
            let id = resolve_id::<Task>(store, &id)?;
            let task = delete_task(store, &id)?;
            println!("Task deleted: {}", task.title);
        }
    }

    Ok(())
}

fn handle_goal_command(command: GoalCommands) -> Result<()> {
    let session = open_session(&Config::load_or_default()?)?;
    require_route(&session, Route::Profile)?;
    let store = session.store();

    match command {
        GoalCommands::Add {
            title,
            category,
            description,
        } => {
            let goal = add_goal(
                store,
                NewGoal {
                    title,
                    description,
                    category: category.parse()?,
                },
            )?;
            println!("Goal added: {} ({})", goal.title, short_id(&goal.id));
        }
        GoalCommands::List => {
            let goals = list_goals(store)?;
            if goals.is_empty() {
                println!("No goals yet");
            }
            for goal in &goals {
                println!("{} {} [{}]", short_id(&goal.id), goal.title, goal.category.label());
            }
        }
        GoalCommands::Delete { id } => {
            let id = resolve_id::<Goal>(store, &id)?;
            let goal = delete_goal(store, &id)?;
            println!("Goal deleted: {}", goal.title);
        }
    }

    Ok(())
}

fn handle_coach(message: Option<String>, mood: Option<String>, use_voice: bool) -> Result<()> {
    let config = Config::load_or_default()?;
    let session = open_session(&config)?;
    require_route(&session, Route::Coach)?;

    let voice_input = if use_voice {
        match voice::detect(&config) {
            Some(input) => Some(input),
            None => {
                println!(
                    "Voice input is not supported here. Set `justly config set voice.command <CMD>` to a speech-to-text command."
                );
                return Ok(());
            }
        }
    } else {
        None
    };

    let model = GeminiClient::from_config(&config);
    run_coach(&session, &model, message, mood, voice_input.as_deref())
}

fn handle_reflect() -> Result<()> {
    let config = Config::load_or_default()?;
    let session = open_session(&config)?;
    require_route(&session, Route::Reflect)?;

    let model = GeminiClient::from_config(&config);
    run_reflection(&session, &model)?;
    Ok(())
}

fn handle_journal_command(command: JournalCommands) -> Result<()> {
    let session = open_session(&Config::load_or_default()?)?;
    require_route(&session, Route::Reflect)?;

    match command {
        JournalCommands::List { limit } => {
            let mut entries = list_journal_entries(session.store())?;
            entries.sort_by(|left, right| right.created_at.cmp(&left.created_at));
            if entries.is_empty() {
                println!("Your journal is empty. Run `justly reflect` tonight.");
            }
            for entry in entries.iter().take(limit.unwrap_or(usize::MAX)) {
                println!("## {} ({})\n{}\n", entry.date, short_id(&entry.id), entry.content);
            }
        }
    }

    Ok(())
}

fn handle_settings_command(command: SettingsCommands) -> Result<()> {
    let session = open_session(&Config::load_or_default()?)?;
    require_route(&session, Route::Profile)?;
    let store = session.store();

    match command {
        SettingsCommands::Show => {
            let settings = get_settings(store)?;
            println!("notifications: {}", settings.notifications);
            println!("morning_prep_time: {}", settings.morning_prep_time);
            println!("evening_reflection_time: {}", settings.evening_reflection_time);
            println!("privacy.show_streak: {}", settings.privacy.show_streak);
        }
        SettingsCommands::Set { key, value } => {
            let mut settings = get_settings(store)?;
            settings.set_value(&key, &value)?;
            save_settings(store, &settings)?;
            println!("Setting saved: {key} = {}", value.trim());
        }
    }

    Ok(())
}

fn handle_achievements() -> Result<()> {
    let session = open_session(&Config::load_or_default()?)?;
    require_route(&session, Route::Profile)?;

    let achievements = get_achievements(session.store())?;
    let unlocked = achievements
        .iter()
        .filter(|achievement| achievement.is_unlocked())
        .count();
    println!("Achievements: {unlocked}/{} unlocked", achievements.len());

    for achievement in achievements {
        let state = achievement
            .unlocked_at
            .map(|at| format!("unlocked {}", at.format("%Y-%m-%d")))
            .unwrap_or_else(|| "locked".to_string());
        println!(
            "[{state}] {} - {}",
            achievement.title, achievement.description
        );
    }
    Ok(())
}

fn handle_summary(date: Option<String>) -> Result<()> {
    let session = open_session(&Config::load_or_default()?)?;
    require_route(&session, Route::Home)?;

    let date = parse_optional_date(date)?;
    let summary = build_daily_summary(session.store(), date)?;
    println!("{}", render_markdown(&summary));
    Ok(())
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load_or_default()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            let masked = if key.contains("api_key") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = Config::load_or_default()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_ai_command(command: AiCommands) -> Result<()> {
    match command {
        AiCommands::Test {
            key,
            base_url,
            model,
        } => {
            let mut config = Config::load_or_default()?;

            if let Some(value) = key {
                config.ai_api_key = Some(value);
            }
            if let Some(value) = base_url {
                config.ai_api_base_url = value;
            }
            if let Some(value) = model {
                config.ai_model = value;
            }

            let client = GeminiClient::from_config(&config);
            let response = ai::test_connection(&client)?;
            println!("AI API connection successful ({})", client.endpoint());
            println!("{response}");

            Ok(())
        }
    }
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = Config::load_or_default()?;

    match Store::open(&config.db_path) {
        Ok(store) => {
            println!("[OK] SQLite reachable: {}", config.db_path.display());
            match store.keys() {
                Ok(keys) => println!("[OK] store collections: {}", keys.len()),
                Err(error) => {
                    println!("[WARN] store read failed: {error}");
                    issues.push("store unreadable".to_string());
                }
            }
            match Session::start(store) {
                Ok(session) => {
                    match session.user() {
                        Some(user) => println!("[OK] signed in as {}", user.email),
                        None => {
                            println!("[WARN] not signed in");
                            issues.push("not signed in".to_string());
                        }
                    }
                    match get_settings(session.store()).and_then(|settings| settings.validate()) {
                        Ok(()) => println!("[OK] reminder times valid"),
                        Err(error) => {
                            println!("[WARN] invalid settings: {error}");
                            issues.push("invalid settings".to_string());
                        }
                    }
                }
                Err(error) => {
                    println!("[WARN] session check failed: {error}");
                    issues.push("session unreadable".to_string());
                }
            }
        }
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable".to_string());
        }
    }

    if config.ai_enabled {
        if ai::has_api_key(&config) {
            println!("[OK] AI API key is configured");
        } else {
            println!(
                "[WARN] AI is enabled but API key is missing (set ai.api_key or {})",
                config::API_KEY_ENV
            );
            issues.push("ai api key missing".to_string());
        }
    } else {
        println!("[OK] AI feature disabled (fallback tasks and journal text are used)");
    }

    if voice::detect(&config).is_some() {
        println!("[OK] voice input command configured");
    } else {
        println!("[OK] voice input not configured (optional)");
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

async fn run_service(config: Config, port: Option<u16>) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let session = Arc::new(Mutex::new(open_session(&config)?));
    let model: Arc<dyn LanguageModel> = Arc::new(GeminiClient::from_config(&config));
    let port = port.unwrap_or(config.api_port);

    let state = ApiState {
        session: Arc::clone(&session),
        model: Arc::clone(&model),
    };
    let schedule_session = Arc::clone(&session);

    info!("Justly service started");

    tokio::select! {
        scheduler_result = scheduler::run_daily_scheduler(move || {
            let session = lock_session(&schedule_session)?;
            DailySchedule::from_settings(&get_settings(session.store())?)
        }, move |job, date| {
            let session = Arc::clone(&session);
            let model = Arc::clone(&model);
            async move { run_daily_job(session, model, job, date).await }
        }) => {
            scheduler_result?;
        }
        api_result = api::run_server(state, port) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

async fn run_daily_job(
    session: Arc<Mutex<Session>>,
    model: Arc<dyn LanguageModel>,
    job: DailyJob,
    date: NaiveDate,
) -> Result<()> {
    match job {
        DailyJob::MorningPrep => {
            let prep = {
                let session = lock_session(&session)?;
                if session.route(Route::Home)? != RouteDecision::Allow {
                    info!(job = %job, "no onboarded user; job skipped");
                    return Ok(());
                }
                if !tasks_for_date(session.store(), date)?.is_empty() {
                    info!(job = %job, date = %date, "tasks already planned; job skipped");
                    return Ok(());
                }
                MorningPrep::prepare(session.store(), date, None)?
            };

            let drafts = tokio::task::spawn_blocking(move || prep.generate(model.as_ref()))
                .await
                .context("Morning prep worker failed")?;

            let session = lock_session(&session)?;
            let tasks = add_tasks(session.store(), drafts, date)?;
            info!(date = %date, count = tasks.len(), "morning prep ready");
            println!(
                "Good morning! {} task(s) planned for {date}. Run `justly home`.",
                tasks.len()
            );
        }
        DailyJob::EveningReflection => {
            let session = lock_session(&session)?;
            if session.route(Route::Reflect)? != RouteDecision::Allow {
                info!(job = %job, "no onboarded user; job skipped");
                return Ok(());
            }
            if entries_on(session.store(), date)?.is_empty() {
                info!(date = %date, "evening reflection reminder");
                println!("Time to reflect on your day. Run `justly reflect`.");
            } else {
                info!(date = %date, "journal already written; reminder skipped");
            }
        }
    }

    Ok(())
}

fn lock_session(session: &Mutex<Session>) -> Result<MutexGuard<'_, Session>> {
    session.lock().map_err(|_| anyhow!("Session lock poisoned"))
}

fn require_route(session: &Session, route: Route) -> Result<()> {
    match session.route(route)? {
        RouteDecision::Allow => Ok(()),
        RouteDecision::Redirect(Route::Onboarding) => {
            bail!("Finish onboarding first: run `justly onboard`")
        }
        RouteDecision::Redirect(_) => {
            bail!("Not signed in. Run `justly login` or `justly signup` first")
        }
    }
}

fn format_habit(habit: &Habit, date: NaiveDate, show_streak: bool) -> String {
    let mark = if habit.is_completed_on(date) { "x" } else { " " };
    let mut line = format!(
        "[{mark}] {} {} ({})",
        short_id(&habit.id),
        habit.title,
        habit.category
    );
    if show_streak {
        line.push_str(&format!(" - streak {}", habit.current_streak(date)));
    }
    line
}

fn format_task(task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    format!(
        "[{mark}] {} {} [{}]",
        short_id(&task.id),
        task.title,
        task.priority
    )
}

fn parse_optional_date(input: Option<String>) -> Result<NaiveDate> {
    input
        .as_deref()
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format: {date}. Example: 2026-02-18"))
        })
        .transpose()
        .map(|date| date.unwrap_or_else(today))
}

fn open_session(config: &Config) -> Result<Session> {
    let store = Store::open(&config.db_path)?;
    Session::start(store)
}

