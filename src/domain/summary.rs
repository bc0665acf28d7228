use crate::db::Store;
use crate::domain::habits::{Habit, list_habits};
use crate::domain::journal::entries_on;
use crate::domain::settings::get_settings;
use crate::domain::tasks::{Task, tasks_for_date};
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HabitStatus {
    pub title: String,
    pub category: String,
    pub completed: bool,
    /// Omitted when `privacy.show_streak` is off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streak: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub date: String,
    pub habits_completed: usize,
    pub habits_total: usize,
    pub tasks_completed: usize,
    pub tasks_total: usize,
    pub habits: Vec<HabitStatus>,
    pub tasks: Vec<Task>,
    pub best_streak: Option<HabitStatus>,
    pub journal_written: bool,
    pub show_streak: bool,
    pub nudges: Vec<String>,
}

pub fn build_daily_summary(store: &Store, date: NaiveDate) -> Result<DailySummary> {
    let habits = list_habits(store)?;
    let tasks = tasks_for_date(store, date)?;
    let journal_written = !entries_on(store, date)?.is_empty();
    let show_streak = get_settings(store)?.privacy.show_streak;

    Ok(summarize(date, &habits, tasks, journal_written, show_streak))
}

fn summarize(
    date: NaiveDate,
    habits: &[Habit],
    tasks: Vec<Task>,
    journal_written: bool,
    show_streak: bool,
) -> DailySummary {
    let statuses = habits
        .iter()
        .map(|habit| HabitStatus {
            title: habit.title.clone(),
            category: habit.category.to_string(),
            completed: habit.is_completed_on(date),
            streak: show_streak.then(|| habit.current_streak(date)),
        })
        .collect::<Vec<_>>();

    let habits_completed = statuses.iter().filter(|status| status.completed).count();
    let tasks_completed = tasks.iter().filter(|task| task.completed).count();

    let best_streak = statuses
        .iter()
        .filter(|status| status.streak.is_some_and(|streak| streak > 0))
        .max_by(|left, right| {
            left.streak
                .cmp(&right.streak)
                .then_with(|| right.title.cmp(&left.title))
        })
        .cloned();

    let nudges = detect_nudges(
        habits_completed,
        statuses.len(),
        tasks_completed,
        tasks.len(),
        journal_written,
    );

    DailySummary {
        date: date.format("%Y-%m-%d").to_string(),
        habits_completed,
        habits_total: statuses.len(),
        tasks_completed,
        tasks_total: tasks.len(),
        habits: statuses,
        tasks,
        best_streak,
        journal_written,
        show_streak,
        nudges,
    }
}

fn detect_nudges(
    habits_completed: usize,
    habits_total: usize,
    tasks_completed: usize,
    tasks_total: usize,
    journal_written: bool,
) -> Vec<String> {
    let no_habits = (habits_total == 0)
        .then_some("No habits yet. Add one with `justly habit add`".to_string());
    let no_tasks = (tasks_total == 0)
        .then_some("No tasks planned. Run `justly prep` for AI suggestions".to_string());
    let all_done = (habits_total > 0
        && habits_completed == habits_total
        && tasks_completed == tasks_total)
        .then_some("Everything done for today. Nice work!".to_string());
    let reflect = (!journal_written)
        .then_some("Close the day with `justly reflect`".to_string());

    [no_habits, no_tasks, all_done, reflect]
        .into_iter()
        .flatten()
        .collect()
}

pub fn render_markdown(summary: &DailySummary) -> String {
    let habit_rows = if summary.habits.is_empty() {
        "- No habits".to_string()
    } else {
        summary
            .habits
            .iter()
            .map(|status| {
                let mark = if status.completed { "x" } else { " " };
                match status.streak {
                    Some(streak) => format!(
                        "- [{mark}] {} ({}) - streak {streak}",
                        status.title, status.category
                    ),
                    None => format!("- [{mark}] {} ({})", status.title, status.category),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let task_rows = if summary.tasks.is_empty() {
        "- No tasks".to_string()
    } else {
        summary
            .tasks
            .iter()
            .map(|task| {
                let mark = if task.completed { "x" } else { " " };
                format!("- [{mark}] {} [{}]", task.title, task.priority)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let best_streak = summary
        .best_streak
        .as_ref()
        .and_then(|status| status.streak.map(|streak| (status, streak)))
        .map(|(status, streak)| format!("\n- Best streak: {} ({streak} days)", status.title))
        .unwrap_or_default();

    let nudge_rows = summary
        .nudges
        .iter()
        .map(|entry| format!("- {entry}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "# Daily Summary - {}\n\n## Progress\n- Habits: {}/{}\n- Tasks: {}/{}\n- Journal: {}{}\n\n## Habits\n{}\n\n## Tasks\n{}\n\n## Next\n{}\n",
        summary.date,
        summary.habits_completed,
        summary.habits_total,
        summary.tasks_completed,
        summary.tasks_total,
        if summary.journal_written {
            "written"
        } else {
            "not yet"
        },
        best_streak,
        habit_rows,
        task_rows,
        if nudge_rows.is_empty() {
            "- Nothing pending".to_string()
        } else {
            nudge_rows
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::habits::{Frequency, HabitCategory, NewHabit, add_habit, complete_habit};
    use crate::domain::settings::save_settings;
    use crate::domain::tasks::{Priority, TaskDraft, add_task, toggle_task};
    use chrono::Duration;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).expect("date")
    }

    fn seed(store: &Store) {
        let habit = add_habit(
            store,
            NewHabit {
                title: "Read for 20 minutes".to_string(),
                description: String::new(),
                category: HabitCategory::Learning,
                frequency: Frequency::Daily,
            },
        )
        .expect("habit");
        complete_habit(store, &habit.id, day() - Duration::days(1)).expect("yesterday");
        complete_habit(store, &habit.id, day()).expect("today");

        let task = add_task(
            store,
            TaskDraft {
                title: "Plan meals".to_string(),
                priority: Priority::High,
                description: None,
            },
            day(),
        )
        .expect("task");
        toggle_task(store, &task.id).expect("toggle");
    }

    #[test]
    fn counts_today_progress() {
        let store = Store::open_in_memory().expect("store");
        seed(&store);

        let summary = build_daily_summary(&store, day()).expect("summary");
        assert_eq!(summary.habits_completed, 1);
        assert_eq!(summary.tasks_completed, 1);
        assert_eq!(
            summary.best_streak.as_ref().and_then(|status| status.streak),
            Some(2)
        );
        assert_eq!(
            summary.nudges,
            vec![
                "Everything done for today. Nice work!".to_string(),
                "Close the day with `justly reflect`".to_string()
            ]
        );

        let markdown = render_markdown(&summary);
        assert!(markdown.contains("- [x] Read for 20 minutes (learning) - streak 2"));
        assert!(markdown.contains("- Best streak: Read for 20 minutes (2 days)"));
    }

    #[test]
    fn hides_streaks_when_privacy_says_so() {
        let store = Store::open_in_memory().expect("store");
        seed(&store);
        let mut settings = get_settings(&store).expect("settings");
        settings.privacy.show_streak = false;
        save_settings(&store, &settings).expect("save");

        let summary = build_daily_summary(&store, day()).expect("summary");
        assert!(summary.best_streak.is_none());
        assert!(summary.habits.iter().all(|status| status.streak.is_none()));

        let json = serde_json::to_value(&summary).expect("json");
        assert!(json["habits"][0].get("streak").is_none());
        assert!(json["best_streak"].is_null());

        let markdown = render_markdown(&summary);
        assert!(!markdown.contains("streak"));
        assert!(markdown.contains("- [x] Read for 20 minutes (learning)"));
    }
}
