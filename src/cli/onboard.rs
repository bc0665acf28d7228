use crate::domain::goals::GoalCategory;
use crate::domain::onboarding::{
    GoalDraft, HabitChoice, OnboardingOutcome, OnboardingPlan, complete_onboarding,
    suggested_habits,
};
use crate::session::Session;
use anyhow::{Context, Result, bail};
use dialoguer::{Input, MultiSelect, theme::ColorfulTheme};

pub fn run_onboarding(session: &Session) -> Result<OnboardingOutcome> {
    let user = session.require_user()?;

    println!("──────────────────────────────────────────");
    println!("  Welcome, {}! Let's set up your coach.", user.name);
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();

    println!("\n[1/3] Focus areas");
    let labels = GoalCategory::ALL
        .iter()
        .map(|category| category.label())
        .collect::<Vec<_>>();
    let picked = MultiSelect::with_theme(&theme)
        .with_prompt("  Which areas do you want to work on? (space to select)")
        .items(&labels)
        .interact()
        .context("Failed to read focus areas")?;
    if picked.is_empty() {
        bail!("Pick at least one focus area");
    }
    let categories = picked
        .into_iter()
        .filter_map(|index| GoalCategory::ALL.get(index).copied())
        .collect::<Vec<_>>();

    println!("\n[2/3] Goals");
    let mut goal_titles = Vec::new();
    for category in &categories {
        let title: String = Input::with_theme(&theme)
            .with_prompt(format!("  Your goal for {} (empty to skip)", category.label()))
            .allow_empty(true)
            .interact_text()
            .context("Failed to read goal")?;
        goal_titles.push(title);
    }

    println!("\n[3/3] Starter habits");
    let options = habit_options(&categories);
    let option_labels = options
        .iter()
        .map(|choice| {
            let suggested = &suggested_habits(choice.category)[choice.index];
            format!("{} - {}", suggested.title, suggested.description)
        })
        .collect::<Vec<_>>();
    let picked_habits = MultiSelect::with_theme(&theme)
        .with_prompt("  Pick habits to start with (space to select)")
        .items(&option_labels)
        .interact()
        .context("Failed to read habit choices")?;

    let plan = build_plan(&categories, &goal_titles, &options, &picked_habits);
    let outcome = complete_onboarding(session.store(), &plan)?;

    println!("\n──────────────────────────────────────────");
    println!(
        "  Onboarding complete: {} goal(s), {} habit(s).",
        outcome.goals.len(),
        outcome.habits.len()
    );
    println!("  Run `justly prep` each morning and `justly reflect` each evening.");
    println!("──────────────────────────────────────────");

    Ok(outcome)
}

fn habit_options(categories: &[GoalCategory]) -> Vec<HabitChoice> {
    categories
        .iter()
        .flat_map(|category| {
            (0..suggested_habits(*category).len()).map(|index| HabitChoice {
                category: *category,
                index,
            })
        })
        .collect()
}

fn build_plan(
    categories: &[GoalCategory],
    goal_titles: &[String],
    options: &[HabitChoice],
    picked_habits: &[usize],
) -> OnboardingPlan {
    OnboardingPlan {
        goals: categories
            .iter()
            .zip(goal_titles)
            .map(|(category, title)| GoalDraft {
                category: *category,
                title: title.trim().to_string(),
                description: String::new(),
            })
            .collect(),
        habits: picked_habits
            .iter()
            .filter_map(|index| options.get(*index).copied())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_cover_every_selected_area() {
        let options = habit_options(&[GoalCategory::Wellness, GoalCategory::Personal]);
        assert_eq!(options.len(), 6);
        assert_eq!(
            options[3],
            HabitChoice {
                category: GoalCategory::Personal,
                index: 0
            }
        );
    }

    #[test]
    fn plan_keeps_only_picked_habits() {
        let categories = [GoalCategory::Health, GoalCategory::Career];
        let options = habit_options(&categories);
        let plan = build_plan(
            &categories,
            &["Run 5k ".to_string(), String::new()],
            &options,
            &[0, 4, 42],
        );

        assert_eq!(plan.goals.len(), 2);
        assert_eq!(plan.goals[0].title, "Run 5k");
        assert_eq!(
            plan.habits,
            vec![
                HabitChoice {
                    category: GoalCategory::Health,
                    index: 0
                },
                HabitChoice {
                    category: GoalCategory::Career,
                    index: 1
                },
            ]
        );
    }
}
